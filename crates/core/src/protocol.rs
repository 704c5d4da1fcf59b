//! Wire types for the backend's REST and push-channel protocol.
//!
//! The push channel carries frames discriminated by a `type` field;
//! unrecognized types decode to `None` so new server-side frame kinds
//! never break the channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Cursor event kinds accepted by `POST /browser/cursorEvent`.
pub const CURSOR_HOVER: u8 = 1;
pub const CURSOR_CLICK: u8 = 2;

/// Status discriminator on asynchronous task updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Step,
    Completed,
    Failed,
}

/// An out-of-band update for an asynchronous interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushUpdate {
    pub status: UpdateStatus,
    pub interaction_id: String,
    #[serde(default)]
    pub data: Value,
}

impl PushUpdate {
    /// Final message carried by a terminal update, if any.
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(|v| v.as_str())
    }
}

/// A decoded inbound push-channel frame.
#[derive(Debug, Clone)]
pub enum PushFrame {
    Screenshot { data: String, url: String },
    Message { text: String },
    Update(PushUpdate),
    Pong,
}

impl PushFrame {
    /// Decode a raw frame. `Ok(None)` for unrecognized types, `Err` for
    /// frames that fail to parse.
    pub fn decode(raw: &str) -> Result<Option<PushFrame>> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| Error::Protocol(format!("Malformed push frame: {}", e)))?;
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Protocol("Push frame missing type".to_string()))?;

        match kind {
            "screenshot" => {
                let data = value
                    .get("data")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::Protocol("Screenshot frame missing data".to_string()))?
                    .to_string();
                let url = value
                    .get("url")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(Some(PushFrame::Screenshot { data, url }))
            }
            "message" => {
                let text = value
                    .get("data")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(Some(PushFrame::Message { text }))
            }
            "update" => {
                let update: PushUpdate = serde_json::from_value(value)
                    .map_err(|e| Error::Protocol(format!("Malformed update frame: {}", e)))?;
                Ok(Some(PushFrame::Update(update)))
            }
            "pong" => Ok(Some(PushFrame::Pong)),
            _ => Ok(None),
        }
    }

    /// The outbound keepalive frame.
    pub fn ping() -> String {
        r#"{"type":"ping"}"#.to_string()
    }
}

/// Uniform REST response body (`{status, message, interaction_id?}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub interaction_id: Option<String>,
}

impl ApiResponse {
    /// HTTP 200 responses can still carry an error payload.
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// Error body on non-2xx responses (`{detail}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigateRequest<'a> {
    pub url: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptRequest<'a> {
    pub prompt: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct FpsRequest {
    pub fps: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct CursorEventRequest {
    #[serde(rename = "type")]
    pub kind: u8,
    pub x_cord: f64,
    pub y_cord: f64,
}
