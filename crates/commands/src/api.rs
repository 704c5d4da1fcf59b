//! REST client for the browser-automation backend.
//!
//! Each method maps to one backend endpoint and normalizes the response:
//! transport failures become `Error::Transport`, HTTP error payloads and
//! 200-with-error bodies become `Error::Backend`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use webpilot_core::protocol::{
    ApiErrorBody, ApiResponse, CursorEventRequest, FpsRequest, NavigateRequest, PromptRequest,
};
use webpilot_core::{Error, Result};

/// The backend's request/response surface. A trait seam so the dispatcher
/// can be exercised without a live server.
#[async_trait]
pub trait ControlApi: Send + Sync {
    async fn start_browser(&self) -> Result<ApiResponse>;
    async fn stop_browser(&self) -> Result<ApiResponse>;
    async fn navigate(&self, url: &str) -> Result<ApiResponse>;
    async fn run_agent(&self, prompt: &str) -> Result<ApiResponse>;
    async fn set_fps(&self, fps: u8) -> Result<ApiResponse>;
    async fn streaming_start(&self) -> Result<ApiResponse>;
    async fn streaming_stop(&self) -> Result<ApiResponse>;
    async fn cursor_event(&self, kind: u8, x: f64, y: f64) -> Result<ApiResponse>;
    async fn health(&self) -> Result<String>;
}

pub struct HttpControlApi {
    base_url: String,
    client: Client,
}

impl HttpControlApi {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_empty(&self, path: &str) -> Result<ApiResponse> {
        debug!(path, "POST");
        let response = self
            .client
            .post(self.endpoint(path))
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        normalize(response).await
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        debug!(path, "POST");
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        normalize(response).await
    }

    async fn get(&self, path: &str) -> Result<ApiResponse> {
        debug!(path, "GET");
        let response = self
            .client
            .get(self.endpoint(path))
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        normalize(response).await
    }
}

async fn normalize(response: reqwest::Response) -> Result<ApiResponse> {
    let status = response.status();
    if !status.is_success() {
        let detail = response
            .json::<ApiErrorBody>()
            .await
            .map(|b| b.detail)
            .unwrap_or_default();
        let detail = if detail.is_empty() {
            status.to_string()
        } else {
            detail
        };
        return Err(Error::Backend(detail));
    }
    let resp: ApiResponse = response
        .json()
        .await
        .map_err(|e| Error::Backend(format!("Unreadable response body: {}", e)))?;
    if resp.is_error() {
        return Err(Error::Backend(resp.message.clone()));
    }
    Ok(resp)
}

#[async_trait]
impl ControlApi for HttpControlApi {
    async fn start_browser(&self) -> Result<ApiResponse> {
        self.post_empty("/browser/start").await
    }

    async fn stop_browser(&self) -> Result<ApiResponse> {
        self.post_empty("/browser/stop").await
    }

    async fn navigate(&self, url: &str) -> Result<ApiResponse> {
        self.post_json("/browser/navigate", &NavigateRequest { url })
            .await
    }

    async fn run_agent(&self, prompt: &str) -> Result<ApiResponse> {
        self.post_json("/agent/run", &PromptRequest { prompt }).await
    }

    async fn set_fps(&self, fps: u8) -> Result<ApiResponse> {
        self.post_json("/streaming/set-fps", &FpsRequest { fps })
            .await
    }

    async fn streaming_start(&self) -> Result<ApiResponse> {
        self.get("/streaming/start").await
    }

    async fn streaming_stop(&self) -> Result<ApiResponse> {
        self.get("/streaming/stop").await
    }

    async fn cursor_event(&self, kind: u8, x: f64, y: f64) -> Result<ApiResponse> {
        self.post_json(
            "/browser/cursorEvent",
            &CursorEventRequest {
                kind,
                x_cord: x,
                y_cord: y,
            },
        )
        .await
    }

    async fn health(&self) -> Result<String> {
        let response = self
            .client
            .get(self.endpoint("/"))
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Backend(response.status().to_string()));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("Unreadable response body: {}", e)))?;
        Ok(body
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let api = HttpControlApi::new("http://localhost:8000/", Duration::from_secs(5));
        assert_eq!(
            api.endpoint("/browser/start"),
            "http://localhost:8000/browser/start"
        );
    }
}
