//! The push channel to the backend.
//!
//! One logical WebSocket connection carries screenshots, agent messages,
//! and task updates from the server. The channel decodes inbound frames,
//! applies screenshot/message frames to the session, and queues update
//! frames for the correlator. It never reconnects on its own; reconnection
//! is an explicit caller action.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

use webpilot_core::protocol::{PushFrame, PushUpdate};
use webpilot_core::session::{Connectivity, Frame, LogOrigin, SessionState};
use webpilot_core::{Error, Result};

const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

struct Connection {
    writer: JoinHandle<()>,
    keepalive: JoinHandle<()>,
    reader: Option<JoinHandle<()>>,
}

/// A single persistent push connection. `connect` and `disconnect` are
/// idempotent; the caller decides when to (re)connect.
pub struct PushChannel {
    session: Arc<SessionState>,
    keepalive_interval: Duration,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl PushChannel {
    pub fn new(session: Arc<SessionState>) -> Self {
        Self::with_keepalive(session, DEFAULT_KEEPALIVE)
    }

    pub fn with_keepalive(session: Arc<SessionState>, keepalive_interval: Duration) -> Self {
        Self {
            session,
            keepalive_interval,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.lock().expect("channel lock poisoned").is_some()
    }

    /// Open the channel. A no-op when already open. Decoded updates are
    /// queued on `update_tx`; dropping that queue's receiver only drops
    /// updates, not the channel itself.
    pub async fn connect(
        &self,
        ws_url: &str,
        update_tx: mpsc::Sender<PushUpdate>,
    ) -> Result<()> {
        if self.is_connected() {
            debug!("Push channel already connected");
            return Ok(());
        }

        url::Url::parse(ws_url)
            .map_err(|e| Error::Channel(format!("Invalid push channel URL: {}", e)))?;
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::Channel(format!("WebSocket connection failed: {}", e)))?;
        info!(url = %ws_url, "Push channel connected");

        let (mut sink, mut stream) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(64);

        // Writer task: owns the sink, forwards outbound frames.
        let writer = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = sink.send(WsMessage::Text(text)).await {
                    error!(error = %e, "Push channel write error");
                    break;
                }
            }
        });

        // Keepalive task: periodic ping until the writer goes away.
        let keepalive = tokio::spawn({
            let out_tx = out_tx.clone();
            let interval = self.keepalive_interval;
            async move {
                loop {
                    tokio::time::sleep(interval).await;
                    if out_tx.send(PushFrame::ping()).await.is_err() {
                        break;
                    }
                }
            }
        });

        self.session.set_connectivity(Connectivity::Connected);
        self.session
            .append_log(LogOrigin::System, "Connected to browser session", false);

        {
            let mut conn = self.conn.lock().expect("channel lock poisoned");
            *conn = Some(Connection {
                writer,
                keepalive,
                reader: None,
            });
        }

        // Reader task: decodes and routes frames until the stream ends,
        // then tears the connection slot down so a later connect starts
        // fresh. Dropping `update_tx` here closes the correlator's queue,
        // which is its disconnect signal.
        let session = self.session.clone();
        let conn_slot = self.conn.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => route_frame(&text, &session, &update_tx).await,
                    Ok(WsMessage::Close(_)) => {
                        info!("Push channel closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Push channel read error");
                        break;
                    }
                }
            }
            if let Some(conn) = conn_slot.lock().expect("channel lock poisoned").take() {
                conn.keepalive.abort();
                conn.writer.abort();
            }
            session.set_connectivity(Connectivity::Disconnected);
            session.append_log(LogOrigin::System, "Push channel disconnected", false);
        });

        let mut conn = self.conn.lock().expect("channel lock poisoned");
        if let Some(conn) = conn.as_mut() {
            conn.reader = Some(reader);
        }
        Ok(())
    }

    /// Close the channel. A no-op when already closed.
    pub async fn disconnect(&self) {
        let conn = self.conn.lock().expect("channel lock poisoned").take();
        let Some(conn) = conn else {
            debug!("Push channel already closed");
            return;
        };
        conn.keepalive.abort();
        conn.writer.abort();
        if let Some(reader) = conn.reader {
            reader.abort();
        }
        self.session.set_connectivity(Connectivity::Disconnected);
        self.session
            .append_log(LogOrigin::System, "Push channel disconnected", false);
        info!("Push channel disconnected");
    }
}

/// Apply one inbound frame. Malformed frames are logged and dropped; they
/// never terminate the channel.
async fn route_frame(
    raw: &str,
    session: &SessionState,
    update_tx: &mpsc::Sender<PushUpdate>,
) {
    match PushFrame::decode(raw) {
        Ok(Some(PushFrame::Screenshot { data, url })) => {
            session.set_frame(Frame {
                data,
                url,
                received_at_ms: chrono::Utc::now().timestamp_millis(),
            });
        }
        Ok(Some(PushFrame::Message { text })) => {
            session.append_log(LogOrigin::Agent, text, false);
        }
        Ok(Some(PushFrame::Update(update))) => {
            if update_tx.send(update).await.is_err() {
                debug!("No update consumer attached, dropping update");
            }
        }
        Ok(Some(PushFrame::Pong)) => {
            debug!("Keepalive pong received");
        }
        Ok(None) => {
            debug!("Ignoring unrecognized push frame");
        }
        Err(e) => {
            warn!(error = %e, "Dropping malformed push frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core::protocol::UpdateStatus;

    fn session() -> Arc<SessionState> {
        Arc::new(SessionState::new(5))
    }

    #[tokio::test]
    async fn test_route_screenshot_replaces_frame() {
        let session = session();
        let (tx, _rx) = mpsc::channel(8);
        session.set_loading(true);

        let raw = r#"{"type":"screenshot","data":"aGVsbG8=","url":"https://example.com"}"#;
        route_frame(raw, &session, &tx).await;

        let frame = session.frame().expect("frame should be set");
        assert_eq!(frame.url, "https://example.com");
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_route_message_appends_agent_log() {
        let session = session();
        let (tx, _rx) = mpsc::channel(8);

        route_frame(r#"{"type":"message","data":"thinking"}"#, &session, &tx).await;

        let log = session.log_snapshot();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].origin, LogOrigin::Agent);
        assert_eq!(log[0].text, "thinking");
    }

    #[tokio::test]
    async fn test_route_update_is_queued() {
        let session = session();
        let (tx, mut rx) = mpsc::channel(8);

        let raw = r#"{"type":"update","status":"step","interaction_id":"x1","data":{}}"#;
        route_frame(raw, &session, &tx).await;

        let update = rx.recv().await.unwrap();
        assert_eq!(update.status, UpdateStatus::Step);
        assert_eq!(update.interaction_id, "x1");
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_frames_are_dropped() {
        let session = session();
        let (tx, mut rx) = mpsc::channel(8);

        route_frame("not json", &session, &tx).await;
        route_frame(r#"{"type":"telemetry"}"#, &session, &tx).await;
        route_frame(r#"{"type":"pong"}"#, &session, &tx).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(session.log_len(), 0);
        assert!(session.frame().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_when_closed_is_noop() {
        let session = session();
        let channel = PushChannel::new(session.clone());
        assert!(!channel.is_connected());
        channel.disconnect().await;
        assert_eq!(session.log_len(), 0);
    }
}
