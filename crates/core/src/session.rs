//! Process-wide session state.
//!
//! One `SessionState` exists per client process. It is only ever written
//! through the methods below, by the push channel, the command dispatcher,
//! the update correlator, and explicit user controls. Observers subscribe
//! to a broadcast of [`SessionEvent`] values instead of polling.

use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{Error, Result};

pub const MIN_FRAME_RATE_HZ: u8 = 1;
pub const MAX_FRAME_RATE_HZ: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Disconnected,
    Connected,
}

/// Browser lifecycle phase. Transitions follow the strict cycle
/// `Idle → Starting → Running → Stopping → Idle`, with failure edges
/// `Starting → Idle` and `Stopping → Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserPhase {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for BrowserPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        write!(f, "{}", s)
    }
}

/// The most recent screenshot pushed by the backend. Replaced wholesale on
/// every push update, never mutated in place.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Base64-encoded PNG.
    pub data: String,
    pub url: String,
    pub received_at_ms: i64,
}

impl Frame {
    pub fn decode(&self) -> Result<Vec<u8>> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| Error::Protocol(format!("Bad screenshot payload: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOrigin {
    System,
    Agent,
    User,
}

impl std::fmt::Display for LogOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::System => "system",
            Self::Agent => "agent",
            Self::User => "user",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub origin: LogOrigin,
    pub text: String,
    pub is_error: bool,
    pub timestamp_ms: i64,
}

/// Change notifications fanned out to observers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connectivity(Connectivity),
    Phase(BrowserPhase),
    FrameReplaced,
    Loading(bool),
    FrameRate(u8),
    Log(LogEntry),
    Progress(Option<String>),
}

struct SessionInner {
    connectivity: Connectivity,
    phase: BrowserPhase,
    frame: Option<Frame>,
    loading: bool,
    frame_rate_hz: u8,
    log: Vec<LogEntry>,
    progress: Option<String>,
}

pub struct SessionState {
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionState {
    pub fn new(frame_rate_hz: u8) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Mutex::new(SessionInner {
                connectivity: Connectivity::Disconnected,
                phase: BrowserPhase::Idle,
                frame: None,
                loading: false,
                frame_rate_hz: frame_rate_hz.clamp(MIN_FRAME_RATE_HZ, MAX_FRAME_RATE_HZ),
                log: Vec::new(),
                progress: None,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn locked(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().expect("session state lock poisoned")
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine; the CLI one-shot paths never subscribe.
        let _ = self.events.send(event);
    }

    // ── Writers (channel lifecycle) ─────────────────────────────────────

    pub fn set_connectivity(&self, connectivity: Connectivity) {
        {
            let mut inner = self.locked();
            if inner.connectivity == connectivity {
                return;
            }
            inner.connectivity = connectivity;
        }
        self.emit(SessionEvent::Connectivity(connectivity));
    }

    // ── Writers (dispatcher, correlator, user controls) ─────────────────

    /// Advance the browser phase. Same-phase calls are no-ops; anything
    /// outside the cycle and its failure edges is rejected.
    pub fn set_phase(&self, to: BrowserPhase) -> Result<()> {
        use BrowserPhase::*;
        let cleared_frame = {
            let mut inner = self.locked();
            let from = inner.phase;
            if from == to {
                return Ok(());
            }
            let allowed = matches!(
                (from, to),
                (Idle, Starting)
                    | (Starting, Running)
                    | (Starting, Idle)
                    | (Running, Stopping)
                    | (Stopping, Idle)
                    | (Stopping, Running)
            );
            if !allowed {
                return Err(Error::Session(format!(
                    "Invalid phase transition: {} -> {}",
                    from, to
                )));
            }
            inner.phase = to;
            // A screenshot is only meaningful while the browser runs.
            to == Idle && inner.frame.take().is_some()
        };
        self.emit(SessionEvent::Phase(to));
        if cleared_frame {
            self.emit(SessionEvent::FrameReplaced);
        }
        Ok(())
    }

    /// Prime a freshly created mirror with the phase the backend is known
    /// to be in. Only for process startup (one-shot CLI invocations whose
    /// mirror begins at `Idle`); live transitions go through `set_phase`.
    pub fn assume_phase(&self, phase: BrowserPhase) {
        {
            let mut inner = self.locked();
            if inner.phase == phase {
                return;
            }
            inner.phase = phase;
        }
        self.emit(SessionEvent::Phase(phase));
    }

    pub fn set_frame(&self, frame: Frame) {
        let was_loading = {
            let mut inner = self.locked();
            inner.frame = Some(frame);
            std::mem::replace(&mut inner.loading, false)
        };
        self.emit(SessionEvent::FrameReplaced);
        if was_loading {
            self.emit(SessionEvent::Loading(false));
        }
    }

    pub fn clear_frame(&self) {
        {
            let mut inner = self.locked();
            if inner.frame.take().is_none() {
                return;
            }
        }
        self.emit(SessionEvent::FrameReplaced);
    }

    pub fn set_loading(&self, loading: bool) {
        {
            let mut inner = self.locked();
            if inner.loading == loading {
                return;
            }
            inner.loading = loading;
        }
        self.emit(SessionEvent::Loading(loading));
    }

    pub fn set_frame_rate(&self, hz: u8) -> Result<()> {
        if !(MIN_FRAME_RATE_HZ..=MAX_FRAME_RATE_HZ).contains(&hz) {
            return Err(Error::Validation(format!(
                "Frame rate must be within {}-{} Hz, got {}",
                MIN_FRAME_RATE_HZ, MAX_FRAME_RATE_HZ, hz
            )));
        }
        {
            let mut inner = self.locked();
            inner.frame_rate_hz = hz;
        }
        self.emit(SessionEvent::FrameRate(hz));
        Ok(())
    }

    pub fn set_progress(&self, note: Option<String>) {
        {
            let mut inner = self.locked();
            if inner.progress == note {
                return;
            }
            inner.progress = note.clone();
        }
        self.emit(SessionEvent::Progress(note));
    }

    pub fn append_log(&self, origin: LogOrigin, text: impl Into<String>, is_error: bool) {
        let entry = LogEntry {
            origin,
            text: text.into(),
            is_error,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        };
        debug!(origin = %entry.origin, is_error, "session log: {}", entry.text);
        {
            let mut inner = self.locked();
            inner.log.push(entry.clone());
        }
        self.emit(SessionEvent::Log(entry));
    }

    // ── Readers ─────────────────────────────────────────────────────────

    pub fn connectivity(&self) -> Connectivity {
        self.locked().connectivity
    }

    pub fn phase(&self) -> BrowserPhase {
        self.locked().phase
    }

    pub fn frame(&self) -> Option<Frame> {
        self.locked().frame.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.locked().loading
    }

    pub fn frame_rate(&self) -> u8 {
        self.locked().frame_rate_hz
    }

    pub fn progress(&self) -> Option<String> {
        self.locked().progress.clone()
    }

    pub fn log_snapshot(&self) -> Vec<LogEntry> {
        self.locked().log.clone()
    }

    pub fn log_len(&self) -> usize {
        self.locked().log.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame {
            data: "aGVsbG8=".to_string(),
            url: "https://example.com".to_string(),
            received_at_ms: 0,
        }
    }

    #[test]
    fn test_phase_cycle() {
        let session = SessionState::new(5);
        assert_eq!(session.phase(), BrowserPhase::Idle);
        session.set_phase(BrowserPhase::Starting).unwrap();
        session.set_phase(BrowserPhase::Running).unwrap();
        session.set_phase(BrowserPhase::Stopping).unwrap();
        session.set_phase(BrowserPhase::Idle).unwrap();
    }

    #[test]
    fn test_phase_failure_reversions() {
        let session = SessionState::new(5);
        session.set_phase(BrowserPhase::Starting).unwrap();
        session.set_phase(BrowserPhase::Idle).unwrap();

        session.set_phase(BrowserPhase::Starting).unwrap();
        session.set_phase(BrowserPhase::Running).unwrap();
        session.set_phase(BrowserPhase::Stopping).unwrap();
        session.set_phase(BrowserPhase::Running).unwrap();
    }

    #[test]
    fn test_phase_rejects_skipped_states() {
        let session = SessionState::new(5);
        assert!(session.set_phase(BrowserPhase::Running).is_err());
        assert!(session.set_phase(BrowserPhase::Stopping).is_err());
        // Same-phase is tolerated.
        session.set_phase(BrowserPhase::Idle).unwrap();
    }

    #[test]
    fn test_stop_clears_frame() {
        let session = SessionState::new(5);
        session.set_phase(BrowserPhase::Starting).unwrap();
        session.set_phase(BrowserPhase::Running).unwrap();
        session.set_frame(frame());
        assert!(session.frame().is_some());

        session.set_phase(BrowserPhase::Stopping).unwrap();
        session.set_phase(BrowserPhase::Idle).unwrap();
        assert!(session.frame().is_none());
    }

    #[test]
    fn test_frame_replaces_and_clears_loading() {
        let session = SessionState::new(5);
        session.set_loading(true);
        session.set_frame(frame());
        assert!(!session.is_loading());
        assert_eq!(session.frame().unwrap().url, "https://example.com");
    }

    #[test]
    fn test_frame_rate_bounds() {
        let session = SessionState::new(5);
        assert!(session.set_frame_rate(0).is_err());
        assert!(session.set_frame_rate(31).is_err());
        session.set_frame_rate(30).unwrap();
        assert_eq!(session.frame_rate(), 30);
    }

    #[test]
    fn test_log_is_append_only_and_ordered() {
        let session = SessionState::new(5);
        session.append_log(LogOrigin::System, "first", false);
        session.append_log(LogOrigin::Agent, "second", true);
        let log = session.log_snapshot();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].text, "first");
        assert!(log[1].is_error);
    }

    #[tokio::test]
    async fn test_observers_receive_events() {
        let session = SessionState::new(5);
        let mut rx = session.subscribe();
        session.set_connectivity(Connectivity::Connected);
        match rx.recv().await.unwrap() {
            SessionEvent::Connectivity(Connectivity::Connected) => {}
            other => panic!("unexpected event: {:?}", other),
        }
        // Redundant writes do not re-notify.
        session.set_connectivity(Connectivity::Connected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_frame_decode() {
        let f = frame();
        assert_eq!(f.decode().unwrap(), b"hello");
        let bad = Frame {
            data: "!!".to_string(),
            ..frame()
        };
        assert!(bad.decode().is_err());
    }
}
