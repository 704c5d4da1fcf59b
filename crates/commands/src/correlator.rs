//! Correlates asynchronous push updates with the outstanding invocation.
//!
//! At most one interaction is ever outstanding. A submission reserves the
//! slot before its REST call and either releases it (synchronous result,
//! failure) or arms it with the backend-assigned interaction id. Armed
//! interactions resolve through a oneshot when a matching terminal update
//! arrives; updates for any other id are discarded silently.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::invocation::Invocation;
use webpilot_core::protocol::{PushUpdate, UpdateStatus};
use webpilot_core::session::{LogOrigin, SessionState};
use webpilot_core::{Error, Result};

/// Terminal resolution of an asynchronous invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResolution {
    Completed(String),
    Failed(String),
}

enum Slot {
    Empty,
    /// Held while the submission's REST call is in flight.
    Reserved { invocation_id: String },
    Armed(Outstanding),
}

struct Outstanding {
    /// The `Started` invocation; only a matching terminal update (or local
    /// abandonment) moves it to `Completed`/`Failed`.
    invocation: Invocation,
    interaction_id: String,
    tx: oneshot::Sender<TaskResolution>,
}

#[derive(Default)]
pub struct UpdateCorrelator {
    slot: Mutex<Slot>,
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Empty
    }
}

impl UpdateCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().expect("correlator lock poisoned")
    }

    /// True while any submission holds the slot, reserved or armed.
    pub fn is_busy(&self) -> bool {
        !matches!(&*self.locked(), Slot::Empty)
    }

    pub fn outstanding_interaction(&self) -> Option<String> {
        match &*self.locked() {
            Slot::Armed(outstanding) => Some(outstanding.interaction_id.clone()),
            _ => None,
        }
    }

    /// Claim the slot for a submission about to dispatch.
    pub fn reserve(&self, invocation_id: &str) -> Result<()> {
        let mut slot = self.locked();
        if !matches!(&*slot, Slot::Empty) {
            return Err(Error::Busy(
                "Another command is still running".to_string(),
            ));
        }
        *slot = Slot::Reserved {
            invocation_id: invocation_id.to_string(),
        };
        Ok(())
    }

    /// Give the slot back after a synchronous result or a dispatch failure.
    pub fn release(&self, invocation_id: &str) {
        let mut slot = self.locked();
        if matches!(&*slot, Slot::Reserved { invocation_id: held } if held.as_str() == invocation_id)
        {
            *slot = Slot::Empty;
        }
    }

    /// Attach the started invocation and its backend-assigned interaction
    /// id to the reserved slot, and hand back the resolution channel.
    pub fn arm(
        &self,
        invocation: Invocation,
        interaction_id: &str,
    ) -> Result<oneshot::Receiver<TaskResolution>> {
        let mut slot = self.locked();
        match &*slot {
            Slot::Reserved { invocation_id: held } if held.as_str() == invocation.id => {
                let (tx, rx) = oneshot::channel();
                *slot = Slot::Armed(Outstanding {
                    invocation,
                    interaction_id: interaction_id.to_string(),
                    tx,
                });
                Ok(rx)
            }
            _ => Err(Error::Session(format!(
                "Cannot arm interaction {}: slot not reserved by invocation {}",
                interaction_id, invocation.id
            ))),
        }
    }

    /// Apply one push update. Non-matching ids are stale or duplicate
    /// deliveries and are dropped without any state change.
    pub fn handle_update(&self, update: PushUpdate, session: &SessionState) {
        let mut slot = self.locked();
        let matches_outstanding = matches!(
            &*slot,
            Slot::Armed(outstanding) if outstanding.interaction_id == update.interaction_id
        );
        if !matches_outstanding {
            debug!(
                interaction_id = %update.interaction_id,
                "Discarding update for unknown interaction"
            );
            return;
        }

        match update.status {
            UpdateStatus::Step => {
                session.set_progress(Some(describe_step(&update.data)));
            }
            UpdateStatus::Completed => {
                if let Slot::Armed(mut outstanding) = std::mem::take(&mut *slot) {
                    let message = update.message().unwrap_or("Task completed").to_string();
                    info!(
                        interaction_id = %outstanding.interaction_id,
                        "Agent task completed"
                    );
                    let _ = outstanding.invocation.complete();
                    session.set_progress(None);
                    session.append_log(LogOrigin::Agent, &message, false);
                    let _ = outstanding.tx.send(TaskResolution::Completed(message));
                }
            }
            UpdateStatus::Failed => {
                if let Slot::Armed(mut outstanding) = std::mem::take(&mut *slot) {
                    let message = update.message().unwrap_or("Agent task failed").to_string();
                    info!(
                        interaction_id = %outstanding.interaction_id,
                        "Agent task failed"
                    );
                    let _ = outstanding.invocation.fail();
                    session.set_progress(None);
                    session.append_log(LogOrigin::Agent, &message, true);
                    let _ = outstanding.tx.send(TaskResolution::Failed(message));
                }
            }
        }
    }

    /// Fail the outstanding interaction locally and clear the slot, so a
    /// stale update can never resolve it after a disconnect or a
    /// browser-stop. Reserved slots are left alone; their REST call is
    /// still in flight and will resolve on its own.
    pub fn abandon(&self, reason: &str, session: &SessionState) {
        let mut slot = self.locked();
        if !matches!(&*slot, Slot::Armed(_)) {
            return;
        }
        if let Slot::Armed(mut outstanding) = std::mem::take(&mut *slot) {
            info!(
                interaction_id = %outstanding.interaction_id,
                reason,
                "Abandoning outstanding interaction"
            );
            let _ = outstanding.invocation.fail();
            session.set_progress(None);
            session.append_log(
                LogOrigin::System,
                format!("Agent task failed: {}", reason),
                true,
            );
            let _ = outstanding.tx.send(TaskResolution::Failed(reason.to_string()));
        }
    }
}

/// Human-readable progress note for a step update.
fn describe_step(data: &Value) -> String {
    match data.get("system").and_then(|v| v.as_str()) {
        Some(tool) => format!("Agent is using {}", tool),
        None => "Agent is working".to_string(),
    }
}

/// Drain push updates into the correlator. The queue closing means the
/// channel went away, so the outstanding interaction (if any) is failed
/// locally rather than left dangling across a later reconnect.
pub async fn run_updates(
    correlator: Arc<UpdateCorrelator>,
    session: Arc<SessionState>,
    mut updates: mpsc::Receiver<PushUpdate>,
) {
    while let Some(update) = updates.recv().await {
        correlator.handle_update(update, &session);
    }
    correlator.abandon("push channel disconnected", &session);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(status: UpdateStatus, interaction_id: &str, data: Value) -> PushUpdate {
        PushUpdate {
            status,
            interaction_id: interaction_id.to_string(),
            data,
        }
    }

    fn armed(correlator: &UpdateCorrelator) -> oneshot::Receiver<TaskResolution> {
        let mut invocation = Invocation::new("prompt", "do things");
        correlator.reserve(&invocation.id).unwrap();
        invocation.start("x1").unwrap();
        correlator.arm(invocation, "x1").unwrap()
    }

    #[test]
    fn test_reserve_is_exclusive() {
        let correlator = UpdateCorrelator::new();
        correlator.reserve("inv-1").unwrap();
        assert!(correlator.is_busy());
        assert!(matches!(
            correlator.reserve("inv-2"),
            Err(Error::Busy(_))
        ));
        correlator.release("inv-1");
        assert!(!correlator.is_busy());
        correlator.reserve("inv-2").unwrap();
    }

    #[test]
    fn test_release_requires_matching_invocation() {
        let correlator = UpdateCorrelator::new();
        correlator.reserve("inv-1").unwrap();
        correlator.release("inv-2");
        assert!(correlator.is_busy());
    }

    #[test]
    fn test_arm_requires_reservation() {
        let correlator = UpdateCorrelator::new();
        let invocation = Invocation::new("prompt", "x");
        assert!(correlator.arm(invocation.clone(), "x1").is_err());

        correlator.reserve(&invocation.id).unwrap();
        let other = Invocation::new("prompt", "y");
        assert!(correlator.arm(other, "x1").is_err());

        correlator.arm(invocation, "x1").unwrap();
        assert_eq!(correlator.outstanding_interaction().as_deref(), Some("x1"));
    }

    #[tokio::test]
    async fn test_step_then_completed_resolves() {
        let correlator = UpdateCorrelator::new();
        let session = SessionState::new(5);
        let rx = armed(&correlator);

        correlator.handle_update(
            update(
                UpdateStatus::Step,
                "x1",
                json!({"type": "tool_use", "system": "screenshot"}),
            ),
            &session,
        );
        assert!(correlator.is_busy());
        assert_eq!(
            session.progress().as_deref(),
            Some("Agent is using screenshot")
        );

        correlator.handle_update(
            update(UpdateStatus::Completed, "x1", json!({"message": "Done"})),
            &session,
        );
        assert!(!correlator.is_busy());
        assert!(session.progress().is_none());
        assert_eq!(rx.await.unwrap(), TaskResolution::Completed("Done".to_string()));
    }

    #[tokio::test]
    async fn test_mismatched_update_is_discarded() {
        let correlator = UpdateCorrelator::new();
        let session = SessionState::new(5);
        let mut rx = armed(&correlator);

        correlator.handle_update(
            update(UpdateStatus::Completed, "x2", json!({"message": "nope"})),
            &session,
        );
        assert!(correlator.is_busy());
        assert_eq!(session.log_len(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_update_resolves_with_error() {
        let correlator = UpdateCorrelator::new();
        let session = SessionState::new(5);
        let rx = armed(&correlator);

        correlator.handle_update(update(UpdateStatus::Failed, "x1", Value::Null), &session);
        assert_eq!(
            rx.await.unwrap(),
            TaskResolution::Failed("Agent task failed".to_string())
        );
        let log = session.log_snapshot();
        assert!(log.last().unwrap().is_error);
    }

    #[tokio::test]
    async fn test_abandon_fails_outstanding_then_ignores_stale() {
        let correlator = UpdateCorrelator::new();
        let session = SessionState::new(5);
        let rx = armed(&correlator);

        correlator.abandon("push channel disconnected", &session);
        assert!(!correlator.is_busy());
        assert_eq!(
            rx.await.unwrap(),
            TaskResolution::Failed("push channel disconnected".to_string())
        );

        // A stale terminal update for the old id changes nothing.
        let before = session.log_len();
        correlator.handle_update(
            update(UpdateStatus::Completed, "x1", json!({"message": "late"})),
            &session,
        );
        assert_eq!(session.log_len(), before);
        assert!(!correlator.is_busy());
    }

    #[tokio::test]
    async fn test_abandon_leaves_reserved_slot() {
        let correlator = UpdateCorrelator::new();
        let session = SessionState::new(5);
        correlator.reserve("inv-1").unwrap();
        correlator.abandon("disconnect", &session);
        assert!(correlator.is_busy());
    }

    #[tokio::test]
    async fn test_run_updates_abandons_on_queue_close() {
        let correlator = Arc::new(UpdateCorrelator::new());
        let session = Arc::new(SessionState::new(5));
        let rx = armed(&correlator);

        let (tx, updates) = mpsc::channel(8);
        let driver = tokio::spawn(run_updates(
            correlator.clone(),
            session.clone(),
            updates,
        ));

        tx.send(update(UpdateStatus::Step, "x1", Value::Null))
            .await
            .unwrap();
        drop(tx);
        driver.await.unwrap();

        assert_eq!(
            rx.await.unwrap(),
            TaskResolution::Failed("push channel disconnected".to_string())
        );
        assert!(!correlator.is_busy());
    }
}
