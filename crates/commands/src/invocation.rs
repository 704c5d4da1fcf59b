//! Invocation lifecycle tracking.
//!
//! One `Invocation` is created per submission and owned by the dispatcher
//! until it reaches a terminal state. Once `Started`, only a matching
//! terminal push update (or local abandonment) may resolve it.

use webpilot_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Pending,
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: String,
    pub command_id: String,
    pub input_text: String,
    pub state: InvocationState,
    /// Correlation key, present once the backend assigns one.
    pub interaction_id: Option<String>,
}

impl Invocation {
    pub fn new(command_id: &str, input_text: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            command_id: command_id.to_string(),
            input_text: input_text.to_string(),
            state: InvocationState::Pending,
            interaction_id: None,
        }
    }

    pub fn start(&mut self, interaction_id: &str) -> Result<()> {
        if self.state != InvocationState::Pending {
            return Err(Error::Session(format!(
                "Invocation {} cannot start from {:?}",
                self.id, self.state
            )));
        }
        self.state = InvocationState::Started;
        self.interaction_id = Some(interaction_id.to_string());
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.terminal(InvocationState::Completed)
    }

    pub fn fail(&mut self) -> Result<()> {
        self.terminal(InvocationState::Failed)
    }

    fn terminal(&mut self, to: InvocationState) -> Result<()> {
        if self.is_terminal() {
            return Err(Error::Session(format!(
                "Invocation {} already resolved as {:?}",
                self.id, self.state
            )));
        }
        self.state = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            InvocationState::Completed | InvocationState::Failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_to_started_to_completed() {
        let mut inv = Invocation::new("prompt", "do things");
        assert_eq!(inv.state, InvocationState::Pending);
        inv.start("x1").unwrap();
        assert_eq!(inv.interaction_id.as_deref(), Some("x1"));
        inv.complete().unwrap();
        assert!(inv.is_terminal());
    }

    #[test]
    fn test_pending_resolves_directly() {
        let mut inv = Invocation::new("navigate", "example.com");
        inv.complete().unwrap();
        assert_eq!(inv.state, InvocationState::Completed);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut inv = Invocation::new("prompt", "x");
        inv.fail().unwrap();
        assert!(inv.complete().is_err());
        assert!(inv.start("x2").is_err());
    }
}
