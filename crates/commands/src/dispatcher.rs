//! Submits commands against the backend and normalizes the outcomes.
//!
//! All dispatch-path errors stop here: they become a session log entry
//! plus an invocation state change, and are handed back as values for the
//! caller to display. Validation rejections happen before any network
//! call and leave the session untouched.

use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::api::ControlApi;
use crate::correlator::{TaskResolution, UpdateCorrelator};
use crate::invocation::Invocation;
use crate::registry::{self, CommandDefinition, CommandKind};
use webpilot_core::protocol::{ApiResponse, CURSOR_CLICK};
use webpilot_core::session::{
    BrowserPhase, Connectivity, LogOrigin, SessionState, MAX_FRAME_RATE_HZ, MIN_FRAME_RATE_HZ,
};
use webpilot_core::{Error, Result};

/// What a submission produced.
pub enum Outcome {
    /// The backend answered with a final result.
    Completed { message: String },
    /// The backend started an asynchronous task; resolution arrives later
    /// through the push channel.
    Started {
        interaction_id: String,
        resolution: oneshot::Receiver<TaskResolution>,
    },
}

pub struct CommandDispatcher {
    api: Arc<dyn ControlApi>,
    session: Arc<SessionState>,
    correlator: Arc<UpdateCorrelator>,
}

impl CommandDispatcher {
    pub fn new(
        api: Arc<dyn ControlApi>,
        session: Arc<SessionState>,
        correlator: Arc<UpdateCorrelator>,
    ) -> Self {
        Self {
            api,
            session,
            correlator,
        }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn correlator(&self) -> &Arc<UpdateCorrelator> {
        &self.correlator
    }

    /// Submit one command. Rejected without side effects when the input is
    /// empty, fails validation, or another invocation is outstanding.
    pub async fn submit(&self, command_id: &str, text: &str) -> Result<Outcome> {
        let definition = registry::find(command_id)
            .ok_or_else(|| Error::Validation(format!("Unknown command: {}", command_id)))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Input is empty".to_string()));
        }
        if !definition.validate(text) {
            return Err(Error::Validation(format!(
                "Input rejected for {}: {}",
                definition.id, text
            )));
        }
        if self.correlator.is_busy() {
            return Err(Error::Busy("Another command is still running".to_string()));
        }

        let mut invocation = Invocation::new(definition.id, text);
        self.session
            .append_log(LogOrigin::User, &invocation.input_text, false);
        match definition.kind {
            CommandKind::Navigate => self.dispatch_navigate(&mut invocation).await,
            CommandKind::ListActions => self.dispatch_list_actions(&mut invocation),
            CommandKind::Prompt => self.dispatch_prompt(definition, &mut invocation).await,
        }
    }

    async fn dispatch_navigate(&self, invocation: &mut Invocation) -> Result<Outcome> {
        self.session.set_loading(true);
        match self.api.navigate(&invocation.input_text).await {
            Ok(resp) => {
                invocation.complete()?;
                self.session
                    .append_log(LogOrigin::System, &resp.message, false);
                Ok(Outcome::Completed {
                    message: resp.message,
                })
            }
            Err(e) => {
                self.session.set_loading(false);
                self.fail_invocation(invocation, e)
            }
        }
    }

    fn dispatch_list_actions(&self, invocation: &mut Invocation) -> Result<Outcome> {
        let matches = registry::matching(&invocation.input_text);
        let message = if matches.is_empty() {
            format!("No actions match '{}'", invocation.input_text)
        } else {
            matches
                .iter()
                .map(|c| format!("/{} — {}", c.id, c.description))
                .collect::<Vec<_>>()
                .join("\n")
        };
        invocation.complete()?;
        self.session.append_log(LogOrigin::System, &message, false);
        Ok(Outcome::Completed { message })
    }

    async fn dispatch_prompt(
        &self,
        definition: &'static CommandDefinition,
        invocation: &mut Invocation,
    ) -> Result<Outcome> {
        self.correlator.reserve(&invocation.id)?;
        match self.api.run_agent(&invocation.input_text).await {
            Ok(resp) => match resp.interaction_id.clone() {
                Some(interaction_id) => {
                    invocation.start(&interaction_id)?;
                    let resolution = self
                        .correlator
                        .arm(invocation.clone(), &interaction_id)?;
                    info!(interaction_id = %interaction_id, "Agent task started");
                    self.session
                        .append_log(LogOrigin::System, definition.running_label, false);
                    if self.session.connectivity() == Connectivity::Disconnected {
                        // No terminal update can arrive without the push
                        // channel, so the task fails locally right away.
                        warn!("Agent task started without a push channel");
                        self.correlator
                            .abandon("push channel not connected", &self.session);
                    }
                    Ok(Outcome::Started {
                        interaction_id,
                        resolution,
                    })
                }
                None => {
                    self.correlator.release(&invocation.id);
                    invocation.complete()?;
                    self.session
                        .append_log(LogOrigin::System, &resp.message, false);
                    Ok(Outcome::Completed {
                        message: resp.message,
                    })
                }
            },
            Err(e) => {
                self.correlator.release(&invocation.id);
                self.fail_invocation(invocation, e)
            }
        }
    }

    fn fail_invocation(&self, invocation: &mut Invocation, err: Error) -> Result<Outcome> {
        invocation.fail()?;
        self.session.append_log(
            LogOrigin::System,
            format!("{} failed: {}", invocation.command_id, err),
            true,
        );
        Err(err)
    }

    // ── Browser lifecycle and user controls ─────────────────────────────

    pub async fn start_browser(&self) -> Result<String> {
        if self.session.phase() == BrowserPhase::Running {
            let message = "Browser already running".to_string();
            self.session.append_log(LogOrigin::System, &message, false);
            return Ok(message);
        }
        self.session.set_phase(BrowserPhase::Starting)?;
        match self.api.start_browser().await {
            Ok(resp) => {
                self.session.set_phase(BrowserPhase::Running)?;
                self.session
                    .append_log(LogOrigin::System, &resp.message, false);
                Ok(resp.message)
            }
            Err(e) => {
                self.session.set_phase(BrowserPhase::Idle)?;
                self.session.append_log(
                    LogOrigin::System,
                    format!("Browser start failed: {}", e),
                    true,
                );
                Err(e)
            }
        }
    }

    pub async fn stop_browser(&self) -> Result<String> {
        if self.session.phase() == BrowserPhase::Idle {
            let message = "Browser is not running".to_string();
            self.session.append_log(LogOrigin::System, &message, false);
            return Ok(message);
        }
        // Stopping abandons any outstanding agent task; its updates would
        // be meaningless once the browser is gone.
        self.correlator.abandon("browser is stopping", &self.session);
        self.session.set_phase(BrowserPhase::Stopping)?;
        match self.api.stop_browser().await {
            Ok(resp) => {
                self.session.set_phase(BrowserPhase::Idle)?;
                self.session
                    .append_log(LogOrigin::System, &resp.message, false);
                Ok(resp.message)
            }
            Err(e) => {
                // The backend session is assumed to still be alive.
                self.session.set_phase(BrowserPhase::Running)?;
                self.session.append_log(
                    LogOrigin::System,
                    format!("Browser stop failed: {}", e),
                    true,
                );
                Err(e)
            }
        }
    }

    /// Request a new streaming rate. Out-of-range values are clamped
    /// before any dispatch.
    pub async fn set_frame_rate(&self, requested: u32) -> Result<String> {
        let clamped = requested.clamp(MIN_FRAME_RATE_HZ as u32, MAX_FRAME_RATE_HZ as u32) as u8;
        if u32::from(clamped) != requested {
            self.session.append_log(
                LogOrigin::System,
                format!("Frame rate {} out of range, using {}", requested, clamped),
                false,
            );
        }
        match self.api.set_fps(clamped).await {
            Ok(resp) => {
                self.session.set_frame_rate(clamped)?;
                self.session
                    .append_log(LogOrigin::System, &resp.message, false);
                Ok(resp.message)
            }
            Err(e) => {
                self.session.append_log(
                    LogOrigin::System,
                    format!("Frame rate change failed: {}", e),
                    true,
                );
                Err(e)
            }
        }
    }

    pub async fn streaming_start(&self) -> Result<String> {
        let result = self.api.streaming_start().await;
        self.log_outcome(result, "Streaming start failed")
    }

    pub async fn streaming_stop(&self) -> Result<String> {
        let result = self.api.streaming_stop().await;
        self.log_outcome(result, "Streaming stop failed")
    }

    /// Forward a click at page coordinates.
    pub async fn click(&self, x: f64, y: f64) -> Result<String> {
        let result = self.api.cursor_event(CURSOR_CLICK, x, y).await;
        self.log_outcome(result, "Cursor event failed")
    }

    fn log_outcome(&self, result: Result<ApiResponse>, failure_label: &str) -> Result<String> {
        match result {
            Ok(resp) => {
                self.session
                    .append_log(LogOrigin::System, &resp.message, false);
                Ok(resp.message)
            }
            Err(e) => {
                self.session.append_log(
                    LogOrigin::System,
                    format!("{}: {}", failure_label, e),
                    true,
                );
                Err(e)
            }
        }
    }
}
