pub mod actions;
pub mod browser;
pub mod config_cmd;
pub mod console;
pub mod init;
pub mod navigate;
pub mod prompt;
pub mod status;
pub mod streaming;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use webpilot_channel::PushChannel;
use webpilot_commands::{CommandDispatcher, ControlApi, HttpControlApi, UpdateCorrelator};
use webpilot_core::session::SessionState;
use webpilot_core::{Config, Paths};

/// Everything a command needs to talk to the backend.
pub(crate) struct Client {
    pub config: Config,
    pub session: Arc<SessionState>,
    pub correlator: Arc<UpdateCorrelator>,
    pub dispatcher: Arc<CommandDispatcher>,
}

pub(crate) fn connect_client() -> anyhow::Result<Client> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let session = Arc::new(SessionState::new(config.streaming.fps));
    let correlator = Arc::new(UpdateCorrelator::new());
    let api: Arc<dyn ControlApi> = Arc::new(HttpControlApi::new(
        &config.server.base_url,
        Duration::from_secs(config.server.request_timeout_secs),
    ));
    let dispatcher = Arc::new(CommandDispatcher::new(
        api,
        session.clone(),
        correlator.clone(),
    ));
    Ok(Client {
        config,
        session,
        correlator,
        dispatcher,
    })
}

pub(crate) fn push_channel(client: &Client) -> PushChannel {
    PushChannel::with_keepalive(
        client.session.clone(),
        Duration::from_secs(client.config.streaming.keepalive_secs),
    )
}
