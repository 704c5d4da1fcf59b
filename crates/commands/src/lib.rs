pub mod api;
pub mod correlator;
pub mod dispatcher;
pub mod invocation;
pub mod registry;

pub use api::{ControlApi, HttpControlApi};
pub use correlator::{run_updates, TaskResolution, UpdateCorrelator};
pub use dispatcher::{CommandDispatcher, Outcome};
pub use invocation::{Invocation, InvocationState};
pub use registry::{CommandDefinition, CommandKind};
