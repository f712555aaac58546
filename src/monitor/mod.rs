//! # Task monitoring.
//!
//! - [`TaskMonitor`] runs one task on a dedicated worker and tracks its lifecycle.
//! - [`MonitorState`] is the `Running → {Successful, Failed, Canceled}` state machine.
//! - [`MonitorCallback`] receives the terminal transition exactly once.
//! - [`TaskId`]/[`CancelToken`] identify a run and authorize its cancellation.
//! - [`RequestContext`]/[`Origin`] capture who started a task and answer "is this mine?".

mod callback;
mod context;
#[allow(clippy::module_inception)]
mod monitor;
mod state;
mod token;

pub use callback::MonitorCallback;
pub use context::{Origin, RequestContext, SessionContext};
pub(crate) use monitor::panic_message;
pub use monitor::{MonitorSnapshot, TaskMonitor};
pub use state::MonitorState;
pub use token::{CancelToken, TaskId};
