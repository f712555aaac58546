//! Runtime core: the driver side of the engine.
//!
//! The public entry point is [`Supervisor`], created through [`SupervisorBuilder`].
//!
//! Internal modules:
//! - [`config`]: runtime settings and their sentinel accessors;
//! - [`job`]: job runner trait (fresh task per execution, prerequisite check);
//! - [`registry`]: monitors by id, one in-flight run per job, bounded retention;
//! - [`supervisor`]: submit, run jobs, route cancels, graceful shutdown;
//! - [`builder`]: wires bus, subscribers, history and jobs together.

mod builder;
mod config;
mod job;
mod registry;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub use job::Job;
pub use registry::Registry;
pub use supervisor::{Submission, Supervisor};
