//! Run records and the history they are handed to.
//!
//! - [`RunOutcome`] / [`RunRecord`] summarize one job execution.
//! - [`RunHistory`] is the collaborator that stores them; [`InMemoryHistory`] is a
//!   bounded in-memory implementation.

mod history;
mod outcome;

pub use history::{InMemoryHistory, RunHistory};
pub use outcome::{MAX_MESSAGE_CHARS, RunOutcome, RunRecord};
