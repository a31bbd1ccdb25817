pub mod action;
pub mod client;
pub mod config;
pub mod github;
pub mod processing;
pub mod report;

pub use crate::config::DispatchbroConfig;
pub use action::{ActionInputs, ActionOutcome};
pub use processing::{CompletionTracker, Dispatcher, TrackerOutcome};
