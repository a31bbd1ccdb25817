pub mod dispatch;
pub mod error;
pub mod tracker;
pub mod window;

pub use dispatch::Dispatcher;
pub use error::Error;
pub use tracker::{CompletionTracker, TrackerOutcome, TrackerState};
pub use window::{RunFilter, RunQueryWindow};
