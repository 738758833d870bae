//! Claimant progress: in-memory trackers with write-behind persistence.

mod retry;
mod service;
mod sync;
mod tracker;

pub use retry::RetryPolicy;
pub use service::{ProgressService, SharedTracker, TaskOutcome};
pub use sync::SyncStatus;
pub use tracker::{ProgressSnapshot, ProgressTracker};
