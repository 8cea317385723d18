//! Session lifecycle: records, heartbeats, and the manager that runs them
//! against the store.

pub mod manager;
pub mod repository;
pub mod tracker;

pub use manager::{SessionManager, SessionStart};
pub use repository::{ActivityUpdate, EndOutcome, HeartbeatOutcome, SessionRepository};
pub use tracker::ActivityTracker;
