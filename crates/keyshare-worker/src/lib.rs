//! Scheduled background tasks for KeyShare.
//!
//! Currently a single job: the reconciliation sweep, driven on a fixed
//! interval by [`SweepRunner`] until its [`SweepHandle`] is stopped.

pub mod runner;

pub use runner::{SweepHandle, SweepRunner};
