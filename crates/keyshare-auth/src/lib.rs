//! # keyshare-auth
//!
//! Session admission and concurrency control for shared accounts.
//!
//! ## Modules
//!
//! - `session` — session records, heartbeats, the activity log, and the
//!   [`SessionManager`] that ties them to the store
//! - `seat` — the admission gate, occupancy resolution, and the
//!   reconciliation sweeper
//! - `password` — Argon2id password hashing
//!
//! The decision logic (`SessionRepository`, `ConcurrencyGate`,
//! `OccupancyResolver`, `ActivityTracker`, the sweep itself) is pure and
//! works on a borrowed [`StoreSnapshot`](keyshare_entity::StoreSnapshot)
//! with an explicit clock reading. Only `SessionManager` and
//! `ReconciliationSweeper` talk to the store, always through
//! [`StoreHandle::mutate`](keyshare_store::StoreHandle::mutate).

pub mod password;
pub mod seat;
pub mod session;

pub use password::PasswordHasher;
pub use seat::{
    Admission, ConcurrencyGate, DenialReason, Occupancy, OccupancyResolver, ReconciliationSweeper,
    SweepReport,
};
pub use session::{ActivityTracker, ActivityUpdate, SessionManager, SessionRepository, SessionStart};
