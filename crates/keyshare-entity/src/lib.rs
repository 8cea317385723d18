//! # keyshare-entity
//!
//! Plain data records persisted in the snapshot document, plus the small
//! amount of behaviour that only depends on a single record (expiry,
//! freshness, ending a session).

pub mod account;
pub mod activity;
pub mod association;
pub mod preset;
pub mod session;
pub mod snapshot;
pub mod user;

pub use account::{Account, Cookie};
pub use activity::{ActivityAction, ActivityEntry};
pub use association::UserAccount;
pub use preset::Preset;
pub use session::{DeviceInfo, EndReason, Session};
pub use snapshot::StoreSnapshot;
pub use user::User;
