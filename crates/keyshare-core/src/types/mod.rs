//! Shared domain types: identifiers and capacity limits.

pub mod id;
pub mod limit;

pub use id::{AccountId, SessionId};
pub use limit::CapacityLimit;
