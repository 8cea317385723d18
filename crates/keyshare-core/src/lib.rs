//! # keyshare-core
//!
//! Core crate for KeyShare. Contains configuration schemas, typed
//! identifiers, capacity limits, and the unified error system.
//!
//! This crate has **no** internal dependencies on other KeyShare crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
