//! Shared account entities.

pub mod model;

pub use model::{Account, Cookie};
