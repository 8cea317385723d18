//! Session domain entities.

pub mod model;

pub use model::{DeviceInfo, EndReason, Session};
