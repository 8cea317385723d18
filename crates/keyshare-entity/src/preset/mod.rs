//! Account presets.

pub mod model;

pub use model::Preset;
