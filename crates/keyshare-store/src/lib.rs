//! # keyshare-store
//!
//! The store accessor contract, its two implementations, and the shared
//! [`StoreHandle`] through which every mutation is serialized.
//!
//! ## Modules
//!
//! - `accessor` — the [`SnapshotStore`] trait
//! - `json` — single-document JSON file store
//! - `memory` — in-process store
//! - `handle` — lock-guarded read-modify-write

pub mod accessor;
pub mod handle;
pub mod json;
pub mod memory;

pub use accessor::SnapshotStore;
pub use handle::StoreHandle;
pub use json::JsonFileStore;
pub use memory::MemoryStore;
