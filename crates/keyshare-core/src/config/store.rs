//! Snapshot store configuration.

use serde::{Deserialize, Serialize};

/// Where and how the snapshot document is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the JSON snapshot document.
    #[serde(default = "default_data_file")]
    pub data_file: String,
    /// Write the document indented for human inspection.
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            pretty: default_true(),
        }
    }
}

fn default_data_file() -> String {
    "data/db.json".to_string()
}

fn default_true() -> bool {
    true
}
