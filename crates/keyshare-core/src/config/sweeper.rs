//! Reconciliation sweeper configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconciliation sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Whether the background sweeper runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweep passes.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Hours an ended session is kept for reporting before being purged.
    /// Absent means ended sessions are retained indefinitely.
    #[serde(default)]
    pub history_retention_hours: Option<u64>,
}

impl SweeperConfig {
    /// Period between passes.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Retention window for ended sessions, if any.
    pub fn history_retention(&self) -> Option<chrono::Duration> {
        self.history_retention_hours
            .map(|hours| chrono::Duration::hours(hours as i64))
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_seconds: default_interval(),
            history_retention_hours: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    120
}
