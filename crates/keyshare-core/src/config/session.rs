//! Session admission configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Session admission and freshness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds without a heartbeat before a session is considered stale.
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_seconds: u64,
    /// Device limit applied to users created without an explicit value.
    #[serde(default = "default_one")]
    pub default_max_devices: u32,
    /// Concurrency limit applied to accounts created without an explicit value.
    #[serde(default = "default_one")]
    pub default_max_concurrent_users: u32,
    /// Access window for new users in days. `0` means never expire.
    #[serde(default = "default_user_expiration_days")]
    pub default_user_expiration_days: u32,
}

impl SessionConfig {
    /// The inactivity timeout as a chrono duration.
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::seconds(self.inactivity_timeout_seconds as i64)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_seconds: default_inactivity_timeout(),
            default_max_devices: default_one(),
            default_max_concurrent_users: default_one(),
            default_user_expiration_days: default_user_expiration_days(),
        }
    }
}

fn default_inactivity_timeout() -> u64 {
    60
}

fn default_one() -> u32 {
    1
}

fn default_user_expiration_days() -> u32 {
    30
}
