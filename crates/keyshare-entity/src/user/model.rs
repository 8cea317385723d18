//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keyshare_core::types::CapacityLimit;

/// A user allowed to borrow shared accounts.
///
/// Users are keyed by their email address. An expired user is treated as
/// absent for admission purposes even while the record still exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identity key.
    pub email: String,
    /// Argon2 password hash.
    #[serde(rename = "password", default)]
    pub password_hash: String,
    /// Whether the user may manage users and accounts.
    #[serde(default)]
    pub is_admin: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When access ends. `None` means never.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Maximum number of distinct devices with live sessions.
    #[serde(default = "default_max_devices")]
    pub max_devices: u32,
    /// Live sessions at the last sweep. Advisory only.
    #[serde(default)]
    pub active_sessions: u32,
    /// Optional preset the user was provisioned from.
    #[serde(default)]
    pub preset_id: Option<u64>,
}

impl User {
    /// Canonical form of an identity key: trimmed and lowercased.
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Check whether the user's access window has closed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// The device limit as a typed capacity.
    pub fn device_limit(&self) -> CapacityLimit {
        CapacityLimit::from_stored(self.max_devices)
    }
}

fn default_max_devices() -> u32 {
    1
}
