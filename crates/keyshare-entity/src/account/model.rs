//! Shared account entity model.

use serde::{Deserialize, Serialize};

use keyshare_core::types::{AccountId, CapacityLimit};

/// A credential bundle that several users may borrow at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Numeric identifier.
    pub id: AccountId,
    /// Display name.
    pub name: String,
    /// Optional grouping label.
    #[serde(default)]
    pub group: Option<String>,
    /// Credentials handed to clients holding a session.
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// Maximum number of live sessions on this account.
    #[serde(default = "default_max_concurrent_users")]
    pub max_concurrent_users: u32,
    /// Live sessions at the last sweep. Advisory only; never used to admit.
    #[serde(default)]
    pub active_sessions: Option<u32>,
}

impl Account {
    /// The concurrency limit as a typed capacity.
    pub fn concurrency_limit(&self) -> CapacityLimit {
        CapacityLimit::from_stored(self.max_concurrent_users)
    }
}

/// One browser cookie belonging to an account's credential bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie domain.
    pub domain: String,
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Cookie path.
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_max_concurrent_users() -> u32 {
    1
}

fn default_path() -> String {
    "/".to_string()
}
