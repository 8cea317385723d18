//! Seed data for a store that does not exist yet.

use serde::{Deserialize, Serialize};

/// Administrator seeded when the snapshot document is first created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Identity key of the initial administrator.
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    /// Plaintext password, hashed before it is written.
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
        }
    }
}

fn default_admin_email() -> String {
    "admin@keyshare.local".to_string()
}

fn default_admin_password() -> String {
    "change-me".to_string()
}
