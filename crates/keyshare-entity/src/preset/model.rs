//! Preset entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keyshare_core::types::AccountId;

/// A named set of accounts handed to users together.
///
/// Applying a preset replaces a user's assignments with its accounts.
/// Later edits to the preset do not touch users it was applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Numeric identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Accounts assigned by this preset.
    #[serde(default)]
    pub account_ids: Vec<AccountId>,
    /// When the preset was created.
    pub created_at: DateTime<Utc>,
}

impl Preset {
    /// Whether the preset grants the account.
    pub fn includes(&self, account_id: AccountId) -> bool {
        self.account_ids.contains(&account_id)
    }
}
