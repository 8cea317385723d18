//! Activity log entry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keyshare_core::types::AccountId;

/// The kind of event recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    /// A heartbeat while using an account.
    #[serde(rename = "account_access")]
    Access,
    /// The client reported leaving an account.
    #[serde(rename = "account_logout")]
    Logout,
    /// The user authenticated.
    Login,
    /// A session was admitted.
    SessionStart,
    /// A session ended.
    SessionEnd,
}

/// One append-only audit record.
///
/// Entries are never mutated. They feed reporting and the audit view of
/// active users, never admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Identity key of the acting user.
    pub user_id: String,
    /// Account involved, if any.
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// What happened.
    pub action: ActivityAction,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Originating network address.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Client signature.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Domain the client was on.
    #[serde(default)]
    pub domain: Option<String>,
}

impl ActivityEntry {
    /// A bare entry with no client metadata.
    pub fn new(
        user_id: impl Into<String>,
        account_id: Option<AccountId>,
        action: ActivityAction,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            account_id,
            action,
            timestamp,
            ip_address: None,
            user_agent: None,
            domain: None,
        }
    }
}
