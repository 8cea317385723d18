//! The persisted document: every collection in one value.

use serde::{Deserialize, Serialize};

use keyshare_core::types::{AccountId, SessionId};

use crate::account::Account;
use crate::activity::ActivityEntry;
use crate::association::UserAccount;
use crate::preset::Preset;
use crate::session::Session;
use crate::user::User;

/// A consistent view of the whole store.
///
/// The store accessor reads and writes this document wholesale. There is
/// no foreign-key enforcement; the lookups below are the only integrity
/// checks callers get.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Registered users.
    #[serde(default)]
    pub users: Vec<User>,
    /// Shared accounts.
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// User-to-account eligibility.
    #[serde(default)]
    pub user_accounts: Vec<UserAccount>,
    /// Active and ended sessions.
    #[serde(default)]
    pub sessions: Vec<Session>,
    /// Append-only activity log.
    #[serde(default)]
    pub analytics: Vec<ActivityEntry>,
    /// Named account sets for provisioning users.
    #[serde(default)]
    pub presets: Vec<Preset>,
}

impl StoreSnapshot {
    /// Find a user by identity key, regardless of expiry.
    pub fn user(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }

    /// Mutable access to a user.
    pub fn user_mut(&mut self, email: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.email == email)
    }

    /// Find an account by id.
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Mutable access to an account.
    pub fn account_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.id == id)
    }

    /// Whether the user may open sessions on the account.
    pub fn association_exists(&self, email: &str, account_id: AccountId) -> bool {
        self.user_accounts
            .iter()
            .any(|ua| ua.user_id == email && ua.account_id == account_id)
    }

    /// Account ids the user is associated with.
    pub fn account_ids_for(&self, email: &str) -> Vec<AccountId> {
        self.user_accounts
            .iter()
            .filter(|ua| ua.user_id == email)
            .map(|ua| ua.account_id)
            .collect()
    }

    /// The id a newly created account receives.
    pub fn next_account_id(&self) -> AccountId {
        self.accounts
            .iter()
            .map(|a| a.id)
            .max()
            .map_or(AccountId(1), AccountId::next)
    }

    /// Find a preset by id.
    pub fn preset(&self, id: u64) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    /// Mutable access to a preset.
    pub fn preset_mut(&mut self, id: u64) -> Option<&mut Preset> {
        self.presets.iter_mut().find(|p| p.id == id)
    }

    /// The id a newly created preset receives.
    pub fn next_preset_id(&self) -> u64 {
        self.presets.iter().map(|p| p.id).max().map_or(1, |id| id + 1)
    }

    /// Users provisioned from a preset.
    pub fn users_with_preset(&self, id: u64) -> usize {
        self.users.iter().filter(|u| u.preset_id == Some(id)).count()
    }

    /// Find a session by id.
    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Mutable access to a session.
    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_collections_default_to_empty() {
        let snapshot: StoreSnapshot = serde_json::from_str(r#"{"users": []}"#).unwrap();
        assert!(snapshot.sessions.is_empty());
        assert!(snapshot.analytics.is_empty());
        assert!(snapshot.presets.is_empty());
    }

    #[test]
    fn test_next_account_id() {
        let mut snapshot = StoreSnapshot::default();
        assert_eq!(snapshot.next_account_id(), AccountId(1));

        for id in [3, 7] {
            snapshot.accounts.push(Account {
                id: AccountId(id),
                name: format!("acct-{id}"),
                group: None,
                cookies: Vec::new(),
                max_concurrent_users: 1,
                active_sessions: None,
            });
        }
        assert_eq!(snapshot.next_account_id(), AccountId(8));
    }

    #[test]
    fn test_association_lookup() {
        let mut snapshot = StoreSnapshot::default();
        snapshot
            .user_accounts
            .push(UserAccount::new("ana@example.com", AccountId(2)));
        assert!(snapshot.association_exists("ana@example.com", AccountId(2)));
        assert!(!snapshot.association_exists("ana@example.com", AccountId(3)));
        assert!(!snapshot.association_exists("bo@example.com", AccountId(2)));
        assert_eq!(snapshot.account_ids_for("ana@example.com"), vec![AccountId(2)]);
    }

    #[test]
    fn test_next_preset_id() {
        let mut snapshot = StoreSnapshot::default();
        assert_eq!(snapshot.next_preset_id(), 1);
        snapshot.presets.push(Preset {
            id: 4,
            name: "media".to_string(),
            description: None,
            account_ids: vec![AccountId(1)],
            created_at: chrono::Utc::now(),
        });
        assert_eq!(snapshot.next_preset_id(), 5);
        assert!(snapshot.preset(4).unwrap().includes(AccountId(1)));
    }
}
