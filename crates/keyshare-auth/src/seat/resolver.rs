//! Occupancy resolution.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keyshare_core::error::AppError;
use keyshare_core::types::AccountId;
use keyshare_entity::{ActivityAction, StoreSnapshot};

use crate::session::repository::SessionRepository;

/// Current occupancy of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    /// The account.
    pub account_id: AccountId,
    /// Live sessions on the account.
    pub active_sessions: u32,
    /// Configured limit.
    pub max_concurrent_users: u32,
    /// Slots still free.
    pub available: u32,
}

/// Counts who is using what, right now.
///
/// Occupancy is derived from live sessions only; the stored
/// `active_sessions` counters are never consulted.
#[derive(Debug, Clone, Copy)]
pub struct OccupancyResolver {
    /// Freshness rule.
    sessions: SessionRepository,
}

impl OccupancyResolver {
    /// Create a resolver sharing the repository's freshness rule.
    pub fn new(sessions: SessionRepository) -> Self {
        Self { sessions }
    }

    /// Live sessions on an account. Each session counts once, so one user
    /// on two devices occupies two slots.
    pub fn account_occupancy(
        &self,
        snapshot: &StoreSnapshot,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> u32 {
        self.sessions
            .list_active_for_account(snapshot, account_id, now)
            .len() as u32
    }

    /// Distinct device fingerprints among a user's live sessions.
    pub fn user_devices<'a>(
        &self,
        snapshot: &'a StoreSnapshot,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> BTreeSet<&'a str> {
        self.sessions
            .list_active_for_user(snapshot, user_id, now)
            .into_iter()
            .map(|s| s.device_id.as_str())
            .collect()
    }

    /// Distinct users with a live session on an account.
    pub fn distinct_users(
        &self,
        snapshot: &StoreSnapshot,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> u32 {
        self.sessions
            .list_active_for_account(snapshot, account_id, now)
            .into_iter()
            .map(|s| s.user_id.as_str())
            .collect::<BTreeSet<_>>()
            .len() as u32
    }

    /// Occupancy summary for an account.
    pub fn occupancy(
        &self,
        snapshot: &StoreSnapshot,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Occupancy, AppError> {
        let account = snapshot
            .account(account_id)
            .ok_or_else(|| AppError::not_found(format!("Account {account_id} not found")))?;

        let limit = account.concurrency_limit();
        let active = self.account_occupancy(snapshot, account_id, now);

        Ok(Occupancy {
            account_id,
            active_sessions: active,
            max_concurrent_users: limit.get(),
            available: limit.remaining(active),
        })
    }

    /// Users the activity log says are on an account.
    ///
    /// Walks the log and counts users whose latest access to the account
    /// has no later logout from it. This is an audit view; it can disagree
    /// with live occupancy and is never used to admit anyone.
    pub fn audit_active_users(&self, snapshot: &StoreSnapshot, account_id: AccountId) -> u32 {
        let mut last_access: HashMap<&str, DateTime<Utc>> = HashMap::new();
        let mut last_logout: HashMap<&str, DateTime<Utc>> = HashMap::new();

        for entry in snapshot
            .analytics
            .iter()
            .filter(|e| e.account_id == Some(account_id))
        {
            let slot = match entry.action {
                ActivityAction::Access => &mut last_access,
                ActivityAction::Logout => &mut last_logout,
                _ => continue,
            };
            slot.entry(entry.user_id.as_str())
                .and_modify(|ts| *ts = (*ts).max(entry.timestamp))
                .or_insert(entry.timestamp);
        }

        last_access
            .into_iter()
            .filter(|(user, accessed)| {
                last_logout
                    .get(user)
                    .is_none_or(|logged_out| logged_out <= accessed)
            })
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use keyshare_entity::{Account, ActivityEntry, DeviceInfo};

    fn resolver() -> (OccupancyResolver, SessionRepository) {
        let repo = SessionRepository::new(Duration::seconds(60));
        (OccupancyResolver::new(repo), repo)
    }

    fn snapshot_with_account(limit: u32) -> StoreSnapshot {
        StoreSnapshot {
            accounts: vec![Account {
                id: AccountId(1),
                name: "streaming".to_string(),
                group: None,
                cookies: Vec::new(),
                max_concurrent_users: limit,
                active_sessions: Some(99),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_counts_sessions_not_users() {
        let (resolver, repo) = resolver();
        let mut snapshot = snapshot_with_account(3);
        let now = Utc::now();
        repo.create(&mut snapshot, "a", AccountId(1), DeviceInfo::new("laptop"), now);
        repo.create(&mut snapshot, "a", AccountId(1), DeviceInfo::new("phone"), now);

        assert_eq!(resolver.account_occupancy(&snapshot, AccountId(1), now), 2);
        assert_eq!(resolver.distinct_users(&snapshot, AccountId(1), now), 1);
        assert_eq!(resolver.user_devices(&snapshot, "a", now).len(), 2);
    }

    #[test]
    fn test_occupancy_ignores_stored_counter() {
        let (resolver, repo) = resolver();
        let mut snapshot = snapshot_with_account(2);
        let now = Utc::now();
        let stale = repo
            .create(&mut snapshot, "b", AccountId(1), DeviceInfo::new("d"), now)
            .id;
        snapshot.session_mut(stale).unwrap().last_activity = now - Duration::seconds(120);
        repo.create(&mut snapshot, "a", AccountId(1), DeviceInfo::new("d"), now);

        let occupancy = resolver.occupancy(&snapshot, AccountId(1), now).unwrap();
        assert_eq!(
            occupancy,
            Occupancy {
                account_id: AccountId(1),
                active_sessions: 1,
                max_concurrent_users: 2,
                available: 1,
            }
        );
    }

    #[test]
    fn test_occupancy_unknown_account() {
        let (resolver, _) = resolver();
        assert!(
            resolver
                .occupancy(&StoreSnapshot::default(), AccountId(7), Utc::now())
                .is_err()
        );
    }

    #[test]
    fn test_audit_view_pairs_access_and_logout() {
        let (resolver, _) = resolver();
        let mut snapshot = snapshot_with_account(1);
        let t0 = Utc::now() - Duration::minutes(10);
        let acct = Some(AccountId(1));

        snapshot.analytics = vec![
            ActivityEntry::new("a", acct, ActivityAction::Access, t0),
            ActivityEntry::new("a", acct, ActivityAction::Logout, t0 + Duration::minutes(1)),
            ActivityEntry::new("b", acct, ActivityAction::Access, t0),
            ActivityEntry::new("c", acct, ActivityAction::Logout, t0),
            ActivityEntry::new("c", acct, ActivityAction::Access, t0 + Duration::minutes(2)),
            ActivityEntry::new("d", Some(AccountId(2)), ActivityAction::Access, t0),
        ];

        // b and c are still on the account; a logged out; d is elsewhere.
        assert_eq!(resolver.audit_active_users(&snapshot, AccountId(1)), 2);
        assert_eq!(resolver.account_occupancy(&snapshot, AccountId(1), Utc::now()), 0);
    }
}
