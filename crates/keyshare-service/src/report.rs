//! Usage reporting over sessions and the activity log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keyshare_auth::seat::OccupancyResolver;
use keyshare_auth::session::SessionRepository;
use keyshare_core::error::AppError;
use keyshare_core::types::AccountId;
use keyshare_entity::{ActivityEntry, Session, User};
use keyshare_store::StoreHandle;

use crate::context::RequestContext;

/// One user's use of one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUsage {
    /// The account.
    pub account_id: AccountId,
    /// Account name, or `Unknown` if it has been deleted.
    pub name: String,
    /// Sessions recorded.
    pub sessions: usize,
    /// Seconds across ended sessions.
    pub total_seconds: f64,
    /// Most recent heartbeat on any of those sessions.
    pub last_access: Option<DateTime<Utc>>,
}

/// A user's usage across all accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUsage {
    /// The user.
    pub user_id: String,
    /// Seconds across all ended sessions.
    pub total_seconds: f64,
    /// Per-account breakdown, ordered by account id.
    pub accounts: Vec<AccountUsage>,
}

/// Occupancy of one account as seen from every angle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOverview {
    /// The account.
    pub account_id: AccountId,
    /// Account name.
    pub name: String,
    /// Configured limit.
    pub max_concurrent_users: u32,
    /// Live sessions: the number admission uses.
    pub live_sessions: u32,
    /// Distinct users among the live sessions.
    pub distinct_users: u32,
    /// Users the activity log considers present.
    pub audit_active_users: u32,
    /// Counter written by the last sweep.
    pub stored_counter: Option<u32>,
}

/// Read-only reports.
#[derive(Debug, Clone)]
pub struct ReportService {
    store: StoreHandle,
    resolver: OccupancyResolver,
}

impl ReportService {
    /// Create a report service sharing the given freshness rule.
    pub fn new(store: StoreHandle, sessions: SessionRepository) -> Self {
        Self {
            store,
            resolver: OccupancyResolver::new(sessions),
        }
    }

    /// Time spent per account by a user.
    pub async fn user_usage(&self, ctx: &RequestContext, email: &str) -> Result<UserUsage, AppError> {
        let email = User::normalize_email(email);
        ctx.require_self_or_admin(&email)?;
        let snapshot = self.store.read().await?;

        let mut per_account: BTreeMap<AccountId, AccountUsage> = BTreeMap::new();
        for session in snapshot.sessions.iter().filter(|s| s.user_id == email) {
            let usage = per_account
                .entry(session.account_id)
                .or_insert_with(|| AccountUsage {
                    account_id: session.account_id,
                    name: snapshot
                        .account(session.account_id)
                        .map(|a| a.name.clone())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    sessions: 0,
                    total_seconds: 0.0,
                    last_access: None,
                });
            usage.sessions += 1;
            usage.total_seconds += session.duration_seconds.unwrap_or_default();
            usage.last_access = usage.last_access.max(Some(session.last_activity));
        }

        let accounts: Vec<AccountUsage> = per_account.into_values().collect();
        Ok(UserUsage {
            user_id: email.to_string(),
            total_seconds: accounts.iter().map(|a| a.total_seconds).sum(),
            accounts,
        })
    }

    /// Every recorded session on an account, newest first (admin).
    pub async fn account_history(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Session>, AppError> {
        ctx.require_admin()?;
        let snapshot = self.store.read().await?;

        let mut sessions: Vec<Session> = snapshot
            .sessions
            .into_iter()
            .filter(|s| s.account_id == account_id)
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    /// Latest activity entries, optionally for one account (admin).
    pub async fn recent_activity(
        &self,
        ctx: &RequestContext,
        account_id: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<ActivityEntry>, AppError> {
        ctx.require_admin()?;
        let snapshot = self.store.read().await?;

        let mut entries: Vec<ActivityEntry> = snapshot
            .analytics
            .into_iter()
            .filter(|e| account_id.is_none() || e.account_id == account_id)
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Live occupancy next to the audit view and the stored counter (admin).
    pub async fn account_overview(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<AccountOverview>, AppError> {
        ctx.require_admin()?;
        let snapshot = self.store.read().await?;
        let now = Utc::now();

        Ok(snapshot
            .accounts
            .iter()
            .map(|account| AccountOverview {
                account_id: account.id,
                name: account.name.clone(),
                max_concurrent_users: account.concurrency_limit().get(),
                live_sessions: self.resolver.account_occupancy(&snapshot, account.id, now),
                distinct_users: self.resolver.distinct_users(&snapshot, account.id, now),
                audit_active_users: self.resolver.audit_active_users(&snapshot, account.id),
                stored_counter: account.active_sessions,
            })
            .collect())
    }
}
