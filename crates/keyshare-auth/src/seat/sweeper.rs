//! Reconciliation sweep.
//!
//! Ends sessions that should no longer hold capacity and rewrites the
//! advisory counters from a fresh scan, so stored state never drifts far
//! from what admission actually sees.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use keyshare_core::config::{SessionConfig, SweeperConfig};
use keyshare_core::error::AppError;
use keyshare_core::types::AccountId;
use keyshare_entity::{EndReason, StoreSnapshot};
use keyshare_store::StoreHandle;

use crate::session::repository::SessionRepository;
use crate::session::tracker::ActivityTracker;

/// What one sweep pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Sessions ended because their user expired.
    pub expired_user_sessions: usize,
    /// Sessions ended because their user no longer exists.
    pub deleted_user_sessions: usize,
    /// Sessions ended because their account no longer exists.
    pub orphaned_account_sessions: usize,
    /// Sessions ended for inactivity.
    pub idle_sessions: usize,
    /// Ended sessions removed by the retention window.
    pub purged_sessions: usize,
    /// Stored counters that disagreed with the scan and were corrected.
    pub counters_corrected: usize,
}

impl SweepReport {
    /// Total sessions ended by the pass.
    pub fn ended(&self) -> usize {
        self.expired_user_sessions
            + self.deleted_user_sessions
            + self.orphaned_account_sessions
            + self.idle_sessions
    }
}

/// Periodic reconciliation of sessions and counters.
#[derive(Debug, Clone)]
pub struct ReconciliationSweeper {
    store: StoreHandle,
    sessions: SessionRepository,
    tracker: ActivityTracker,
    /// Ended sessions older than this are removed. `None` keeps them.
    history_retention: Option<Duration>,
}

impl ReconciliationSweeper {
    /// Create a sweeper.
    pub fn new(
        store: StoreHandle,
        sessions: SessionRepository,
        history_retention: Option<Duration>,
    ) -> Self {
        Self {
            store,
            sessions,
            tracker: ActivityTracker::new(sessions),
            history_retention,
        }
    }

    /// Create a sweeper from configuration.
    pub fn from_config(store: StoreHandle, session: &SessionConfig, sweeper: &SweeperConfig) -> Self {
        Self::new(
            store,
            SessionRepository::from_config(session),
            sweeper.history_retention(),
        )
    }

    /// Run one pass against the store as a single mutation.
    pub async fn run_pass(&self) -> Result<SweepReport, AppError> {
        let report = self
            .store
            .mutate(|snapshot| Ok(self.sweep(snapshot, Utc::now())))
            .await?;

        if report.ended() > 0 || report.purged_sessions > 0 || report.counters_corrected > 0 {
            info!(
                expired_user = report.expired_user_sessions,
                deleted_user = report.deleted_user_sessions,
                orphaned_account = report.orphaned_account_sessions,
                idle = report.idle_sessions,
                purged = report.purged_sessions,
                counters_corrected = report.counters_corrected,
                "Sweep pass completed"
            );
        } else {
            debug!("Sweep pass completed, nothing to do");
        }

        Ok(report)
    }

    /// Apply one pass to `snapshot` as of `now`.
    ///
    /// 1. end sessions of expired users
    /// 2. end sessions of deleted users, then of deleted accounts
    /// 3. end stale sessions
    /// 4. overwrite account and user counters from live sessions
    /// 5. purge ended sessions older than the retention window
    pub fn sweep(&self, snapshot: &mut StoreSnapshot, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        let expired_users: BTreeSet<String> = snapshot
            .users
            .iter()
            .filter(|u| u.is_expired_at(now))
            .map(|u| u.email.clone())
            .collect();
        let known_users: BTreeSet<String> =
            snapshot.users.iter().map(|u| u.email.clone()).collect();
        let known_accounts: BTreeSet<AccountId> =
            snapshot.accounts.iter().map(|a| a.id).collect();

        let mut ended = Vec::new();
        for session in snapshot.sessions.iter_mut().filter(|s| s.active) {
            let reason = if expired_users.contains(&session.user_id) {
                report.expired_user_sessions += 1;
                EndReason::UserExpired
            } else if !known_users.contains(&session.user_id) {
                report.deleted_user_sessions += 1;
                EndReason::UserDeleted
            } else if !known_accounts.contains(&session.account_id) {
                report.orphaned_account_sessions += 1;
                EndReason::AccountDeleted
            } else if !session.is_fresh_at(now, self.sessions.inactivity_timeout()) {
                report.idle_sessions += 1;
                EndReason::Idle
            } else {
                continue;
            };

            session.end_at(now, reason);
            debug!(
                session_id = %session.id,
                user_id = %session.user_id,
                account_id = %session.account_id,
                reason = %reason,
                "Session ended by sweep"
            );
            ended.push(session.clone());
        }
        for session in &ended {
            self.tracker.record_session_end(snapshot, session);
        }

        report.counters_corrected = self.rewrite_counters(snapshot, now);

        if let Some(retention) = self.history_retention {
            let cutoff = now - retention;
            let before = snapshot.sessions.len();
            snapshot
                .sessions
                .retain(|s| s.active || s.end_time.is_none_or(|ended| ended >= cutoff));
            report.purged_sessions = before - snapshot.sessions.len();
        }

        report
    }

    fn rewrite_counters(&self, snapshot: &mut StoreSnapshot, now: DateTime<Utc>) -> usize {
        let mut per_account: HashMap<AccountId, u32> = HashMap::new();
        let mut per_user: HashMap<String, u32> = HashMap::new();
        for session in snapshot
            .sessions
            .iter()
            .filter(|s| self.sessions.is_live(s, now))
        {
            *per_account.entry(session.account_id).or_default() += 1;
            *per_user.entry(session.user_id.clone()).or_default() += 1;
        }

        let mut corrected = 0;
        for account in &mut snapshot.accounts {
            let actual = per_account.get(&account.id).copied().unwrap_or(0);
            if account.active_sessions != Some(actual) {
                if account.active_sessions.is_some() {
                    warn!(
                        account_id = %account.id,
                        stored = ?account.active_sessions,
                        actual,
                        "Account counter drift detected, correcting"
                    );
                }
                account.active_sessions = Some(actual);
                corrected += 1;
            }
        }
        for user in &mut snapshot.users {
            let actual = per_user.get(&user.email).copied().unwrap_or(0);
            if user.active_sessions != actual {
                debug!(
                    user_id = %user.email,
                    stored = user.active_sessions,
                    actual,
                    "User counter corrected"
                );
                user.active_sessions = actual;
                corrected += 1;
            }
        }
        corrected
    }
}
