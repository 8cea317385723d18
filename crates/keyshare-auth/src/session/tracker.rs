//! Activity log maintenance.

use chrono::{DateTime, Utc};

use keyshare_core::error::{AppError, ErrorKind};
use keyshare_core::types::{AccountId, SessionId};
use keyshare_entity::{ActivityAction, ActivityEntry, DeviceInfo, Session, StoreSnapshot};

use super::repository::{ActivityUpdate, HeartbeatOutcome, SessionRepository};

/// Refreshes sessions on heartbeat and appends audit entries.
///
/// The log is append-only. Nothing here decides admission.
#[derive(Debug, Clone, Copy)]
pub struct ActivityTracker {
    sessions: SessionRepository,
}

impl ActivityTracker {
    /// Create a tracker over the given session repository.
    pub fn new(sessions: SessionRepository) -> Self {
        Self { sessions }
    }

    /// Heartbeat a session and log the access.
    ///
    /// Returns `false` when the session is unknown, ended, or was found
    /// stale. A stale session is ended here and its end is logged instead
    /// of an access.
    pub fn touch(
        &self,
        snapshot: &mut StoreSnapshot,
        id: SessionId,
        update: &ActivityUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self.sessions.heartbeat(snapshot, id, update, now) {
            Ok(HeartbeatOutcome::Refreshed(session)) => {
                snapshot.analytics.push(ActivityEntry {
                    ip_address: session.ip_address.clone(),
                    user_agent: session.user_agent.clone(),
                    domain: session.domain.clone(),
                    ..ActivityEntry::new(
                        session.user_id,
                        Some(session.account_id),
                        ActivityAction::Access,
                        now,
                    )
                });
                Ok(true)
            }
            Ok(HeartbeatOutcome::Expired(session)) => {
                self.record_session_end(snapshot, &session);
                Ok(false)
            }
            Err(e) if e.kind == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Log that a user left an account.
    pub fn record_logout(
        &self,
        snapshot: &mut StoreSnapshot,
        user_id: &str,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) {
        snapshot.analytics.push(ActivityEntry::new(
            user_id,
            Some(account_id),
            ActivityAction::Logout,
            now,
        ));
    }

    /// Log a successful authentication.
    pub fn record_login(
        &self,
        snapshot: &mut StoreSnapshot,
        user_id: &str,
        device: &DeviceInfo,
        now: DateTime<Utc>,
    ) {
        snapshot.analytics.push(ActivityEntry {
            ip_address: device.ip_address.clone(),
            user_agent: device.user_agent.clone(),
            ..ActivityEntry::new(user_id, None, ActivityAction::Login, now)
        });
    }

    /// Log an admitted session.
    pub fn record_session_start(&self, snapshot: &mut StoreSnapshot, session: &Session) {
        snapshot.analytics.push(ActivityEntry {
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            ..ActivityEntry::new(
                session.user_id.clone(),
                Some(session.account_id),
                ActivityAction::SessionStart,
                session.created_at,
            )
        });
    }

    /// Log an ended session.
    pub fn record_session_end(&self, snapshot: &mut StoreSnapshot, session: &Session) {
        snapshot.analytics.push(ActivityEntry {
            domain: session.domain.clone(),
            ..ActivityEntry::new(
                session.user_id.clone(),
                Some(session.account_id),
                ActivityAction::SessionEnd,
                session.end_time.unwrap_or(session.last_activity),
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tracker() -> (ActivityTracker, SessionRepository) {
        let repo = SessionRepository::new(Duration::seconds(60));
        (ActivityTracker::new(repo), repo)
    }

    #[test]
    fn test_touch_logs_access_with_domain() {
        let (tracker, repo) = tracker();
        let mut snapshot = StoreSnapshot::default();
        let now = Utc::now();
        let id = repo
            .create(&mut snapshot, "a", AccountId(3), DeviceInfo::new("d"), now)
            .id;

        let touched = tracker
            .touch(
                &mut snapshot,
                id,
                &ActivityUpdate::domain(Some("video.example".to_string())),
                now + Duration::seconds(5),
            )
            .unwrap();

        assert!(touched);
        let entry = snapshot.analytics.last().unwrap();
        assert_eq!(entry.action, ActivityAction::Access);
        assert_eq!(entry.account_id, Some(AccountId(3)));
        assert_eq!(entry.domain.as_deref(), Some("video.example"));
    }

    #[test]
    fn test_touch_unknown_session_returns_false() {
        let (tracker, _) = tracker();
        let mut snapshot = StoreSnapshot::default();
        let touched = tracker
            .touch(&mut snapshot, SessionId::new(), &ActivityUpdate::default(), Utc::now())
            .unwrap();
        assert!(!touched);
        assert!(snapshot.analytics.is_empty());
    }

    #[test]
    fn test_touch_stale_session_logs_its_end() {
        let (tracker, repo) = tracker();
        let mut snapshot = StoreSnapshot::default();
        let start = Utc::now();
        let id = repo
            .create(&mut snapshot, "a", AccountId(2), DeviceInfo::new("d"), start)
            .id;

        let touched = tracker
            .touch(
                &mut snapshot,
                id,
                &ActivityUpdate::default(),
                start + Duration::seconds(120),
            )
            .unwrap();

        assert!(!touched);
        assert_eq!(snapshot.analytics.len(), 1);
        let entry = &snapshot.analytics[0];
        assert_eq!(entry.action, ActivityAction::SessionEnd);
        assert_eq!(entry.account_id, Some(AccountId(2)));
        assert_eq!(entry.timestamp, start + Duration::seconds(120));
    }

    #[test]
    fn test_logout_and_login_entries() {
        let (tracker, _) = tracker();
        let mut snapshot = StoreSnapshot::default();
        let now = Utc::now();
        tracker.record_login(&mut snapshot, "a", &DeviceInfo::new("d"), now);
        tracker.record_logout(&mut snapshot, "a", AccountId(1), now);

        let actions: Vec<_> = snapshot.analytics.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![ActivityAction::Login, ActivityAction::Logout]);
        assert_eq!(snapshot.analytics[0].account_id, None);
    }
}
