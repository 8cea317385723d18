//! Session lifecycle against the store.

use chrono::Utc;
use tracing::{debug, info};

use keyshare_core::config::SessionConfig;
use keyshare_core::error::AppError;
use keyshare_core::types::{AccountId, SessionId};
use keyshare_entity::{DeviceInfo, EndReason, Session};
use keyshare_store::StoreHandle;

use super::repository::{ActivityUpdate, EndOutcome, HeartbeatOutcome, SessionRepository};
use super::tracker::ActivityTracker;
use crate::seat::gate::{Admission, ConcurrencyGate, DenialReason};
use crate::seat::resolver::{Occupancy, OccupancyResolver};

/// Result of a session request.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStart {
    /// A new session was created.
    Started(Session),
    /// The device already held a live session on the account; it was
    /// refreshed and is returned instead of creating a second one.
    Resumed(Session),
    /// The request was refused.
    Denied(DenialReason),
}

impl SessionStart {
    /// The session, if one was granted.
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Started(s) | Self::Resumed(s) => Some(s),
            Self::Denied(_) => None,
        }
    }

    /// Convert into the granted session, surfacing a denial as an error.
    pub fn into_result(self) -> Result<Session, AppError> {
        match self {
            Self::Started(s) | Self::Resumed(s) => Ok(s),
            Self::Denied(reason) => Err(reason.into()),
        }
    }
}

/// Runs admission, heartbeats, and termination as store mutations.
///
/// Every state change happens inside [`StoreHandle::mutate`], so the
/// admission check and the session it authorizes are one critical
/// section.
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: StoreHandle,
    sessions: SessionRepository,
    gate: ConcurrencyGate,
    resolver: OccupancyResolver,
    tracker: ActivityTracker,
}

impl SessionManager {
    /// Create a manager with the given freshness rule.
    pub fn new(store: StoreHandle, sessions: SessionRepository) -> Self {
        Self {
            store,
            sessions,
            gate: ConcurrencyGate::new(sessions),
            resolver: OccupancyResolver::new(sessions),
            tracker: ActivityTracker::new(sessions),
        }
    }

    /// Create a manager from session configuration.
    pub fn from_config(store: StoreHandle, config: &SessionConfig) -> Self {
        Self::new(store, SessionRepository::from_config(config))
    }

    /// The shared store handle.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// The freshness rule in use.
    pub fn repository(&self) -> &SessionRepository {
        &self.sessions
    }

    /// Admit a user onto an account and create (or resume) a session.
    pub async fn start_session(
        &self,
        user_id: &str,
        account_id: AccountId,
        device: DeviceInfo,
    ) -> Result<SessionStart, AppError> {
        let outcome = self
            .store
            .mutate(|snapshot| {
                let now = Utc::now();
                match self
                    .gate
                    .admit(snapshot, user_id, &device.device_id, account_id, now)
                {
                    Admission::Denied(reason) => Ok(SessionStart::Denied(reason)),
                    Admission::Reconnect(id) => {
                        let update = ActivityUpdate {
                            domain: None,
                            ip_address: device.ip_address.clone(),
                            user_agent: device.user_agent.clone(),
                        };
                        match self.sessions.heartbeat(snapshot, id, &update, now)? {
                            HeartbeatOutcome::Refreshed(session) => Ok(SessionStart::Resumed(session)),
                            HeartbeatOutcome::Expired(session) => Err(AppError::internal(format!(
                                "Session {} went stale during admission",
                                session.id
                            ))),
                        }
                    }
                    Admission::Admitted => {
                        let session = self.sessions.create(
                            snapshot,
                            user_id,
                            account_id,
                            device.clone(),
                            now,
                        );
                        self.tracker.record_session_start(snapshot, &session);
                        Ok(SessionStart::Started(session))
                    }
                }
            })
            .await?;

        match &outcome {
            SessionStart::Started(s) => info!(
                session_id = %s.id,
                user_id = %user_id,
                account_id = %account_id,
                device_id = %s.device_id,
                "Session started"
            ),
            SessionStart::Resumed(s) => debug!(
                session_id = %s.id,
                user_id = %user_id,
                account_id = %account_id,
                "Session resumed"
            ),
            SessionStart::Denied(reason) => info!(
                user_id = %user_id,
                account_id = %account_id,
                reason = ?reason,
                "Session denied"
            ),
        }

        Ok(outcome)
    }

    /// Refresh a session. Returns `false` if it is unknown or no longer live.
    pub async fn heartbeat(&self, id: SessionId, update: ActivityUpdate) -> Result<bool, AppError> {
        self.store
            .mutate(|snapshot| self.tracker.touch(snapshot, id, &update, Utc::now()))
            .await
    }

    /// End a session. Ending an already-ended session succeeds without change.
    pub async fn end_session(&self, id: SessionId) -> Result<(), AppError> {
        let outcome = self
            .store
            .mutate(|snapshot| {
                let outcome = self.sessions.end(snapshot, id, EndReason::Explicit, Utc::now())?;
                if let EndOutcome::Ended(session) = &outcome {
                    self.tracker.record_session_end(snapshot, session);
                }
                Ok(outcome)
            })
            .await?;

        match outcome {
            EndOutcome::Ended(session) => info!(
                session_id = %id,
                user_id = %session.user_id,
                duration_seconds = session.duration_seconds.unwrap_or_default(),
                "Session ended"
            ),
            EndOutcome::AlreadyEnded => debug!(session_id = %id, "Session already ended"),
        }
        Ok(())
    }

    /// End every active session a user holds on an account and log the
    /// logout. Returns how many sessions were ended.
    pub async fn end_account_session(
        &self,
        user_id: &str,
        account_id: AccountId,
    ) -> Result<usize, AppError> {
        let ended = self
            .store
            .mutate(|snapshot| {
                let now = Utc::now();
                let ended = self
                    .sessions
                    .end_for(snapshot, user_id, account_id, EndReason::Explicit, now);
                for session in &ended {
                    self.tracker.record_session_end(snapshot, session);
                }
                self.tracker.record_logout(snapshot, user_id, account_id, now);
                Ok(ended.len())
            })
            .await?;

        info!(user_id = %user_id, account_id = %account_id, ended, "Account sessions ended");
        Ok(ended)
    }

    /// Log that a user left an account without ending its sessions.
    pub async fn record_logout(&self, user_id: &str, account_id: AccountId) -> Result<(), AppError> {
        self.store
            .mutate(|snapshot| {
                self.tracker.record_logout(snapshot, user_id, account_id, Utc::now());
                Ok(())
            })
            .await
    }

    /// Log a successful authentication.
    pub async fn record_login(&self, user_id: &str, device: &DeviceInfo) -> Result<(), AppError> {
        self.store
            .mutate(|snapshot| {
                self.tracker.record_login(snapshot, user_id, device, Utc::now());
                Ok(())
            })
            .await
    }

    /// Current occupancy of an account.
    pub async fn get_occupancy(&self, account_id: AccountId) -> Result<Occupancy, AppError> {
        let snapshot = self.store.read().await?;
        self.resolver.occupancy(&snapshot, account_id, Utc::now())
    }

    /// A single session by id.
    pub async fn get_session(&self, id: SessionId) -> Result<Session, AppError> {
        let snapshot = self.store.read().await?;
        self.sessions
            .find(&snapshot, id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Session {id} not found")))
    }

    /// A user's live sessions.
    pub async fn list_user_sessions(&self, user_id: &str) -> Result<Vec<Session>, AppError> {
        let snapshot = self.store.read().await?;
        Ok(self
            .sessions
            .list_active_for_user(&snapshot, user_id, Utc::now())
            .into_iter()
            .cloned()
            .collect())
    }

    /// Every live session.
    pub async fn list_active_sessions(&self) -> Result<Vec<Session>, AppError> {
        let snapshot = self.store.read().await?;
        let now = Utc::now();
        Ok(snapshot
            .sessions
            .iter()
            .filter(|s| self.sessions.is_live(s, now))
            .cloned()
            .collect())
    }

    /// Live sessions on an account.
    pub async fn list_account_sessions(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Session>, AppError> {
        let snapshot = self.store.read().await?;
        Ok(self
            .sessions
            .list_active_for_account(&snapshot, account_id, Utc::now())
            .into_iter()
            .cloned()
            .collect())
    }
}
