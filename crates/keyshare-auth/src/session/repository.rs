//! Session records within a snapshot.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use keyshare_core::config::SessionConfig;
use keyshare_core::error::AppError;
use keyshare_core::types::{AccountId, SessionId};
use keyshare_entity::{DeviceInfo, EndReason, Session, StoreSnapshot};

/// Fields a heartbeat may merge into a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityUpdate {
    /// Domain the client is currently on.
    pub domain: Option<String>,
    /// Network address the heartbeat came from.
    pub ip_address: Option<String>,
    /// Client signature the heartbeat came with.
    pub user_agent: Option<String>,
}

impl ActivityUpdate {
    /// An update carrying only a domain.
    pub fn domain(domain: Option<String>) -> Self {
        Self {
            domain,
            ..Self::default()
        }
    }
}

/// Result of ending a session that exists.
#[derive(Debug, Clone, PartialEq)]
pub enum EndOutcome {
    /// The session was active and is now ended.
    Ended(Session),
    /// The session had already ended; nothing changed.
    AlreadyEnded,
}

/// Result of a heartbeat on an active session.
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatOutcome {
    /// The session was fresh and its activity was refreshed.
    Refreshed(Session),
    /// The session had gone stale and was ended as idle.
    Expired(Session),
}

/// CRUD over session records, plus the freshness rule.
///
/// Stateless apart from the inactivity timeout; every method works on the
/// snapshot it is given. Staleness is derived from `last_activity` and
/// never stored.
#[derive(Debug, Clone, Copy)]
pub struct SessionRepository {
    /// Idle time after which a session stops occupying capacity.
    inactivity_timeout: Duration,
}

impl SessionRepository {
    /// Create a repository with the given inactivity timeout.
    pub fn new(inactivity_timeout: Duration) -> Self {
        Self { inactivity_timeout }
    }

    /// Create a repository from session configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.inactivity_timeout())
    }

    /// The configured inactivity timeout.
    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    /// `now - last_activity < timeout`.
    pub fn is_fresh(&self, session: &Session, now: DateTime<Utc>) -> bool {
        session.is_fresh_at(now, self.inactivity_timeout)
    }

    /// Active and fresh.
    pub fn is_live(&self, session: &Session, now: DateTime<Utc>) -> bool {
        session.is_live_at(now, self.inactivity_timeout)
    }

    /// Allocate an id not used by any session in the snapshot.
    pub fn allocate_id(&self, snapshot: &StoreSnapshot) -> SessionId {
        loop {
            let id = SessionId::new();
            if snapshot.session(id).is_none() {
                return id;
            }
            debug!(session_id = %id, "Session id collision, regenerating");
        }
    }

    /// Append a new active session and return a copy of it.
    pub fn create(
        &self,
        snapshot: &mut StoreSnapshot,
        user_id: &str,
        account_id: AccountId,
        device: DeviceInfo,
        now: DateTime<Utc>,
    ) -> Session {
        let id = self.allocate_id(snapshot);
        let session = Session::new(id, user_id, account_id, device, now);
        snapshot.sessions.push(session.clone());
        session
    }

    /// Look up a session by id.
    pub fn find<'a>(&self, snapshot: &'a StoreSnapshot, id: SessionId) -> Option<&'a Session> {
        snapshot.session(id)
    }

    /// Refresh a live session and merge the supplied fields.
    ///
    /// Only live sessions accept heartbeats. A session that is unknown or
    /// already ended yields `NotFound`. A session that is still flagged
    /// active but has gone stale is ended on the spot (reason `Idle`) and
    /// returned as [`HeartbeatOutcome::Expired`]: reviving it could push its
    /// account past the concurrency limit, since its slot may already have
    /// been handed out.
    pub fn heartbeat(
        &self,
        snapshot: &mut StoreSnapshot,
        id: SessionId,
        update: &ActivityUpdate,
        now: DateTime<Utc>,
    ) -> Result<HeartbeatOutcome, AppError> {
        let timeout = self.inactivity_timeout;
        let session = snapshot
            .session_mut(id)
            .filter(|s| s.active)
            .ok_or_else(|| AppError::not_found(format!("Session {id} not found")))?;

        if !session.is_fresh_at(now, timeout) {
            session.end_at(now, EndReason::Idle);
            debug!(session_id = %id, "Heartbeat on stale session, ended it");
            return Ok(HeartbeatOutcome::Expired(session.clone()));
        }

        if let Some(domain) = &update.domain {
            session.domain = Some(domain.clone());
        }
        if let Some(ip) = &update.ip_address {
            session.ip_address = Some(ip.clone());
        }
        if let Some(agent) = &update.user_agent {
            session.user_agent = Some(agent.clone());
        }
        session.last_activity = now;

        Ok(HeartbeatOutcome::Refreshed(session.clone()))
    }

    /// End a session. Ending an already-ended session is a no-op.
    pub fn end(
        &self,
        snapshot: &mut StoreSnapshot,
        id: SessionId,
        reason: EndReason,
        now: DateTime<Utc>,
    ) -> Result<EndOutcome, AppError> {
        let session = snapshot
            .session_mut(id)
            .ok_or_else(|| AppError::not_found(format!("Session {id} not found")))?;

        if session.end_at(now, reason) {
            Ok(EndOutcome::Ended(session.clone()))
        } else {
            Ok(EndOutcome::AlreadyEnded)
        }
    }

    /// End every active session a user holds on an account, fresh or not.
    pub fn end_for(
        &self,
        snapshot: &mut StoreSnapshot,
        user_id: &str,
        account_id: AccountId,
        reason: EndReason,
        now: DateTime<Utc>,
    ) -> Vec<Session> {
        snapshot
            .sessions
            .iter_mut()
            .filter(|s| s.user_id == user_id && s.account_id == account_id)
            .filter_map(|s| s.end_at(now, reason).then(|| s.clone()))
            .collect()
    }

    /// Live sessions on an account.
    pub fn list_active_for_account<'a>(
        &self,
        snapshot: &'a StoreSnapshot,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Vec<&'a Session> {
        snapshot
            .sessions
            .iter()
            .filter(|s| s.account_id == account_id && self.is_live(s, now))
            .collect()
    }

    /// Live sessions held by a user.
    pub fn list_active_for_user<'a>(
        &self,
        snapshot: &'a StoreSnapshot,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<&'a Session> {
        snapshot
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && self.is_live(s, now))
            .collect()
    }
}
