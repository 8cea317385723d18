//! Session use cases for clients and administrators.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use keyshare_auth::password::PasswordHasher;
use keyshare_auth::seat::Occupancy;
use keyshare_auth::session::{ActivityUpdate, SessionManager, SessionStart};
use keyshare_core::error::{AppError, ErrorKind};
use keyshare_core::types::{AccountId, SessionId};
use keyshare_entity::{DeviceInfo, Session, User};

use crate::context::RequestContext;

/// The external session interface.
///
/// Identity comes from the [`RequestContext`]; ownership is checked here
/// so the manager below can stay identity-agnostic.
#[derive(Debug, Clone)]
pub struct SessionService {
    /// Session manager.
    manager: Arc<SessionManager>,
    /// Password hasher for credential checks.
    hasher: PasswordHasher,
}

impl SessionService {
    /// Create a new session service.
    pub fn new(manager: Arc<SessionManager>, hasher: PasswordHasher) -> Self {
        Self { manager, hasher }
    }

    /// Check a user's credentials and log the login.
    ///
    /// Unknown users and wrong passwords produce the same error.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device: &DeviceInfo,
    ) -> Result<User, AppError> {
        let email = User::normalize_email(email);
        let snapshot = self.manager.store().read().await?;
        let invalid = || AppError::unauthorized("Invalid email or password");

        let user = snapshot.user(&email).cloned().ok_or_else(invalid)?;
        if !self.hasher.verify(password, &user.password_hash)? {
            warn!(user_id = %email, "Failed login attempt");
            return Err(invalid());
        }
        if user.is_expired_at(Utc::now()) {
            return Err(AppError::new(ErrorKind::UserExpired, "User access has expired"));
        }

        self.manager.record_login(&email, device).await?;
        info!(user_id = %email, "User logged in");
        Ok(user)
    }

    /// Request a session on an account for the calling user.
    pub async fn start_session(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        device_id: &str,
    ) -> Result<SessionStart, AppError> {
        self.manager
            .start_session(&ctx.user_id, account_id, ctx.device(device_id))
            .await
    }

    /// Heartbeat one of the caller's sessions.
    ///
    /// Returns `false` when the session is unknown or no longer live.
    pub async fn heartbeat(
        &self,
        ctx: &RequestContext,
        session_id: SessionId,
        domain: Option<String>,
    ) -> Result<bool, AppError> {
        let session = match self.manager.get_session(session_id).await {
            Ok(session) => session,
            Err(e) if e.kind == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        ctx.require_self_or_admin(&session.user_id)?;

        let update = ActivityUpdate {
            domain,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        };
        self.manager.heartbeat(session_id, update).await
    }

    /// End a session owned by the caller (or any session, for admins).
    pub async fn end_session(
        &self,
        ctx: &RequestContext,
        session_id: SessionId,
    ) -> Result<(), AppError> {
        let session = self.manager.get_session(session_id).await?;
        ctx.require_self_or_admin(&session.user_id)?;

        self.manager.end_session(session_id).await?;
        if ctx.user_id != session.user_id {
            info!(
                admin_id = %ctx.user_id,
                session_id = %session_id,
                user_id = %session.user_id,
                "Session terminated by admin"
            );
        }
        Ok(())
    }

    /// End every session `user_id` holds on an account.
    pub async fn end_account_session(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        account_id: AccountId,
    ) -> Result<usize, AppError> {
        let user_id = User::normalize_email(user_id);
        ctx.require_self_or_admin(&user_id)?;
        self.manager.end_account_session(&user_id, account_id).await
    }

    /// Log that the caller left an account; its sessions stay open.
    pub async fn record_logout(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
    ) -> Result<(), AppError> {
        self.manager.record_logout(&ctx.user_id, account_id).await
    }

    /// Current occupancy and limit of an account.
    pub async fn get_occupancy(
        &self,
        _ctx: &RequestContext,
        account_id: AccountId,
    ) -> Result<Occupancy, AppError> {
        self.manager.get_occupancy(account_id).await
    }

    /// Live sessions held by `user_id`.
    pub async fn list_user_sessions(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> Result<Vec<Session>, AppError> {
        let user_id = User::normalize_email(user_id);
        ctx.require_self_or_admin(&user_id)?;
        self.manager.list_user_sessions(&user_id).await
    }

    /// Every live session (admin).
    pub async fn list_active_sessions(&self, ctx: &RequestContext) -> Result<Vec<Session>, AppError> {
        ctx.require_admin()?;
        self.manager.list_active_sessions().await
    }

    /// Live sessions on an account (admin).
    pub async fn list_account_sessions(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
    ) -> Result<Vec<Session>, AppError> {
        ctx.require_admin()?;
        self.manager.list_account_sessions(account_id).await
    }
}
