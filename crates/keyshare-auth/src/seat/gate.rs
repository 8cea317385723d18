//! Admission gate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use keyshare_core::error::{AppError, ErrorKind};
use keyshare_core::types::{AccountId, SessionId};
use keyshare_entity::StoreSnapshot;

use super::resolver::OccupancyResolver;
use crate::session::repository::SessionRepository;

/// Why a session request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// No such user.
    UserNotFound,
    /// No such account.
    AccountNotFound,
    /// The user's access window has closed.
    UserExpired,
    /// The user is not associated with the account.
    Unauthorized,
    /// The user already has live sessions on as many devices as allowed.
    DeviceLimitExceeded,
    /// The account already hosts as many live sessions as allowed.
    ConcurrencyLimitExceeded,
}

impl DenialReason {
    /// The error kind this denial maps to when surfaced as an error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound | Self::AccountNotFound => ErrorKind::NotFound,
            Self::UserExpired => ErrorKind::UserExpired,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::DeviceLimitExceeded => ErrorKind::DeviceLimitExceeded,
            Self::ConcurrencyLimitExceeded => ErrorKind::ConcurrencyLimitExceeded,
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UserNotFound => "User not found",
            Self::AccountNotFound => "Account not found",
            Self::UserExpired => "User access has expired",
            Self::Unauthorized => "User is not assigned to this account",
            Self::DeviceLimitExceeded => "Device limit reached",
            Self::ConcurrencyLimitExceeded => "Account is at its concurrent user limit",
        };
        f.write_str(text)
    }
}

impl From<DenialReason> for AppError {
    fn from(reason: DenialReason) -> Self {
        AppError::new(reason.kind(), reason.to_string())
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new session may be created.
    Admitted,
    /// The same device already holds a live session on this account;
    /// that session should be refreshed and handed back.
    Reconnect(SessionId),
    /// The request is refused.
    Denied(DenialReason),
}

/// Decides whether a user may start a session on an account.
///
/// Must be evaluated inside the store's critical section together with
/// the session creation it authorizes, or two concurrent requests could
/// both see the last free slot.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyGate {
    sessions: SessionRepository,
    resolver: OccupancyResolver,
}

impl ConcurrencyGate {
    /// Create a gate sharing the repository's freshness rule.
    pub fn new(sessions: SessionRepository) -> Self {
        Self {
            sessions,
            resolver: OccupancyResolver::new(sessions),
        }
    }

    /// Run the admission checks in order.
    ///
    /// 1. user exists, account exists, user not expired
    /// 2. user is assigned to the account
    /// 3. same device already live on this account: reconnect
    /// 4. device limit, unless the device is already live elsewhere
    /// 5. account concurrency limit
    pub fn admit(
        &self,
        snapshot: &StoreSnapshot,
        user_id: &str,
        device_id: &str,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Admission {
        let Some(user) = snapshot.user(user_id) else {
            return Admission::Denied(DenialReason::UserNotFound);
        };
        let Some(account) = snapshot.account(account_id) else {
            return Admission::Denied(DenialReason::AccountNotFound);
        };
        if user.is_expired_at(now) {
            return Admission::Denied(DenialReason::UserExpired);
        }
        if !snapshot.association_exists(user_id, account_id) {
            return Admission::Denied(DenialReason::Unauthorized);
        }

        let live = self.sessions.list_active_for_user(snapshot, user_id, now);

        if let Some(existing) = live
            .iter()
            .find(|s| s.account_id == account_id && s.device_id == device_id)
        {
            debug!(
                user_id = %user_id,
                account_id = %account_id,
                session_id = %existing.id,
                "Device already holds a live session, reconnecting"
            );
            return Admission::Reconnect(existing.id);
        }

        let device_known = live.iter().any(|s| s.device_id == device_id);
        if !device_known {
            let devices = self.resolver.user_devices(snapshot, user_id, now).len() as u32;
            if user.device_limit().is_reached_by(devices) {
                debug!(
                    user_id = %user_id,
                    devices,
                    max_devices = user.device_limit().get(),
                    "Device limit reached"
                );
                return Admission::Denied(DenialReason::DeviceLimitExceeded);
            }
        }

        let occupancy = self.resolver.account_occupancy(snapshot, account_id, now);
        if account.concurrency_limit().is_reached_by(occupancy) {
            debug!(
                account_id = %account_id,
                occupancy,
                max_concurrent_users = account.concurrency_limit().get(),
                "Concurrency limit reached"
            );
            return Admission::Denied(DenialReason::ConcurrencyLimitExceeded);
        }

        Admission::Admitted
    }
}
