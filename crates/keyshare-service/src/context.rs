//! Request context carrying the authenticated identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keyshare_core::error::AppError;
use keyshare_entity::{DeviceInfo, User};

/// Who is acting, as established by the credential layer.
///
/// Passed into every service method so each operation knows whose
/// sessions it may touch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Identity key of the caller.
    pub user_id: String,
    /// Whether the caller may manage users and accounts.
    pub is_admin: bool,
    /// Originating network address.
    pub ip_address: Option<String>,
    /// Client signature.
    pub user_agent: Option<String>,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Create a context for the given identity, normalizing its case.
    pub fn new(user_id: impl Into<String>, is_admin: bool) -> Self {
        Self {
            user_id: User::normalize_email(&user_id.into()),
            is_admin,
            ip_address: None,
            user_agent: None,
            request_time: Utc::now(),
        }
    }

    /// Context for an authenticated user record.
    pub fn for_user(user: &User) -> Self {
        Self::new(user.email.clone(), user.is_admin)
    }

    /// Administrative context for local tooling.
    pub fn system() -> Self {
        Self::new("system", true)
    }

    /// Attach client metadata.
    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    /// Device description for a session request from this client.
    pub fn device(&self, device_id: impl Into<String>) -> DeviceInfo {
        DeviceInfo {
            device_id: device_id.into(),
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Fail unless the caller is an administrator.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::unauthorized("Administrator access required"))
        }
    }

    /// Fail unless the caller is `user_id` or an administrator.
    pub fn require_self_or_admin(&self, user_id: &str) -> Result<(), AppError> {
        if self.is_admin || self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::unauthorized(
                "Cannot act on another user's sessions",
            ))
        }
    }
}
