//! Session entity model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use keyshare_core::types::{AccountId, SessionId};

/// One user's use of one account from one device.
///
/// A session is created active, refreshed by heartbeats, and ended exactly
/// once. Ended sessions stay in the snapshot for reporting unless a
/// retention window purges them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Identity key of the owning user.
    pub user_id: String,
    /// The account being used.
    pub account_id: AccountId,
    /// Opaque device fingerprint.
    pub device_id: String,
    /// Originating network address.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Client signature (User-Agent).
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Last domain reported by a heartbeat.
    #[serde(default)]
    pub domain: Option<String>,
    /// When the session was admitted.
    pub created_at: DateTime<Utc>,
    /// Last heartbeat.
    pub last_activity: DateTime<Utc>,
    /// False once the session has ended.
    pub active: bool,
    /// When the session ended.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds between creation and end.
    #[serde(rename = "duration", default)]
    pub duration_seconds: Option<f64>,
    /// Why the session ended.
    #[serde(default)]
    pub end_reason: Option<EndReason>,
}

impl Session {
    /// Create a new active session stamped at `now`.
    pub fn new(
        id: SessionId,
        user_id: impl Into<String>,
        account_id: AccountId,
        device: DeviceInfo,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            account_id,
            device_id: device.device_id,
            ip_address: device.ip_address,
            user_agent: device.user_agent,
            domain: None,
            created_at: now,
            last_activity: now,
            active: true,
            end_time: None,
            duration_seconds: None,
            end_reason: None,
        }
    }

    /// Whether the last heartbeat is strictly younger than `timeout`.
    ///
    /// A session whose last activity is exactly `timeout` old is stale.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity < timeout
    }

    /// Active and fresh: the only sessions that occupy capacity.
    pub fn is_live_at(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.active && self.is_fresh_at(now, timeout)
    }

    /// Seconds since the last heartbeat.
    pub fn idle_seconds_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity).num_seconds().max(0)
    }

    /// End the session at `now`.
    ///
    /// Returns `false` without touching anything if it had already ended.
    pub fn end_at(&mut self, now: DateTime<Utc>, reason: EndReason) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.end_time = Some(now);
        self.duration_seconds = Some((now - self.created_at).num_milliseconds() as f64 / 1000.0);
        self.end_reason = Some(reason);
        true
    }
}

/// Client description supplied when a session is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Opaque device fingerprint.
    pub device_id: String,
    /// Originating network address.
    pub ip_address: Option<String>,
    /// Client signature (User-Agent).
    pub user_agent: Option<String>,
}

impl DeviceInfo {
    /// Device info carrying only a fingerprint.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ip_address: None,
            user_agent: None,
        }
    }
}

/// Why a session left the `Active` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The client ended it.
    Explicit,
    /// No heartbeat within the inactivity timeout.
    Idle,
    /// The owning user's access window closed.
    UserExpired,
    /// The owning user no longer exists.
    UserDeleted,
    /// The account it was using no longer exists.
    AccountDeleted,
    /// An administrator cleared the domain it was used on.
    DomainCleanup,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Idle => write!(f, "idle"),
            Self::UserExpired => write!(f, "user_expired"),
            Self::UserDeleted => write!(f, "user_deleted"),
            Self::AccountDeleted => write!(f, "account_deleted"),
            Self::DomainCleanup => write!(f, "domain_cleanup"),
        }
    }
}
