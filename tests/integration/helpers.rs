//! Shared test helpers for integration tests.

use std::sync::Arc;

use chrono::{Duration, Utc};

use keyshare_auth::password::PasswordHasher;
use keyshare_auth::seat::ReconciliationSweeper;
use keyshare_auth::session::{SessionManager, SessionRepository, SessionStart};
use keyshare_core::config::SessionConfig;
use keyshare_core::types::{AccountId, SessionId};
use keyshare_entity::{Account, DeviceInfo, Session, StoreSnapshot, User, UserAccount};
use keyshare_service::{AdminService, ReportService, RequestContext, SessionService};
use keyshare_store::{MemoryStore, StoreHandle};

/// Inactivity timeout used by every test application.
pub const TIMEOUT_SECONDS: u64 = 60;

/// Test application context
pub struct TestApp {
    /// Backing store, for failure injection and write counting
    pub memory: MemoryStore,
    /// Handle shared by every service
    pub store: StoreHandle,
    /// Session manager
    pub manager: Arc<SessionManager>,
    /// Client-facing session service
    pub sessions: SessionService,
    /// Administration
    pub admin: AdminService,
    /// Reporting
    pub reports: ReportService,
    /// Reconciliation sweeper without history retention
    pub sweeper: ReconciliationSweeper,
    /// Administrator context
    pub ctx: RequestContext,
}

impl TestApp {
    /// Create a test application over an empty store
    pub fn new() -> Self {
        Self::with_snapshot(StoreSnapshot::default())
    }

    /// Create a test application over the given snapshot
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        let config = SessionConfig {
            inactivity_timeout_seconds: TIMEOUT_SECONDS,
            ..Default::default()
        };
        let memory = MemoryStore::new(snapshot);
        let store = StoreHandle::new(Arc::new(memory.clone()));
        let repo = SessionRepository::from_config(&config);
        let hasher = PasswordHasher::new();

        let manager = Arc::new(SessionManager::new(store.clone(), repo));
        Self {
            sessions: SessionService::new(manager.clone(), hasher.clone()),
            admin: AdminService::new(store.clone(), hasher, config),
            reports: ReportService::new(store.clone(), repo),
            sweeper: ReconciliationSweeper::new(store.clone(), repo, None),
            manager,
            store,
            memory,
            ctx: RequestContext::system(),
        }
    }

    /// Start a session as `user` and return it, panicking on denial
    pub async fn start(&self, user: &str, account: u64, device: &str) -> Session {
        self.try_start(user, account, device)
            .await
            .into_result()
            .expect("session should be admitted")
    }

    /// Start a session as `user` and return the raw outcome
    pub async fn try_start(&self, user: &str, account: u64, device: &str) -> SessionStart {
        self.manager
            .start_session(user, AccountId(account), DeviceInfo::new(device))
            .await
            .expect("store should be available")
    }

    /// Move a session's last heartbeat `seconds` into the past
    pub async fn age_session(&self, id: SessionId, seconds: i64) {
        self.store
            .mutate(|s| {
                if let Some(session) = s.session_mut(id) {
                    session.last_activity = Utc::now() - Duration::seconds(seconds);
                }
                Ok(())
            })
            .await
            .expect("age session");
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> StoreSnapshot {
        self.store.read().await.expect("read snapshot")
    }
}

/// Builder for seeded snapshots
#[derive(Default)]
pub struct Seed {
    snapshot: StoreSnapshot,
}

impl Seed {
    /// Start with an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account with the given concurrency limit
    pub fn account(mut self, id: u64, max_concurrent_users: u32) -> Self {
        self.snapshot.accounts.push(Account {
            id: AccountId(id),
            name: format!("account-{id}"),
            group: None,
            cookies: Vec::new(),
            max_concurrent_users,
            active_sessions: Some(0),
        });
        self
    }

    /// Add a user with the given device limit, assigned to `accounts`
    pub fn user(mut self, email: &str, max_devices: u32, accounts: &[u64]) -> Self {
        self.snapshot.users.push(test_user(email, max_devices));
        for id in accounts {
            self.snapshot
                .user_accounts
                .push(UserAccount::new(email, AccountId(*id)));
        }
        self
    }

    /// Expire a previously added user
    pub fn expired(mut self, email: &str) -> Self {
        if let Some(user) = self.snapshot.user_mut(email) {
            user.expires_at = Some(Utc::now() - Duration::hours(1));
        }
        self
    }

    /// Finish into a test application
    pub fn build(self) -> TestApp {
        TestApp::with_snapshot(self.snapshot)
    }
}

/// A user record with no usable password
pub fn test_user(email: &str, max_devices: u32) -> User {
    User {
        email: email.to_string(),
        password_hash: String::new(),
        is_admin: false,
        created_at: Utc::now(),
        expires_at: None,
        max_devices,
        active_sessions: 0,
        preset_id: None,
    }
}
