//! Opening the store, seeding it on first run.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use keyshare_auth::password::PasswordHasher;
use keyshare_core::config::{AppConfig, BootstrapConfig};
use keyshare_core::error::AppError;
use keyshare_entity::{StoreSnapshot, User};
use keyshare_store::{JsonFileStore, SnapshotStore, StoreHandle};

/// A snapshot holding only the bootstrap administrator.
///
/// The administrator never expires.
pub fn bootstrap_snapshot(
    config: &BootstrapConfig,
    hasher: &PasswordHasher,
) -> Result<StoreSnapshot, AppError> {
    let admin = User {
        email: config.admin_email.clone(),
        password_hash: hasher.hash(&config.admin_password)?,
        is_admin: true,
        created_at: Utc::now(),
        expires_at: None,
        max_devices: 1,
        active_sessions: 0,
        preset_id: None,
    };

    Ok(StoreSnapshot {
        users: vec![admin],
        ..Default::default()
    })
}

/// Open the configured JSON store, creating it if missing.
///
/// The document is read once before returning; a store that exists but
/// cannot be read is an error the caller should treat as fatal.
pub async fn open_store(config: &AppConfig) -> Result<StoreHandle, AppError> {
    let store = JsonFileStore::from_config(&config.store);
    let hasher = PasswordHasher::new();

    let seed = bootstrap_snapshot(&config.bootstrap, &hasher)?;
    if store.ensure_initialized(&seed).await? {
        warn!(
            admin_email = %config.bootstrap.admin_email,
            "Created data file with bootstrap admin; change its password"
        );
    }

    let snapshot = store.read_snapshot().await?;
    info!(
        path = %store.path().display(),
        users = snapshot.users.len(),
        accounts = snapshot.accounts.len(),
        sessions = snapshot.sessions.len(),
        "Store opened"
    );

    Ok(StoreHandle::new(Arc::new(store)))
}
