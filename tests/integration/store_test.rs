//! End-to-end tests against the JSON file store.

use std::sync::Arc;

use keyshare_auth::session::{SessionManager, SessionRepository, SessionStart};
use keyshare_core::config::{AppConfig, StoreConfig};
use keyshare_core::error::ErrorKind;
use keyshare_core::types::AccountId;
use keyshare_entity::{DeviceInfo, StoreSnapshot, UserAccount};
use keyshare_store::{JsonFileStore, SnapshotStore, StoreHandle};

use crate::helpers::test_user;

fn config(dir: &tempfile::TempDir) -> AppConfig {
    AppConfig {
        store: StoreConfig {
            data_file: dir.path().join("db.json").display().to_string(),
            pretty: false,
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_sessions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);

    let store = keyshare_service::open_store(&config).await.unwrap();
    store
        .mutate(|s| {
            s.users.push(test_user("ana@example.com", 1));
            s.accounts.push(keyshare_entity::Account {
                id: AccountId(1),
                name: "streaming".to_string(),
                group: None,
                cookies: Vec::new(),
                max_concurrent_users: 1,
                active_sessions: Some(0),
            });
            s.user_accounts
                .push(UserAccount::new("ana@example.com", AccountId(1)));
            Ok(())
        })
        .await
        .unwrap();

    let manager = SessionManager::from_config(store, &config.session);
    let session = manager
        .start_session("ana@example.com", AccountId(1), DeviceInfo::new("laptop"))
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let reopened = keyshare_service::open_store(&config).await.unwrap();
    let snapshot = reopened.read().await.unwrap();
    assert!(snapshot.user(&config.bootstrap.admin_email).is_some());
    assert!(snapshot.session(session.id).unwrap().active);

    let manager = SessionManager::from_config(reopened, &config.session);
    let again = manager
        .start_session("ana@example.com", AccountId(1), DeviceInfo::new("laptop"))
        .await
        .unwrap();
    assert!(matches!(again, SessionStart::Resumed(ref s) if s.id == session.id));
}

#[tokio::test]
async fn test_missing_document_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("absent.json"), true);
    let handle = StoreHandle::new(Arc::new(store));
    let manager = SessionManager::new(handle, SessionRepository::new(chrono::Duration::seconds(60)));

    let err = manager
        .start_session("ana@example.com", AccountId(1), DeviceInfo::new("laptop"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::StoreUnavailable);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_written_document_is_plain_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let store = JsonFileStore::new(&path, true);
    store.ensure_initialized(&StoreSnapshot::default()).await.unwrap();

    let mut snapshot = store.read_snapshot().await.unwrap();
    snapshot.users.push(test_user("ana@example.com", 2));
    store.write_snapshot(&snapshot).await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["users"][0]["email"], "ana@example.com");
    assert!(raw["sessions"].as_array().unwrap().is_empty());
}
