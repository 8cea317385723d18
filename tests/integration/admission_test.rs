//! Integration tests for seat admission and the session lifecycle.

use keyshare_auth::seat::DenialReason;
use keyshare_auth::session::SessionStart;
use keyshare_core::error::ErrorKind;
use keyshare_core::types::AccountId;
use keyshare_entity::{ActivityAction, DeviceInfo, EndReason};
use keyshare_service::{CreateUserRequest, RequestContext};

use crate::helpers::{Seed, TIMEOUT_SECONDS, TestApp};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_starts_never_exceed_limit() {
    let users: Vec<String> = (0..8).map(|i| format!("user{i}@example.com")).collect();
    let mut seed = Seed::new().account(1, 3);
    for user in &users {
        seed = seed.user(user, 1, &[1]);
    }
    let app = seed.build();

    let tasks: Vec<_> = users
        .iter()
        .map(|user| {
            let manager = app.manager.clone();
            let user = user.clone();
            tokio::spawn(async move {
                manager
                    .start_session(&user, AccountId(1), DeviceInfo::new(format!("{user}-laptop")))
                    .await
            })
        })
        .collect();

    let mut started = 0;
    let mut denied = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            SessionStart::Started(_) => started += 1,
            SessionStart::Denied(DenialReason::ConcurrencyLimitExceeded) => denied += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(started, 3);
    assert_eq!(denied, 5);
    let occupancy = app.manager.get_occupancy(AccountId(1)).await.unwrap();
    assert_eq!(occupancy.active_sessions, 3);
    assert_eq!(occupancy.available, 0);
}

#[tokio::test]
async fn test_device_limit_and_reconnect() {
    let app = Seed::new()
        .account(1, 5)
        .account(2, 5)
        .user("ana@example.com", 2, &[1, 2])
        .build();

    let laptop = app.start("ana@example.com", 1, "laptop").await;
    app.start("ana@example.com", 1, "phone").await;

    let third = app.try_start("ana@example.com", 1, "tablet").await;
    assert_eq!(third, SessionStart::Denied(DenialReason::DeviceLimitExceeded));

    // A device already in use elsewhere does not count as a new device.
    let other_account = app.try_start("ana@example.com", 2, "laptop").await;
    assert!(matches!(other_account, SessionStart::Started(_)));

    let again = app.try_start("ana@example.com", 1, "laptop").await;
    assert!(matches!(again, SessionStart::Resumed(ref s) if s.id == laptop.id));
    assert_eq!(
        app.manager.list_account_sessions(AccountId(1)).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_single_device_user_reconnects_but_cannot_add_a_device() {
    let app = Seed::new().account(1, 5).user("ana@example.com", 1, &[1]).build();

    let first = app.start("ana@example.com", 1, "device-a").await;
    let again = app.try_start("ana@example.com", 1, "device-a").await;
    assert!(matches!(again, SessionStart::Resumed(ref s) if s.id == first.id));

    assert_eq!(
        app.try_start("ana@example.com", 1, "device-b").await,
        SessionStart::Denied(DenialReason::DeviceLimitExceeded)
    );
}

#[tokio::test]
async fn test_started_session_is_listed() {
    let app = Seed::new().account(1, 1).user("ana@example.com", 1, &[1]).build();
    let started = app.start("ana@example.com", 1, "laptop").await;

    let ctx = RequestContext::new("ana@example.com", false);
    let listed = app
        .sessions
        .list_user_sessions(&ctx, "ana@example.com")
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, started.id);
    assert_eq!(listed[0].user_id, "ana@example.com");
    assert_eq!(listed[0].account_id, AccountId(1));
    assert_eq!(listed[0].device_id, "laptop");
}

#[tokio::test]
async fn test_occupancy_counts_sessions_not_users() {
    let app = Seed::new()
        .account(1, 2)
        .user("ana@example.com", 3, &[1])
        .user("bo@example.com", 1, &[1])
        .build();

    app.start("ana@example.com", 1, "laptop").await;
    app.start("ana@example.com", 1, "phone").await;

    let outcome = app.try_start("bo@example.com", 1, "laptop").await;
    assert_eq!(
        outcome,
        SessionStart::Denied(DenialReason::ConcurrencyLimitExceeded)
    );

    let overview = app.reports.account_overview(&app.ctx).await.unwrap();
    assert_eq!(overview[0].live_sessions, 2);
    assert_eq!(overview[0].distinct_users, 1);
}

#[tokio::test]
async fn test_admission_checks_run_in_order() {
    let app = Seed::new()
        .account(1, 1)
        .account(2, 1)
        .user("ana@example.com", 1, &[1])
        .user("old@example.com", 1, &[1])
        .expired("old@example.com")
        .build();

    let cases = [
        ("ghost@example.com", 1, DenialReason::UserNotFound),
        ("ana@example.com", 9, DenialReason::AccountNotFound),
        ("old@example.com", 1, DenialReason::UserExpired),
        ("ana@example.com", 2, DenialReason::Unauthorized),
    ];
    for (user, account, expected) in cases {
        assert_eq!(
            app.try_start(user, account, "laptop").await,
            SessionStart::Denied(expected),
            "{user} on account {account}"
        );
    }
    assert_eq!(app.memory.write_count(), 0);
}

#[tokio::test]
async fn test_stale_session_releases_its_slot() {
    let app = Seed::new()
        .account(1, 1)
        .user("ana@example.com", 1, &[1])
        .user("bo@example.com", 1, &[1])
        .build();

    let held = app.start("ana@example.com", 1, "laptop").await;

    app.age_session(held.id, TIMEOUT_SECONDS as i64 - 10).await;
    assert_eq!(
        app.try_start("bo@example.com", 1, "laptop").await,
        SessionStart::Denied(DenialReason::ConcurrencyLimitExceeded)
    );

    app.age_session(held.id, TIMEOUT_SECONDS as i64).await;
    assert!(matches!(
        app.try_start("bo@example.com", 1, "laptop").await,
        SessionStart::Started(_)
    ));
}

#[tokio::test]
async fn test_heartbeat_on_stale_session_ends_it() {
    let app = Seed::new().account(1, 1).user("ana@example.com", 1, &[1]).build();
    let session = app.start("ana@example.com", 1, "laptop").await;
    app.age_session(session.id, TIMEOUT_SECONDS as i64 + 1).await;

    let ctx = RequestContext::new("ana@example.com", false);
    assert!(!app.sessions.heartbeat(&ctx, session.id, None).await.unwrap());

    let snapshot = app.snapshot().await;
    let stored = snapshot.session(session.id).unwrap();
    assert!(!stored.active);
    assert_eq!(stored.end_reason, Some(EndReason::Idle));
    let ends: Vec<_> = snapshot
        .analytics
        .iter()
        .filter(|e| e.action == ActivityAction::SessionEnd)
        .collect();
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].user_id, "ana@example.com");
}

#[tokio::test]
async fn test_end_session_is_idempotent() {
    let app = Seed::new()
        .account(1, 1)
        .user("ana@example.com", 1, &[1])
        .user("bo@example.com", 1, &[1])
        .build();
    let ctx = RequestContext::new("ana@example.com", false);
    let session = app.start("ana@example.com", 1, "laptop").await;

    app.sessions.end_session(&ctx, session.id).await.unwrap();
    app.sessions.end_session(&ctx, session.id).await.unwrap();

    let snapshot = app.snapshot().await;
    let ends = snapshot
        .analytics
        .iter()
        .filter(|e| e.action == ActivityAction::SessionEnd)
        .count();
    assert_eq!(ends, 1);
    assert!(!app.sessions.heartbeat(&ctx, session.id, None).await.unwrap());
    assert!(matches!(
        app.try_start("bo@example.com", 1, "phone").await,
        SessionStart::Started(_)
    ));
}

#[tokio::test]
async fn test_other_users_cannot_touch_a_session() {
    let app = Seed::new()
        .account(1, 2)
        .user("ana@example.com", 1, &[1])
        .user("bo@example.com", 1, &[1])
        .build();
    let session = app.start("ana@example.com", 1, "laptop").await;

    let bo = RequestContext::new("bo@example.com", false);
    let err = app.sessions.end_session(&bo, session.id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);

    app.sessions.end_session(&app.ctx, session.id).await.unwrap();
}

#[tokio::test]
async fn test_login_session_round_trip() {
    let app = TestApp::new();
    let ctx = app.ctx.clone();
    app.admin
        .create_user(
            &ctx,
            CreateUserRequest {
                email: "Ana@Example.com".to_string(),
                password: "correct horse".to_string(),
                is_admin: false,
                max_devices: Some(2),
                expires_in_days: Some(7),
                preset_id: None,
            },
        )
        .await
        .unwrap();
    let account = app
        .admin
        .create_account(
            &ctx,
            keyshare_service::CreateAccountRequest {
                name: "streaming".to_string(),
                group: None,
                cookies: Vec::new(),
                max_concurrent_users: Some(1),
            },
        )
        .await
        .unwrap();
    app.admin
        .assign_account(&ctx, "ana@example.com", account.id)
        .await
        .unwrap();

    let device = DeviceInfo::new("laptop");
    let err = app
        .sessions
        .login("ana@example.com", "wrong password", &device)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);

    let user = app
        .sessions
        .login("ana@example.com", "correct horse", &device)
        .await
        .unwrap();
    let as_user = RequestContext::for_user(&user);

    let session = app
        .sessions
        .start_session(&as_user, account.id, "laptop")
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert!(
        app.sessions
            .heartbeat(&as_user, session.id, Some("video.example".to_string()))
            .await
            .unwrap()
    );
    app.sessions.record_logout(&as_user, account.id).await.unwrap();
    app.sessions.end_session(&as_user, session.id).await.unwrap();

    let usage = app.reports.user_usage(&as_user, "ana@example.com").await.unwrap();
    assert_eq!(usage.accounts.len(), 1);
    assert_eq!(usage.accounts[0].sessions, 1);

    let actions: Vec<ActivityAction> = app
        .snapshot()
        .await
        .analytics
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            ActivityAction::Login,
            ActivityAction::SessionStart,
            ActivityAction::Access,
            ActivityAction::Logout,
            ActivityAction::SessionEnd,
        ]
    );

    let overview = app.reports.account_overview(&ctx).await.unwrap();
    assert_eq!(overview[0].live_sessions, 0);
    assert_eq!(overview[0].audit_active_users, 0);
}

#[tokio::test]
async fn test_store_outage_is_retryable_and_recovers() {
    let app = Seed::new().account(1, 1).user("ana@example.com", 1, &[1]).build();

    app.memory.set_offline(true);
    let err = app
        .manager
        .start_session("ana@example.com", AccountId(1), DeviceInfo::new("laptop"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::StoreUnavailable);
    assert!(err.is_retryable());

    app.memory.set_offline(false);
    app.start("ana@example.com", 1, "laptop").await;
}
