//! Integration tests for the reconciliation sweeper and its runner.

use std::sync::Arc;

use chrono::{Duration, Utc};

use keyshare_auth::seat::{DenialReason, ReconciliationSweeper};
use keyshare_auth::session::{SessionRepository, SessionStart};
use keyshare_core::types::AccountId;
use keyshare_entity::{ActivityAction, EndReason};
use keyshare_worker::SweepRunner;

use crate::helpers::{Seed, TIMEOUT_SECONDS};

#[tokio::test]
async fn test_expired_user_sessions_free_capacity() {
    let app = Seed::new()
        .account(1, 2)
        .user("ana@example.com", 2, &[1])
        .user("bo@example.com", 1, &[1])
        .build();

    app.start("ana@example.com", 1, "laptop").await;
    app.start("ana@example.com", 1, "phone").await;
    app.store
        .mutate(|s| {
            if let Some(user) = s.user_mut("ana@example.com") {
                user.expires_at = Some(Utc::now() - Duration::seconds(1));
            }
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(
        app.try_start("bo@example.com", 1, "laptop").await,
        SessionStart::Denied(DenialReason::ConcurrencyLimitExceeded)
    );

    let report = app.sweeper.run_pass().await.unwrap();
    assert_eq!(report.expired_user_sessions, 2);
    assert_eq!(report.ended(), 2);

    let snapshot = app.snapshot().await;
    assert!(
        snapshot
            .sessions
            .iter()
            .all(|s| !s.active && s.end_reason == Some(EndReason::UserExpired))
    );
    let ends = snapshot
        .analytics
        .iter()
        .filter(|e| e.action == ActivityAction::SessionEnd)
        .count();
    assert_eq!(ends, 2);
    assert_eq!(snapshot.account(AccountId(1)).unwrap().active_sessions, Some(0));

    assert!(matches!(
        app.try_start("bo@example.com", 1, "laptop").await,
        SessionStart::Started(_)
    ));
}

#[tokio::test]
async fn test_deleted_user_sessions_end_on_next_pass() {
    let app = Seed::new().account(1, 1).user("ana@example.com", 1, &[1]).build();
    let session = app.start("ana@example.com", 1, "laptop").await;

    app.admin.delete_user(&app.ctx, "ana@example.com").await.unwrap();
    assert!(app.snapshot().await.session(session.id).unwrap().active);

    let report = app.sweeper.run_pass().await.unwrap();
    assert_eq!(report.deleted_user_sessions, 1);
    assert_eq!(
        app.snapshot().await.session(session.id).unwrap().end_reason,
        Some(EndReason::UserDeleted)
    );
}

#[tokio::test]
async fn test_idle_sessions_end_and_counters_are_rewritten() {
    let app = Seed::new()
        .account(1, 3)
        .user("ana@example.com", 1, &[1])
        .user("bo@example.com", 1, &[1])
        .build();
    let idle = app.start("ana@example.com", 1, "laptop").await;
    let fresh = app.start("bo@example.com", 1, "laptop").await;
    app.age_session(idle.id, TIMEOUT_SECONDS as i64 + 5).await;
    app.store
        .mutate(|s| {
            if let Some(account) = s.account_mut(AccountId(1)) {
                account.active_sessions = Some(7);
            }
            Ok(())
        })
        .await
        .unwrap();

    let report = app.sweeper.run_pass().await.unwrap();
    assert_eq!(report.idle_sessions, 1);
    assert!(report.counters_corrected >= 1);

    let snapshot = app.snapshot().await;
    assert_eq!(snapshot.session(idle.id).unwrap().end_reason, Some(EndReason::Idle));
    assert!(snapshot.session(fresh.id).unwrap().active);
    assert_eq!(snapshot.account(AccountId(1)).unwrap().active_sessions, Some(1));
    assert_eq!(snapshot.user("bo@example.com").unwrap().active_sessions, 1);
    assert_eq!(snapshot.user("ana@example.com").unwrap().active_sessions, 0);

    let second = app.sweeper.run_pass().await.unwrap();
    assert_eq!(second.ended(), 0);
    assert_eq!(second.counters_corrected, 0);
}

#[tokio::test]
async fn test_retention_purges_old_history_only() {
    let app = Seed::new()
        .account(1, 3)
        .user("ana@example.com", 3, &[1])
        .build();
    let old = app.start("ana@example.com", 1, "laptop").await;
    let recent = app.start("ana@example.com", 1, "phone").await;
    let live = app.start("ana@example.com", 1, "tablet").await;

    app.store
        .mutate(|s| {
            let now = Utc::now();
            if let Some(session) = s.session_mut(old.id) {
                session.end_at(now - Duration::hours(3), EndReason::Explicit);
            }
            if let Some(session) = s.session_mut(recent.id) {
                session.end_at(now - Duration::minutes(10), EndReason::Explicit);
            }
            Ok(())
        })
        .await
        .unwrap();

    let sweeper = ReconciliationSweeper::new(
        app.store.clone(),
        SessionRepository::new(Duration::seconds(TIMEOUT_SECONDS as i64)),
        Some(Duration::hours(1)),
    );
    let report = sweeper.run_pass().await.unwrap();
    assert_eq!(report.purged_sessions, 1);

    let snapshot = app.snapshot().await;
    assert!(snapshot.session(old.id).is_none());
    assert!(snapshot.session(recent.id).is_some());
    assert!(snapshot.session(live.id).unwrap().active);
}

#[tokio::test(start_paused = true)]
async fn test_runner_sweeps_in_background() {
    let app = Seed::new().account(1, 1).user("ana@example.com", 1, &[1]).build();
    let session = app.start("ana@example.com", 1, "laptop").await;
    app.age_session(session.id, TIMEOUT_SECONDS as i64 + 1).await;

    let handle = SweepRunner::new(
        Arc::new(app.sweeper.clone()),
        std::time::Duration::from_secs(30),
    )
    .start();
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    assert!(handle.completed_passes() >= 1);
    assert!(!app.snapshot().await.session(session.id).unwrap().active);

    handle.stop().await;
}
