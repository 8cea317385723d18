//! Integration tests for administrative changes that touch live sessions.

use keyshare_auth::seat::DenialReason;
use keyshare_auth::session::SessionStart;
use keyshare_core::error::ErrorKind;
use keyshare_core::types::AccountId;
use keyshare_entity::{DeviceInfo, EndReason};
use keyshare_service::{
    CreatePresetRequest, CreateUserRequest, RequestContext, UpdateAccountRequest, UpdateUserRequest,
};

use crate::helpers::Seed;

#[tokio::test]
async fn test_delete_account_removes_its_sessions() {
    let app = Seed::new()
        .account(1, 2)
        .account(2, 2)
        .user("ana@example.com", 2, &[1, 2])
        .user("bo@example.com", 1, &[1])
        .build();
    app.start("ana@example.com", 1, "laptop").await;
    app.start("bo@example.com", 1, "laptop").await;
    let kept = app.start("ana@example.com", 2, "phone").await;

    let removed = app.admin.delete_account(&app.ctx, AccountId(1)).await.unwrap();
    assert_eq!(removed, 2);

    let err = app.manager.get_occupancy(AccountId(1)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let snapshot = app.snapshot().await;
    assert_eq!(snapshot.sessions.len(), 1);
    assert_eq!(snapshot.sessions[0].id, kept.id);
    assert!(!snapshot.association_exists("bo@example.com", AccountId(1)));
    assert!(
        snapshot
            .analytics
            .iter()
            .all(|e| e.account_id != Some(AccountId(1)))
    );

    assert_eq!(
        app.try_start("bo@example.com", 1, "laptop").await,
        SessionStart::Denied(DenialReason::AccountNotFound)
    );
}

#[tokio::test]
async fn test_unassign_keeps_running_session() {
    let app = Seed::new()
        .account(1, 2)
        .user("ana@example.com", 2, &[1])
        .build();
    let session = app.start("ana@example.com", 1, "laptop").await;

    assert!(
        app.admin
            .unassign_account(&app.ctx, "ana@example.com", AccountId(1))
            .await
            .unwrap()
    );

    let ctx = RequestContext::new("ana@example.com", false);
    assert!(app.sessions.heartbeat(&ctx, session.id, None).await.unwrap());
    assert_eq!(
        app.try_start("ana@example.com", 1, "phone").await,
        SessionStart::Denied(DenialReason::Unauthorized)
    );
}

#[tokio::test]
async fn test_lowered_limit_applies_to_new_sessions_only() {
    let app = Seed::new()
        .account(1, 3)
        .user("ana@example.com", 1, &[1])
        .user("bo@example.com", 1, &[1])
        .user("cy@example.com", 1, &[1])
        .build();
    app.start("ana@example.com", 1, "laptop").await;
    app.start("bo@example.com", 1, "laptop").await;

    app.admin
        .update_account(
            &app.ctx,
            AccountId(1),
            UpdateAccountRequest {
                max_concurrent_users: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let occupancy = app.manager.get_occupancy(AccountId(1)).await.unwrap();
    assert_eq!(occupancy.active_sessions, 2);
    assert_eq!(occupancy.available, 0);
    assert_eq!(
        app.try_start("cy@example.com", 1, "laptop").await,
        SessionStart::Denied(DenialReason::ConcurrencyLimitExceeded)
    );
}

#[tokio::test]
async fn test_domain_cleanup_ends_sessions_on_that_domain() {
    let app = Seed::new()
        .account(1, 2)
        .user("ana@example.com", 2, &[1])
        .build();
    let ctx = RequestContext::new("ana@example.com", false);
    let video = app.start("ana@example.com", 1, "laptop").await;
    let music = app.start("ana@example.com", 1, "phone").await;
    app.sessions
        .heartbeat(&ctx, video.id, Some("video.example".to_string()))
        .await
        .unwrap();
    app.sessions
        .heartbeat(&ctx, music.id, Some("music.example".to_string()))
        .await
        .unwrap();

    let cleanup = app
        .admin
        .cleanup_domain(&app.ctx, "ana@example.com", "video.example")
        .await
        .unwrap();
    assert_eq!(cleanup.entries_removed, 1);
    assert_eq!(cleanup.sessions_ended, 1);

    let snapshot = app.snapshot().await;
    assert_eq!(
        snapshot.session(video.id).unwrap().end_reason,
        Some(EndReason::DomainCleanup)
    );
    assert!(snapshot.session(music.id).unwrap().active);
}

#[tokio::test]
async fn test_preset_provisioned_user_can_start_sessions() {
    let app = Seed::new().account(1, 1).account(2, 1).account(3, 1).build();
    let preset = app
        .admin
        .create_preset(
            &app.ctx,
            CreatePresetRequest {
                name: "video".to_string(),
                description: None,
                account_ids: vec![AccountId(1), AccountId(2)],
            },
        )
        .await
        .unwrap();

    let user = app
        .admin
        .create_user(
            &app.ctx,
            CreateUserRequest {
                email: "Cy@Example.com".to_string(),
                password: "password123".to_string(),
                is_admin: false,
                max_devices: Some(2),
                expires_in_days: None,
                preset_id: Some(preset.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(user.email, "cy@example.com");

    let device = DeviceInfo::new("laptop");
    app.sessions.login("CY@example.com", "password123", &device).await.unwrap();
    app.start("cy@example.com", 2, "laptop").await;
    assert_eq!(
        app.try_start("cy@example.com", 3, "laptop").await,
        SessionStart::Denied(DenialReason::Unauthorized)
    );

    let update = UpdateUserRequest {
        preset_id: Some(preset.id),
        ..Default::default()
    };
    app.admin.update_user(&app.ctx, "cy@example.com", update).await.unwrap();
    let summary = app.admin.get_preset(&app.ctx, preset.id).await.unwrap();
    assert_eq!(summary.user_count, 1);
}
