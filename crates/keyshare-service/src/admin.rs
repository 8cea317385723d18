//! Administration: users, accounts, presets, assignments, and data cleanup.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use keyshare_auth::password::PasswordHasher;
use keyshare_auth::session::{ActivityTracker, SessionRepository};
use keyshare_core::config::SessionConfig;
use keyshare_core::error::AppError;
use keyshare_core::types::AccountId;
use keyshare_entity::{Account, Cookie, EndReason, Preset, StoreSnapshot, User, UserAccount};
use keyshare_store::StoreHandle;

use crate::context::RequestContext;

/// Request to create a user.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    /// Identity key.
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    /// Initial password.
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    /// Grant administrator rights.
    #[serde(default)]
    pub is_admin: bool,
    /// Device limit; the configured default when absent.
    #[validate(range(min = 1, message = "Device limit must be at least 1"))]
    pub max_devices: Option<u32>,
    /// Days until access ends; the configured default when absent, never when zero.
    pub expires_in_days: Option<u32>,
    /// Preset whose accounts the user starts with.
    pub preset_id: Option<u64>,
}

/// Request to update a user. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateUserRequest {
    /// New password.
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    /// New administrator flag.
    pub is_admin: Option<bool>,
    /// New device limit.
    #[validate(range(min = 1, message = "Device limit must be at least 1"))]
    pub max_devices: Option<u32>,
    /// Days from now until access ends; zero means never.
    pub expires_in_days: Option<u32>,
    /// Preset to apply; replaces the user's account assignments.
    pub preset_id: Option<u64>,
}

/// Request to create a shared account.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAccountRequest {
    /// Display name.
    #[validate(length(min = 1, message = "Account name is required"))]
    pub name: String,
    /// Grouping label.
    pub group: Option<String>,
    /// Credential bundle.
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// Concurrency limit; the configured default when absent.
    #[validate(range(min = 1, message = "Concurrency limit must be at least 1"))]
    pub max_concurrent_users: Option<u32>,
}

/// Request to update an account. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    /// New display name.
    #[validate(length(min = 1, message = "Account name cannot be empty"))]
    pub name: Option<String>,
    /// New grouping label.
    pub group: Option<String>,
    /// Replacement credential bundle.
    pub cookies: Option<Vec<Cookie>>,
    /// New concurrency limit. Sessions already above it keep running.
    #[validate(range(min = 1, message = "Concurrency limit must be at least 1"))]
    pub max_concurrent_users: Option<u32>,
}

/// Request to create a preset.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePresetRequest {
    /// Display name.
    #[validate(length(min = 1, message = "Preset name is required"))]
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Accounts the preset grants.
    #[serde(default)]
    pub account_ids: Vec<AccountId>,
}

/// Request to update a preset. Users it was already applied to keep
/// their current assignments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePresetRequest {
    /// New display name.
    #[validate(length(min = 1, message = "Preset name cannot be empty"))]
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement account list.
    pub account_ids: Option<Vec<AccountId>>,
}

/// A preset with the number of users provisioned from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetSummary {
    /// The preset.
    #[serde(flatten)]
    pub preset: Preset,
    /// Users whose `preset_id` points at it.
    pub user_count: usize,
}

/// What a domain cleanup removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCleanup {
    /// Activity entries deleted.
    pub entries_removed: usize,
    /// Active sessions ended.
    pub sessions_ended: usize,
}

/// Administrative operations on the snapshot.
///
/// Each operation is one store mutation. User keys are normalized on the
/// way in, so callers may pass them in any case.
#[derive(Debug, Clone)]
pub struct AdminService {
    store: StoreHandle,
    hasher: PasswordHasher,
    config: SessionConfig,
    sessions: SessionRepository,
    tracker: ActivityTracker,
}

impl AdminService {
    /// Create a new admin service.
    pub fn new(store: StoreHandle, hasher: PasswordHasher, config: SessionConfig) -> Self {
        let sessions = SessionRepository::from_config(&config);
        Self {
            store,
            hasher,
            config,
            sessions,
            tracker: ActivityTracker::new(sessions),
        }
    }

    // ── Users ──────────────────────────────────────────────────────────

    /// All users.
    pub async fn list_users(&self, ctx: &RequestContext) -> Result<Vec<User>, AppError> {
        ctx.require_admin()?;
        Ok(self.store.read().await?.users)
    }

    /// A single user.
    pub async fn get_user(&self, ctx: &RequestContext, email: &str) -> Result<User, AppError> {
        let email = User::normalize_email(email);
        ctx.require_self_or_admin(&email)?;
        self.store
            .read()
            .await?
            .user(&email)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("User '{email}' not found")))
    }

    /// Create a user, assigning the accounts of its preset if one is given.
    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        mut req: CreateUserRequest,
    ) -> Result<User, AppError> {
        ctx.require_admin()?;

        req.email = User::normalize_email(&req.email);
        validate_request(&req)?;

        let now = Utc::now();
        let days = req
            .expires_in_days
            .unwrap_or(self.config.default_user_expiration_days);

        // Hash before taking the write lock.
        let password_hash = self.hasher.hash(&req.password)?;

        let user = User {
            email: req.email.clone(),
            password_hash,
            is_admin: req.is_admin,
            created_at: now,
            expires_at: expiry_after(now, days),
            max_devices: req.max_devices.unwrap_or(self.config.default_max_devices),
            active_sessions: 0,
            preset_id: None,
        };

        let created = self
            .store
            .mutate(move |snapshot| {
                if snapshot.user(&user.email).is_some() {
                    return Err(AppError::conflict(format!("User '{}' already exists", user.email)));
                }
                let email = user.email.clone();
                snapshot.users.push(user);
                if let Some(preset_id) = req.preset_id {
                    apply_preset_to(snapshot, &email, preset_id)?;
                }
                snapshot
                    .user(&email)
                    .cloned()
                    .ok_or_else(|| AppError::internal("Created user vanished"))
            })
            .await?;

        info!(
            admin_id = %ctx.user_id,
            user_id = %created.email,
            preset_id = ?created.preset_id,
            "User created"
        );
        Ok(created)
    }

    /// Update a user. Setting a preset replaces their account assignments.
    pub async fn update_user(
        &self,
        ctx: &RequestContext,
        email: &str,
        req: UpdateUserRequest,
    ) -> Result<User, AppError> {
        ctx.require_admin()?;
        validate_request(&req)?;

        let email = User::normalize_email(email);
        let password_hash = req
            .password
            .as_deref()
            .map(|p| self.hasher.hash(p))
            .transpose()?;
        let now = Utc::now();

        let updated = self
            .store
            .mutate(|snapshot| {
                let user = snapshot
                    .user_mut(&email)
                    .ok_or_else(|| AppError::not_found(format!("User '{email}' not found")))?;

                if let Some(hash) = password_hash {
                    user.password_hash = hash;
                }
                if let Some(is_admin) = req.is_admin {
                    user.is_admin = is_admin;
                }
                if let Some(max) = req.max_devices {
                    user.max_devices = max;
                }
                if let Some(days) = req.expires_in_days {
                    user.expires_at = expiry_after(now, days);
                }
                if let Some(preset_id) = req.preset_id {
                    apply_preset_to(snapshot, &email, preset_id)?;
                }
                snapshot
                    .user(&email)
                    .cloned()
                    .ok_or_else(|| AppError::internal("Updated user vanished"))
            })
            .await?;

        info!(admin_id = %ctx.user_id, user_id = %email, "User updated");
        Ok(updated)
    }

    /// Delete a user and their account assignments.
    ///
    /// Their sessions are left for the sweeper, which ends them as
    /// belonging to a deleted user.
    pub async fn delete_user(&self, ctx: &RequestContext, email: &str) -> Result<(), AppError> {
        ctx.require_admin()?;
        let email = User::normalize_email(email);
        if ctx.user_id == email {
            return Err(AppError::validation("Cannot delete your own user"));
        }

        self.store
            .mutate(|snapshot| {
                let before = snapshot.users.len();
                snapshot.users.retain(|u| u.email != email);
                if snapshot.users.len() == before {
                    return Err(AppError::not_found(format!("User '{email}' not found")));
                }
                snapshot.user_accounts.retain(|ua| ua.user_id != email);
                Ok(())
            })
            .await?;

        info!(admin_id = %ctx.user_id, user_id = %email, "User deleted");
        Ok(())
    }

    // ── Accounts ───────────────────────────────────────────────────────

    /// All accounts.
    pub async fn list_accounts(&self, ctx: &RequestContext) -> Result<Vec<Account>, AppError> {
        ctx.require_admin()?;
        Ok(self.store.read().await?.accounts)
    }

    /// A single account.
    pub async fn get_account(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
    ) -> Result<Account, AppError> {
        ctx.require_admin()?;
        self.store
            .read()
            .await?
            .account(account_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Account {account_id} not found")))
    }

    /// Create an account with the next free id.
    pub async fn create_account(
        &self,
        ctx: &RequestContext,
        mut req: CreateAccountRequest,
    ) -> Result<Account, AppError> {
        ctx.require_admin()?;

        req.name = req.name.trim().to_string();
        validate_request(&req)?;
        let max_concurrent_users = req
            .max_concurrent_users
            .unwrap_or(self.config.default_max_concurrent_users);

        let account = self
            .store
            .mutate(|snapshot| {
                let account = Account {
                    id: snapshot.next_account_id(),
                    name: req.name,
                    group: req.group,
                    cookies: req.cookies,
                    max_concurrent_users,
                    active_sessions: Some(0),
                };
                snapshot.accounts.push(account.clone());
                Ok(account)
            })
            .await?;

        info!(admin_id = %ctx.user_id, account_id = %account.id, name = %account.name, "Account created");
        Ok(account)
    }

    /// Update an account.
    pub async fn update_account(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        mut req: UpdateAccountRequest,
    ) -> Result<Account, AppError> {
        ctx.require_admin()?;

        req.name = req.name.map(|n| n.trim().to_string());
        validate_request(&req)?;

        let updated = self
            .store
            .mutate(|snapshot| {
                let account = snapshot
                    .account_mut(account_id)
                    .ok_or_else(|| AppError::not_found(format!("Account {account_id} not found")))?;

                if let Some(name) = req.name {
                    account.name = name;
                }
                if let Some(group) = req.group {
                    account.group = Some(group);
                }
                if let Some(cookies) = req.cookies {
                    account.cookies = cookies;
                }
                if let Some(max) = req.max_concurrent_users {
                    account.max_concurrent_users = max;
                }
                Ok(account.clone())
            })
            .await?;

        info!(admin_id = %ctx.user_id, account_id = %account_id, "Account updated");
        Ok(updated)
    }

    /// Delete an account with its assignments, sessions, and activity.
    /// Presets stop granting it.
    ///
    /// Returns the number of sessions removed that were still active.
    pub async fn delete_account(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
    ) -> Result<usize, AppError> {
        ctx.require_admin()?;

        let active_removed = self
            .store
            .mutate(|snapshot| {
                let before = snapshot.accounts.len();
                snapshot.accounts.retain(|a| a.id != account_id);
                if snapshot.accounts.len() == before {
                    return Err(AppError::not_found(format!("Account {account_id} not found")));
                }

                let active = snapshot
                    .sessions
                    .iter()
                    .filter(|s| s.account_id == account_id && s.active)
                    .count();
                snapshot.user_accounts.retain(|ua| ua.account_id != account_id);
                snapshot.sessions.retain(|s| s.account_id != account_id);
                snapshot.analytics.retain(|e| e.account_id != Some(account_id));
                for preset in snapshot.presets.iter_mut().filter(|p| p.includes(account_id)) {
                    preset.account_ids.retain(|id| *id != account_id);
                }
                Ok(active)
            })
            .await?;

        info!(
            admin_id = %ctx.user_id,
            account_id = %account_id,
            active_sessions_removed = active_removed,
            "Account deleted"
        );
        Ok(active_removed)
    }

    // ── Presets ────────────────────────────────────────────────────────

    /// All presets with their user counts.
    pub async fn list_presets(&self, ctx: &RequestContext) -> Result<Vec<PresetSummary>, AppError> {
        ctx.require_admin()?;
        let snapshot = self.store.read().await?;
        Ok(snapshot
            .presets
            .iter()
            .map(|preset| PresetSummary {
                user_count: snapshot.users_with_preset(preset.id),
                preset: preset.clone(),
            })
            .collect())
    }

    /// A single preset with its user count.
    pub async fn get_preset(
        &self,
        ctx: &RequestContext,
        preset_id: u64,
    ) -> Result<PresetSummary, AppError> {
        ctx.require_admin()?;
        let snapshot = self.store.read().await?;
        let preset = snapshot
            .preset(preset_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Preset {preset_id} not found")))?;
        Ok(PresetSummary {
            user_count: snapshot.users_with_preset(preset_id),
            preset,
        })
    }

    /// Create a preset with the next free id.
    pub async fn create_preset(
        &self,
        ctx: &RequestContext,
        mut req: CreatePresetRequest,
    ) -> Result<Preset, AppError> {
        ctx.require_admin()?;

        req.name = req.name.trim().to_string();
        validate_request(&req)?;

        let preset = self
            .store
            .mutate(|snapshot| {
                let preset = Preset {
                    id: snapshot.next_preset_id(),
                    name: req.name,
                    description: req.description,
                    account_ids: known_accounts(snapshot, req.account_ids)?,
                    created_at: Utc::now(),
                };
                snapshot.presets.push(preset.clone());
                Ok(preset)
            })
            .await?;

        info!(admin_id = %ctx.user_id, preset_id = preset.id, name = %preset.name, "Preset created");
        Ok(preset)
    }

    /// Update a preset.
    pub async fn update_preset(
        &self,
        ctx: &RequestContext,
        preset_id: u64,
        mut req: UpdatePresetRequest,
    ) -> Result<Preset, AppError> {
        ctx.require_admin()?;

        req.name = req.name.map(|n| n.trim().to_string());
        validate_request(&req)?;

        let updated = self
            .store
            .mutate(|snapshot| {
                let account_ids = req
                    .account_ids
                    .map(|ids| known_accounts(snapshot, ids))
                    .transpose()?;
                let preset = snapshot
                    .preset_mut(preset_id)
                    .ok_or_else(|| AppError::not_found(format!("Preset {preset_id} not found")))?;

                if let Some(name) = req.name {
                    preset.name = name;
                }
                if let Some(description) = req.description {
                    preset.description = Some(description);
                }
                if let Some(ids) = account_ids {
                    preset.account_ids = ids;
                }
                Ok(preset.clone())
            })
            .await?;

        info!(admin_id = %ctx.user_id, preset_id, "Preset updated");
        Ok(updated)
    }

    /// Delete a preset. Users provisioned from it keep their accounts.
    pub async fn delete_preset(&self, ctx: &RequestContext, preset_id: u64) -> Result<(), AppError> {
        ctx.require_admin()?;

        self.store
            .mutate(|snapshot| {
                let before = snapshot.presets.len();
                snapshot.presets.retain(|p| p.id != preset_id);
                if snapshot.presets.len() == before {
                    return Err(AppError::not_found(format!("Preset {preset_id} not found")));
                }
                for user in snapshot
                    .users
                    .iter_mut()
                    .filter(|u| u.preset_id == Some(preset_id))
                {
                    user.preset_id = None;
                }
                Ok(())
            })
            .await?;

        info!(admin_id = %ctx.user_id, preset_id, "Preset deleted");
        Ok(())
    }

    /// Replace a user's account assignments with a preset's accounts.
    ///
    /// Returns the number of accounts the user now has. Running sessions
    /// on accounts the user loses are not ended.
    pub async fn apply_preset(
        &self,
        ctx: &RequestContext,
        email: &str,
        preset_id: u64,
    ) -> Result<usize, AppError> {
        ctx.require_admin()?;
        let email = User::normalize_email(email);

        let assigned = self
            .store
            .mutate(|snapshot| {
                if snapshot.user(&email).is_none() {
                    return Err(AppError::not_found(format!("User '{email}' not found")));
                }
                apply_preset_to(snapshot, &email, preset_id)
            })
            .await?;

        info!(admin_id = %ctx.user_id, user_id = %email, preset_id, assigned, "Preset applied");
        Ok(assigned)
    }

    // ── Assignments ────────────────────────────────────────────────────

    /// Allow a user to use an account. Returns `false` if already assigned.
    pub async fn assign_account(
        &self,
        ctx: &RequestContext,
        email: &str,
        account_id: AccountId,
    ) -> Result<bool, AppError> {
        ctx.require_admin()?;
        let email = User::normalize_email(email);

        let added = self
            .store
            .mutate(|snapshot| {
                if snapshot.user(&email).is_none() {
                    return Err(AppError::not_found(format!("User '{email}' not found")));
                }
                if snapshot.account(account_id).is_none() {
                    return Err(AppError::not_found(format!("Account {account_id} not found")));
                }
                if snapshot.association_exists(&email, account_id) {
                    return Ok(false);
                }
                snapshot.user_accounts.push(UserAccount::new(email.as_str(), account_id));
                Ok(true)
            })
            .await?;

        if added {
            info!(admin_id = %ctx.user_id, user_id = %email, account_id = %account_id, "Account assigned");
        }
        Ok(added)
    }

    /// Revoke a user's access to an account. Returns `false` if it was not
    /// assigned. Sessions already running are not ended.
    pub async fn unassign_account(
        &self,
        ctx: &RequestContext,
        email: &str,
        account_id: AccountId,
    ) -> Result<bool, AppError> {
        ctx.require_admin()?;
        let email = User::normalize_email(email);

        let removed = self
            .store
            .mutate(|snapshot| {
                let before = snapshot.user_accounts.len();
                snapshot
                    .user_accounts
                    .retain(|ua| !(ua.user_id == email && ua.account_id == account_id));
                Ok(snapshot.user_accounts.len() < before)
            })
            .await?;

        if removed {
            info!(admin_id = %ctx.user_id, user_id = %email, account_id = %account_id, "Account unassigned");
        }
        Ok(removed)
    }

    /// Accounts a user may use.
    pub async fn list_user_accounts(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<Vec<Account>, AppError> {
        let email = User::normalize_email(email);
        ctx.require_self_or_admin(&email)?;
        let snapshot = self.store.read().await?;
        if snapshot.user(&email).is_none() {
            return Err(AppError::not_found(format!("User '{email}' not found")));
        }
        Ok(snapshot
            .account_ids_for(&email)
            .into_iter()
            .filter_map(|id| snapshot.account(id).cloned())
            .collect())
    }

    // ── Cleanup ────────────────────────────────────────────────────────

    /// Forget a user's activity on a domain and end their sessions there.
    pub async fn cleanup_domain(
        &self,
        ctx: &RequestContext,
        email: &str,
        domain: &str,
    ) -> Result<DomainCleanup, AppError> {
        let email = User::normalize_email(email);
        ctx.require_self_or_admin(&email)?;

        let cleanup = self
            .store
            .mutate(|snapshot| {
                let now = Utc::now();
                let before = snapshot.analytics.len();
                snapshot
                    .analytics
                    .retain(|e| !(e.user_id == email && e.domain.as_deref() == Some(domain)));
                let entries_removed = before - snapshot.analytics.len();

                let mut ended = Vec::new();
                for session in snapshot
                    .sessions
                    .iter_mut()
                    .filter(|s| s.user_id == email && s.domain.as_deref() == Some(domain))
                {
                    if session.end_at(now, EndReason::DomainCleanup) {
                        ended.push(session.clone());
                    }
                }
                for session in &ended {
                    self.tracker.record_session_end(snapshot, session);
                }

                Ok(DomainCleanup {
                    entries_removed,
                    sessions_ended: ended.len(),
                })
            })
            .await?;

        info!(
            user_id = %email,
            domain = %domain,
            entries_removed = cleanup.entries_removed,
            sessions_ended = cleanup.sessions_ended,
            "Domain activity cleaned up"
        );
        Ok(cleanup)
    }

    /// The freshness rule used by this service.
    pub fn repository(&self) -> &SessionRepository {
        &self.sessions
    }
}

fn validate_request<T: Validate>(req: &T) -> Result<(), AppError> {
    req.validate()
        .map_err(|e| AppError::validation(format!("Invalid request: {e}")))
}

/// Deduplicate `ids`, rejecting any account that does not exist.
fn known_accounts(
    snapshot: &StoreSnapshot,
    ids: Vec<AccountId>,
) -> Result<Vec<AccountId>, AppError> {
    let ids: BTreeSet<AccountId> = ids.into_iter().collect();
    if let Some(missing) = ids.iter().find(|id| snapshot.account(**id).is_none()) {
        return Err(AppError::not_found(format!("Account {missing} not found")));
    }
    Ok(ids.into_iter().collect())
}

/// Point `email` at a preset and replace their assignments with its
/// accounts. Returns how many accounts were assigned.
fn apply_preset_to(
    snapshot: &mut StoreSnapshot,
    email: &str,
    preset_id: u64,
) -> Result<usize, AppError> {
    let account_ids: Vec<AccountId> = snapshot
        .preset(preset_id)
        .ok_or_else(|| AppError::not_found(format!("Preset {preset_id} not found")))?
        .account_ids
        .iter()
        .copied()
        .filter(|id| snapshot.account(*id).is_some())
        .collect();

    snapshot.user_accounts.retain(|ua| ua.user_id != email);
    snapshot
        .user_accounts
        .extend(account_ids.iter().map(|id| UserAccount::new(email, *id)));
    if let Some(user) = snapshot.user_mut(email) {
        user.preset_id = Some(preset_id);
    }
    Ok(account_ids.len())
}

/// `None` for zero days, otherwise `now + days`.
fn expiry_after(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    (days > 0).then(|| now + Duration::days(i64::from(days)))
}
