//! User management CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use keyshare_core::error::AppError;
use keyshare_entity::User;
use keyshare_service::{CreateUserRequest, UpdateUserRequest};

use super::Services;
use crate::commands::account::AccountRow;
use crate::output::{self, OutputFormat};

/// Arguments for user commands
#[derive(Debug, Args)]
pub struct UserArgs {
    /// User subcommand
    #[command(subcommand)]
    pub command: UserCommand,
}

/// User subcommands
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// List all users
    List,
    /// Show one user
    Show {
        /// Email address
        email: String,
    },
    /// Create a user
    Create {
        /// Email address
        email: String,
        /// Initial password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Grant administrator rights
        #[arg(long)]
        admin: bool,
        /// Maximum devices with live sessions
        #[arg(long)]
        max_devices: Option<u32>,
        /// Days until access ends (0 = never)
        #[arg(long)]
        expires_in_days: Option<u32>,
        /// Preset whose accounts replace the assignments
        #[arg(long)]
        preset: Option<u64>,
    },
    /// Update a user
    Update {
        /// Email address
        email: String,
        /// Prompt for a new password
        #[arg(long)]
        reset_password: bool,
        /// Set administrator rights
        #[arg(long)]
        admin: Option<bool>,
        /// Maximum devices with live sessions
        #[arg(long)]
        max_devices: Option<u32>,
        /// Days from now until access ends (0 = never)
        #[arg(long)]
        expires_in_days: Option<u32>,
        /// Preset whose accounts replace the assignments
        #[arg(long)]
        preset: Option<u64>,
    },
    /// Delete a user
    Delete {
        /// Email address
        email: String,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
    /// List the accounts a user may use
    Accounts {
        /// Email address
        email: String,
    },
    /// Forget a user's activity on a domain and end their sessions there
    CleanupDomain {
        /// Email address
        email: String,
        /// Domain to clean up
        domain: String,
    },
}

/// User display row for table output
#[derive(Debug, Serialize, Tabled)]
struct UserRow {
    /// Email
    email: String,
    /// Admin
    admin: String,
    /// Max devices
    max_devices: u32,
    /// Active sessions at last sweep
    active: u32,
    /// Expires at
    expires: String,
    /// Created at
    created_at: String,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        Self {
            email: u.email.clone(),
            admin: if u.is_admin { "✓" } else { "" }.to_string(),
            max_devices: u.max_devices,
            active: u.active_sessions,
            expires: u
                .expires_at
                .as_ref()
                .map(output::timestamp)
                .unwrap_or_else(|| "never".to_string()),
            created_at: output::timestamp(&u.created_at),
        }
    }
}

/// Execute user commands
pub async fn execute(
    args: &UserArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), AppError> {
    let ctx = &services.ctx;
    let admin = &services.admin;

    match &args.command {
        UserCommand::List => {
            let users = admin.list_users(ctx).await?;
            let rows: Vec<UserRow> = users.iter().map(UserRow::from).collect();
            output::print_list(&rows, format);
        }
        UserCommand::Show { email } => {
            let user = admin.get_user(ctx, email).await?;
            output::print_item(&UserRow::from(&user), format);
        }
        UserCommand::Create {
            email,
            password,
            admin: is_admin,
            max_devices,
            expires_in_days,
            preset,
        } => {
            let password = match password {
                Some(p) => p.clone(),
                None => prompt_password()?,
            };
            let user = admin
                .create_user(
                    ctx,
                    CreateUserRequest {
                        email: email.clone(),
                        password,
                        is_admin: *is_admin,
                        max_devices: *max_devices,
                        expires_in_days: *expires_in_days,
                        preset_id: *preset,
                    },
                )
                .await?;
            output::print_success(&format!("User {} created", user.email));
        }
        UserCommand::Update {
            email,
            reset_password,
            admin: is_admin,
            max_devices,
            expires_in_days,
            preset,
        } => {
            let password = if *reset_password {
                Some(prompt_password()?)
            } else {
                None
            };
            let user = admin
                .update_user(
                    ctx,
                    email,
                    UpdateUserRequest {
                        password,
                        is_admin: *is_admin,
                        max_devices: *max_devices,
                        expires_in_days: *expires_in_days,
                        preset_id: *preset,
                    },
                )
                .await?;
            output::print_item(&UserRow::from(&user), format);
        }
        UserCommand::Delete { email, force } => {
            if !*force && !confirm(&format!("Delete user {email}?"))? {
                println!("Cancelled.");
                return Ok(());
            }
            admin.delete_user(ctx, email).await?;
            output::print_success(&format!("User {email} deleted"));
        }
        UserCommand::Accounts { email } => {
            let accounts = admin.list_user_accounts(ctx, email).await?;
            let rows: Vec<AccountRow> = accounts.iter().map(AccountRow::from).collect();
            output::print_list(&rows, format);
        }
        UserCommand::CleanupDomain { email, domain } => {
            let cleanup = admin.cleanup_domain(ctx, email, domain).await?;
            output::print_success(&format!(
                "Removed {} activity entries, ended {} sessions",
                cleanup.entries_removed, cleanup.sessions_ended
            ));
        }
    }

    Ok(())
}

fn prompt_password() -> Result<String, AppError> {
    dialoguer::Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))
}

/// Ask for a yes/no confirmation, defaulting to no.
pub fn confirm(prompt: &str) -> Result<bool, AppError> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))
}
