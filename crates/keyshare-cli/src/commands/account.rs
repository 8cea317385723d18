//! Shared account CLI commands.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use keyshare_core::error::AppError;
use keyshare_core::types::AccountId;
use keyshare_entity::{Account, Cookie};
use keyshare_service::{CreateAccountRequest, UpdateAccountRequest};

use super::Services;
use super::user::confirm;
use crate::output::{self, OutputFormat};

/// Arguments for account commands
#[derive(Debug, Args)]
pub struct AccountArgs {
    /// Account subcommand
    #[command(subcommand)]
    pub command: AccountCommand,
}

/// Account subcommands
#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    /// List all accounts
    List,
    /// Create an account
    Create {
        /// Display name
        name: String,
        /// Grouping label
        #[arg(long)]
        group: Option<String>,
        /// Maximum concurrent sessions
        #[arg(long)]
        max_users: Option<u32>,
        /// JSON file holding the cookie bundle
        #[arg(long)]
        cookies: Option<PathBuf>,
    },
    /// Update an account
    Update {
        /// Account ID
        id: AccountId,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Grouping label
        #[arg(long)]
        group: Option<String>,
        /// Maximum concurrent sessions
        #[arg(long)]
        max_users: Option<u32>,
        /// JSON file holding a replacement cookie bundle
        #[arg(long)]
        cookies: Option<PathBuf>,
    },
    /// Delete an account with its assignments, sessions, and activity
    Delete {
        /// Account ID
        id: AccountId,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
    /// Allow a user to use an account
    Assign {
        /// Email address
        email: String,
        /// Account ID
        id: AccountId,
    },
    /// Revoke a user's access to an account
    Unassign {
        /// Email address
        email: String,
        /// Account ID
        id: AccountId,
    },
    /// Show live occupancy of an account
    Occupancy {
        /// Account ID
        id: AccountId,
    },
}

/// Account display row for table output
#[derive(Debug, Serialize, Tabled)]
pub struct AccountRow {
    /// Account ID
    id: u64,
    /// Name
    name: String,
    /// Group
    group: String,
    /// Max concurrent users
    max_users: u32,
    /// Active sessions at last sweep
    active: String,
    /// Number of cookies
    cookies: usize,
}

impl From<&Account> for AccountRow {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id.0,
            name: a.name.clone(),
            group: a.group.clone().unwrap_or_default(),
            max_users: a.max_concurrent_users,
            active: a
                .active_sessions
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            cookies: a.cookies.len(),
        }
    }
}

/// Execute account commands
pub async fn execute(
    args: &AccountArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), AppError> {
    let ctx = &services.ctx;
    let admin = &services.admin;

    match &args.command {
        AccountCommand::List => {
            let accounts = admin.list_accounts(ctx).await?;
            let rows: Vec<AccountRow> = accounts.iter().map(AccountRow::from).collect();
            output::print_list(&rows, format);
        }
        AccountCommand::Create {
            name,
            group,
            max_users,
            cookies,
        } => {
            let cookies = match cookies {
                Some(path) => read_cookies(path).await?,
                None => Vec::new(),
            };
            let account = admin
                .create_account(
                    ctx,
                    CreateAccountRequest {
                        name: name.clone(),
                        group: group.clone(),
                        cookies,
                        max_concurrent_users: *max_users,
                    },
                )
                .await?;
            output::print_success(&format!("Account {} created with id {}", account.name, account.id));
        }
        AccountCommand::Update {
            id,
            name,
            group,
            max_users,
            cookies,
        } => {
            let cookies = match cookies {
                Some(path) => Some(read_cookies(path).await?),
                None => None,
            };
            let account = admin
                .update_account(
                    ctx,
                    *id,
                    UpdateAccountRequest {
                        name: name.clone(),
                        group: group.clone(),
                        cookies,
                        max_concurrent_users: *max_users,
                    },
                )
                .await?;
            output::print_item(&AccountRow::from(&account), format);
        }
        AccountCommand::Delete { id, force } => {
            let account = admin.get_account(ctx, *id).await?;
            if !*force
                && !confirm(&format!(
                    "Delete account {} ({}) and all of its sessions and history?",
                    account.id, account.name
                ))?
            {
                println!("Cancelled.");
                return Ok(());
            }
            let active = admin.delete_account(ctx, *id).await?;
            if active > 0 {
                output::print_warning(&format!("{active} active sessions were removed"));
            }
            output::print_success(&format!("Account {id} deleted"));
        }
        AccountCommand::Assign { email, id } => {
            if admin.assign_account(ctx, email, *id).await? {
                output::print_success(&format!("Assigned account {id} to {email}"));
            } else {
                output::print_warning(&format!("{email} already has account {id}"));
            }
        }
        AccountCommand::Unassign { email, id } => {
            if admin.unassign_account(ctx, email, *id).await? {
                output::print_success(&format!("Unassigned account {id} from {email}"));
            } else {
                output::print_warning(&format!("{email} did not have account {id}"));
            }
        }
        AccountCommand::Occupancy { id } => {
            let occupancy = services.sessions.get_occupancy(ctx, *id).await?;
            output::print_item(&occupancy, format);
        }
    }

    Ok(())
}

async fn read_cookies(path: &Path) -> Result<Vec<Cookie>, AppError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        AppError::validation(format!("Cannot read cookie file '{}': {e}", path.display()))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::validation(format!("Cookie file '{}' is not valid: {e}", path.display()))
    })
}
