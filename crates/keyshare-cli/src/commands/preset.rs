//! Preset CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use keyshare_core::error::AppError;
use keyshare_core::types::AccountId;
use keyshare_service::{CreatePresetRequest, PresetSummary, UpdatePresetRequest};

use super::Services;
use super::user::confirm;
use crate::output::{self, OutputFormat};

/// Arguments for preset commands
#[derive(Debug, Args)]
pub struct PresetArgs {
    /// Preset subcommand
    #[command(subcommand)]
    pub command: PresetCommand,
}

/// Preset subcommands
#[derive(Debug, Subcommand)]
pub enum PresetCommand {
    /// List all presets
    List,
    /// Show one preset
    Show {
        /// Preset ID
        id: u64,
    },
    /// Create a preset
    Create {
        /// Display name
        name: String,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Account granted by the preset (repeatable)
        #[arg(long = "account")]
        accounts: Vec<AccountId>,
    },
    /// Update a preset; users it was applied to are not changed
    Update {
        /// Preset ID
        id: u64,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Replacement account list (repeatable)
        #[arg(long = "account")]
        accounts: Option<Vec<AccountId>>,
    },
    /// Delete a preset; users keep their accounts
    Delete {
        /// Preset ID
        id: u64,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
    /// Replace a user's accounts with a preset's
    Apply {
        /// Email address
        email: String,
        /// Preset ID
        id: u64,
    },
}

/// Preset display row for table output
#[derive(Debug, Serialize, Tabled)]
struct PresetRow {
    /// Preset ID
    id: u64,
    /// Name
    name: String,
    /// Accounts granted
    accounts: String,
    /// Users provisioned from it
    users: usize,
    /// Creation time
    created_at: String,
}

impl From<&PresetSummary> for PresetRow {
    fn from(p: &PresetSummary) -> Self {
        Self {
            id: p.preset.id,
            name: p.preset.name.clone(),
            accounts: p
                .preset
                .account_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            users: p.user_count,
            created_at: output::timestamp(&p.preset.created_at),
        }
    }
}

/// Execute preset commands
pub async fn execute(
    args: &PresetArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), AppError> {
    let ctx = &services.ctx;
    let admin = &services.admin;

    match &args.command {
        PresetCommand::List => {
            let presets = admin.list_presets(ctx).await?;
            let rows: Vec<PresetRow> = presets.iter().map(PresetRow::from).collect();
            output::print_list(&rows, format);
        }
        PresetCommand::Show { id } => {
            let preset = admin.get_preset(ctx, *id).await?;
            match format {
                OutputFormat::Json => output::print_item(&preset, format),
                OutputFormat::Table => {
                    let row = PresetRow::from(&preset);
                    output::print_kv("ID", &row.id.to_string());
                    output::print_kv("Name", &row.name);
                    output::print_kv(
                        "Description",
                        preset.preset.description.as_deref().unwrap_or("-"),
                    );
                    output::print_kv("Accounts", &row.accounts);
                    output::print_kv("Users", &row.users.to_string());
                    output::print_kv("Created", &row.created_at);
                }
            }
        }
        PresetCommand::Create {
            name,
            description,
            accounts,
        } => {
            let preset = admin
                .create_preset(
                    ctx,
                    CreatePresetRequest {
                        name: name.clone(),
                        description: description.clone(),
                        account_ids: accounts.clone(),
                    },
                )
                .await?;
            output::print_success(&format!("Preset {} created with id {}", preset.name, preset.id));
        }
        PresetCommand::Update {
            id,
            name,
            description,
            accounts,
        } => {
            let preset = admin
                .update_preset(
                    ctx,
                    *id,
                    UpdatePresetRequest {
                        name: name.clone(),
                        description: description.clone(),
                        account_ids: accounts.clone(),
                    },
                )
                .await?;
            output::print_success(&format!("Preset {} updated", preset.id));
        }
        PresetCommand::Delete { id, force } => {
            let preset = admin.get_preset(ctx, *id).await?;
            if !*force
                && !confirm(&format!(
                    "Delete preset {} ({}) used by {} users?",
                    preset.preset.id, preset.preset.name, preset.user_count
                ))?
            {
                println!("Cancelled.");
                return Ok(());
            }
            admin.delete_preset(ctx, *id).await?;
            output::print_success(&format!("Preset {id} deleted"));
        }
        PresetCommand::Apply { email, id } => {
            let assigned = admin.apply_preset(ctx, email, *id).await?;
            output::print_success(&format!("Applied preset {id} to {email}: {assigned} accounts"));
        }
    }

    Ok(())
}
