//! Reporting CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use keyshare_core::error::AppError;
use keyshare_core::types::AccountId;
use keyshare_entity::ActivityEntry;

use super::Services;
use crate::output::{self, OutputFormat};

/// Arguments for report commands
#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Report subcommand
    #[command(subcommand)]
    pub command: ReportCommand,
}

/// Report subcommands
#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Time spent per account by a user
    Usage {
        /// Email address
        email: String,
    },
    /// Session history of an account
    History {
        /// Account ID
        account: AccountId,
        /// Maximum rows
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Latest activity entries
    Activity {
        /// Only entries for this account
        #[arg(long)]
        account: Option<AccountId>,
        /// Maximum rows
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Occupancy of every account: live, audit, and stored
    Overview,
}

#[derive(Debug, Serialize, Tabled)]
struct UsageRow {
    account: u64,
    name: String,
    sessions: usize,
    minutes: String,
    last_access: String,
}

#[derive(Debug, Serialize, Tabled)]
struct HistoryRow {
    user: String,
    device: String,
    started: String,
    ended: String,
    minutes: String,
    reason: String,
}

#[derive(Debug, Serialize, Tabled)]
struct ActivityRow {
    time: String,
    user: String,
    account: String,
    action: String,
    domain: String,
}

impl From<&ActivityEntry> for ActivityRow {
    fn from(e: &ActivityEntry) -> Self {
        Self {
            time: output::timestamp(&e.timestamp),
            user: e.user_id.clone(),
            account: e.account_id.map(|a| a.to_string()).unwrap_or_default(),
            action: serde_json::to_value(e.action)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            domain: e.domain.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct OverviewRow {
    account: u64,
    name: String,
    limit: u32,
    live: u32,
    users: u32,
    audit: u32,
    stored: String,
}

fn minutes(seconds: f64) -> String {
    format!("{:.1}", seconds / 60.0)
}

/// Execute report commands
pub async fn execute(
    args: &ReportArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), AppError> {
    let ctx = &services.ctx;
    let reports = &services.reports;

    match &args.command {
        ReportCommand::Usage { email } => {
            let usage = reports.user_usage(ctx, email).await?;
            if format == OutputFormat::Json {
                output::print_item(&usage, format);
                return Ok(());
            }
            let rows: Vec<UsageRow> = usage
                .accounts
                .iter()
                .map(|a| UsageRow {
                    account: a.account_id.0,
                    name: a.name.clone(),
                    sessions: a.sessions,
                    minutes: minutes(a.total_seconds),
                    last_access: output::opt_timestamp(a.last_access.as_ref()),
                })
                .collect();
            output::print_list(&rows, format);
            output::print_kv("Total minutes", &minutes(usage.total_seconds));
        }
        ReportCommand::History { account, limit } => {
            let sessions = reports.account_history(ctx, *account, *limit).await?;
            let rows: Vec<HistoryRow> = sessions
                .iter()
                .map(|s| HistoryRow {
                    user: s.user_id.clone(),
                    device: s.device_id.clone(),
                    started: output::timestamp(&s.created_at),
                    ended: output::opt_timestamp(s.end_time.as_ref()),
                    minutes: s.duration_seconds.map(minutes).unwrap_or_default(),
                    reason: s.end_reason.map(|r| r.to_string()).unwrap_or_default(),
                })
                .collect();
            output::print_list(&rows, format);
        }
        ReportCommand::Activity { account, limit } => {
            let entries = reports.recent_activity(ctx, *account, *limit).await?;
            let rows: Vec<ActivityRow> = entries.iter().map(ActivityRow::from).collect();
            output::print_list(&rows, format);
        }
        ReportCommand::Overview => {
            let overview = reports.account_overview(ctx).await?;
            let rows: Vec<OverviewRow> = overview
                .iter()
                .map(|o| OverviewRow {
                    account: o.account_id.0,
                    name: o.name.clone(),
                    limit: o.max_concurrent_users,
                    live: o.live_sessions,
                    users: o.distinct_users,
                    audit: o.audit_active_users,
                    stored: o
                        .stored_counter
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            output::print_list(&rows, format);
        }
    }

    Ok(())
}
