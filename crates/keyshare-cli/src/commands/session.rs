//! Session CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use keyshare_auth::session::SessionStart;
use keyshare_core::error::AppError;
use keyshare_core::types::{AccountId, SessionId};
use keyshare_entity::Session;
use keyshare_service::RequestContext;

use super::Services;
use crate::output::{self, OutputFormat};

/// Arguments for session commands
#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Session subcommand
    #[command(subcommand)]
    pub command: SessionCommand,
}

/// Session subcommands
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// List live sessions
    List {
        /// Only sessions of this user
        #[arg(long, conflicts_with = "account")]
        user: Option<String>,
        /// Only sessions on this account
        #[arg(long)]
        account: Option<AccountId>,
    },
    /// Request a session on behalf of a user
    Start {
        /// Email address
        email: String,
        /// Account ID
        account: AccountId,
        /// Device fingerprint
        #[arg(long, default_value = "cli")]
        device: String,
    },
    /// Refresh a session
    Heartbeat {
        /// Session ID
        id: SessionId,
        /// Domain currently in use
        #[arg(long)]
        domain: Option<String>,
    },
    /// End a session
    End {
        /// Session ID
        id: SessionId,
    },
    /// End every session a user holds on an account
    EndAccount {
        /// Email address
        email: String,
        /// Account ID
        account: AccountId,
    },
}

/// Session display row
#[derive(Debug, Serialize, Tabled)]
struct SessionRow {
    /// Session ID
    id: String,
    /// User
    user: String,
    /// Account
    account: u64,
    /// Device
    device: String,
    /// Domain
    domain: String,
    /// Started
    started: String,
    /// Idle seconds
    idle: i64,
}

impl From<&Session> for SessionRow {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.to_string(),
            user: s.user_id.clone(),
            account: s.account_id.0,
            device: s.device_id.clone(),
            domain: s.domain.clone().unwrap_or_default(),
            started: output::timestamp(&s.created_at),
            idle: s.idle_seconds_at(chrono::Utc::now()),
        }
    }
}

/// Execute session commands
pub async fn execute(
    args: &SessionArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), AppError> {
    let ctx = &services.ctx;
    let sessions = &services.sessions;

    match &args.command {
        SessionCommand::List { user, account } => {
            let list = match (user, account) {
                (Some(user), _) => sessions.list_user_sessions(ctx, user).await?,
                (None, Some(account)) => sessions.list_account_sessions(ctx, *account).await?,
                (None, None) => sessions.list_active_sessions(ctx).await?,
            };
            let rows: Vec<SessionRow> = list.iter().map(SessionRow::from).collect();
            output::print_list(&rows, format);
        }
        SessionCommand::Start {
            email,
            account,
            device,
        } => {
            let user = services.admin.get_user(ctx, email).await?;
            let as_user = RequestContext::for_user(&user);
            match sessions.start_session(&as_user, *account, device).await? {
                SessionStart::Started(session) => {
                    output::print_success(&format!("Session {} started", session.id));
                }
                SessionStart::Resumed(session) => {
                    output::print_success(&format!("Session {} resumed", session.id));
                }
                SessionStart::Denied(reason) => return Err(reason.into()),
            }
        }
        SessionCommand::Heartbeat { id, domain } => {
            if sessions.heartbeat(ctx, *id, domain.clone()).await? {
                output::print_success(&format!("Session {id} refreshed"));
            } else {
                output::print_warning(&format!("Session {id} is not live"));
            }
        }
        SessionCommand::End { id } => {
            sessions.end_session(ctx, *id).await?;
            output::print_success(&format!("Session {id} ended"));
        }
        SessionCommand::EndAccount { email, account } => {
            let ended = sessions.end_account_session(ctx, email, *account).await?;
            output::print_success(&format!("Ended {ended} sessions of {email} on account {account}"));
        }
    }

    Ok(())
}
