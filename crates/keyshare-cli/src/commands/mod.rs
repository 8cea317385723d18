//! CLI command definitions and dispatch.

pub mod account;
pub mod preset;
pub mod report;
pub mod session;
pub mod sweep;
pub mod user;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use keyshare_auth::password::PasswordHasher;
use keyshare_auth::seat::ReconciliationSweeper;
use keyshare_auth::session::{SessionManager, SessionRepository};
use keyshare_core::config::AppConfig;
use keyshare_core::error::AppError;
use keyshare_service::{AdminService, ReportService, RequestContext, SessionService};

use crate::output::OutputFormat;

/// KeyShare: shared account access with per-account seat limits
#[derive(Debug, Parser)]
#[command(name = "keyshare", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Configuration environment overlay (e.g. `production`)
    #[arg(short, long, env = "KEYSHARE_ENV")]
    pub env: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// User management
    User(user::UserArgs),
    /// Shared account management
    Account(account::AccountArgs),
    /// Account presets for provisioning users
    Preset(preset::PresetArgs),
    /// Session inspection and control
    Session(session::SessionArgs),
    /// Run one reconciliation pass
    Sweep(sweep::SweepArgs),
    /// Usage reports
    Report(report::ReportArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = AppConfig::load(&self.config, self.env.as_deref())?;
        let services = Services::open(&config).await?;

        match &self.command {
            Commands::User(args) => user::execute(args, &services, self.format).await,
            Commands::Account(args) => account::execute(args, &services, self.format).await,
            Commands::Preset(args) => preset::execute(args, &services, self.format).await,
            Commands::Session(args) => session::execute(args, &services, self.format).await,
            Commands::Sweep(args) => sweep::execute(args, &services, self.format).await,
            Commands::Report(args) => report::execute(args, &services, self.format).await,
        }
    }
}

/// Everything a command may need, wired against the configured store.
pub struct Services {
    /// Identity the CLI acts under.
    pub ctx: RequestContext,
    /// User and account administration.
    pub admin: AdminService,
    /// Session operations.
    pub sessions: SessionService,
    /// Reports.
    pub reports: ReportService,
    /// Reconciliation sweeper.
    pub sweeper: ReconciliationSweeper,
}

impl Services {
    /// Open the store (bootstrapping it if missing) and build the services.
    pub async fn open(config: &AppConfig) -> Result<Self, AppError> {
        let store = keyshare_service::open_store(config).await?;
        let repository = SessionRepository::from_config(&config.session);
        let hasher = PasswordHasher::new();
        let manager = Arc::new(SessionManager::new(store.clone(), repository));

        Ok(Self {
            ctx: RequestContext::system(),
            admin: AdminService::new(store.clone(), hasher.clone(), config.session.clone()),
            sessions: SessionService::new(manager, hasher),
            reports: ReportService::new(store.clone(), repository),
            sweeper: ReconciliationSweeper::from_config(store, &config.session, &config.sweeper),
        })
    }
}
