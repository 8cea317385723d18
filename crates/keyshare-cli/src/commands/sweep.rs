//! Manual reconciliation pass.

use clap::Args;

use keyshare_core::error::AppError;

use super::Services;
use crate::output::{self, OutputFormat};

/// Arguments for the sweep command
#[derive(Debug, Args)]
pub struct SweepArgs {}

/// Run one reconciliation pass and print what it did
pub async fn execute(
    _args: &SweepArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), AppError> {
    services.ctx.require_admin()?;
    let report = services.sweeper.run_pass().await?;
    output::print_item(&report, format);
    Ok(())
}
