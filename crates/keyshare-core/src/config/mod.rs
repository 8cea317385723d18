//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a serde default so an empty file (or
//! no file at all) still yields a usable [`AppConfig`].

pub mod bootstrap;
pub mod logging;
pub mod session;
pub mod store;
pub mod sweeper;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::bootstrap::BootstrapConfig;
pub use self::logging::LoggingConfig;
pub use self::session::SessionConfig;
pub use self::store::StoreConfig;
pub use self::sweeper::SweeperConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged configuration
/// (base file + environment overlay + `KEYSHARE__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Snapshot store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Session admission settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Reconciliation sweeper settings.
    #[serde(default)]
    pub sweeper: SweeperConfig,
    /// Initial data seeded into a fresh store.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Sources, later ones overriding earlier ones:
    /// 1. `config_path` (optional if missing)
    /// 2. `{env}.toml` next to `config_path`, when `env` is given
    /// 3. environment variables prefixed with `KEYSHARE__`
    pub fn load(config_path: &str, env: Option<&str>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false));

        if let Some(env) = env {
            let overlay = Path::new(config_path).with_file_name(format!("{env}.toml"));
            builder = builder.add_source(config::File::from(overlay).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("KEYSHARE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject values that would make the admission engine meaningless.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.session.inactivity_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "session.inactivity_timeout_seconds must be greater than zero",
            ));
        }
        if self.session.default_max_devices == 0 {
            return Err(AppError::configuration(
                "session.default_max_devices must be at least 1",
            ));
        }
        if self.session.default_max_concurrent_users == 0 {
            return Err(AppError::configuration(
                "session.default_max_concurrent_users must be at least 1",
            ));
        }
        if self.sweeper.interval_seconds == 0 {
            return Err(AppError::configuration(
                "sweeper.interval_seconds must be greater than zero",
            ));
        }
        Ok(())
    }
}
