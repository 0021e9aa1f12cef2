//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file with environment variable
//! overrides for sensitive values (`DISBURSE_ALGOD_TOKEN`,
//! `DISBURSE_TREASURY_KEY`).
//!
//! # Example
//!
//! ```no_run
//! use disburse::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("disburse.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use url::Url;

use super::batch::{BatchConfig, ConfirmationConfig, SchedulerConfig};
use super::funding::{FundingConfig, SignerConfig, TreasuryConfig};
use super::ledger::LedgerConfig;
use super::logging::LoggingConfig;
use crate::domain::KeyHandle;
use crate::error::{ConfigError, Result};

/// Environment variable holding the algod API token.
pub const ALGOD_TOKEN_ENV: &str = "DISBURSE_ALGOD_TOKEN";

/// Environment variable holding the treasury key handle.
pub const TREASURY_KEY_ENV: &str = "DISBURSE_TREASURY_KEY";

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`]. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Ledger node connection.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Concurrency and dispatch rate limits.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Confirmation polling bounds.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Output location and batch deadline.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Amounts and token contract.
    #[serde(default)]
    pub funding: FundingConfig,

    /// Treasury account.
    #[serde(default)]
    pub treasury: TreasuryConfig,

    /// External signing helper.
    #[serde(default)]
    pub signer: SignerConfig,

    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// Loads secrets from the environment after parsing, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        // Secrets come from the environment, never from the config file
        config.ledger.api_token = std::env::var(ALGOD_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty());
        config.treasury.key = std::env::var(TREASURY_KEY_ENV)
            .ok()
            .map(KeyHandle::new)
            .filter(|key| !key.is_empty());

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is
    /// malformed, or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if self.ledger.algod_url.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "algod_url" }.into());
        }
        if let Err(e) = Url::parse(&self.ledger.algod_url) {
            return Err(ConfigError::InvalidValue {
                field: "algod_url",
                reason: e.to_string(),
            }
            .into());
        }
        if self.ledger.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.scheduler.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.confirmation.max_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_rounds",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.confirmation.round_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "round_timeout_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.batch.deadline_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "deadline_secs",
                reason: "must be greater than 0 when set".to_string(),
            }
            .into());
        }
        if self.batch.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "output_dir",
            }
            .into());
        }
        if self.signer.command.iter().any(|arg| arg.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "signer.command",
                reason: "arguments cannot be empty strings".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
