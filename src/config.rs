//! Configuration
//!
//! Settings come from CLI flags, falling back to environment variables (a
//! `.env` file is loaded first when present) and then to defaults.

use std::{path::PathBuf, sync::Arc};

use clap::Args;
use rust_decimal::Decimal;
use rusty_money::iso::{self, Currency};
use thiserror::Error;

use crate::{
    checkout::ShippingPolicy,
    storage::{FileStorage, Storage, StorageError},
};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Currency code not known to ISO 4217
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Shipping amounts must not be negative
    #[error("Shipping amounts must not be negative")]
    NegativeShipping,

    /// Storage directory could not be opened
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Storefront settings.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Directory holding persisted cart, wishlist and session snapshots
    #[arg(long, env = "ALIPHORIA_STORAGE_DIR", default_value = ".aliphoria")]
    pub storage_dir: PathBuf,

    /// Product catalog YAML file
    #[arg(long, env = "ALIPHORIA_CATALOG", default_value = "fixtures/products/catalog.yml")]
    pub catalog: PathBuf,

    /// Mock accounts YAML file
    #[arg(long, env = "ALIPHORIA_ACCOUNTS", default_value = "fixtures/accounts.yml")]
    pub accounts: PathBuf,

    /// ISO 4217 currency used to display amounts
    #[arg(long, env = "ALIPHORIA_CURRENCY", default_value = "USD")]
    pub currency: String,

    /// Subtotal at or above which shipping is free
    #[arg(long, env = "ALIPHORIA_FREE_SHIPPING_THRESHOLD", default_value = "100.00")]
    pub free_shipping_threshold: Decimal,

    /// Shipping charge below the free-shipping threshold
    #[arg(long, env = "ALIPHORIA_SHIPPING_FLAT_RATE", default_value = "5.00")]
    pub shipping_flat_rate: Decimal,

    /// Logging settings
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the configured currency code.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCurrency`] for codes `rusty-money` does not know.
    pub fn currency(&self) -> Result<&'static Currency, ConfigError> {
        iso::find(&self.currency.to_ascii_uppercase())
            .ok_or_else(|| ConfigError::UnknownCurrency(self.currency.clone()))
    }

    /// Shipping policy built from the configured amounts and currency.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an unknown currency or negative amounts.
    pub fn shipping_policy(&self) -> Result<ShippingPolicy, ConfigError> {
        if self.free_shipping_threshold.is_sign_negative()
            || self.shipping_flat_rate.is_sign_negative()
        {
            return Err(ConfigError::NegativeShipping);
        }

        Ok(ShippingPolicy {
            free_threshold: self.free_shipping_threshold,
            flat_rate: self.shipping_flat_rate,
            currency: self.currency()?,
        })
    }

    /// Open the file storage backend in the configured directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Storage`] if the directory cannot be created.
    pub fn storage(&self) -> Result<Arc<dyn Storage>, ConfigError> {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&self.storage_dir)?);

        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rust_decimal::dec;
    use testresult::TestResult;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        config: Config,
    }

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        Harness::try_parse_from(std::iter::once("aliphoria").chain(args.iter().copied()))
            .map(|harness| harness.config)
    }

    #[test]
    fn flags_override_defaults() -> TestResult {
        let config = parse(&[
            "--currency",
            "gbp",
            "--free-shipping-threshold",
            "75",
            "--shipping-flat-rate",
            "3.50",
        ])?;

        let policy = config.shipping_policy()?;

        assert_eq!(policy.free_threshold, dec!(75));
        assert_eq!(policy.flat_rate, dec!(3.50));
        assert_eq!(policy.currency, iso::GBP);

        Ok(())
    }

    #[test]
    fn rejects_unknown_currency() -> TestResult {
        let config = parse(&["--currency", "XXQ"])?;

        assert!(matches!(
            config.currency(),
            Err(ConfigError::UnknownCurrency(code)) if code == "XXQ"
        ));

        Ok(())
    }

    #[test]
    fn rejects_negative_shipping() -> TestResult {
        let config = parse(&["--shipping-flat-rate=-1"])?;

        assert!(matches!(
            config.shipping_policy(),
            Err(ConfigError::NegativeShipping)
        ));

        Ok(())
    }

    #[test]
    fn storage_creates_directory() -> TestResult {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("state");

        let target_arg = target.to_string_lossy().into_owned();

        let config = parse(&["--storage-dir", target_arg.as_str()])?;

        config.storage()?.set("settings", "{}")?;

        assert!(target.is_dir());

        Ok(())
    }
}
