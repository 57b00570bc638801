//! Application configuration.
//!
//! Values are layered: built-in defaults, then the optional TOML file under
//! the user's config directory, then `PIXELMART__SECTION__KEY` environment
//! variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pricing::{to_minor_units, Pricing};

/// Directory under `~/.config` holding the configuration file.
pub const CONFIG_DIR: &str = "pixelmart";
/// File name of the configuration file.
pub const CONFIG_FILE: &str = "config.toml";
/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "PIXELMART";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Grid dimensions.
    pub grid: GridConfig,
    /// Price schedule and currency display.
    pub pricing: PricingConfig,
    /// Merchant and collaborator settings.
    pub checkout: CheckoutConfig,
    /// Banner expiry settings.
    pub notifications: NotificationConfig,
}

/// Grid dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { rows: 12, cols: 24 }
    }
}

/// Price schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Price of tier zero in major units.
    pub base: u64,
    /// Added per tier.
    pub increment: u64,
    /// ISO currency code.
    pub currency: String,
    /// Symbol prefixed to displayed amounts.
    pub symbol: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base: 500,
            increment: 100,
            currency: "INR".to_string(),
            symbol: "₹".to_string(),
        }
    }
}

/// Merchant identity and collaborator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Name shown in the header and the checkout dialog.
    pub merchant_name: String,
    /// Header tagline.
    pub tagline: String,
    /// Public key passed to the payment collaborator.
    pub key_id: String,
    /// Latency of the simulated order service.
    pub order_latency_ms: u64,
    /// Initial state of the simulate toggle in the purchase form.
    pub simulate_by_default: bool,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            merchant_name: "Bestinindia".to_string(),
            tagline: "Showcase your company - buy pixels to place your logo.".to_string(),
            key_id: "RAZORPAY_KEY_ID".to_string(),
            order_latency_ms: 600,
            simulate_by_default: false,
        }
    }
}

impl CheckoutConfig {
    /// Latency of the simulated order service.
    pub fn order_latency(&self) -> Duration {
        Duration::from_millis(self.order_latency_ms)
    }
}

/// Banner expiry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Lifetime of ordinary banners.
    pub ttl_ms: u64,
    /// Lifetime of the payment success banner.
    pub success_ttl_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 3000,
            success_ttl_ms: 4000,
        }
    }
}

impl NotificationConfig {
    /// Lifetime of ordinary banners.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Lifetime of the payment success banner.
    pub fn success_ttl(&self) -> Duration {
        Duration::from_millis(self.success_ttl_ms)
    }
}

impl AppConfig {
    /// Load from the default location plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from an explicit file (which may be missing) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_layers(path.as_ref(), environment())
    }

    fn load_layers(path: &Path, env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("failed to parse configuration {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the storefront cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.grid.rows == 0 || self.grid.cols == 0 {
            bail!(
                "grid must have at least one row and column (got {}x{})",
                self.grid.cols,
                self.grid.rows
            );
        }
        if self.notifications.ttl_ms == 0 || self.notifications.success_ttl_ms == 0 {
            bail!("notification lifetimes must be positive");
        }
        let max_price = Pricing::from(&self.pricing).max_price();
        if max_price.and_then(to_minor_units).is_none() {
            bail!(
                "pricing base {} with increment {} overflows order amounts",
                self.pricing.base,
                self.pricing.increment
            );
        }
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__")
}

/// Default configuration file path.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Write the default configuration file if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(config_path())
}

fn write_default_config(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let serialized =
        toml::to_string_pretty(&AppConfig::default()).context("failed to serialize defaults")?;
    fs::write(path, serialized).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config.grid, GridConfig::default());
        assert_eq!(config.pricing.base, 500);
        assert_eq!(config.notifications.success_ttl(), Duration::from_millis(4000));
        Ok(())
    }

    #[test]
    fn file_overrides_selected_keys() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
[grid]
rows = 3
cols = 4

[checkout]
simulate_by_default = true
"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.grid.rows, 3);
        assert_eq!(config.grid.cols, 4);
        assert!(config.checkout.simulate_by_default);
        assert_eq!(config.checkout.merchant_name, "Bestinindia");
        assert_eq!(config.pricing.symbol, "₹");
        Ok(())
    }

    #[test]
    fn default_file_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);
        write_default_config(&path)?;
        assert!(path.exists());
        assert_eq!(AppConfig::load_from(&path)?, AppConfig::default());
        Ok(())
    }

    #[test]
    fn environment_overrides_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[grid]\nrows = 3\ncols = 4\n")?;

        let vars = HashMap::from([
            ("PIXELMART__GRID__ROWS".to_string(), "7".to_string()),
            (
                "PIXELMART__CHECKOUT__MERCHANT_NAME".to_string(),
                "Acme Bazaar".to_string(),
            ),
        ]);
        let config = AppConfig::load_layers(&path, environment().source(Some(vars)))?;
        assert_eq!(config.grid.rows, 7);
        assert_eq!(config.grid.cols, 4);
        assert_eq!(config.checkout.merchant_name, "Acme Bazaar");
        Ok(())
    }

    #[test]
    fn rejects_pricing_that_overflows_orders() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, format!("[pricing]\nbase = {}\n", u64::MAX / 50))?;
        let err = AppConfig::load_from(&path).expect_err("base too large");
        assert!(format!("{err:#}").contains("overflows"));
        Ok(())
    }

    #[test]
    fn rejects_empty_grid() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[grid]\nrows = 0\n")?;
        assert!(AppConfig::load_from(&path).is_err());
        Ok(())
    }
}
