use std::fmt;
use std::path::Path;

use config::{Config, Environment, File};
pub use config::ConfigError;
use serde::Deserialize;

use crate::grid::{GridConfig, GridError, GridResult};
use crate::market::PaperTradingInput;
use crate::phemex::PhemexConfig;

/// Environment variable holding the Phemex API key
pub const API_KEY_VAR: &str = "PHEMEX_API_KEY";
/// Environment variable holding the Phemex API secret
pub const API_SECRET_VAR: &str = "PHEMEX_API_SECRET";

/// Main configuration struct
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Network configuration (testnet, mode, HTTP limits)
    #[serde(default)]
    pub network: NetworkConfig,
    /// Grid parameters
    #[serde(default)]
    pub grid: GridConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Simulated balances for paper mode
    #[serde(default)]
    pub paper: PaperTradingInput,
}

/// Where orders go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    #[default]
    Live,
    Paper,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    /// Use the Phemex testnet
    #[serde(default)]
    pub testnet: bool,
    /// Mode: "live" or "paper"
    #[serde(default)]
    pub mode: TradingMode,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Signature validity window in seconds
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: i64,
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
    /// Overrides the mainnet/testnet REST URL
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            testnet: false,
            mode: TradingMode::default(),
            timeout_secs: default_timeout_secs(),
            expiry_secs: default_expiry_secs(),
            min_request_interval_ms: default_min_request_interval_ms(),
            base_url: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_expiry_secs() -> i64 {
    60
}

fn default_min_request_interval_ms() -> u64 {
    100
}

impl NetworkConfig {
    /// Client settings for this network, signed when credentials are given
    pub fn phemex_config(&self, credentials: Option<Credentials>) -> PhemexConfig {
        let mut config = match credentials {
            Some(c) => PhemexConfig::new(c.api_key, c.api_secret),
            None => PhemexConfig::public(),
        }
        .with_testnet(self.testnet)
        .with_timeout_secs(self.timeout_secs)
        .with_expiry_secs(self.expiry_secs)
        .with_min_request_interval_ms(self.min_request_interval_ms);

        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.clone());
        }
        config
    }
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// "BASE/QUOTE"
    pub pair: Option<String>,
    pub grid_size: Option<u32>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub order_amount: Option<f64>,
    pub time_interval: Option<u64>,
    pub paper: bool,
    pub testnet: bool,
}

/// Split "WIF/USDT" into ("WIF", "USDT")
pub fn parse_pair(pair: &str) -> GridResult<(String, String)> {
    match pair.split_once('/') {
        Some((base, quote)) if !base.trim().is_empty() && !quote.trim().is_empty() => {
            Ok((base.trim().to_uppercase(), quote.trim().to_uppercase()))
        }
        _ => Err(GridError::InvalidConfig(format!(
            "pair must look like BASE/QUOTE, got '{}'",
            pair
        ))),
    }
}

impl Settings {
    /// Load settings: defaults, then the optional file, then `GRID_BOT_*`
    /// environment variables, then command-line overrides.
    pub fn load(config_path: Option<&Path>, overrides: &CliOverrides) -> GridResult<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }

        // e.g. GRID_BOT_GRID__GRID_SIZE=50
        builder = builder.add_source(
            Environment::with_prefix("GRID_BOT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder, overrides)
    }

    /// Same layering with the file given as TOML text; no environment layer
    #[cfg(test)]
    pub(crate) fn from_toml(toml: &str, overrides: &CliOverrides) -> GridResult<Self> {
        let builder =
            Config::builder().add_source(File::from_str(toml, config::FileFormat::Toml));
        Self::finish(builder, overrides)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        overrides: &CliOverrides,
    ) -> GridResult<Self> {
        let (base, quote) = match &overrides.pair {
            Some(pair) => {
                let (b, q) = parse_pair(pair)?;
                (Some(b), Some(q))
            }
            None => (None, None),
        };

        let settings: Settings = builder
            .set_override_option("grid.base", base)?
            .set_override_option("grid.quote", quote)?
            .set_override_option("grid.grid_size", overrides.grid_size.map(i64::from))?
            .set_override_option("grid.price_min", overrides.price_min)?
            .set_override_option("grid.price_max", overrides.price_max)?
            .set_override_option("grid.order_amount", overrides.order_amount)?
            .set_override_option(
                "grid.time_interval_secs",
                overrides.time_interval.map(|s| s as i64),
            )?
            .set_override_option("network.mode", overrides.paper.then_some("paper"))?
            .set_override_option("network.testnet", overrides.testnet.then_some(true))?
            .build()?
            .try_deserialize()?;

        settings.grid.validate()?;
        Ok(settings)
    }

    pub fn is_paper(&self) -> bool {
        self.network.mode == TradingMode::Paper
    }
}

/// API credentials read from the environment
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***REDACTED***")
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}

impl Credentials {
    /// Read `PHEMEX_API_KEY` / `PHEMEX_API_SECRET`
    pub fn from_env() -> GridResult<Self> {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| GridError::MissingCredentials(format!("{} is not set", name)))
        };

        Ok(Self {
            api_key: read(API_KEY_VAR)?,
            api_secret: read(API_SECRET_VAR)?,
        })
    }
}
