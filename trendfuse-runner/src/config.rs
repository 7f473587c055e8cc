//! Application configuration loaded from TOML.
//!
//! Every section is optional; missing keys fall back to defaults. The config
//! is constructed once (by the CLI or a test) and passed down explicitly.
//!
//! ```toml
//! [engine]
//! warmup_bars = 250
//! min_entry_grade = "B"
//!
//! [data]
//! base_url = "https://api.exchange.coinbase.com"
//!
//! [forward_test]
//! poll_interval_secs = 300
//! store_dir = "runs"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use trendfuse_core::engine::{BracketConfig, EngineConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub data: DataConfig,
    pub backtest: BacktestConfig,
    pub forward_test: ForwardTestConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `path` when given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ind = &self.engine.indicators;
        if ind.ema_fast == 0 || ind.ema_mid == 0 || ind.ema_slow == 0 {
            return Err(ConfigError::Invalid("EMA periods must be positive".into()));
        }
        if self.forward_test.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be positive".into()));
        }
        if self.backtest.limit_5m == 0 || self.backtest.limit_15m == 0 {
            return Err(ConfigError::Invalid("backtest candle limits must be positive".into()));
        }
        Ok(())
    }
}

/// Market data source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Circuit breaker cooldown after repeated failures.
    pub breaker_cooldown_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exchange.coinbase.com".into(),
            timeout_secs: 15,
            breaker_cooldown_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub limit_5m: usize,
    pub limit_15m: usize,
    /// Most recent trades kept in the report.
    pub max_report_trades: usize,
    /// Candle limits used by the `learn` command.
    pub learn_limit_5m: usize,
    pub learn_limit_15m: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            limit_5m: 1500,
            limit_15m: 500,
            max_report_trades: 100,
            learn_limit_5m: 1200,
            learn_limit_15m: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardTestConfig {
    pub poll_interval_secs: u64,
    pub session_days: i64,
    /// Candles fetched per timeframe on every step.
    pub fetch_limit: usize,
    pub bracket: BracketConfig,
    pub store_dir: PathBuf,
    /// Apply learned weights (from history before the step) to the live action.
    ///
    /// Off by default: learned weights are advisory, and a session then trades
    /// the same base score that `analyze` and `backtest` report. Turning it on
    /// also runs a learner pass on every step with new candles.
    pub learner_bonus: bool,
}

impl Default for ForwardTestConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            session_days: 5,
            fetch_limit: 500,
            bracket: BracketConfig::default(),
            store_dir: PathBuf::from("runs"),
            learner_bonus: false,
        }
    }
}
