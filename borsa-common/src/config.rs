//! Configuration management for the borsa pipeline.
//!
//! The pipeline reads a single JSON file at `~/.borsa/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (BORSA_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `BORSA_LOG_LEVEL` → observability.log_level
//! - `BORSA_LOG_FORMAT` → observability.log_format
//! - `BORSA_DB_PATH` → storage.db_path
//! - `BORSA_MARKET_DATA_URL` → market_data.base_url
//! - `BORSA_SEQUENCE_LENGTH` → pipeline.sequence_length
//! - `BORSA_BATCH_SIZE` → pipeline.batch_size
//! - `BORSA_PACING_DELAY_SECONDS` → pipeline.pacing_delay_seconds
//! - `BORSA_SYMBOLS` → symbols (comma separated)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::universe::BIST_SYMBOLS;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".borsa"),
        |dirs| dirs.home_dir().join(".borsa"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Market Data
// ============================================================================

/// Market data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    /// Chart API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Exchange suffix appended to plain tickers
    #[serde(default = "default_symbol_suffix")]
    pub symbol_suffix: String,

    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Token bucket budget for the provider
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Daily history fetched by the screening job
    #[serde(default = "default_screen_lookback_days")]
    pub screen_lookback_days: u32,

    /// Daily history fetched for technical analysis
    #[serde(default = "default_technical_lookback_days")]
    pub technical_lookback_days: u32,

    /// Derive hourly bars from daily bars when hourly data is unavailable
    #[serde(default = "default_true")]
    pub simulate_hourly_fallback: bool,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            symbol_suffix: default_symbol_suffix(),
            timeout_secs: default_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
            screen_lookback_days: default_screen_lookback_days(),
            technical_lookback_days: default_technical_lookback_days(),
            simulate_hourly_fallback: true,
        }
    }
}

fn default_base_url() -> String {
    "https://query2.finance.yahoo.com/v8/finance/chart".into()
}

fn default_symbol_suffix() -> String {
    ".IS".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_screen_lookback_days() -> u32 {
    30 // one month of daily bars
}

fn default_technical_lookback_days() -> u32 {
    365 // enough for SMA200
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Storage
// ============================================================================

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    config_dir().join("borsa.db")
}

// ============================================================================
// Pipeline
// ============================================================================

/// Cron expressions (with seconds) for the three scheduled jobs.
///
/// Evaluated in `PipelineConfig::timezone`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTimes {
    #[serde(default = "default_screen_cron")]
    pub screen: String,

    #[serde(default = "default_predict_cron")]
    pub predict: String,

    #[serde(default = "default_report_cron")]
    pub report: String,
}

impl Default for ScheduleTimes {
    fn default() -> Self {
        Self {
            screen: default_screen_cron(),
            predict: default_predict_cron(),
            report: default_report_cron(),
        }
    }
}

fn default_screen_cron() -> String {
    "0 30 18 * * *".into() // after the BIST close
}

fn default_predict_cron() -> String {
    "0 0 20 * * *".into()
}

fn default_report_cron() -> String {
    "0 0 9 * * Mon".into()
}

/// Gradient descent settings shared by every model family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_max_epochs")]
    pub max_epochs: usize,

    /// Epochs without validation improvement before stopping
    #[serde(default = "default_patience")]
    pub patience: usize,

    #[serde(default = "default_training_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Seed for weight initialization and batch shuffling
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epochs: default_max_epochs(),
            patience: default_patience(),
            batch_size: default_training_batch_size(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
        }
    }
}

fn default_max_epochs() -> usize {
    150
}

fn default_patience() -> usize {
    30
}

fn default_training_batch_size() -> usize {
    20
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_seed() -> u64 {
    42
}

/// Screening, forecasting and scheduling options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    // === Screening ===
    #[serde(default = "default_rsi_low")]
    pub rsi_low: f64,

    #[serde(default = "default_rsi_high")]
    pub rsi_high: f64,

    /// Relative volume must be strictly above this
    #[serde(default = "default_min_relative_volume")]
    pub min_relative_volume: f64,

    // === Forecasting ===
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,

    #[serde(default = "default_min_features")]
    pub min_features: usize,

    #[serde(default)]
    pub training: TrainingConfig,

    /// Concurrent per-symbol predictions
    #[serde(default = "default_prediction_workers")]
    pub prediction_workers: usize,

    /// Hourly history when running before the close cutoff
    #[serde(default = "default_history_days_before_close")]
    pub history_days_before_close: u32,

    /// Hourly history when running after the close cutoff
    #[serde(default = "default_history_days_after_close")]
    pub history_days_after_close: u32,

    // === Scheduling ===
    /// Symbols per screening batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between symbols in a batch
    #[serde(default = "default_pacing_delay_seconds")]
    pub pacing_delay_seconds: f64,

    #[serde(default)]
    pub schedule_times: ScheduleTimes,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_interval_seconds")]
    pub retry_interval_seconds: u64,

    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Per-call timeout on external data requests
    #[serde(default = "default_symbol_timeout_seconds")]
    pub symbol_timeout_seconds: u64,

    /// IANA zone for schedules and session hours
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Local "HH:MM" before which the latest bar is treated as in progress
    #[serde(default = "default_close_cutoff")]
    pub close_cutoff: String,

    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rsi_low: default_rsi_low(),
            rsi_high: default_rsi_high(),
            min_relative_volume: default_min_relative_volume(),
            sequence_length: default_sequence_length(),
            min_features: default_min_features(),
            training: TrainingConfig::default(),
            prediction_workers: default_prediction_workers(),
            history_days_before_close: default_history_days_before_close(),
            history_days_after_close: default_history_days_after_close(),
            batch_size: default_batch_size(),
            pacing_delay_seconds: default_pacing_delay_seconds(),
            schedule_times: ScheduleTimes::default(),
            max_retries: default_max_retries(),
            retry_interval_seconds: default_retry_interval_seconds(),
            poll_interval_seconds: default_poll_interval_seconds(),
            symbol_timeout_seconds: default_symbol_timeout_seconds(),
            timezone: default_timezone(),
            close_cutoff: default_close_cutoff(),
            report_dir: default_report_dir(),
        }
    }
}

fn default_rsi_low() -> f64 {
    45.0
}

fn default_rsi_high() -> f64 {
    65.0
}

fn default_min_relative_volume() -> f64 {
    1.4
}

fn default_sequence_length() -> usize {
    30
}

fn default_min_features() -> usize {
    5
}

fn default_prediction_workers() -> usize {
    2
}

fn default_history_days_before_close() -> u32 {
    30
}

fn default_history_days_after_close() -> u32 {
    15
}

fn default_batch_size() -> usize {
    2
}

fn default_pacing_delay_seconds() -> f64 {
    1.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval_seconds() -> u64 {
    2
}

fn default_poll_interval_seconds() -> u64 {
    60
}

fn default_symbol_timeout_seconds() -> u64 {
    60
}

fn default_timezone() -> String {
    "Europe/Istanbul".into()
}

fn default_close_cutoff() -> String {
    "18:30".into()
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl PipelineConfig {
    /// Parsed IANA time zone.
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone {}: {}", self.timezone, e))
    }

    /// Parsed close cutoff time of day.
    pub fn cutoff_time(&self) -> Result<chrono::NaiveTime> {
        chrono::NaiveTime::parse_from_str(&self.close_cutoff, "%H:%M")
            .with_context(|| format!("Invalid close_cutoff: {}", self.close_cutoff))
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub market_data: MarketDataConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Plain tickers to screen
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig::default(),
            market_data: MarketDataConfig::default(),
            storage: StorageConfig::default(),
            pipeline: PipelineConfig::default(),
            symbols: default_symbols(),
        }
    }
}

fn default_symbols() -> Vec<String> {
    BIST_SYMBOLS.iter().map(|s| (*s).to_string()).collect()
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration (explicit path or default) with environment overrides applied.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("BORSA_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("BORSA_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(path) = std::env::var("BORSA_DB_PATH") {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("BORSA_MARKET_DATA_URL") {
            self.market_data.base_url = url;
        }
        if let Ok(v) = std::env::var("BORSA_SEQUENCE_LENGTH") {
            if let Ok(n) = v.parse() {
                self.pipeline.sequence_length = n;
            }
        }
        if let Ok(v) = std::env::var("BORSA_BATCH_SIZE") {
            if let Ok(n) = v.parse() {
                self.pipeline.batch_size = n;
            }
        }
        if let Ok(v) = std::env::var("BORSA_PACING_DELAY_SECONDS") {
            if let Ok(secs) = v.parse() {
                self.pipeline.pacing_delay_seconds = secs;
            }
        }
        if let Ok(v) = std::env::var("BORSA_SYMBOLS") {
            let symbols: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !symbols.is_empty() {
                self.symbols = symbols;
            }
        }
    }

    /// Save configuration to a path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        let p = &config.pipeline;
        assert_eq!(p.rsi_low, 45.0);
        assert_eq!(p.rsi_high, 65.0);
        assert_eq!(p.min_relative_volume, 1.4);
        assert_eq!(p.sequence_length, 30);
        assert_eq!(p.min_features, 5);
        assert_eq!(p.batch_size, 2);
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.retry_interval_seconds, 2);
        assert_eq!(p.training.patience, 30);
        assert_eq!(p.training.max_epochs, 150);
        assert_eq!(config.market_data.symbol_suffix, ".IS");
        assert_eq!(config.symbols.len(), BIST_SYMBOLS.len());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "pipeline": { "rsi_low": 40, "schedule_times": { "screen": "0 0 19 * * *" } },
            "symbols": ["THYAO", "ASELS"]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.pipeline.rsi_low, 40.0);
        assert_eq!(config.pipeline.rsi_high, 65.0);
        assert_eq!(config.pipeline.schedule_times.screen, "0 0 19 * * *");
        assert_eq!(config.pipeline.schedule_times.predict, "0 0 20 * * *");
        assert_eq!(config.symbols, vec!["THYAO", "ASELS"]);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.symbols = vec!["GARAN".into()];
        config.pipeline.batch_size = 7;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.symbols, vec!["GARAN"]);
        assert_eq!(loaded.pipeline.batch_size, 7);
    }

    #[test]
    fn test_timezone_and_cutoff_parse() {
        let p = PipelineConfig::default();
        assert_eq!(p.tz().unwrap(), chrono_tz::Europe::Istanbul);
        assert_eq!(
            p.cutoff_time().unwrap(),
            chrono::NaiveTime::from_hms_opt(18, 30, 0).unwrap()
        );

        let bad = PipelineConfig {
            timezone: "Mars/Olympus".into(),
            close_cutoff: "25:99".into(),
            ..PipelineConfig::default()
        };
        assert!(bad.tz().is_err());
        assert!(bad.cutoff_time().is_err());
    }
}
