//! Configuration validation for the borsa pipeline.
//!
//! Checks thresholds, sizes, cron schedules and the time zone.

use std::str::FromStr;
use thiserror::Error;

use crate::config::{Config, MarketDataConfig, ObservabilityConfig, PipelineConfig};
use crate::error::{Error, ResultExt};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }
        if let Err(e) = self.market_data.validate() {
            errors.push(e);
        }
        if let Err(e) = self.pipeline.validate() {
            errors.push(e);
        }
        if self.symbols.is_empty() {
            errors.push(invalid("symbols", "at least one symbol is required"));
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load (with environment overrides) and validate configuration.
    pub fn load_and_validate(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let config = Self::load_with_env(path)?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(invalid(
                "observability.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(invalid(
                "observability.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        Ok(())
    }
}

impl Validate for MarketDataConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.base_url.is_empty() {
            return Err(invalid("market_data.base_url", "cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("market_data.timeout_secs", "must be greater than 0"));
        }
        if self.requests_per_minute == 0 {
            return Err(invalid(
                "market_data.requests_per_minute",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validate for PipelineConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if !(0.0..=100.0).contains(&self.rsi_low)
            || !(0.0..=100.0).contains(&self.rsi_high)
            || self.rsi_low > self.rsi_high
        {
            errors.push(invalid(
                "pipeline.rsi_low/rsi_high",
                "must satisfy 0 <= rsi_low <= rsi_high <= 100",
            ));
        }
        if !self.min_relative_volume.is_finite() || self.min_relative_volume < 0.0 {
            errors.push(invalid(
                "pipeline.min_relative_volume",
                "must be a non-negative number",
            ));
        }

        for (field, value) in [
            ("pipeline.sequence_length", self.sequence_length),
            ("pipeline.min_features", self.min_features),
            ("pipeline.batch_size", self.batch_size),
            ("pipeline.prediction_workers", self.prediction_workers),
            ("pipeline.training.max_epochs", self.training.max_epochs),
            ("pipeline.training.batch_size", self.training.batch_size),
        ] {
            if value == 0 {
                errors.push(invalid(field, "must be greater than 0"));
            }
        }

        if !self.training.learning_rate.is_finite() || self.training.learning_rate <= 0.0 {
            errors.push(invalid(
                "pipeline.training.learning_rate",
                "must be greater than 0",
            ));
        }
        if !self.pacing_delay_seconds.is_finite() || self.pacing_delay_seconds < 0.0 {
            errors.push(invalid(
                "pipeline.pacing_delay_seconds",
                "must be a non-negative number",
            ));
        }
        if self.poll_interval_seconds == 0 {
            errors.push(invalid(
                "pipeline.poll_interval_seconds",
                "must be greater than 0",
            ));
        }

        for (field, expr) in [
            ("pipeline.schedule_times.screen", &self.schedule_times.screen),
            ("pipeline.schedule_times.predict", &self.schedule_times.predict),
            ("pipeline.schedule_times.report", &self.schedule_times.report),
        ] {
            if let Err(e) = cron::Schedule::from_str(expr) {
                errors.push(invalid(field, format!("invalid cron expression: {}", e)));
            }
        }

        if chrono_tz::Tz::from_str(&self.timezone).is_err() {
            errors.push(invalid(
                "pipeline.timezone",
                format!("unknown time zone: {}", self.timezone),
            ));
        }
        if self.cutoff_time().is_err() {
            errors.push(invalid("pipeline.close_cutoff", "must be HH:MM"));
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}
