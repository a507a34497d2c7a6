//! Borsa Common - shared configuration, logging and error types for the
//! borsa screening and forecasting pipeline.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup
//! - The default BIST symbol universe

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod universe;
pub mod validation;

pub use config::{
    Config, MarketDataConfig, ObservabilityConfig, PipelineConfig, ScheduleTimes, StorageConfig,
    TrainingConfig,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
