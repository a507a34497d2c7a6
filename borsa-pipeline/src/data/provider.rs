//! Market data source abstraction.
//!
//! A source returns a raw columnar series; the caller normalizes it onto the
//! `Bar` schema. Tests substitute their own implementations.

use async_trait::async_trait;
use std::fmt;

use super::normalize::RawSeries;
use super::{FetchRange, Interval};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to market data sources.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Connection failed or non-success status
    Network(String),
    /// Rate limit exceeded
    RateLimited,
    /// Symbol unknown to the source
    NotFound(String),
    /// Body could not be decoded
    InvalidResponse(String),
    /// Call exceeded its deadline
    Timeout,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited => write!(f, "Rate limited"),
            Self::NotFound(symbol) => write!(f, "Symbol not found: {}", symbol),
            Self::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            Self::Timeout => write!(f, "Request timed out"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited | Self::Timeout)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

// ============================================================================
// Market Data Source Trait
// ============================================================================

/// Trait for market data sources.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Fetch bars for a plain ticker (no exchange suffix) over a range.
    async fn fetch(
        &self,
        symbol: &str,
        range: FetchRange,
        interval: Interval,
    ) -> Result<RawSeries, ProviderError>;
}
