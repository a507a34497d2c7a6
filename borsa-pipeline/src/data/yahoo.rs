//! Yahoo Finance chart adapter.
//!
//! Fetches daily or hourly bars from the v8 chart API. BIST tickers are
//! requested with the `.IS` suffix. Retries are left to the caller's
//! `RetryPolicy`; this adapter makes exactly one HTTP request per call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::normalize::RawSeries;
use super::provider::{MarketDataSource, ProviderError};
use super::rate_limiter::SharedRateLimiter;
use super::{FetchRange, Interval};
use borsa_common::config::MarketDataConfig;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Chart API data source.
pub struct YahooChartSource {
    client: reqwest::Client,
    base_url: String,
    suffix: String,
    limiter: SharedRateLimiter,
}

impl YahooChartSource {
    pub fn new(config: &MarketDataConfig, limiter: SharedRateLimiter) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) borsa-pipeline")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            suffix: config.symbol_suffix.clone(),
            limiter,
        })
    }

    /// Exchange-qualified ticker.
    fn qualified(&self, symbol: &str) -> String {
        if symbol.ends_with(&self.suffix) {
            symbol.to_string()
        } else {
            format!("{}{}", symbol, self.suffix)
        }
    }

    fn chart_url(&self, symbol: &str, range: FetchRange, interval: Interval) -> String {
        format!(
            "{}/{}?period1={}&period2={}&interval={}&includePrePost=false",
            self.base_url,
            self.qualified(symbol),
            range.start.timestamp(),
            range.end.timestamp(),
            interval.to_api_interval()
        )
    }

    /// Convert a decoded chart body into a raw series.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<RawSeries, ProviderError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => ProviderError::NotFound(symbol.to_string()),
            Some(err) => ProviderError::InvalidResponse(format!("{}: {}", err.code, err.description)),
            None => ProviderError::InvalidResponse("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?
            .into_iter()
            .map(|ts| {
                DateTime::<Utc>::from_timestamp(ts, 0)
                    .ok_or_else(|| ProviderError::InvalidResponse(format!("invalid timestamp: {}", ts)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no quote data".into()))?;

        let mut series = RawSeries::new(timestamps);
        for (name, values) in [
            ("open", quote.open),
            ("high", quote.high),
            ("low", quote.low),
            ("close", quote.close),
            ("volume", quote.volume),
        ] {
            if !values.is_empty() {
                series = series.with_column(name, values);
            }
        }
        Ok(series)
    }
}

#[async_trait]
impl MarketDataSource for YahooChartSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch(
        &self,
        symbol: &str,
        range: FetchRange,
        interval: Interval,
    ) -> Result<RawSeries, ProviderError> {
        self.limiter.acquire().await;

        let url = self.chart_url(symbol, range, interval);
        debug!(symbol, %interval, url = %url, "Fetching chart");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(symbol.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Network(format!("HTTP {}", status)));
        }

        let body: ChartResponse = response.json().await?;
        let series = Self::parse_response(symbol, body)?;
        debug!(symbol, rows = series.timestamps.len(), "Chart fetched");
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::rate_limiter::shared_limiter;
    use crate::data::normalize;

    fn source() -> YahooChartSource {
        YahooChartSource::new(&MarketDataConfig::default(), shared_limiter("test", 60)).unwrap()
    }

    #[test]
    fn test_symbol_gets_exchange_suffix() {
        let src = source();
        assert_eq!(src.qualified("THYAO"), "THYAO.IS");
        assert_eq!(src.qualified("THYAO.IS"), "THYAO.IS");
    }

    #[test]
    fn test_chart_url() {
        let src = source();
        let range = FetchRange::new(
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            DateTime::<Utc>::from_timestamp(1_700_086_400, 0).unwrap(),
        );
        let url = src.chart_url("ASELS", range, Interval::Hourly);
        assert!(url.ends_with(
            "/ASELS.IS?period1=1700000000&period2=1700086400&interval=1h&includePrePost=false"
        ));
    }

    #[test]
    fn test_parse_response_to_bars() {
        let json = r#"{"chart":{"result":[{"timestamp":[1700000000,1700086400],
            "indicators":{"quote":[{"open":[10.0,null],"high":[11.0,12.0],"low":[9.5,10.0],
            "close":[10.5,11.5],"volume":[1000,2000]}]}}],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let raw = YahooChartSource::parse_response("THYAO", resp).unwrap();
        let bars = normalize("THYAO", &raw).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[1].open.is_nan());
        assert_eq!(bars[1].volume, 2000.0);
    }

    #[test]
    fn test_parse_not_found() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let err = YahooChartSource::parse_response("NOPE", resp).unwrap_err();
        assert_eq!(err, ProviderError::NotFound("NOPE".into()));
    }
}
