//! Job bodies: screening, prediction and the weekly report.
//!
//! The orchestrator owns every per-cycle collaborator (retry policy, bar
//! cache, single-flight registry) and never lets one symbol's failure abort
//! a batch. Each job returns a `JobSummary`.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use borsa_common::config::{Config, MarketDataConfig, PipelineConfig};

use super::jobs::JobKind;
use super::report::{log_prediction_summary, WeeklyReport};
use super::single_flight::SingleFlight;
use crate::data::session::{
    filter_trading_hours, history_days, last_closed_session, simulate_hourly_from_daily,
    trim_in_progress_bar,
};
use crate::data::{
    normalize, Bar, CycleCache, CycleId, FetchRange, Interval, MarketDataSource, RetryPolicy,
};
use crate::error::{PipelineError, PipelineResult};
use crate::forecast::{ForecastPipeline, PredictionRecord, TrainingParams};
use crate::indicators::IndicatorEngine;
use crate::repository::SharedRepository;
use crate::screener::{FilterResult, ScreeningFilter, ScreeningThresholds};
use crate::technical::{TechnicalAnalysisEngine, TechnicalSnapshot};

/// Source of "now". Tests pin it.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

// ============================================================================
// Job Summary
// ============================================================================

/// Counters for one job run.
///
/// For the weekly report `succeeded`/`failed` count prediction hits and misses.
#[derive(Debug, Clone, Default)]
pub struct JobSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub selected: usize,
    pub duration: Duration,
}

impl JobSummary {
    pub fn log_summary(&self, job: JobKind) {
        info!(
            job = job.name(),
            processed = self.processed,
            succeeded = self.succeeded,
            skipped = self.skipped,
            failed = self.failed,
            selected = self.selected,
            duration_ms = self.duration.as_millis() as u64,
            "Job finished"
        );
    }

    fn record_error(&mut self, job: JobKind, symbol: &str, err: &PipelineError) {
        if matches!(err, PipelineError::DataUnavailable { .. }) || err.is_insufficient() {
            self.skipped += 1;
        } else {
            self.failed += 1;
        }
        warn!(job = job.name(), symbol = %symbol, error = %err, "Symbol skipped");
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator {
    pipeline: PipelineConfig,
    market: MarketDataConfig,
    symbols: Vec<String>,
    source: Arc<dyn MarketDataSource>,
    repo: SharedRepository,
    retry: RetryPolicy,
    indicators: IndicatorEngine,
    filter: ScreeningFilter,
    technical: TechnicalAnalysisEngine,
    forecast: Arc<ForecastPipeline>,
    bars: CycleCache<Arc<Vec<Bar>>>,
    flights: SingleFlight,
    tz: Tz,
    cutoff: NaiveTime,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        source: Arc<dyn MarketDataSource>,
        repo: SharedRepository,
    ) -> Result<Self> {
        let pipeline = config.pipeline.clone();
        let tz = pipeline.tz()?;
        let cutoff = pipeline.cutoff_time()?;
        let retry = RetryPolicy::new(
            pipeline.max_retries,
            Duration::from_secs(pipeline.retry_interval_seconds),
            Duration::from_secs(pipeline.symbol_timeout_seconds),
        );
        let forecast = ForecastPipeline::new(
            pipeline.min_features,
            pipeline.sequence_length,
            TrainingParams::from(&pipeline.training),
        );

        Ok(Self {
            filter: ScreeningFilter::new(ScreeningThresholds::from(&pipeline)),
            market: config.market_data.clone(),
            symbols: config.symbols.clone(),
            source,
            repo,
            retry,
            indicators: IndicatorEngine::new(),
            technical: TechnicalAnalysisEngine::new(),
            forecast: Arc::new(forecast),
            bars: CycleCache::new(),
            flights: SingleFlight::new(),
            tz,
            cutoff,
            clock: Arc::new(Utc::now),
            pipeline,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_forecast(mut self, forecast: ForecastPipeline) -> Self {
        self.forecast = Arc::new(forecast);
        self
    }

    pub fn repository(&self) -> &SharedRepository {
        &self.repo
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Run one job to completion.
    pub async fn run_job(&self, kind: JobKind) -> Result<JobSummary> {
        let summary = match kind {
            JobKind::ScreenAll => self.screen_all().await?,
            JobKind::PredictSelected => self.predict_selected().await?,
            JobKind::WeeklyReport => self.weekly_report().await?,
        };
        summary.log_summary(kind);
        Ok(summary)
    }

    // ========================================================================
    // Market data
    // ========================================================================

    /// Fetch with retry, then normalize. An empty series is `DataUnavailable`.
    async fn fetch_bars(
        &self,
        symbol: &str,
        range: FetchRange,
        interval: Interval,
    ) -> PipelineResult<Vec<Bar>> {
        let raw = self
            .retry
            .run(symbol, || self.source.fetch(symbol, range, interval))
            .await?;
        if raw.is_empty() {
            return Err(PipelineError::data_unavailable(symbol, "empty response"));
        }
        let bars = normalize(symbol, &raw)?;
        if bars.is_empty() {
            return Err(PipelineError::data_unavailable(symbol, "no usable bars"));
        }
        Ok(bars)
    }

    /// Daily bars over `days`, shared within a cycle.
    async fn daily_bars(
        &self,
        cycle: CycleId,
        symbol: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> PipelineResult<Vec<Bar>> {
        let key = format!("{}:{}:{}", symbol, Interval::Daily, days);
        if let Some(cached) = self.bars.get(cycle, &key) {
            debug!(symbol = %symbol, cycle = %cycle, "Daily bars from cycle cache");
            return Ok(cached.as_ref().clone());
        }
        let bars = self
            .fetch_bars(symbol, FetchRange::last_days(now, days), Interval::Daily)
            .await?;
        self.bars.insert(cycle, key, Arc::new(bars.clone()));
        Ok(bars)
    }

    /// Session-hour bars over `days`, derived from daily bars when the
    /// hourly feed has nothing and the fallback is enabled.
    async fn hourly_bars(
        &self,
        cycle: CycleId,
        symbol: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> PipelineResult<Vec<Bar>> {
        let reason = match self
            .fetch_bars(symbol, FetchRange::last_days(now, days), Interval::Hourly)
            .await
        {
            Ok(bars) => {
                let bars = filter_trading_hours(bars, self.tz);
                if !bars.is_empty() {
                    return Ok(bars);
                }
                PipelineError::data_unavailable(symbol, "no hourly bars inside session hours")
            }
            Err(e) => e,
        };

        if !self.market.simulate_hourly_fallback {
            return Err(reason);
        }
        warn!(symbol = %symbol, error = %reason, "Hourly data unavailable, deriving from daily bars");
        let daily = self.daily_bars(cycle, symbol, days, now).await?;
        let simulated = simulate_hourly_from_daily(&daily, days as usize, self.tz);
        if simulated.is_empty() {
            return Err(reason);
        }
        Ok(simulated)
    }

    // ========================================================================
    // Screen-all
    // ========================================================================

    pub async fn screen_all(&self) -> Result<JobSummary> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let cycle = self.bars.begin_cycle();
        let batch_size = self.pipeline.batch_size.max(1);
        let pacing = Duration::from_secs_f64(self.pipeline.pacing_delay_seconds.max(0.0));
        let mut summary = JobSummary::default();

        info!(
            run_id = %run_id,
            cycle = %cycle,
            symbols = self.symbols.len(),
            batch_size,
            session = %last_closed_session(self.now(), self.tz, self.cutoff),
            "Screening started"
        );

        for (index, batch) in self.symbols.chunks(batch_size).enumerate() {
            debug!(run_id = %run_id, batch = index + 1, size = batch.len(), "Screening batch");
            for symbol in batch {
                if summary.processed > 0 && !pacing.is_zero() {
                    tokio::time::sleep(pacing).await;
                }
                summary.processed += 1;
                match self.screen_symbol(cycle, symbol).await {
                    Ok(filter) => {
                        summary.succeeded += 1;
                        if filter.is_selected() {
                            summary.selected += 1;
                        }
                    }
                    Err(e) => summary.record_error(JobKind::ScreenAll, symbol, &e),
                }
            }
        }

        summary.duration = started.elapsed();
        Ok(summary)
    }

    async fn screen_symbol(&self, cycle: CycleId, symbol: &str) -> PipelineResult<FilterResult> {
        let now = self.now();
        let mut bars = self
            .daily_bars(cycle, symbol, self.market.screen_lookback_days, now)
            .await?;
        if trim_in_progress_bar(&mut bars, now, self.tz, self.cutoff) {
            debug!(
                symbol = %symbol,
                session = %last_closed_session(now, self.tz, self.cutoff),
                "Dropped in-progress daily bar"
            );
        }

        let snapshot = self.indicators.compute(symbol, &bars);
        let filter = self.filter.evaluate(Some(&snapshot), snapshot.previous_close);
        self.repo
            .upsert_indicator_snapshot(symbol, &snapshot, &filter)
            .await?;

        debug!(
            symbol = %symbol,
            rsi = snapshot.rsi,
            relative_volume = snapshot.relative_volume,
            rsi_filter = filter.rsi_filter(),
            volume_filter = filter.volume_filter(),
            pivot_filter = filter.pivot_filter(),
            selected = filter.is_selected(),
            "Symbol screened"
        );
        Ok(filter)
    }

    // ========================================================================
    // Predict-selected
    // ========================================================================

    pub async fn predict_selected(&self) -> Result<JobSummary> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let cycle = self.bars.begin_cycle();
        let mut summary = JobSummary::default();

        let symbols = self
            .repo
            .get_selected_symbols()
            .await
            .context("Failed to load selected symbols")?;
        summary.selected = symbols.len();
        if symbols.is_empty() {
            info!(run_id = %run_id, "No selected symbols, nothing to predict");
            summary.duration = started.elapsed();
            return Ok(summary);
        }

        let now = self.now();
        let days = history_days(
            now,
            self.tz,
            self.cutoff,
            self.pipeline.history_days_before_close,
            self.pipeline.history_days_after_close,
        );
        let workers = self.pipeline.prediction_workers.max(1);
        info!(
            run_id = %run_id,
            cycle = %cycle,
            symbols = symbols.len(),
            history_days = days,
            workers,
            "Prediction started"
        );

        let results: Vec<(String, PipelineResult<PredictionRecord>)> =
            stream::iter(symbols.iter().cloned())
                .map(move |symbol| async move {
                    let result = self.predict_symbol(cycle, &symbol, days, now).await;
                    (symbol, result)
                })
                .buffer_unordered(workers)
                .collect()
                .await;

        let mut records = Vec::new();
        for (symbol, result) in results {
            summary.processed += 1;
            match result {
                Ok(record) => {
                    summary.succeeded += 1;
                    records.push(record);
                }
                Err(e) => summary.record_error(JobKind::PredictSelected, &symbol, &e),
            }
        }
        records.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        log_prediction_summary(&records);

        for symbol in &symbols {
            if let Err(e) = self.analyze_symbol(cycle, symbol, now).await {
                warn!(symbol = %symbol, error = %e, "Technical analysis failed");
            }
        }

        summary.duration = started.elapsed();
        Ok(summary)
    }

    /// Forecast one symbol. Concurrent requests for the same symbol queue
    /// behind the one in flight.
    async fn predict_symbol(
        &self,
        cycle: CycleId,
        symbol: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> PipelineResult<PredictionRecord> {
        if self.flights.is_busy(symbol).await {
            debug!(symbol = %symbol, "Waiting for in-flight prediction");
        }
        let _claim = self.flights.claim(symbol).await;

        let bars = self.hourly_bars(cycle, symbol, days, now).await?;
        let current_price = self
            .repo
            .get_screening(symbol)
            .await?
            .and_then(|entry| entry.snapshot.last_close);

        let forecast = Arc::clone(&self.forecast);
        let owned = symbol.to_string();
        let record = tokio::task::spawn_blocking(move || {
            forecast.run(&owned, &bars, current_price, now)
        })
        .await
        .map_err(|e| PipelineError::Computation(format!("training task failed: {}", e)))??;

        self.repo.upsert_prediction(symbol, &record).await?;
        Ok(record)
    }

    // ========================================================================
    // Technical analysis
    // ========================================================================

    /// On-demand technical analysis, persisted like the scheduled one.
    pub async fn analyze(&self, symbol: &str) -> PipelineResult<TechnicalSnapshot> {
        let cycle = self.bars.begin_cycle();
        self.analyze_symbol(cycle, symbol, self.now()).await
    }

    async fn analyze_symbol(
        &self,
        cycle: CycleId,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> PipelineResult<TechnicalSnapshot> {
        let mut bars = self
            .daily_bars(cycle, symbol, self.market.technical_lookback_days, now)
            .await?;
        trim_in_progress_bar(&mut bars, now, self.tz, self.cutoff);

        let snapshot = self.technical.analyze(symbol, &bars, now);
        self.repo.upsert_technical_snapshot(symbol, &snapshot).await?;
        debug!(symbol = %symbol, bars = snapshot.bars_used, "Technical snapshot stored");
        Ok(snapshot)
    }

    // ========================================================================
    // Weekly report
    // ========================================================================

    pub async fn weekly_report(&self) -> Result<JobSummary> {
        let started = Instant::now();
        let now = self.now();
        let records = self
            .repo
            .list_predictions_since(now - chrono::Duration::days(7))
            .await
            .context("Failed to load recent predictions")?;

        let mut realized = HashMap::new();
        for record in &records {
            match self.repo.get_screening(&record.symbol).await {
                Ok(Some(entry)) => {
                    if let Some(close) = entry.snapshot.last_close {
                        realized.insert(record.symbol.clone(), close);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(symbol = %record.symbol, error = %e, "Realized price lookup failed"),
            }
        }

        let report = WeeklyReport::evaluate(now.with_timezone(&self.tz).date_naive(), &records, &realized);
        info!(
            total = report.total(),
            success = report.success_count,
            failure = report.failure_count,
            success_rate = %format!("{:.2}", report.success_rate()),
            "Weekly report"
        );
        report.save(&self.pipeline.report_dir).await?;

        Ok(JobSummary {
            processed: report.total(),
            succeeded: report.success_count,
            failed: report.failure_count,
            duration: started.elapsed(),
            ..JobSummary::default()
        })
    }
}
