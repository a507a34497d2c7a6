//! Borsa Pipeline Library
//!
//! Scheduled screening and multi-model price forecasting for Borsa Istanbul
//! equities.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      borsa-pipeline                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Scheduler (polling loop + manual triggers)                      │
//! │      │                                                           │
//! │  Orchestrator ── screen-all ──► IndicatorEngine ► ScreeningFilter│
//! │      │        ── predict    ──► ForecastPipeline (ensemble)      │
//! │      │        ── report     ──► WeeklyReport                     │
//! │      ▼                                                           │
//! │  MarketDataSource (chart API)      PredictionRepository (SQLite) │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Screening
//! - RSI(14) inside a band, relative volume above a threshold and a fresh
//!   close above the classic pivot. All three must hold.
//!
//! ## Forecasting
//! - Hourly bars become a scaled feature frame, windowed into sequences
//! - Three model families train on the same split; the lowest MSE wins

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod error;
pub mod forecast;
pub mod indicators;
pub mod repository;
pub mod scheduler;
pub mod screener;
pub mod technical;

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use borsa_common::config::Config;

use crate::data::{shared_limiter, MarketDataSource, YahooChartSource};
use crate::repository::{MemoryRepository, SharedRepository, SqliteRepository};
use crate::scheduler::runner::TRIGGER_BUFFER;
use crate::scheduler::{trigger_channel, Orchestrator, Scheduler, TriggerCommand, TriggerHandle};

/// Wires configuration, the data source and the repository together.
///
/// The service owns the trigger channel, so handles taken from
/// [`PipelineService::triggers`] stay usable for the whole run.
pub struct PipelineService {
    config: Config,
    orchestrator: Arc<Orchestrator>,
    triggers: TriggerHandle,
    pending: Mutex<Option<mpsc::Receiver<TriggerCommand>>>,
}

impl PipelineService {
    /// Build the service. `in_memory` swaps SQLite for the in-memory repository.
    pub fn new(config: Config, in_memory: bool) -> Result<Self> {
        let repo: SharedRepository = if in_memory {
            info!("Using in-memory repository");
            Arc::new(MemoryRepository::new())
        } else {
            let repo = SqliteRepository::open(&config.storage.db_path)
                .context("Failed to open prediction database")?;
            info!(path = %repo.db_path().display(), "Using SQLite repository");
            Arc::new(repo)
        };

        let limiter = shared_limiter("yahoo", config.market_data.requests_per_minute);
        let source: Arc<dyn MarketDataSource> =
            Arc::new(YahooChartSource::new(&config.market_data, limiter)?);

        Self::with_parts(config, source, repo)
    }

    /// Build the service around an explicit source and repository.
    pub fn with_parts(
        config: Config,
        source: Arc<dyn MarketDataSource>,
        repo: SharedRepository,
    ) -> Result<Self> {
        let orchestrator = Arc::new(Orchestrator::new(&config, source, repo)?);
        let (triggers, receiver) = trigger_channel(TRIGGER_BUFFER);
        Ok(Self {
            config,
            orchestrator,
            triggers,
            pending: Mutex::new(Some(receiver)),
        })
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn repository(&self) -> &SharedRepository {
        self.orchestrator.repository()
    }

    /// Handle for sending manual triggers to the running scheduler.
    pub fn triggers(&self) -> TriggerHandle {
        self.triggers.clone()
    }

    /// Run the polling loop until Ctrl-C.
    ///
    /// On Unix, SIGUSR1 forces a recompute and SIGUSR2 runs predictions now.
    pub async fn start(&self) -> Result<()> {
        #[cfg(unix)]
        let forwarder = {
            let triggers = self.triggers();
            tokio::spawn(async move {
                if let Err(e) = forward_signals(triggers).await {
                    warn!(error = %format!("{:#}", e), "Signal triggers disabled");
                }
            })
        };

        let result = self
            .start_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            })
            .await;

        #[cfg(unix)]
        forwarder.abort();
        result
    }

    /// Run the polling loop until `shutdown` resolves. A service runs once.
    pub async fn start_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let receiver = self
            .pending
            .lock()
            .await
            .take()
            .context("Pipeline service already started")?;
        let mut scheduler = Scheduler::with_triggers(
            Arc::clone(&self.orchestrator),
            &self.config.pipeline,
            receiver,
        )?;

        info!(
            symbols = self.config.symbols.len(),
            timezone = %self.config.pipeline.timezone,
            "Borsa pipeline started"
        );

        scheduler.run(shutdown).await;

        info!("Borsa pipeline stopped");
        Ok(())
    }
}

#[cfg(unix)]
async fn forward_signals(triggers: TriggerHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut recompute =
        signal(SignalKind::user_defined1()).context("Failed to listen for SIGUSR1")?;
    let mut predict =
        signal(SignalKind::user_defined2()).context("Failed to listen for SIGUSR2")?;

    loop {
        let command = tokio::select! {
            Some(()) = recompute.recv() => TriggerCommand::ForceRecompute,
            Some(()) = predict.recv() => TriggerCommand::RunPredictionsNow,
            else => break,
        };
        info!(command = ?command, "Signal received");
        triggers.send(command).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FetchRange, Interval, ProviderError, RawSeries};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Counts fetches and never returns data.
    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(
            &self,
            symbol: &str,
            _range: FetchRange,
            _interval: Interval,
        ) -> std::result::Result<RawSeries, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::NotFound(symbol.to_string()))
        }
    }

    fn service(source: Arc<CountingSource>) -> PipelineService {
        let mut config = Config::default();
        config.symbols = vec!["GARAN".into()];
        config.pipeline.pacing_delay_seconds = 0.0;
        config.pipeline.max_retries = 1;
        config.pipeline.retry_interval_seconds = 0;
        // Midnight on January 1st keeps cron jobs out of the way
        config.pipeline.schedule_times.screen = "0 0 0 1 1 *".into();
        config.pipeline.schedule_times.predict = "0 0 0 1 1 *".into();
        config.pipeline.schedule_times.report = "0 0 0 1 1 *".into();
        PipelineService::with_parts(config, source, Arc::new(MemoryRepository::new())).unwrap()
    }

    #[tokio::test]
    async fn test_trigger_reaches_running_service() {
        let source = Arc::new(CountingSource::default());
        let service = service(Arc::clone(&source));
        let triggers = service.triggers();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let run = service.start_until(async move {
            let _ = stop_rx.await;
        });
        let drive = async {
            // let the loop pass its first tick before sending
            tokio::time::sleep(Duration::from_millis(50)).await;
            triggers.force_recompute().await.unwrap();
            tokio::time::timeout(Duration::from_secs(5), async {
                while source.calls.load(Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
            .unwrap();
            stop_tx.send(()).unwrap();
        };

        let (result, ()) = tokio::join!(run, drive);
        result.unwrap();
        assert!(source.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_service_starts_once() {
        let service = service(Arc::new(CountingSource::default()));
        service.start_until(async {}).await.unwrap();
        let err = service.start_until(async {}).await.unwrap_err();
        assert!(err.to_string().contains("already started"));
    }
}
