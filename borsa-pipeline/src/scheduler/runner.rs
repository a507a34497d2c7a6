//! The polling loop.
//!
//! One loop wakes every `poll_interval_seconds`, runs due jobs serially and
//! drains manual triggers in between. Job failures are logged and recorded
//! on the job; the loop itself only stops on shutdown.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use borsa_common::config::PipelineConfig;

use super::jobs::{JobKind, JobOutcome, JobState, ScheduleJob};
use super::orchestrator::Orchestrator;
use super::trigger::{trigger_channel, TriggerCommand, TriggerHandle};

pub(crate) const TRIGGER_BUFFER: usize = 8;

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    jobs: Vec<ScheduleJob>,
    poll_interval: Duration,
    triggers: mpsc::Receiver<TriggerCommand>,
    last_check: Option<DateTime<Utc>>,
}

impl Scheduler {
    /// Build the loop and the handle used to send it manual triggers.
    pub fn new(orchestrator: Arc<Orchestrator>, config: &PipelineConfig) -> Result<(Self, TriggerHandle)> {
        let (handle, triggers) = trigger_channel(TRIGGER_BUFFER);
        let scheduler = Self::with_triggers(orchestrator, config, triggers)?;
        Ok((scheduler, handle))
    }

    /// Build the loop around an existing trigger receiver.
    pub fn with_triggers(
        orchestrator: Arc<Orchestrator>,
        config: &PipelineConfig,
        triggers: mpsc::Receiver<TriggerCommand>,
    ) -> Result<Self> {
        let jobs = ScheduleJob::from_config(&config.schedule_times, config.tz()?)?;
        Ok(Self {
            orchestrator,
            jobs,
            poll_interval: Duration::from_secs(config.poll_interval_seconds.max(1)),
            triggers,
            last_check: None,
        })
    }

    pub fn job(&self, kind: JobKind) -> Option<&ScheduleJob> {
        self.jobs.iter().find(|j| j.kind == kind)
    }

    /// Run until `shutdown` resolves.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut triggers_open = true;

        for job in &self.jobs {
            info!(
                job = job.kind.name(),
                cron = %job.trigger_spec,
                next = ?job.next_after(Utc::now()),
                "Job registered"
            );
        }
        info!(poll_seconds = self.poll_interval.as_secs(), "Scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    break;
                }
                command = self.triggers.recv(), if triggers_open => match command {
                    Some(command) => {
                        info!(command = ?command, "Manual trigger received");
                        self.execute(command.job(), Utc::now()).await;
                    }
                    None => {
                        debug!("Trigger channel closed");
                        triggers_open = false;
                    }
                },
                _ = ticker.tick() => {
                    self.tick(Utc::now()).await;
                }
            }
        }
    }

    /// Run every job due at `now`, in registration order.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Vec<(JobKind, JobState)> {
        let poll = chrono::Duration::seconds(self.poll_interval.as_secs() as i64);
        // Cover the gap since the previous check so a late tick misses nothing.
        let window = self
            .last_check
            .map_or(poll, |last| (now - last).max(poll));
        self.last_check = Some(now);

        let due: Vec<JobKind> = self
            .jobs
            .iter()
            .filter(|j| j.is_due(now, window))
            .map(|j| j.kind)
            .collect();

        let mut ran = Vec::with_capacity(due.len());
        for kind in due {
            let state = self.execute(kind, now).await;
            ran.push((kind, state));
        }
        ran
    }

    /// Run one job and record its outcome. Errors never propagate.
    pub async fn execute(&mut self, kind: JobKind, now: DateTime<Utc>) -> JobState {
        let Some(index) = self.jobs.iter().position(|j| j.kind == kind) else {
            error!(job = kind.name(), "Job not registered");
            return JobState::Failed;
        };
        self.jobs[index].mark_running(now);
        info!(job = kind.name(), "Executing job");

        let outcome = match self.orchestrator.run_job(kind).await {
            Ok(summary) => JobOutcome::Succeeded(summary),
            Err(e) => {
                error!(job = kind.name(), error = %format!("{:#}", e), "Job failed");
                JobOutcome::Failed(format!("{:#}", e))
            }
        };
        self.jobs[index].finish(outcome)
    }
}
