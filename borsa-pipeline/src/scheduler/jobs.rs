//! Scheduled jobs and their trigger evaluation.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use borsa_common::config::ScheduleTimes;

use super::orchestrator::JobSummary;

/// Job type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Screen the whole universe
    ScreenAll,
    /// Forecast every selected symbol
    PredictSelected,
    /// Evaluate last week's predictions
    WeeklyReport,
}

impl JobKind {
    /// Get job name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::ScreenAll => "screen_all",
            Self::PredictSelected => "predict_selected",
            Self::WeeklyReport => "weekly_report",
        }
    }
}

/// Lifecycle: Idle → Running → {Succeeded, Failed} → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Result of the most recent run.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Succeeded(JobSummary),
    Failed(String),
}

/// A registered job. Lives in memory only.
#[derive(Debug, Clone)]
pub struct ScheduleJob {
    pub kind: JobKind,
    pub trigger_spec: String,
    schedule: Schedule,
    tz: Tz,
    pub last_run: Option<DateTime<Utc>>,
    pub last_result: Option<JobOutcome>,
    pub state: JobState,
}

impl ScheduleJob {
    /// Parse a six-field cron expression evaluated in `tz`.
    pub fn new(kind: JobKind, trigger_spec: &str, tz: Tz) -> Result<Self> {
        let schedule = Schedule::from_str(trigger_spec)
            .with_context(|| format!("Invalid {} cron: {}", kind.name(), trigger_spec))?;
        Ok(Self {
            kind,
            trigger_spec: trigger_spec.to_string(),
            schedule,
            tz,
            last_run: None,
            last_result: None,
            state: JobState::Idle,
        })
    }

    /// All three jobs from configuration.
    pub fn from_config(times: &ScheduleTimes, tz: Tz) -> Result<Vec<Self>> {
        Ok(vec![
            Self::new(JobKind::ScreenAll, &times.screen, tz)?,
            Self::new(JobKind::PredictSelected, &times.predict, tz)?,
            Self::new(JobKind::WeeklyReport, &times.report, tz)?,
        ])
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.tz))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    /// True when a fire time fell inside `(now - window, now]` and the job has
    /// not run since.
    pub fn is_due(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let floor = now - window;
        let after = match self.last_run {
            Some(last) if last > floor => last,
            _ => floor,
        };
        self.next_after(after).is_some_and(|t| t <= now)
    }

    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        self.state = JobState::Running;
        self.last_run = Some(now);
    }

    /// Record the outcome, return to idle and report the terminal state.
    pub fn finish(&mut self, outcome: JobOutcome) -> JobState {
        let terminal = match outcome {
            JobOutcome::Succeeded(_) => JobState::Succeeded,
            JobOutcome::Failed(_) => JobState::Failed,
        };
        self.last_result = Some(outcome);
        self.state = JobState::Idle;
        terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Istanbul;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Istanbul
            .with_ymd_and_hms(y, m, d, h, min, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_daily_job_due_in_window() {
        let job = ScheduleJob::new(JobKind::ScreenAll, "0 30 18 * * *", Istanbul).unwrap();
        let window = Duration::seconds(60);
        assert!(job.is_due(at(2024, 5, 6, 18, 30, 20), window));
        assert!(!job.is_due(at(2024, 5, 6, 18, 29, 50), window));
        assert!(!job.is_due(at(2024, 5, 6, 18, 32, 0), window));
    }

    #[test]
    fn test_not_due_twice() {
        let mut job = ScheduleJob::new(JobKind::PredictSelected, "0 0 20 * * *", Istanbul).unwrap();
        let window = Duration::seconds(60);
        let first = at(2024, 5, 6, 20, 0, 10);
        assert!(job.is_due(first, window));
        job.mark_running(first);
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.finish(JobOutcome::Failed("boom".into())), JobState::Failed);
        assert_eq!(job.state, JobState::Idle);
        assert!(!job.is_due(at(2024, 5, 6, 20, 0, 40), window));
    }

    #[test]
    fn test_weekly_job_fires_on_monday_only() {
        let job = ScheduleJob::new(JobKind::WeeklyReport, "0 0 9 * * Mon", Istanbul).unwrap();
        let window = Duration::seconds(60);
        // 2024-05-06 is a Monday
        assert!(job.is_due(at(2024, 5, 6, 9, 0, 30), window));
        assert!(!job.is_due(at(2024, 5, 7, 9, 0, 30), window));
    }

    #[test]
    fn test_invalid_cron_rejected() {
        assert!(ScheduleJob::new(JobKind::ScreenAll, "every day", Istanbul).is_err());
    }

    #[test]
    fn test_from_config_order() {
        let jobs = ScheduleJob::from_config(&ScheduleTimes::default(), Istanbul).unwrap();
        let kinds: Vec<_> = jobs.iter().map(|j| j.kind).collect();
        assert_eq!(
            kinds,
            vec![JobKind::ScreenAll, JobKind::PredictSelected, JobKind::WeeklyReport]
        );
    }
}
