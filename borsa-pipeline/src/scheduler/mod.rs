//! Job scheduling for the pipeline.
//!
//! Three cron-triggered jobs (screen-all, predict-selected, weekly report)
//! run serially from a single polling loop. Manual triggers arrive over a
//! channel and run on the same loop.
//!
//! # Default Schedule (Europe/Istanbul)
//!
//! - 18:30 daily: screen the universe
//! - 20:00 daily: forecast selected symbols
//! - 09:00 Monday: weekly prediction report

pub mod jobs;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod single_flight;
pub mod trigger;

pub use jobs::{JobKind, JobOutcome, JobState, ScheduleJob};
pub use orchestrator::{Clock, JobSummary, Orchestrator};
pub use report::{is_success, log_prediction_summary, PredictionOutcome, WeeklyReport};
pub use runner::Scheduler;
pub use single_flight::SingleFlight;
pub use trigger::{trigger_channel, TriggerCommand, TriggerHandle};
