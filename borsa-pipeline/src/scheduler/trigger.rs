//! Manual triggers delivered to the polling loop.

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::jobs::JobKind;

/// Commands accepted by the running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCommand {
    /// Run screen-all now
    ForceRecompute,
    /// Run predict-selected now
    RunPredictionsNow,
}

impl TriggerCommand {
    pub fn job(&self) -> JobKind {
        match self {
            Self::ForceRecompute => JobKind::ScreenAll,
            Self::RunPredictionsNow => JobKind::PredictSelected,
        }
    }
}

/// Sending half handed to callers outside the loop.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<TriggerCommand>,
}

impl TriggerHandle {
    pub async fn send(&self, command: TriggerCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .context("Scheduler is no longer accepting triggers")
    }

    pub async fn force_recompute(&self) -> Result<()> {
        self.send(TriggerCommand::ForceRecompute).await
    }

    pub async fn run_predictions_now(&self) -> Result<()> {
        self.send(TriggerCommand::RunPredictionsNow).await
    }
}

/// Create a trigger channel with room for `buffer` pending commands.
pub fn trigger_channel(buffer: usize) -> (TriggerHandle, mpsc::Receiver<TriggerCommand>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (TriggerHandle { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_arrive_in_order() {
        let (handle, mut rx) = trigger_channel(4);
        handle.force_recompute().await.unwrap();
        handle.run_predictions_now().await.unwrap();
        assert_eq!(rx.recv().await, Some(TriggerCommand::ForceRecompute));
        assert_eq!(rx.recv().await.map(|c| c.job()), Some(JobKind::PredictSelected));
    }

    #[tokio::test]
    async fn test_send_fails_after_receiver_dropped() {
        let (handle, rx) = trigger_channel(1);
        drop(rx);
        assert!(handle.force_recompute().await.is_err());
    }
}
