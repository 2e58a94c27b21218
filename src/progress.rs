use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::StepFailure;
use crate::executor::RunOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed { reason: StepFailure },
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded)
    }
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub step_index: usize,
    pub action: &'static str,
    pub outcome: StepOutcome,
}

/// Observer for a running plan. Calls are fire-and-forget; a sink must not
/// block the run.
pub trait ProgressSink: Send + Sync {
    fn step(&self, event: &ProgressEvent);

    fn finished(&self, _outcome: &RunOutcome) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn step(&self, _event: &ProgressEvent) {}
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn step(&self, event: &ProgressEvent) {
        match &event.outcome {
            StepOutcome::Succeeded => {
                info!(step = event.step_index, action = event.action, "step succeeded")
            }
            StepOutcome::Failed { reason } => warn!(
                step = event.step_index,
                action = event.action,
                reason = reason.label(),
                error = %reason,
                "step failed"
            ),
        }
    }

    fn finished(&self, outcome: &RunOutcome) {
        info!(?outcome, "plan finished");
    }
}

/// Everything a [`BroadcastSink`] publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Step(ProgressEvent),
    Finished(RunOutcome),
}

/// Fans events out to any number of subscribers. Sending with no
/// subscribers is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<EngineEvent>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl ProgressSink for BroadcastSink {
    fn step(&self, event: &ProgressEvent) {
        let _ = self.tx.send(EngineEvent::Step(event.clone()));
    }

    fn finished(&self, outcome: &RunOutcome) {
        let _ = self.tx.send(EngineEvent::Finished(outcome.clone()));
    }
}
