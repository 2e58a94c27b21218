use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::browser::Browser;
use crate::dispatcher::Dispatcher;
use crate::error::StepFailure;
use crate::handlers::{DefaultHandlers, StepHandlers};
use crate::plan::Plan;
use crate::progress::{ProgressEvent, ProgressSink, StepOutcome};
use crate::session::Session;

/// Progress of the plan currently running on a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionState {
    pub current_step_index: usize,
    pub last_step_succeeded: bool,
    pub last_error: Option<String>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every step succeeded.
    Completed { steps_run: usize },
    /// Step `step_index` failed; later steps never ran.
    Aborted {
        step_index: usize,
        reason: StepFailure,
    },
    /// Cancelled between steps after `steps_run` steps.
    Cancelled { steps_run: usize },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

/// Runs a plan's steps strictly in order and stops at the first failure.
#[derive(Debug, Clone, Default)]
pub struct PlanExecutor<H = DefaultHandlers> {
    dispatcher: Dispatcher<H>,
    cancel: CancellationToken,
}

impl PlanExecutor<DefaultHandlers> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H> PlanExecutor<H> {
    pub fn with_handlers(handlers: H) -> Self {
        Self {
            dispatcher: Dispatcher::new(handlers),
            cancel: CancellationToken::new(),
        }
    }

    /// Checked before every step. A step already running is left to finish.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run<B>(
        &self,
        session: &mut Session<B>,
        plan: &Plan,
        sink: &dyn ProgressSink,
    ) -> RunOutcome
    where
        B: Browser,
        H: StepHandlers<B>,
    {
        *session.state_mut() = ExecutionState::default();
        let total = plan.len();
        info!(steps = total, "executing plan");

        let outcome = self.run_steps(session, plan, sink).await;
        match &outcome {
            RunOutcome::Completed { steps_run } => info!(steps_run, "plan completed"),
            RunOutcome::Aborted { step_index, reason } => {
                warn!(step = step_index, total, reason = reason.label(), "plan aborted")
            }
            RunOutcome::Cancelled { steps_run } => info!(steps_run, total, "plan cancelled"),
        }
        sink.finished(&outcome);
        outcome
    }

    async fn run_steps<B>(
        &self,
        session: &mut Session<B>,
        plan: &Plan,
        sink: &dyn ProgressSink,
    ) -> RunOutcome
    where
        B: Browser,
        H: StepHandlers<B>,
    {
        for (index, action) in plan.steps().iter().enumerate() {
            if self.cancel.is_cancelled() {
                return RunOutcome::Cancelled { steps_run: index };
            }

            session.state_mut().current_step_index = index;
            info!(step = index + 1, total = plan.len(), action = action.label(), "running step");

            let outcome = {
                let mut ctx = session.step_context();
                self.dispatcher.dispatch(&mut ctx, action).await
            };

            let state = session.state_mut();
            state.last_step_succeeded = outcome.is_success();
            state.last_error = match &outcome {
                StepOutcome::Succeeded => None,
                StepOutcome::Failed { reason } => Some(reason.to_string()),
            };

            sink.step(&ProgressEvent {
                step_index: index,
                action: action.label(),
                outcome: outcome.clone(),
            });

            if let StepOutcome::Failed { reason } = outcome {
                return RunOutcome::Aborted {
                    step_index: index,
                    reason,
                };
            }
        }

        RunOutcome::Completed {
            steps_run: plan.len(),
        }
    }
}
