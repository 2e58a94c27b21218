use std::sync::Arc;

use serde_json::Value;

use crate::browser::Browser;
use crate::cache::ElementHandleCache;
use crate::config::EngineConfig;
use crate::decide::Decider;
use crate::error::PlanError;
use crate::executor::{ExecutionState, PlanExecutor, RunOutcome};
use crate::handlers::StepContext;
use crate::plan::Plan;
use crate::progress::ProgressSink;

/// One user's browser page with its handle cache and run state.
///
/// Runs take `&mut self`, so a session executes at most one plan at a time.
/// Sessions never share a page or a cache.
pub struct Session<B: Browser> {
    browser: B,
    cache: ElementHandleCache<B::Element>,
    state: ExecutionState,
    decider: Arc<dyn Decider>,
    config: EngineConfig,
}

impl<B: Browser> Session<B> {
    pub fn new(browser: B, decider: Arc<dyn Decider>, config: EngineConfig) -> Self {
        Self {
            browser,
            cache: ElementHandleCache::new(),
            state: ExecutionState::default(),
            decider,
            config,
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn cache(&self) -> &ElementHandleCache<B::Element> {
        &self.cache
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn state_mut(&mut self) -> &mut ExecutionState {
        &mut self.state
    }

    pub(crate) fn step_context(&mut self) -> StepContext<'_, B> {
        StepContext::new(
            &self.browser,
            &mut self.cache,
            self.decider.as_ref(),
            &self.config,
        )
    }

    /// Run `plan` with the default handlers.
    pub async fn execute(&mut self, plan: &Plan, sink: &dyn ProgressSink) -> RunOutcome {
        PlanExecutor::new().run(self, plan, sink).await
    }

    /// Validate an untyped payload, then run it. A malformed payload runs no steps.
    pub async fn execute_value(
        &mut self,
        payload: &Value,
        sink: &dyn ProgressSink,
    ) -> Result<RunOutcome, PlanError> {
        let plan = Plan::from_value(payload)?;
        Ok(self.execute(&plan, sink).await)
    }

    /// Tear the session down and hand back the browser.
    pub fn into_browser(self) -> B {
        self.browser
    }
}
