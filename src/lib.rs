//! Runs typed browser plans (navigate, click, type) one step at a time
//! against a live page, halting at the first failed step.

pub mod browser;
pub mod cache;
pub mod config;
pub mod decide;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod plan;
pub mod progress;
pub mod session;

pub use browser::{Browser, ElementSummary};
pub use cache::{ElementHandleCache, Handle, NotFound, Space};
pub use config::EngineConfig;
pub use decide::{Decider, ElementListing, KeywordDecider, ListingPage};
pub use error::{BrowserError, ConfigError, PlanError, StepFailure};
pub use executor::{ExecutionState, PlanExecutor, RunOutcome};
pub use plan::{Action, Interaction, InteractionKind, Plan};
pub use progress::{
    BroadcastSink, EngineEvent, NullSink, ProgressEvent, ProgressSink, StepOutcome, TracingSink,
};
pub use session::Session;
