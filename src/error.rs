use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::cache::{Handle, NotFound, Space};

/// Rejection of an incoming plan payload. Raised before any step runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Every problem found in the payload, in document order.
    #[error("malformed plan: {}", .0.join("; "))]
    Malformed(Vec<String>),
}

impl PlanError {
    pub fn problems(&self) -> &[String] {
        match self {
            PlanError::Malformed(problems) => problems,
        }
    }
}

/// Failure reported by a browser collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowserError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("{0}")]
    Backend(String),
}

/// Why a single step failed. Every handler failure ends up as one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailure {
    #[error("unknown action kind '{action}'")]
    UnknownActionKind { action: String },

    #[error("no handler for interaction kind '{interaction}'")]
    UnknownInteractionKind { interaction: String },

    #[error("element {handle} is not live in the {space} cache")]
    ElementNotFound { space: Space, handle: Handle },

    #[error("no element matches \"{description}\"")]
    NoMatch { description: String },

    #[error("navigation to {url} failed: {detail}")]
    NavigationFailed { url: String, detail: String },

    #[error("{operation} failed: {detail}")]
    InteractionTimeout { operation: String, detail: String },

    #[error("handler finished without acting on the page")]
    NoActionPerformed,
}

impl StepFailure {
    /// Stable label used in logs and progress events.
    pub fn label(&self) -> &'static str {
        match self {
            StepFailure::UnknownActionKind { .. } => "unknown_action_kind",
            StepFailure::UnknownInteractionKind { .. } => "unknown_interaction_kind",
            StepFailure::ElementNotFound { .. } => "element_not_found",
            StepFailure::NoMatch { .. } => "no_match",
            StepFailure::NavigationFailed { .. } => "navigation_failed",
            StepFailure::InteractionTimeout { .. } => "interaction_timeout",
            StepFailure::NoActionPerformed => "no_action_performed",
        }
    }

    pub(crate) fn interaction(operation: &str, err: BrowserError) -> Self {
        StepFailure::InteractionTimeout {
            operation: operation.to_string(),
            detail: err.to_string(),
        }
    }
}

impl From<NotFound> for StepFailure {
    fn from(miss: NotFound) -> Self {
        StepFailure::ElementNotFound {
            space: miss.space,
            handle: miss.handle,
        }
    }
}

/// Bad value in the environment-driven engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },
}
