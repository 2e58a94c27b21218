use std::time::Duration;

use crate::error::ConfigError;

pub const CLICKABLE_SELECTOR: &str = "a, button, [role='button'], input[type='submit'], input[type='button'], input[type='reset']";
pub const FORM_SELECTOR: &str = r#"input:not([type="submit"]):not([type="button"]):not([type="reset"]):not([type="checkbox"]):not([type="radio"]), textarea"#;

/// Timeouts, selectors and listing size used while running plans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub navigate_timeout: Duration,
    /// Applies to click, fill, submit and element descriptions.
    pub interaction_timeout: Duration,
    pub query_timeout: Duration,
    pub clickable_selector: String,
    pub form_selector: String,
    /// Maximum rows shown to the decision collaborator.
    pub listing_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            navigate_timeout: Duration::from_secs(60),
            interaction_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(10),
            clickable_selector: CLICKABLE_SELECTOR.to_string(),
            form_selector: FORM_SELECTOR.to_string(),
            listing_limit: 50,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `AGENT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = positive(&lookup, "AGENT_NAVIGATE_TIMEOUT_MS")? {
            config.navigate_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = positive(&lookup, "AGENT_INTERACTION_TIMEOUT_MS")? {
            config.interaction_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = positive(&lookup, "AGENT_QUERY_TIMEOUT_MS")? {
            config.query_timeout = Duration::from_millis(ms);
        }
        if let Some(limit) = positive(&lookup, "AGENT_LISTING_LIMIT")? {
            config.listing_limit = limit as usize;
        }
        if let Some(selector) = selector(&lookup, "AGENT_CLICKABLE_SELECTOR")? {
            config.clickable_selector = selector;
        }
        if let Some(selector) = selector(&lookup, "AGENT_FORM_SELECTOR")? {
            config.form_selector = selector;
        }

        tracing::debug!(?config, "engine config resolved");
        Ok(config)
    }
}

fn positive<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::InvalidNumber { name, value: raw }),
    }
}

fn selector<F>(lookup: &F, name: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Err(ConfigError::Empty { name }),
        Some(raw) => Ok(Some(raw)),
    }
}
