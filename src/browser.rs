use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BrowserError;

/// The atomic page primitives the engine relies on.
///
/// `Element` is an opaque reference into the live page. The engine stores it
/// in the handle cache and hands it back to the browser, never looking inside.
/// Every call except `screenshot` is bounded by the timeout it receives.
#[async_trait]
pub trait Browser: Send + Sync + 'static {
    type Element: Clone + Send + Sync + 'static;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// All elements matching `selector`, in document order.
    async fn query_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Vec<Self::Element>, BrowserError>;

    /// Tag, text and attributes of an element, or `None` when it is not visible.
    async fn describe(
        &self,
        element: &Self::Element,
        timeout: Duration,
    ) -> Result<Option<ElementSummary>, BrowserError>;

    async fn click(&self, element: &Self::Element, timeout: Duration) -> Result<(), BrowserError>;

    /// Replace the element's current value with `text`.
    async fn fill(
        &self,
        element: &Self::Element,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    /// Trigger the default submit action (Enter) on the element.
    async fn submit(&self, element: &Self::Element, timeout: Duration) -> Result<(), BrowserError>;

    async fn screenshot(&self) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSummary {
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}
