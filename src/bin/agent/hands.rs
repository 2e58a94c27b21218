use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::DOM::NodeId;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser as Chrome, Element, LaunchOptions, Tab};
use plan_engine::{Browser, BrowserError, ElementSummary};
use tracing::{info, warn};

use crate::dom;

const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(60);
const JPEG_QUALITY: u32 = 80;

pub struct LaunchSettings {
    /// DevTools endpoint of an already running Chrome, tried first.
    pub attach_url: Option<String>,
    pub headless: bool,
}

/// DOM node id of an element on the current page.
///
/// Ids stay valid until the next `DOM.getDocument`, which only `query_selector`
/// issues. The engine re-queries a space before every interaction, so a stored
/// id is never used across that boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(NodeId);

/// One Chrome tab driven through the DevTools protocol.
#[derive(Clone)]
pub struct ChromeBrowser {
    _chrome: Arc<Chrome>,
    tab: Arc<Tab>,
}

impl ChromeBrowser {
    /// Attach to a running Chrome if one answers, otherwise start our own.
    /// Blocking; call from `spawn_blocking`.
    pub fn launch(settings: &LaunchSettings) -> Result<Self> {
        if let Some(url) = &settings.attach_url {
            info!(url = %url, "attempting to attach to existing Chrome");
            match Chrome::connect(url.clone()) {
                Ok(chrome) => {
                    let tab = {
                        let tabs = chrome.get_tabs();
                        let tabs = tabs.lock().map_err(|_| anyhow!("tab list lock poisoned"))?;
                        tabs.first().cloned()
                    };
                    let tab = match tab {
                        Some(tab) => tab,
                        None => chrome.new_tab()?,
                    };
                    info!("attached to existing Chrome");
                    return Ok(Self {
                        _chrome: Arc::new(chrome),
                        tab,
                    });
                }
                Err(e) => warn!(error = %e, "could not attach; launching a new Chrome"),
            }
        }

        let profile = profile_dir()?;
        std::fs::create_dir_all(&profile)?;

        let options = LaunchOptions {
            headless: settings.headless,
            path: find_chrome(),
            user_data_dir: Some(profile.clone()),
            args: vec![
                std::ffi::OsStr::new("--no-first-run"),
                std::ffi::OsStr::new("--no-default-browser-check"),
                std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
                std::ffi::OsStr::new("--disable-infobars"),
                std::ffi::OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        info!(profile = %profile.display(), headless = settings.headless, "starting Chrome");
        let chrome = Chrome::new(options).map_err(|e| anyhow!("Browser launch failed: {e}"))?;
        let tab = chrome.new_tab()?;
        info!("Chrome ready");

        Ok(Self {
            _chrome: Arc::new(chrome),
            tab,
        })
    }

    /// Run a blocking DevTools call off the async runtime, bounded by `timeout`.
    /// The tab's own wait limit is raised to match, so headless_chrome never
    /// gives up before we do. A call that overruns keeps going in the
    /// background; only its result is dropped.
    async fn blocking<T, F>(&self, timeout: Duration, call: F) -> Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = self.tab.clone();
        let task = tokio::task::spawn_blocking(move || {
            tab.set_default_timeout(timeout);
            call(tab.as_ref())
        });
        match tokio::time::timeout(timeout, task).await {
            Err(_) => Err(BrowserError::Timeout(timeout)),
            Ok(Err(join)) => Err(BrowserError::Backend(format!(
                "browser task panicked: {join}"
            ))),
            Ok(Ok(result)) => result.map_err(|e| BrowserError::Backend(format!("{e:#}"))),
        }
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    type Element = NodeRef;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let url = url.to_string();
        self.blocking(timeout, move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn query_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Vec<NodeRef>, BrowserError> {
        let selector = selector.to_string();
        self.blocking(timeout, move |tab| {
            let root = tab.get_document()?.node_id;
            let elements = tab.run_query_selector_all_on_node(root, &selector)?;
            Ok(elements.into_iter().map(|e| NodeRef(e.node_id)).collect())
        })
        .await
    }

    async fn describe(
        &self,
        element: &NodeRef,
        timeout: Duration,
    ) -> Result<Option<ElementSummary>, BrowserError> {
        let node = element.0;
        self.blocking(timeout, move |tab| {
            let remote = Element::new(tab, node)?.call_js_fn(dom::DESCRIBE_JS, vec![], false)?;
            dom::parse_summary(remote.value)
        })
        .await
    }

    async fn click(&self, element: &NodeRef, timeout: Duration) -> Result<(), BrowserError> {
        let node = element.0;
        self.blocking(timeout, move |tab| {
            Element::new(tab, node)?.click()?;
            Ok(())
        })
        .await
    }

    async fn fill(
        &self,
        element: &NodeRef,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let node = element.0;
        let text = text.to_string();
        self.blocking(timeout, move |tab| {
            let element = Element::new(tab, node)?;
            element.call_js_fn(dom::CLEAR_VALUE_JS, vec![], false)?;
            element.type_into(&text)?;
            Ok(())
        })
        .await
    }

    async fn submit(&self, element: &NodeRef, timeout: Duration) -> Result<(), BrowserError> {
        let node = element.0;
        self.blocking(timeout, move |tab| {
            Element::new(tab, node)?.focus()?;
            tab.press_key("Enter")?;
            Ok(())
        })
        .await
    }

    async fn screenshot(&self) -> Option<Vec<u8>> {
        let shot = self
            .blocking(SCREENSHOT_TIMEOUT, |tab| {
                tab.capture_screenshot(
                    CaptureScreenshotFormatOption::Jpeg,
                    Some(JPEG_QUALITY),
                    None,
                    true,
                )
            })
            .await;
        match shot {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "screenshot failed");
                None
            }
        }
    }
}

/// Persistent profile so logins survive between runs.
fn profile_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| anyhow!("no local data directory"))?;
    Ok(base.join("plan-engine").join("chrome-profile"))
}

/// Well-known install locations; `None` lets headless_chrome search on its own.
fn find_chrome() -> Option<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
        PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        PathBuf::from("/usr/bin/google-chrome"),
        PathBuf::from("/usr/bin/chromium"),
    ];
    if let Some(local) = dirs::data_local_dir() {
        candidates.push(local.join(r"Google\Chrome\Application\chrome.exe"));
    }
    candidates.into_iter().find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_browser<B: Browser>() {}

    #[test]
    fn chrome_satisfies_the_engine_bounds() {
        assert_browser::<ChromeBrowser>();
        let node = NodeRef(7);
        let copy = node;
        assert_eq!(node, copy);
    }

    #[tokio::test]
    #[ignore = "needs a local Chrome"]
    async fn navigation_honours_timeouts_past_the_tab_default() {
        let settings = LaunchSettings {
            attach_url: None,
            headless: true,
        };
        let browser = tokio::task::spawn_blocking(move || ChromeBrowser::launch(&settings))
            .await
            .unwrap()
            .unwrap();

        browser
            .navigate("about:blank", Duration::from_secs(45))
            .await
            .unwrap();
        let links = browser
            .query_selector("a", Duration::from_secs(45))
            .await
            .unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn chrome_lookup_only_returns_existing_paths() {
        if let Some(path) = find_chrome() {
            assert!(path.exists());
        }
    }
}
