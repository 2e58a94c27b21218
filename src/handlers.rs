//! One handler per action kind, plus the per-step context they act through.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::browser::Browser;
use crate::cache::{ElementHandleCache, Handle, NotFound, Space};
use crate::config::EngineConfig;
use crate::decide::{Decider, ElementListing, ListingPage, build_listing};
use crate::error::{BrowserError, StepFailure};
use crate::plan::InteractionKind;

/// Everything a handler may touch while running one step.
///
/// Page-changing calls go through here so the dispatcher can tell whether a
/// handler actually did anything.
pub struct StepContext<'a, B: Browser> {
    browser: &'a B,
    cache: &'a mut ElementHandleCache<B::Element>,
    decider: &'a dyn Decider,
    config: &'a EngineConfig,
    actions: u32,
}

impl<'a, B: Browser> StepContext<'a, B> {
    pub fn new(
        browser: &'a B,
        cache: &'a mut ElementHandleCache<B::Element>,
        decider: &'a dyn Decider,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            browser,
            cache,
            decider,
            config,
            actions: 0,
        }
    }

    /// Navigations and element interactions issued so far in this step.
    pub fn actions_performed(&self) -> u32 {
        self.actions
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    pub async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.actions += 1;
        self.browser
            .navigate(url, self.config.navigate_timeout)
            .await?;
        self.cache.invalidate_all();
        Ok(())
    }

    pub async fn refresh(&mut self, space: Space) -> Result<usize, BrowserError> {
        let config = self.config;
        let selector = match space {
            Space::Clickable => &config.clickable_selector,
            Space::FormField => &config.form_selector,
        };
        self.cache
            .refresh(self.browser, space, selector, config.query_timeout)
            .await
    }

    /// The window of `space` starting at handle `start`.
    pub async fn listing(&self, space: Space, start: Handle) -> ListingPage {
        build_listing(
            self.browser,
            &*self.cache,
            space,
            start,
            self.config.listing_limit,
            self.config.interaction_timeout,
        )
        .await
    }

    pub async fn decide(
        &self,
        kind: InteractionKind,
        description: &str,
        listing: &[ElementListing],
    ) -> Option<Handle> {
        self.decider.choose(kind, description, listing).await
    }

    pub fn resolve(&self, space: Space, handle: Handle) -> Result<B::Element, NotFound> {
        self.cache.resolve(space, handle).cloned()
    }

    pub async fn click(&mut self, element: &B::Element) -> Result<(), BrowserError> {
        self.actions += 1;
        self.browser
            .click(element, self.config.interaction_timeout)
            .await
    }

    pub async fn fill(&mut self, element: &B::Element, text: &str) -> Result<(), BrowserError> {
        self.actions += 1;
        self.browser
            .fill(element, text, self.config.interaction_timeout)
            .await
    }

    pub async fn submit(&mut self, element: &B::Element) -> Result<(), BrowserError> {
        self.actions += 1;
        self.browser
            .submit(element, self.config.interaction_timeout)
            .await
    }
}

/// The dispatch table: one entry per handled action kind.
#[async_trait]
pub trait StepHandlers<B: Browser>: Send + Sync {
    async fn navigate(&self, ctx: &mut StepContext<'_, B>, url: &str) -> Result<(), StepFailure>;

    async fn click(
        &self,
        ctx: &mut StepContext<'_, B>,
        description: &str,
    ) -> Result<(), StepFailure>;

    async fn type_text(
        &self,
        ctx: &mut StepContext<'_, B>,
        description: &str,
        value: &str,
        submit: bool,
    ) -> Result<(), StepFailure>;
}

/// Handlers that drive the browser collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandlers;

#[async_trait]
impl<B: Browser> StepHandlers<B> for DefaultHandlers {
    async fn navigate(&self, ctx: &mut StepContext<'_, B>, url: &str) -> Result<(), StepFailure> {
        NavigateHandler.run(ctx, url).await
    }

    async fn click(
        &self,
        ctx: &mut StepContext<'_, B>,
        description: &str,
    ) -> Result<(), StepFailure> {
        ClickHandler.run(ctx, description).await
    }

    async fn type_text(
        &self,
        ctx: &mut StepContext<'_, B>,
        description: &str,
        value: &str,
        submit: bool,
    ) -> Result<(), StepFailure> {
        TypeHandler.run(ctx, description, value, submit).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NavigateHandler;

impl NavigateHandler {
    pub async fn run<B: Browser>(
        &self,
        ctx: &mut StepContext<'_, B>,
        url: &str,
    ) -> Result<(), StepFailure> {
        info!(url, "navigating");
        ctx.navigate(url)
            .await
            .map_err(|e| StepFailure::NavigationFailed {
                url: url.to_string(),
                detail: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHandler;

impl ClickHandler {
    pub async fn run<B: Browser>(
        &self,
        ctx: &mut StepContext<'_, B>,
        description: &str,
    ) -> Result<(), StepFailure> {
        let element = pick(ctx, Space::Clickable, InteractionKind::Click, description).await?;
        ctx.click(&element)
            .await
            .map_err(|e| StepFailure::interaction("click", e))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TypeHandler;

impl TypeHandler {
    pub async fn run<B: Browser>(
        &self,
        ctx: &mut StepContext<'_, B>,
        description: &str,
        value: &str,
        submit: bool,
    ) -> Result<(), StepFailure> {
        let element = pick(ctx, Space::FormField, InteractionKind::Type, description).await?;
        ctx.fill(&element, value)
            .await
            .map_err(|e| StepFailure::interaction("fill", e))?;
        if submit {
            ctx.submit(&element)
                .await
                .map_err(|e| StepFailure::interaction("submit", e))?;
        }
        Ok(())
    }
}

/// Refresh `space`, then offer the decider one listing window at a time
/// until it chooses a handle or the space runs out. Resolve its choice.
async fn pick<B: Browser>(
    ctx: &mut StepContext<'_, B>,
    space: Space,
    kind: InteractionKind,
    description: &str,
) -> Result<B::Element, StepFailure> {
    let found = ctx
        .refresh(space)
        .await
        .map_err(|e| StepFailure::interaction("element query", e))?;
    info!(%space, found, description, "choosing element");

    let mut start = 0;
    let handle = loop {
        let page = ctx.listing(space, start).await;
        debug!(%space, start, listed = page.rows.len(), "offering listing window");
        if let Some(handle) = ctx.decide(kind, description, &page.rows).await {
            break handle;
        }
        match page.next {
            Some(next) => start = next,
            None => {
                return Err(StepFailure::NoMatch {
                    description: description.to_string(),
                });
            }
        }
    };
    debug!(%space, handle, "decider chose element");

    Ok(ctx.resolve(space, handle)?)
}
