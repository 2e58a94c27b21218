//! Integer handles for live page elements.
//!
//! Elements belong to the browser and die with the page, so plan steps and
//! decision collaborators only ever see small integers. A handle is looked up
//! again right before the interaction that needs it. Navigation clears every
//! table through [`ElementHandleCache::invalidate_all`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::browser::Browser;
use crate::error::BrowserError;

pub type Handle = usize;

/// The two independent handle namespaces. A handle value can exist in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Space {
    Clickable,
    FormField,
}

impl std::fmt::Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Space::Clickable => f.write_str("clickable"),
            Space::FormField => f.write_str("form"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("handle {handle} is not live in the {space} space")]
pub struct NotFound {
    pub space: Space,
    pub handle: Handle,
}

#[derive(Debug)]
struct Table<R> {
    entries: Vec<R>,
    generation: u64,
}

impl<R> Table<R> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            generation: 0,
        }
    }

    fn reset(&mut self, entries: Vec<R>) {
        self.entries = entries;
        self.generation += 1;
    }
}

/// Handle tables for the page currently loaded in one session.
#[derive(Debug)]
pub struct ElementHandleCache<R> {
    clickable: Table<R>,
    form: Table<R>,
}

impl<R> Default for ElementHandleCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ElementHandleCache<R> {
    pub fn new() -> Self {
        Self {
            clickable: Table::new(),
            form: Table::new(),
        }
    }

    fn table(&self, space: Space) -> &Table<R> {
        match space {
            Space::Clickable => &self.clickable,
            Space::FormField => &self.form,
        }
    }

    fn table_mut(&mut self, space: Space) -> &mut Table<R> {
        match space {
            Space::Clickable => &mut self.clickable,
            Space::FormField => &mut self.form,
        }
    }

    /// Drop everything in `space` and hand out handles `0..n` in the given order.
    pub fn replace(&mut self, space: Space, elements: Vec<R>) -> usize {
        let table = self.table_mut(space);
        table.reset(elements);
        table.entries.len()
    }

    /// Query the page for `selector` and make the result the only live
    /// generation of `space`. A failed query leaves the space empty.
    pub async fn refresh<B>(
        &mut self,
        browser: &B,
        space: Space,
        selector: &str,
        timeout: Duration,
    ) -> Result<usize, BrowserError>
    where
        B: Browser<Element = R>,
    {
        match browser.query_selector(selector, timeout).await {
            Ok(elements) => {
                let count = self.replace(space, elements);
                let generation = self.generation(space);
                debug!(%space, count, generation, "handle space refreshed");
                Ok(count)
            }
            Err(e) => {
                self.replace(space, Vec::new());
                warn!(%space, error = %e, "element query failed; space cleared");
                Err(e)
            }
        }
    }

    pub fn resolve(&self, space: Space, handle: Handle) -> Result<&R, NotFound> {
        self.table(space)
            .entries
            .get(handle)
            .ok_or(NotFound { space, handle })
    }

    /// Forget both spaces. Runs once after every successful navigation.
    pub fn invalidate_all(&mut self) {
        self.clickable.reset(Vec::new());
        self.form.reset(Vec::new());
        debug!("element handle cache invalidated");
    }

    pub fn len(&self, space: Space) -> usize {
        self.table(space).entries.len()
    }

    pub fn is_empty(&self, space: Space) -> bool {
        self.table(space).entries.is_empty()
    }

    /// Bumped on every refresh or clear of `space`.
    pub fn generation(&self, space: Space) -> u64 {
        self.table(space).generation
    }

    pub fn handles(&self, space: Space) -> impl Iterator<Item = (Handle, &R)> {
        self.table(space).entries.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_dense_in_query_order() {
        let mut cache = ElementHandleCache::new();
        assert_eq!(cache.replace(Space::Clickable, vec!["A", "B", "C"]), 3);
        assert_eq!(cache.resolve(Space::Clickable, 0), Ok(&"A"));
        assert_eq!(cache.resolve(Space::Clickable, 1), Ok(&"B"));
        assert_eq!(cache.resolve(Space::Clickable, 2), Ok(&"C"));
        assert!(cache.resolve(Space::Clickable, 3).is_err());
    }

    #[test]
    fn second_refresh_restarts_at_zero() {
        let mut cache = ElementHandleCache::new();
        cache.replace(Space::Clickable, vec!["A", "B", "C"]);
        cache.replace(Space::Clickable, vec!["D"]);
        assert_eq!(cache.resolve(Space::Clickable, 0), Ok(&"D"));
        assert_eq!(
            cache.resolve(Space::Clickable, 1),
            Err(NotFound {
                space: Space::Clickable,
                handle: 1
            })
        );
        assert_eq!(cache.generation(Space::Clickable), 2);
    }

    #[test]
    fn spaces_are_independent() {
        let mut cache = ElementHandleCache::new();
        cache.replace(Space::Clickable, vec!["link"]);
        cache.replace(Space::FormField, vec!["input", "textarea"]);
        cache.replace(Space::Clickable, vec!["button"]);

        assert_eq!(cache.resolve(Space::Clickable, 0), Ok(&"button"));
        assert_eq!(cache.resolve(Space::FormField, 0), Ok(&"input"));
        assert_eq!(cache.len(Space::FormField), 2);
        assert_eq!(cache.generation(Space::FormField), 1);
    }

    #[test]
    fn invalidate_all_clears_both_spaces() {
        let mut cache = ElementHandleCache::new();
        cache.replace(Space::Clickable, vec![1, 2]);
        cache.replace(Space::FormField, vec![3]);
        cache.invalidate_all();

        assert!(cache.is_empty(Space::Clickable));
        assert!(cache.is_empty(Space::FormField));
        assert!(cache.resolve(Space::Clickable, 0).is_err());
        assert!(cache.resolve(Space::FormField, 0).is_err());
        assert_eq!(cache.handles(Space::Clickable).count(), 0);
    }
}
