use std::collections::BTreeMap;
use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::browser::Browser;
use crate::cache::{ElementHandleCache, Handle, Space};
use crate::plan::InteractionKind;

/// One row of the element table shown to a decision collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementListing {
    pub handle: Handle,
    pub tag: String,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
}

/// Picks the element that best matches a natural-language description.
#[async_trait]
pub trait Decider: Send + Sync {
    /// `None` means nothing in the listing is a reasonable match.
    async fn choose(
        &self,
        kind: InteractionKind,
        description: &str,
        listing: &[ElementListing],
    ) -> Option<Handle>;
}

/// One window of the element table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub rows: Vec<ElementListing>,
    /// First handle not yet described, when the space holds more.
    pub next: Option<Handle>,
}

/// Describe the live elements of `space` in handle order from `start`,
/// skipping hidden ones, until `limit` rows are collected.
pub async fn build_listing<B: Browser>(
    browser: &B,
    cache: &ElementHandleCache<B::Element>,
    space: Space,
    start: Handle,
    limit: usize,
    timeout: Duration,
) -> ListingPage {
    let mut page = ListingPage::default();
    for (handle, element) in cache.handles(space).skip(start) {
        if page.rows.len() >= limit {
            page.next = Some(handle);
            break;
        }
        match browser.describe(element, timeout).await {
            Ok(Some(summary)) => page.rows.push(ElementListing {
                handle,
                tag: summary.tag,
                text: summary.text,
                attributes: summary.attributes,
            }),
            Ok(None) => {}
            Err(e) => debug!(%space, handle, error = %e, "could not describe element; skipped"),
        }
    }
    page
}

/// Attributes that usually carry the human-facing name of a control.
const NAMING_ATTRIBUTES: &[&str] = &[
    "aria-label",
    "placeholder",
    "title",
    "name",
    "id",
    "alt",
    "value",
    "type",
    "role",
    "href",
];

const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "with", "and", "or", "of", "on", "in", "to", "for", "that", "this", "is",
    "text", "labeled", "labelled", "called", "named", "element",
];

/// Token-overlap matcher over visible text and naming attributes.
///
/// Each description word found in an element scores one point, words that
/// match the element's tag or role score half. The earliest element wins ties.
#[derive(Debug, Clone, Default)]
pub struct KeywordDecider;

#[async_trait]
impl Decider for KeywordDecider {
    async fn choose(
        &self,
        kind: InteractionKind,
        description: &str,
        listing: &[ElementListing],
    ) -> Option<Handle> {
        let wanted: Vec<String> = tokens(description)
            .into_iter()
            .filter(|t| !FILLER_WORDS.contains(&t.as_str()))
            .collect();
        if wanted.is_empty() {
            return None;
        }

        let mut best: Option<(Handle, u32)> = None;
        for row in listing {
            let score = score(&wanted, row);
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((row.handle, score));
            }
        }
        debug!(%kind, description, candidates = listing.len(), chosen = ?best, "keyword decision");
        best.map(|(handle, _)| handle)
    }
}

fn score(wanted: &[String], row: &ElementListing) -> u32 {
    let mut words: HashSet<String> = tokens(&row.text).into_iter().collect();
    for name in NAMING_ATTRIBUTES {
        if let Some(value) = row.attributes.get(*name) {
            words.extend(tokens(value));
        }
    }
    let structural: HashSet<String> = tokens(&row.tag)
        .into_iter()
        .chain(row.attributes.get("role").map(|r| tokens(r)).unwrap_or_default())
        .collect();

    // doubled so a structural hit can count half
    wanted
        .iter()
        .map(|w| {
            if words.contains(w) {
                2
            } else if structural.contains(w) || (w == "link" && row.tag == "a") {
                1
            } else {
                0
            }
        })
        .sum()
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
