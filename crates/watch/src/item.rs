// ABOUTME: Item model and normalisation helpers: href resolution, whitespace collapsing, dedup keys.
// ABOUTME: ItemList keeps the first item per key in insertion order.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;
use url::Url;

/// A candidate promotion found on a page during this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    /// Stable dedup identifier; the only part that is persisted.
    pub key: String,
    pub url: String,
    pub title: String,
}

/// Title used for banner links that carry no text, label or alt.
pub const BANNER_PLACEHOLDER: &str = "(banner)";

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves a raw href against `base`.
///
/// Returns `None` for empty or fragment-only hrefs, pseudo-URLs
/// (`javascript:`, `mailto:`, `tel:`, `data:`) and anything that does not end
/// up as http(s). Fragments are stripped from the result.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|p| lower.starts_with(p))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// How a site's dedup key is derived from an item URL.
#[derive(Debug, Clone)]
pub enum KeyRule {
    /// The canonical absolute URL.
    Url,
    /// The canonical URL with its query string removed.
    UrlWithoutQuery,
    /// `"{site}:{id}"` where `id` is the first capture group of the pattern.
    Capture(Regex),
}

impl KeyRule {
    /// Computes the dedup key for `url`. A `Capture` rule that does not
    /// match falls back to the canonical URL.
    pub fn key_for(&self, site: &str, url: &Url) -> String {
        match self {
            KeyRule::Url => url.to_string(),
            KeyRule::UrlWithoutQuery => {
                let mut u = url.clone();
                u.set_query(None);
                u.to_string()
            }
            KeyRule::Capture(re) => match capture_id(re, url.as_str()) {
                Some(id) => format!("{}:{}", site, id),
                None => url.to_string(),
            },
        }
    }
}

/// First capture group of `re` in `text`, or the whole match when the
/// pattern has no groups.
pub fn capture_id(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
}

/// Insertion-ordered item collection that drops later items with a key it
/// has already seen.
#[derive(Debug, Default, Clone)]
pub struct ItemList {
    items: Vec<Item>,
    keys: HashSet<String>,
}

impl ItemList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `item` unless its key is already present. Returns true if added.
    pub fn push(&mut self, item: Item) -> bool {
        if self.keys.contains(&item.key) {
            return false;
        }
        self.keys.insert(item.key.clone());
        self.items.push(item);
        true
    }

    pub fn extend<I: IntoIterator<Item = Item>>(&mut self, items: I) {
        for item in items {
            self.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Item> {
        self.items
    }
}

impl FromIterator<Item> for ItemList {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        let mut list = ItemList::new();
        list.extend(iter);
        list
    }
}

/// Dedupes a vector by key, keeping first occurrences in order.
pub fn dedupe(items: Vec<Item>) -> Vec<Item> {
    items.into_iter().collect::<ItemList>().into_vec()
}
