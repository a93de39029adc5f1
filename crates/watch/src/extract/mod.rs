// ABOUTME: Extraction entry point: dispatches a compiled site to its strategy and applies hooks.
// ABOUTME: Strategies share ExtractContext for navigation, item construction and in-flight debug capture.

//! Per-site extraction.
//!
//! Every site runs exactly one strategy:
//! - `list`: allow-listed anchors on a listing page, optionally paginated.
//! - `banner`: image links in the homepage banner area.
//! - `click`: JS-routed cards that must be clicked to reveal a detail URL.
//! - `http_scan`: identifiers scanned from a plain HTTP response.
//! - `hover_menu`: a hover-revealed submenu backed by fixed detail pages.
//!
//! Strategies return `Err` only when nothing useful could be done; partial
//! failures are absorbed and reported through [`Extraction`].

pub mod active_window;
pub mod banner;
pub mod click;
pub mod http_scan;
pub mod hover_menu;
pub mod list;

use std::path::PathBuf;

use chrono::NaiveDate;
use url::Url;

use crate::browser::{Navigation, Page};
use crate::debug::DebugCapture;
use crate::error::ExtractionFailure;
use crate::item::{dedupe, Item};
use crate::options::Timeouts;
use crate::resource::Fetcher;
use crate::sites::catalog::HookSpec;
use crate::sites::compiled::{CompiledSite, CompiledStrategy};

/// Result of running one site's extractor.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub items: Vec<Item>,
    /// Set when the site's own health check failed even though items may
    /// have been returned.
    pub hard_failure: bool,
    pub notes: Vec<String>,
}

/// Everything a strategy needs while it runs.
pub struct ExtractContext<'a> {
    pub site: &'a CompiledSite,
    pub page: &'a mut dyn Page,
    pub fetcher: &'a Fetcher,
    pub debug: &'a DebugCapture,
    pub timeouts: &'a Timeouts,
    /// Local date used by date-window hooks.
    pub today: NaiveDate,
}

impl<'a> ExtractContext<'a> {
    pub fn site_id(&self) -> &str {
        self.site.id()
    }

    /// Navigates and waits for the settle pause.
    pub fn goto(&mut self, url: &str, op: &str) -> Result<Navigation, ExtractionFailure> {
        tracing::debug!(site = self.site.id(), url, op, "goto");
        let nav = self
            .page
            .goto(url, self.timeouts.navigation)
            .map_err(|e| ExtractionFailure::from_browser(self.site.id(), op, e))?;
        self.page.settle(self.timeouts.settle);
        Ok(nav)
    }

    /// Builds an item, deriving the key with the site's key rule.
    pub fn make_item(&self, url: &Url, title: impl Into<String>) -> Item {
        Item {
            key: self.site.key.key_for(self.site.id(), url),
            url: url.to_string(),
            title: title.into(),
        }
    }

    /// Captures the current page as `{site}_{suffix}_*`.
    pub fn capture(&self, suffix: &str, reason: &str) -> Vec<PathBuf> {
        let prefix = format!("{}_{}", self.site.id(), suffix);
        self.debug.capture_page(&*self.page, &prefix, reason)
    }
}

/// First non-empty candidate, used for titles.
pub(crate) fn first_non_empty<'s, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'s str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(crate::item::collapse_whitespace)
        .find(|s| !s.is_empty())
}

/// Runs the site's strategy, then its hooks, then a final dedupe.
pub fn extract(ctx: &mut ExtractContext<'_>) -> Result<Extraction, ExtractionFailure> {
    let site = ctx.site;
    let mut extraction = match &site.strategy {
        CompiledStrategy::ListAnchor(list) => list::scrape_list(ctx, list)?,
        CompiledStrategy::Banner(banner) => banner::scrape_banner(ctx, banner)?,
        CompiledStrategy::ClickThrough(click) => click::scrape_click_through(ctx, click)?,
        CompiledStrategy::HttpScan(scan) => http_scan::scrape_http_scan(ctx, scan)?,
        CompiledStrategy::HoverMenu(hover) => hover_menu::scrape_hover_menu(ctx, hover)?,
    };

    for hook in &site.spec.hooks {
        match hook {
            HookSpec::ActiveWindow => {
                let before = extraction.items.len();
                extraction
                    .items
                    .retain(|item| active_window::is_active(&item.title, ctx.today));
                let dropped = before - extraction.items.len();
                if dropped > 0 {
                    tracing::debug!(site = site.id(), dropped, "dropped ended events");
                    extraction
                        .notes
                        .push(format!("active_window dropped {}", dropped));
                }
            }
        }
    }

    extraction.items = dedupe(extraction.items);
    Ok(extraction)
}
