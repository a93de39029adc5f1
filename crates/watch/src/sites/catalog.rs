// ABOUTME: Serde data model for the monitored-site catalog: SiteSpec, Strategy, KeySpec and HookSpec.
// ABOUTME: Each site picks one extraction strategy and is parameterised by URLs, selectors and patterns.

//! Site catalog definitions.
//!
//! A site is described entirely by data: which extraction strategy to run,
//! where to start, which links count as promotions, and how dedup keys are
//! derived. Bespoke behaviour is limited to the `hover_menu` strategy and the
//! optional post-filter hooks.

use serde::{Deserialize, Serialize};

fn default_link_selector() -> String {
    "a[href]".to_string()
}

fn default_list_max() -> usize {
    30
}

fn default_banner_max() -> usize {
    20
}

fn default_max_cards() -> usize {
    12
}

fn default_max_pages() -> usize {
    20
}

fn default_stop_after_empty() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_banner_selectors() -> Vec<String> {
    vec![
        ".swiper-slide a[href]".to_string(),
        ".main-banner a[href]".to_string(),
        ".slick-slide a[href]".to_string(),
        "a[href]".to_string(),
    ]
}

/// How a site's dedup key is derived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeySpec {
    /// The canonical absolute URL.
    #[default]
    Url,
    /// The canonical URL without its query string.
    UrlWithoutQuery,
    /// `"{site}:{id}"` from the first capture group of `pattern`.
    Capture { pattern: String },
}

/// Paginated listing: `template` contains a `{page}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub template: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Stop after this many consecutive pages with no matching links.
    #[serde(default = "default_stop_after_empty")]
    pub stop_after_empty: usize,
}

/// Collect allow-listed links from a fixed listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAnchorSpec {
    pub list_url: String,
    /// Base for relative hrefs; defaults to `list_url`.
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_list_max")]
    pub max_items: usize,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Collect image links from the homepage banner area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerSpec {
    pub home_url: String,
    /// Candidate selectors, most specific first.
    #[serde(default = "default_banner_selectors")]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_true")]
    pub same_host: bool,
    /// Keep only links that wrap an image.
    #[serde(default = "default_true")]
    pub image_links_only: bool,
    #[serde(default = "default_banner_max")]
    pub max_items: usize,
}

/// Click list cards one by one and record the detail URL they route to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickThroughSpec {
    pub list_url: String,
    pub card_selector: String,
    pub detail_pattern: String,
    #[serde(default = "default_max_cards")]
    pub max_cards: usize,
}

/// Plain HTTP GET of known endpoints, scanning the text for identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpScanSpec {
    pub endpoints: Vec<String>,
    /// Regex whose first capture group is the identifier.
    pub id_pattern: String,
    /// Detail URL with an `{id}` placeholder.
    pub detail_template: String,
    /// Browser-driven path used when the HTTP scan finds nothing.
    #[serde(default)]
    pub fallback: Option<ListAnchorSpec>,
}

/// Checks that a fixed detail page really loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValiditySpec {
    /// The page title must contain at least one of these.
    pub title_markers: Vec<String>,
    /// The current URL must contain this.
    pub url_fragment: String,
    /// The markup must contain this (an application root element).
    pub app_marker: String,
}

/// Hover a navigation menu to reveal event links, backed by fixed URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverMenuSpec {
    pub home_url: String,
    pub menu_selector: String,
    pub submenu_selector: String,
    pub detail_pattern: String,
    pub fixed_urls: Vec<String>,
    pub validity: ValiditySpec,
}

/// The closed set of extraction strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    ListAnchor(ListAnchorSpec),
    Banner(BannerSpec),
    ClickThrough(ClickThroughSpec),
    HttpScan(HttpScanSpec),
    HoverMenu(HoverMenuSpec),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::ListAnchor(_) => "list_anchor",
            Strategy::Banner(_) => "banner",
            Strategy::ClickThrough(_) => "click_through",
            Strategy::HttpScan(_) => "http_scan",
            Strategy::HoverMenu(_) => "hover_menu",
        }
    }
}

/// Post-extraction filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HookSpec {
    /// Drop items whose title carries a date range that has already ended.
    ActiveWindow,
}

/// One monitored site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSpec {
    pub id: String,
    pub name: String,
    pub strategy: Strategy,
    #[serde(default)]
    pub key: KeySpec,
    #[serde(default)]
    pub hooks: Vec<HookSpec>,
    /// Capture a debug artifact when the site yields nothing.
    #[serde(default = "default_true")]
    pub capture_on_empty: bool,
}
