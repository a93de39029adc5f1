// ABOUTME: Browser automation seam: the Page and Browser traits plus the Anchor snapshot type.
// ABOUTME: Drivers live in submodules; extractors only ever talk to `dyn Page`.

//! Page automation abstractions.
//!
//! Extractors are written against [`Page`], a small blocking interface that
//! covers what the monitored sites need: navigation, link snapshots, clicks
//! on list cards, hovering menus and screenshots for debugging.
//!
//! Drivers:
//! - [`StaticBrowser`]: HTTP GET plus HTML parsing, no JavaScript.
//! - `ChromeBrowser` (feature `headless`): headless Chromium over CDP.

pub mod selectors;
pub mod static_page;

#[cfg(feature = "headless")]
pub mod chrome;

use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::BrowserError;

pub use static_page::{StaticBrowser, StaticPage};

#[cfg(feature = "headless")]
pub use chrome::ChromeBrowser;

/// Snapshot of one `<a>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Anchor {
    pub href: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub img_alt: Option<String>,
    #[serde(default)]
    pub has_image: bool,
}

/// Outcome of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub url: String,
    /// HTTP status when the driver knows it.
    pub status: Option<u16>,
}

/// A single browsing context.
pub trait Page {
    /// Navigate and wait for the document to be ready.
    fn goto(&mut self, url: &str, timeout: Duration) -> Result<Navigation, BrowserError>;

    fn current_url(&self) -> String;

    fn title(&self) -> Result<String, BrowserError>;

    /// Serialised markup of the current document.
    fn content(&self) -> Result<String, BrowserError>;

    /// Snapshot every element matching `selector` as an [`Anchor`].
    fn anchors(&self, selector: &str) -> Result<Vec<Anchor>, BrowserError>;

    /// Text of every element matching `selector`.
    fn texts(&self, selector: &str) -> Result<Vec<String>, BrowserError>;

    fn count(&self, selector: &str) -> Result<usize, BrowserError>;

    /// Click the `index`-th element matching `selector`.
    fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), BrowserError>;

    fn hover(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until the current URL matches `pattern`.
    fn wait_for_url(&mut self, pattern: &Regex, timeout: Duration) -> Result<(), BrowserError>;

    fn go_back(&mut self, timeout: Duration) -> Result<(), BrowserError>;

    /// Fixed pause for client-side rendering.
    fn settle(&mut self, pause: Duration);

    /// Full-page PNG screenshot.
    fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError>;
}

/// Factory for isolated pages; one page per site.
pub trait Browser {
    fn new_page(&self) -> Result<Box<dyn Page>, BrowserError>;
}

impl<B: Browser + ?Sized> Browser for &B {
    fn new_page(&self) -> Result<Box<dyn Page>, BrowserError> {
        (**self).new_page()
    }
}
