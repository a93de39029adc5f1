// ABOUTME: Static driver: pages are fetched with a plain HTTP GET and queried with dom_query.
// ABOUTME: No JavaScript runs, so hover and screenshots are unsupported; anchor clicks follow the href.

use std::time::Duration;

use dom_query::{Document, Selection};
use regex::Regex;
use url::Url;

use crate::browser::selectors::get_or_compile;
use crate::browser::{Anchor, Browser, Navigation, Page};
use crate::error::BrowserError;
use crate::item::collapse_whitespace;
use crate::resource::Fetcher;

/// Browser that hands out [`StaticPage`]s sharing one HTTP fetcher.
#[derive(Debug, Clone)]
pub struct StaticBrowser {
    fetcher: Fetcher,
}

impl StaticBrowser {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

impl Browser for StaticBrowser {
    fn new_page(&self) -> Result<Box<dyn Page>, BrowserError> {
        Ok(Box::new(StaticPage::new(self.fetcher.clone())))
    }
}

/// A page backed by fetched markup.
#[derive(Debug, Clone)]
pub struct StaticPage {
    fetcher: Option<Fetcher>,
    url: String,
    html: String,
    history: Vec<(String, String)>,
}

impl StaticPage {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher: Some(fetcher),
            url: "about:blank".to_string(),
            html: String::new(),
            history: Vec::new(),
        }
    }

    /// A page preloaded with `html`; navigation is unavailable.
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            fetcher: None,
            url: url.into(),
            html: html.into(),
            history: Vec::new(),
        }
    }

    fn document(&self) -> Document {
        Document::from(self.html.as_str())
    }

    fn select<'a>(&self, doc: &'a Document, selector: &str) -> Result<Selection<'a>, BrowserError> {
        let matcher = get_or_compile(selector).ok_or_else(|| BrowserError::NoSuchElement {
            selector: selector.to_string(),
            index: 0,
        })?;
        Ok(doc.select_matcher(&matcher))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| collapse_whitespace(&v))
        .filter(|v| !v.is_empty())
}

fn anchor_from(el: &Selection) -> Anchor {
    let img = el.select("img");
    Anchor {
        href: el.attr("href").map(|v| v.to_string()).unwrap_or_default(),
        text: collapse_whitespace(&el.text()),
        aria_label: non_empty(el.attr("aria-label").map(|v| v.to_string())),
        img_alt: non_empty(img.attr("alt").map(|v| v.to_string())),
        has_image: img.exists(),
    }
}

impl Page for StaticPage {
    fn goto(&mut self, url: &str, timeout: Duration) -> Result<Navigation, BrowserError> {
        let fetcher = self.fetcher.as_ref().ok_or(BrowserError::Unsupported("goto"))?;
        let res = fetcher.get_page(url).map_err(|e| {
            if e.is_timeout() {
                BrowserError::Timeout {
                    what: format!("navigation to {}", url),
                    after: timeout,
                }
            } else {
                BrowserError::Fetch(e)
            }
        })?;
        if !res.is_success() {
            tracing::debug!(url, status = res.status, "page loaded with error status");
        }
        let previous_url = std::mem::replace(&mut self.url, res.final_url.clone());
        let previous_html = std::mem::replace(&mut self.html, res.text());
        if previous_url != "about:blank" {
            self.history.push((previous_url, previous_html));
        }
        Ok(Navigation {
            url: res.final_url,
            status: Some(res.status),
        })
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn title(&self) -> Result<String, BrowserError> {
        let doc = self.document();
        Ok(collapse_whitespace(&doc.select("title").text()))
    }

    fn content(&self) -> Result<String, BrowserError> {
        Ok(self.html.clone())
    }

    fn anchors(&self, selector: &str) -> Result<Vec<Anchor>, BrowserError> {
        let doc = self.document();
        let sel = self.select(&doc, selector)?;
        Ok(sel.iter().map(|el| anchor_from(&el)).collect())
    }

    fn texts(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let doc = self.document();
        let sel = self.select(&doc, selector)?;
        Ok(sel.iter().map(|el| collapse_whitespace(&el.text())).collect())
    }

    fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        let doc = self.document();
        Ok(self.select(&doc, selector)?.length())
    }

    fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), BrowserError> {
        let href = {
            let doc = self.document();
            let sel = self.select(&doc, selector)?;
            let el = sel.iter().nth(index).ok_or_else(|| BrowserError::NoSuchElement {
                selector: selector.to_string(),
                index,
            })?;
            let own = el.attr("href").map(|v| v.to_string());
            own.or_else(|| el.select("a[href]").attr("href").map(|v| v.to_string()))
        };
        let href = href.ok_or(BrowserError::Unsupported("click on element without href"))?;
        let target = Url::parse(&self.url)
            .and_then(|base| base.join(&href))
            .map_err(|e| BrowserError::Navigation {
                url: href.clone(),
                reason: e.to_string(),
            })?;
        self.goto(target.as_str(), Duration::ZERO).map(|_| ())
    }

    fn hover(&mut self, _selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        Err(BrowserError::Unsupported("hover"))
    }

    fn wait_for_url(&mut self, pattern: &Regex, timeout: Duration) -> Result<(), BrowserError> {
        if pattern.is_match(&self.url) {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                what: format!("URL matching {}", pattern.as_str()),
                after: timeout,
            })
        }
    }

    fn go_back(&mut self, _timeout: Duration) -> Result<(), BrowserError> {
        let (url, html) = self
            .history
            .pop()
            .ok_or(BrowserError::Unsupported("go_back without history"))?;
        self.url = url;
        self.html = html;
        Ok(())
    }

    fn settle(&mut self, _pause: Duration) {}

    fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError> {
        Err(BrowserError::Unsupported("screenshot"))
    }
}
