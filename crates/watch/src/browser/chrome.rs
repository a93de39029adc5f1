// ABOUTME: Headless Chromium driver built on headless_chrome (enabled with the `headless` feature).
// ABOUTME: Each page is a fresh tab that is closed when the page is dropped.

use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{LaunchOptions, Tab};
use regex::Regex;

use crate::browser::{Anchor, Browser, Navigation, Page};
use crate::error::BrowserError;
use crate::options::Config;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Collects `{href, text, aria_label, img_alt, has_image}` for every match.
const ANCHORS_JS: &str = r#"
(function(sel) {
  const out = [];
  for (const a of document.querySelectorAll(sel)) {
    const img = a.querySelector('img');
    out.push({
      href: a.getAttribute('href') || '',
      text: (a.innerText || a.textContent || '').replace(/\s+/g, ' ').trim(),
      aria_label: a.getAttribute('aria-label'),
      img_alt: img ? img.getAttribute('alt') : null,
      has_image: !!img,
    });
  }
  return JSON.stringify(out);
})"#;

/// Browser backed by a single headless Chromium process.
pub struct ChromeBrowser {
    browser: headless_chrome::Browser,
    user_agent: String,
    action_timeout: Duration,
}

impl ChromeBrowser {
    /// Launch Chromium configured for the monitored (Korean-locale) sites.
    pub fn launch(config: &Config) -> Result<Self, BrowserError> {
        let args = vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--lang=ko-KR"),
            OsStr::new("--no-first-run"),
        ];
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some((1400, 900)))
            .idle_browser_timeout(Duration::from_secs(300))
            .args(args)
            .build()
            .map_err(|e| BrowserError::Driver(anyhow!("launch options: {}", e)))?;
        let browser = headless_chrome::Browser::new(options)?;
        Ok(Self {
            browser,
            user_agent: config.user_agent.clone(),
            action_timeout: config.timeouts.action,
        })
    }
}

impl Browser for ChromeBrowser {
    fn new_page(&self) -> Result<Box<dyn Page>, BrowserError> {
        let tab = self.browser.new_tab()?;
        tab.set_default_timeout(self.action_timeout);
        tab.set_user_agent(&self.user_agent, Some("ko-KR"), None)?;
        Ok(Box::new(ChromePage {
            tab,
            action_timeout: self.action_timeout,
        }))
    }
}

/// One Chromium tab.
pub struct ChromePage {
    tab: Arc<Tab>,
    action_timeout: Duration,
}

impl ChromePage {
    fn eval_string(&self, js: &str) -> Result<String, BrowserError> {
        let remote = self.tab.evaluate(js, false)?;
        match remote.value {
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(other) => Ok(other.to_string()),
            None => Ok(String::new()),
        }
    }

    fn poll_until<F>(&self, what: String, timeout: Duration, mut done: F) -> Result<(), BrowserError>
    where
        F: FnMut(&Tab) -> bool,
    {
        let start = Instant::now();
        loop {
            if done(&self.tab) {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(BrowserError::Timeout {
                    what,
                    after: timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

impl Page for ChromePage {
    fn goto(&mut self, url: &str, timeout: Duration) -> Result<Navigation, BrowserError> {
        self.tab.set_default_timeout(timeout);
        let result = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| {
                let msg = e.to_string();
                if msg.to_ascii_lowercase().contains("timeout") {
                    BrowserError::Timeout {
                        what: format!("navigation to {}", url),
                        after: timeout,
                    }
                } else {
                    BrowserError::Navigation {
                        url: url.to_string(),
                        reason: msg,
                    }
                }
            });
        // Element lookups after navigation use the shorter action budget.
        self.tab.set_default_timeout(self.action_timeout);
        result?;
        Ok(Navigation {
            url: self.tab.get_url(),
            status: None,
        })
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    fn title(&self) -> Result<String, BrowserError> {
        Ok(self.tab.get_title()?)
    }

    fn content(&self) -> Result<String, BrowserError> {
        Ok(self.tab.get_content()?)
    }

    fn anchors(&self, selector: &str) -> Result<Vec<Anchor>, BrowserError> {
        let js = format!("{}({})", ANCHORS_JS, js_string(selector));
        let raw = self.eval_string(&js)?;
        serde_json::from_str(&raw).map_err(|e| BrowserError::Driver(anyhow!("anchor JSON: {}", e)))
    }

    fn texts(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let js = format!(
            "JSON.stringify(Array.from(document.querySelectorAll({})).map(e => (e.innerText || '').replace(/\\s+/g, ' ').trim()))",
            js_string(selector)
        );
        let raw = self.eval_string(&js)?;
        serde_json::from_str(&raw).map_err(|e| BrowserError::Driver(anyhow!("text JSON: {}", e)))
    }

    fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        let js = format!("String(document.querySelectorAll({}).length)", js_string(selector));
        let raw = self.eval_string(&js)?;
        raw.trim()
            .parse()
            .map_err(|e| BrowserError::Driver(anyhow!("count: {}", e)))
    }

    fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), BrowserError> {
        let elements = self.tab.find_elements(selector)?;
        let el = elements.get(index).ok_or_else(|| BrowserError::NoSuchElement {
            selector: selector.to_string(),
            index,
        })?;
        el.scroll_into_view()?;
        el.click()?;
        Ok(())
    }

    fn hover(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let el = self
            .tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|_| BrowserError::Timeout {
                what: format!("element {}", selector),
                after: timeout,
            })?;
        el.move_mouse_over()?;
        Ok(())
    }

    fn wait_for_url(&mut self, pattern: &Regex, timeout: Duration) -> Result<(), BrowserError> {
        self.poll_until(format!("URL matching {}", pattern.as_str()), timeout, |tab| {
            pattern.is_match(&tab.get_url())
        })
    }

    fn go_back(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        let before = self.tab.get_url();
        self.tab.evaluate("history.back()", false)?;
        self.poll_until("history.back()".to_string(), timeout, |tab| {
            tab.get_url() != before
        })?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }

    fn settle(&mut self, pause: Duration) {
        thread::sleep(pause);
    }

    fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError> {
        Ok(self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?)
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            tracing::debug!(error = %e, "closing tab failed");
        }
    }
}
