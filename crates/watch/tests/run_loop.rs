// ABOUTME: Integration tests for the run loop against a scripted in-memory browser.
// ABOUTME: Webhooks are httpmock servers; state and debug directories live in a TempDir.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::rc::Rc;
use std::time::Duration;

use chrono::NaiveDate;
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use promo_watch::{
    parse_registry, Anchor, Browser, BrowserError, Config, Fetcher, Navigation, Notifier, Page,
    Runner, SeenState, StaticPage, Timeouts,
};
use regex::Regex;
use tempfile::TempDir;

// ----------------------------------------------------------------------------
// Scripted browser
// ----------------------------------------------------------------------------

#[derive(Default)]
struct Script {
    pages: HashMap<String, String>,
    timeouts: HashSet<String>,
    /// (page url, card index) -> url the click routes to.
    clicks: HashMap<(String, usize), String>,
}

type SharedScript = Rc<RefCell<Script>>;

struct ScriptedBrowser {
    script: SharedScript,
}

impl Browser for ScriptedBrowser {
    fn new_page(&self) -> Result<Box<dyn Page>, BrowserError> {
        Ok(Box::new(ScriptedPage {
            script: Rc::clone(&self.script),
            url: "about:blank".to_string(),
            history: Vec::new(),
        }))
    }
}

struct ScriptedPage {
    script: SharedScript,
    url: String,
    history: Vec<String>,
}

impl ScriptedPage {
    fn dom(&self) -> StaticPage {
        let html = self
            .script
            .borrow()
            .pages
            .get(&self.url)
            .cloned()
            .unwrap_or_default();
        StaticPage::from_html(self.url.clone(), html)
    }
}

impl Page for ScriptedPage {
    fn goto(&mut self, url: &str, timeout: Duration) -> Result<Navigation, BrowserError> {
        let script = self.script.borrow();
        if script.timeouts.contains(url) {
            return Err(BrowserError::Timeout {
                what: format!("navigation to {}", url),
                after: timeout,
            });
        }
        if !script.pages.contains_key(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        drop(script);
        self.history.push(std::mem::replace(&mut self.url, url.to_string()));
        Ok(Navigation {
            url: url.to_string(),
            status: Some(200),
        })
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn title(&self) -> Result<String, BrowserError> {
        self.dom().title()
    }

    fn content(&self) -> Result<String, BrowserError> {
        self.dom().content()
    }

    fn anchors(&self, selector: &str) -> Result<Vec<Anchor>, BrowserError> {
        self.dom().anchors(selector)
    }

    fn texts(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        self.dom().texts(selector)
    }

    fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        self.dom().count(selector)
    }

    fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), BrowserError> {
        if index >= self.count(selector)? {
            return Err(BrowserError::NoSuchElement {
                selector: selector.to_string(),
                index,
            });
        }
        let target = self
            .script
            .borrow()
            .clicks
            .get(&(self.url.clone(), index))
            .cloned();
        // An unmapped card swallows the click without routing anywhere.
        if let Some(target) = target {
            self.history.push(std::mem::replace(&mut self.url, target));
        }
        Ok(())
    }

    fn hover(&mut self, _selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        Err(BrowserError::Unsupported("hover"))
    }

    fn wait_for_url(&mut self, pattern: &Regex, timeout: Duration) -> Result<(), BrowserError> {
        if pattern.is_match(&self.url) {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                what: format!("url matching {}", pattern),
                after: timeout,
            })
        }
    }

    fn go_back(&mut self, _timeout: Duration) -> Result<(), BrowserError> {
        match self.history.pop() {
            Some(previous) => {
                self.url = previous;
                Ok(())
            }
            None => Err(BrowserError::Unsupported("empty history")),
        }
    }

    fn settle(&mut self, _pause: Duration) {}

    fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError> {
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }
}

// ----------------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------------

const ALPHA_LIST: &str = "https://alpha.test/event";
const BETA_LIST: &str = "https://beta.test/board";
const GAMMA_LIST: &str = "https://gamma.test/events";

const SITES: &str = r#"[
  {
    "id": "beta",
    "name": "Beta Lens",
    "strategy": { "type": "list_anchor", "list_url": "https://beta.test/board", "include": ["/board/\\d+"] }
  },
  {
    "id": "alpha",
    "name": "Alpha Lens",
    "strategy": { "type": "list_anchor", "list_url": "https://alpha.test/event", "include": ["/event/view/\\d+"] },
    "key": { "type": "capture", "pattern": "/event/view/(\\d+)" }
  },
  {
    "id": "gamma",
    "name": "Gamma Lens",
    "strategy": {
      "type": "click_through",
      "list_url": "https://gamma.test/events",
      "card_selector": ".card",
      "detail_pattern": "/event/\\d+"
    },
    "key": { "type": "capture", "pattern": "/event/(\\d+)" }
  }
]"#;

fn alpha_html(ids: &[u32]) -> String {
    let mut links: String = ids
        .iter()
        .map(|id| format!(r#"<li><a href="/event/view/{id}">Event {id}</a></li>"#))
        .collect();
    links.push_str(r#"<li><a href="/event/view/55?ref=home">Event 55 again</a></li>"#);
    links.push_str(r#"<li><a href="/about">About us</a></li>"#);
    format!("<html><head><title>Alpha events</title></head><body><ul>{links}</ul></body></html>")
}

const BETA_HTML: &str = r#"<html><body><a href="/board/7">Coupon week</a></body></html>"#;

const GAMMA_HTML: &str = r#"<html><body>
  <div class="card"><h3>Spring sale</h3></div>
  <div class="card"><h3>Broken card</h3></div>
  <div class="card"><h3>Summer sale</h3></div>
</body></html>"#;

fn script() -> SharedScript {
    let mut s = Script::default();
    s.pages.insert(ALPHA_LIST.to_string(), alpha_html(&[55, 56]));
    s.pages.insert(BETA_LIST.to_string(), BETA_HTML.to_string());
    s.pages.insert(GAMMA_LIST.to_string(), GAMMA_HTML.to_string());
    s.pages.insert(
        "https://gamma.test/event/1".to_string(),
        "<html><head><title>Spring</title></head></html>".to_string(),
    );
    s.pages.insert(
        "https://gamma.test/event/3".to_string(),
        "<html><head><title>Summer</title></head></html>".to_string(),
    );
    s.clicks.insert(
        (GAMMA_LIST.to_string(), 0),
        "https://gamma.test/event/1".to_string(),
    );
    s.clicks.insert(
        (GAMMA_LIST.to_string(), 2),
        "https://gamma.test/event/3".to_string(),
    );
    Rc::new(RefCell::new(s))
}

struct Harness {
    dir: TempDir,
    server: MockServer,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            server: MockServer::start(),
        }
    }

    fn config(&self) -> promo_watch::ConfigBuilder {
        Config::builder()
            .state_file(self.dir.path().join("state").join("seen.json"))
            .debug_dir(self.dir.path().join("debug"))
            .prod_webhook(Some(self.server.url("/prod")))
            .test_webhook(Some(self.server.url("/test")))
            .timeouts(Timeouts {
                settle: Duration::ZERO,
                ..Timeouts::default()
            })
    }

    fn runner(
        &self,
        config: Config,
        script: &SharedScript,
        only: &[&str],
    ) -> Runner<ScriptedBrowser> {
        let mut registry = parse_registry(SITES).unwrap();
        let ids: Vec<String> = only.iter().map(|s| s.to_string()).collect();
        assert!(registry.retain_ids(&ids).is_empty());
        let fetcher = Fetcher::new(&config).unwrap();
        let notifier = Notifier::new(&config).unwrap();
        let browser = ScriptedBrowser {
            script: Rc::clone(script),
        };
        Runner::new(config, registry, browser, fetcher, notifier)
    }

    fn state(&self) -> SeenState {
        SeenState::load(&self.dir.path().join("state").join("seen.json"), "alpha")
    }

    fn debug_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path().join("debug"))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.file_name().to_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[test]
fn test_first_run_notifies_each_new_item_once() {
    let h = Harness::new();
    let prod = h.server.mock(|when, then| {
        when.method(POST).path("/prod").body_includes("Alpha Lens");
        then.status(200);
    });
    let script = script();

    let runner = h.runner(h.config().build(), &script, &["alpha"]);
    let mut state = h.state();
    let report = runner.run(&mut state);

    let alpha = &report.outcomes[0];
    assert_eq!(alpha.extracted, 2, "55 variants collapse and /about is excluded");
    assert_eq!(alpha.new, 2);
    assert_eq!(alpha.notified, 2);
    assert!(report.state_changed);
    prod.assert_hits(2);

    let saved = h.state();
    let keys: Vec<&str> = saved.get("alpha").unwrap().iter().map(String::as_str).collect();
    assert_eq!(keys, vec!["alpha:55", "alpha:56"]);
}

#[test]
fn test_second_run_against_unchanged_page_is_quiet() {
    let h = Harness::new();
    let prod = h.server.mock(|when, then| {
        when.method(POST).path("/prod");
        then.status(200);
    });
    let script = script();

    let mut state = h.state();
    h.runner(h.config().build(), &script, &["alpha"]).run(&mut state);
    prod.assert_hits(2);

    let mut reloaded = h.state();
    let report = h.runner(h.config().build(), &script, &["alpha"]).run(&mut reloaded);
    assert_eq!(report.outcomes[0].new, 0);
    assert!(!report.state_changed);
    prod.assert_hits(2);
}

#[test]
fn test_silent_init_seeds_without_notifying() {
    let h = Harness::new();
    let prod = h.server.mock(|when, then| {
        when.method(POST).path("/prod");
        then.status(200);
    });
    let script = script();

    let mut state = h.state();
    let report = h
        .runner(h.config().silent_init(true).build(), &script, &["alpha"])
        .run(&mut state);

    assert_eq!(report.outcomes[0].silent_seeded, 2);
    assert_eq!(report.outcomes[0].notified, 0);
    prod.assert_hits(0);
    assert_eq!(h.state().get("alpha").map(|s| s.len()), Some(2));

    // A seeded site notifies normally even with the flag still on.
    script
        .borrow_mut()
        .pages
        .insert(ALPHA_LIST.to_string(), alpha_html(&[55, 56, 57]));
    let mut state = h.state();
    let report = h
        .runner(h.config().silent_init(true).build(), &script, &["alpha"])
        .run(&mut state);
    assert_eq!(report.outcomes[0].notified, 1);
    prod.assert_hits(1);
}

#[test]
fn test_navigation_timeout_is_captured_and_run_continues() {
    let h = Harness::new();
    let prod = h.server.mock(|when, then| {
        when.method(POST).path("/prod");
        then.status(200);
    });
    let warn = h.server.mock(|when, then| {
        when.method(POST).path("/test").body_includes("Beta Lens");
        then.status(200);
    });
    let script = script();
    script.borrow_mut().timeouts.insert(BETA_LIST.to_string());

    let mut state = h.state();
    let report = h
        .runner(h.config().build(), &script, &["beta", "alpha"])
        .run(&mut state);

    let beta = &report.outcomes[0];
    assert_eq!(beta.site, "beta");
    assert_eq!(beta.extracted, 0);
    assert!(beta.error.as_deref().unwrap_or_default().contains("timeout"));
    assert!(!beta.debug_files.is_empty());
    assert!(beta.debug_files.iter().all(|f| f.starts_with("beta_timeout_")));

    let alpha = &report.outcomes[1];
    assert_eq!(alpha.notified, 2);
    assert!(alpha.debug_files.is_empty());

    prod.assert_hits(2);
    warn.assert_hits(1);
    assert!(h.debug_files().iter().any(|f| f.starts_with("beta_timeout_")));
}

#[test]
fn test_debug_warning_is_not_repeated_without_new_files() {
    let h = Harness::new();
    h.server.mock(|when, then| {
        when.method(POST).path("/prod");
        then.status(200);
    });
    let warn = h.server.mock(|when, then| {
        when.method(POST).path("/test");
        then.status(200);
    });
    let script = script();
    script.borrow_mut().timeouts.insert(BETA_LIST.to_string());

    let mut state = h.state();
    h.runner(h.config().build(), &script, &["beta"]).run(&mut state);
    warn.assert_hits(1);

    script.borrow_mut().timeouts.clear();
    let mut state = h.state();
    let report = h.runner(h.config().build(), &script, &["beta"]).run(&mut state);
    assert_eq!(report.outcomes[0].notified, 1);
    assert!(report.outcomes[0].debug_files.is_empty());
    warn.assert_hits(1);
}

#[test]
fn test_empty_site_writes_no_results_capture() {
    let h = Harness::new();
    let warn = h.server.mock(|when, then| {
        when.method(POST).path("/test");
        then.status(200);
    });
    let script = script();
    script
        .borrow_mut()
        .pages
        .insert(BETA_LIST.to_string(), "<html><body>점검 중</body></html>".to_string());

    let mut state = h.state();
    let report = h.runner(h.config().build(), &script, &["beta"]).run(&mut state);

    let beta = &report.outcomes[0];
    assert_eq!(beta.extracted, 0);
    assert!(beta.error.is_none());
    assert!(beta.debug_files.iter().any(|f| f.starts_with("beta_no_results_")));
    warn.assert_hits(1);
}

#[test]
fn test_notification_cap_defers_remaining_items_to_next_run() {
    let h = Harness::new();
    let prod = h.server.mock(|when, then| {
        when.method(POST).path("/prod");
        then.status(200);
    });
    let script = script();
    script
        .borrow_mut()
        .pages
        .insert(ALPHA_LIST.to_string(), alpha_html(&[55, 56, 57]));

    let mut state = h.state();
    let report = h
        .runner(h.config().max_notify_per_site(2).build(), &script, &["alpha"])
        .run(&mut state);
    assert_eq!(report.outcomes[0].notified, 2);
    assert_eq!(report.outcomes[0].deferred, 1);
    prod.assert_hits(2);

    let mut state = h.state();
    let report = h
        .runner(h.config().max_notify_per_site(2).build(), &script, &["alpha"])
        .run(&mut state);
    assert_eq!(report.outcomes[0].notified, 1);
    assert_eq!(report.outcomes[0].deferred, 0);
    prod.assert_hits(3);
}

#[test]
fn test_zero_notification_cap_still_drains_one_item_per_run() {
    let h = Harness::new();
    let prod = h.server.mock(|when, then| {
        when.method(POST).path("/prod");
        then.status(200);
    });
    let script = script();

    let mut state = h.state();
    let report = h
        .runner(h.config().max_notify_per_site(0).build(), &script, &["alpha"])
        .run(&mut state);
    assert_eq!(report.outcomes[0].notified, 1);
    assert_eq!(report.outcomes[0].deferred, 1);
    assert!(state.contains("alpha", "alpha:55"));
    prod.assert_hits(1);
}

#[test]
fn test_failed_delivery_still_commits_key() {
    let h = Harness::new();
    h.server.mock(|when, then| {
        when.method(POST).path("/prod");
        then.status(500).body("webhook down");
    });
    let script = script();

    let mut state = h.state();
    let report = h.runner(h.config().build(), &script, &["alpha"]).run(&mut state);
    assert_eq!(report.outcomes[0].notify_errors, 2);
    assert_eq!(h.state().get("alpha").map(|s| s.len()), Some(2));
}

#[test]
fn test_click_through_survives_one_broken_card() {
    let h = Harness::new();
    let prod = h.server.mock(|when, then| {
        when.method(POST).path("/prod").body_includes("Gamma Lens");
        then.status(200);
    });
    let script = script();

    let mut state = h.state();
    let report = h.runner(h.config().build(), &script, &["gamma"]).run(&mut state);

    let gamma = &report.outcomes[0];
    assert_eq!(gamma.extracted, 2);
    assert!(!gamma.hard_failure);
    assert!(gamma.debug_files.iter().any(|f| f.starts_with("gamma_click_1_")));
    prod.assert_hits(2);

    let keys: Vec<&str> = state.get("gamma").unwrap().iter().map(String::as_str).collect();
    assert_eq!(keys, vec!["gamma:1", "gamma:3"]);
}

#[test]
fn test_click_through_with_every_card_broken_is_hard_failure() {
    let h = Harness::new();
    h.server.mock(|when, then| {
        when.method(POST).path("/test").body_includes("Extraction failed");
        then.status(200);
    });
    let script = script();
    script.borrow_mut().clicks.clear();

    let mut state = h.state();
    let report = h.runner(h.config().build(), &script, &["gamma"]).run(&mut state);

    let gamma = &report.outcomes[0];
    assert_eq!(gamma.extracted, 0);
    assert!(gamma.hard_failure);
    assert!(gamma.error.is_none());
    for i in 0..3 {
        let prefix = format!("gamma_click_{}_", i);
        assert!(gamma.debug_files.iter().any(|f| f.starts_with(&prefix)));
    }
}

#[test]
fn test_active_window_hook_drops_ended_events() {
    const SITE: &str = r#"[{
        "id": "isha",
        "name": "Isha",
        "strategy": { "type": "list_anchor", "list_url": "https://isha.test/board", "include": ["/article/"] },
        "hooks": [{ "type": "active_window" }]
    }]"#;
    let h = Harness::new();
    h.server.mock(|when, then| {
        when.method(POST).path("/prod");
        then.status(200);
    });
    let script = script();
    script.borrow_mut().pages.insert(
        "https://isha.test/board".to_string(),
        r#"<html><body>
            <a href="/article/1">3월 할인 2024.03.01 ~ 2024.03.31</a>
            <a href="/article/2">4월 할인 2024.04.01 ~ 2024.04.30</a>
            <a href="/article/3">상시 적립 이벤트</a>
        </body></html>"#
            .to_string(),
    );

    let config = h.config().build();
    let registry = parse_registry(SITE).unwrap();
    let fetcher = Fetcher::new(&config).unwrap();
    let notifier = Notifier::new(&config).unwrap();
    let runner = Runner::new(
        config,
        registry,
        ScriptedBrowser {
            script: Rc::clone(&script),
        },
        fetcher,
        notifier,
    )
    .with_today(NaiveDate::from_ymd_opt(2024, 4, 10).unwrap());

    let mut state = h.state();
    let report = runner.run(&mut state);
    assert_eq!(report.outcomes[0].extracted, 2);
    assert!(!state.contains("isha", "https://isha.test/article/1"));
    assert!(state.contains("isha", "https://isha.test/article/2"));
    assert!(state.contains("isha", "https://isha.test/article/3"));
}

#[test]
fn test_hover_menu_flags_invalid_fixed_page() {
    const SITE: &str = r#"[{
        "id": "hapa",
        "name": "Hapa",
        "strategy": {
            "type": "hover_menu",
            "home_url": "https://hapa.test/",
            "menu_selector": "nav .events",
            "submenu_selector": "nav .events a",
            "detail_pattern": "/events/(\\d+)",
            "fixed_urls": ["https://hapa.test/events/1", "https://hapa.test/events/2"],
            "validity": { "title_markers": ["이벤트"], "url_fragment": "/events/", "app_marker": "id=\"app\"" }
        },
        "key": { "type": "capture", "pattern": "/events/(\\d+)" }
    }]"#;
    let h = Harness::new();
    h.server.mock(|when, then| {
        when.method(POST).path("/prod");
        then.status(200);
    });
    let warn = h.server.mock(|when, then| {
        when.method(POST).path("/test");
        then.status(200);
    });
    let script = script();
    {
        let mut s = script.borrow_mut();
        s.pages.insert(
            "https://hapa.test/".to_string(),
            "<html><body><nav><span class=\"events\">Events</span></nav></body></html>".to_string(),
        );
        s.pages.insert(
            "https://hapa.test/events/1".to_string(),
            r#"<html><head><title>이벤트</title></head><body><div id="app"></div></body></html>"#
                .to_string(),
        );
        s.pages.insert(
            "https://hapa.test/events/2".to_string(),
            "<html><head><title>Not found</title></head><body></body></html>".to_string(),
        );
    }

    let config = h.config().build();
    let registry = parse_registry(SITE).unwrap();
    let fetcher = Fetcher::new(&config).unwrap();
    let notifier = Notifier::new(&config).unwrap();
    let runner = Runner::new(
        config,
        registry,
        ScriptedBrowser {
            script: Rc::clone(&script),
        },
        fetcher,
        notifier,
    );

    let mut state = h.state();
    let report = runner.run(&mut state);
    let hapa = &report.outcomes[0];
    assert_eq!(hapa.extracted, 2, "fixed pages are always reported");
    assert!(hapa.hard_failure);
    assert!(hapa.debug_files.iter().any(|f| f.starts_with("hapa_fixed_url_bad_info_")));
    assert!(state.contains("hapa", "hapa:1"));
    assert!(state.contains("hapa", "hapa:2"));
    warn.assert_hits(1);
}
