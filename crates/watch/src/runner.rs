// ABOUTME: Sequential run loop: extract each site, diff against seen-state, notify, and warn on new debug files.
// ABOUTME: Nothing escapes the per-site boundary; one broken site never stops the others.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Serialize;

use crate::browser::Browser;
use crate::debug::DebugCapture;
use crate::error::ExtractionFailure;
use crate::extract::{extract, ExtractContext, Extraction};
use crate::item::Item;
use crate::notify::{format_debug_warning, format_item_message, now_kst, Channel, Notifier};
use crate::options::Config;
use crate::resource::Fetcher;
use crate::sites::compiled::CompiledSite;
use crate::sites::SiteRegistry;
use crate::state::SeenState;

/// Per-site result of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteOutcome {
    pub site: String,
    /// Items returned by the extractor after dedupe.
    pub extracted: usize,
    /// Items whose key was not in seen-state.
    pub new: usize,
    pub notified: usize,
    /// Keys committed without notification (silent init).
    pub silent_seeded: usize,
    /// New items held back by the per-site notification cap.
    pub deferred: usize,
    pub notify_errors: usize,
    pub hard_failure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Debug files that appeared while this site ran.
    pub debug_files: Vec<String>,
}

impl SiteOutcome {
    fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<SiteOutcome>,
    pub state_changed: bool,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

impl RunReport {
    pub fn total_notified(&self) -> usize {
        self.outcomes.iter().map(|o| o.notified).sum()
    }

    pub fn failed_sites(&self) -> impl Iterator<Item = &SiteOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.error.is_some() || o.hard_failure)
    }

    /// One line per site plus a totals line.
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self
            .outcomes
            .iter()
            .map(|o| {
                let mut line = format!(
                    "{:<12} extracted={} new={} notified={}",
                    o.site, o.extracted, o.new, o.notified
                );
                if o.silent_seeded > 0 {
                    line.push_str(&format!(" seeded={}", o.silent_seeded));
                }
                if o.deferred > 0 {
                    line.push_str(&format!(" deferred={}", o.deferred));
                }
                if let Some(err) = &o.error {
                    line.push_str(&format!(" error={}", err));
                } else if o.hard_failure {
                    line.push_str(" hard_failure");
                }
                if !o.debug_files.is_empty() {
                    line.push_str(&format!(" debug_files={}", o.debug_files.len()));
                }
                line
            })
            .collect();
        lines.push(format!(
            "sites={} notified={} failed={} state_changed={} elapsed={:.1}s",
            self.outcomes.len(),
            self.total_notified(),
            self.failed_sites().count(),
            self.state_changed,
            self.elapsed.as_secs_f64()
        ));
        lines.join("\n")
    }
}

/// Drives every site in catalog order.
pub struct Runner<B> {
    config: Config,
    registry: SiteRegistry,
    browser: B,
    fetcher: Fetcher,
    notifier: Notifier,
    debug: DebugCapture,
    today: Option<NaiveDate>,
}

impl<B: Browser> Runner<B> {
    pub fn new(
        config: Config,
        registry: SiteRegistry,
        browser: B,
        fetcher: Fetcher,
        notifier: Notifier,
    ) -> Self {
        let debug = DebugCapture::new(config.debug_dir.clone());
        Self {
            config,
            registry,
            browser,
            fetcher,
            notifier,
            debug,
            today: None,
        }
    }

    /// Pins the date used by date-window hooks instead of today in KST.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Runs every site, then saves state if anything was committed.
    pub fn run(&self, state: &mut SeenState) -> RunReport {
        let started = Instant::now();
        let today = self.today.unwrap_or_else(|| now_kst().date_naive());
        tracing::info!(sites = self.registry.len(), %today, "run started");

        let outcomes: Vec<SiteOutcome> = self
            .registry
            .iter()
            .map(|site| self.run_site(site, state, today))
            .collect();

        let state_changed = state.dirty();
        if state_changed {
            match state.save(&self.config.state_file) {
                Ok(()) => tracing::info!(
                    path = %self.config.state_file.display(),
                    keys = state.total_keys(),
                    "seen-state saved"
                ),
                Err(e) => tracing::error!(
                    path = %self.config.state_file.display(),
                    error = %e,
                    "seen-state save failed"
                ),
            }
        } else {
            tracing::info!("seen-state unchanged");
        }

        RunReport {
            outcomes,
            state_changed,
            elapsed: started.elapsed(),
        }
    }

    /// Runs one site end to end.
    pub fn run_site(
        &self,
        site: &CompiledSite,
        state: &mut SeenState,
        today: NaiveDate,
    ) -> SiteOutcome {
        let span = tracing::info_span!("site", id = site.id());
        let _guard = span.enter();

        let before = self.debug.snapshot();
        let mut outcome = SiteOutcome::new(site.id());

        match self.extract_site(site, today) {
            Ok(extraction) => {
                outcome.extracted = extraction.items.len();
                outcome.hard_failure = extraction.hard_failure;
                outcome.notes = extraction.notes;
                self.commit(site, extraction.items, state, &mut outcome);
            }
            Err(failure) => {
                outcome.hard_failure = true;
                outcome.error = Some(failure.to_string());
            }
        }

        outcome.debug_files = self.debug.new_since(&before);
        if !outcome.debug_files.is_empty() {
            let message = format_debug_warning(
                site.name(),
                &outcome.debug_files,
                outcome.hard_failure,
                self.config.run_url.as_deref(),
            );
            if let Err(e) = self.notifier.send(Channel::Test, &message) {
                tracing::warn!(error = %e, "debug warning not delivered");
            }
        }

        tracing::info!(
            extracted = outcome.extracted,
            new = outcome.new,
            notified = outcome.notified,
            debug_files = outcome.debug_files.len(),
            "site done"
        );
        outcome
    }

    /// Opens a fresh page, runs the extractor, and captures artifacts for
    /// failures and empty results.
    fn extract_site(
        &self,
        site: &CompiledSite,
        today: NaiveDate,
    ) -> Result<Extraction, ExtractionFailure> {
        let mut page = match self.browser.new_page() {
            Ok(page) => page,
            Err(e) => {
                let failure = ExtractionFailure::from_browser(site.id(), "new_page", e);
                tracing::warn!(error = %failure, "page unavailable");
                self.debug
                    .capture_text(&failure.debug_prefix(), &failure.to_string());
                return Err(failure);
            }
        };

        let result = {
            let mut ctx = ExtractContext {
                site,
                page: page.as_mut(),
                fetcher: &self.fetcher,
                debug: &self.debug,
                timeouts: &self.config.timeouts,
                today,
            };
            extract(&mut ctx)
        };

        match &result {
            Err(failure) => {
                tracing::warn!(error = %failure, "extraction failed");
                self.debug
                    .capture_page(page.as_ref(), &failure.debug_prefix(), &failure.to_string());
            }
            Ok(extraction) if extraction.items.is_empty() && site.spec.capture_on_empty => {
                tracing::warn!("no items extracted");
                self.debug.capture_page(
                    page.as_ref(),
                    &format!("{}_no_results", site.id()),
                    "extractor returned no items",
                );
            }
            Ok(_) => {}
        }
        result
    }

    /// Diffs `items` against seen-state and notifies or seeds.
    fn commit(
        &self,
        site: &CompiledSite,
        items: Vec<Item>,
        state: &mut SeenState,
        outcome: &mut SiteOutcome,
    ) {
        let site_id = site.id();
        let fresh: Vec<Item> = items
            .into_iter()
            .filter(|item| !state.contains(site_id, &item.key))
            .collect();
        outcome.new = fresh.len();
        if fresh.is_empty() {
            return;
        }

        if self.config.silent_init && state.is_empty_for(site_id) {
            outcome.silent_seeded =
                state.commit_all(site_id, fresh.iter().map(|item| item.key.as_str()));
            tracing::info!(seeded = outcome.silent_seeded, "silent init, no notifications");
            return;
        }

        let cap = self.config.max_notify_per_site.max(1);
        outcome.deferred = fresh.len().saturating_sub(cap);
        if outcome.deferred > 0 {
            tracing::info!(cap, deferred = outcome.deferred, "notification cap reached");
        }

        for item in fresh.iter().take(cap) {
            let message = format_item_message(site.name(), item);
            if let Err(e) = self.notifier.send(Channel::Production, &message) {
                outcome.notify_errors += 1;
                tracing::warn!(url = %item.url, error = %e, "notification not delivered");
            }
            // Committed even when delivery failed.
            state.insert(site_id, &item.key);
            outcome.notified += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_each_site_and_totals() {
        let report = RunReport {
            outcomes: vec![
                SiteOutcome {
                    site: "lensme".to_string(),
                    extracted: 5,
                    new: 2,
                    notified: 2,
                    ..Default::default()
                },
                SiteOutcome {
                    site: "olens".to_string(),
                    error: Some("promo-watch: list olens: timeout".to_string()),
                    hard_failure: true,
                    debug_files: vec!["olens_timeout_x.html".to_string()],
                    ..Default::default()
                },
            ],
            state_changed: true,
            elapsed: Duration::from_millis(1500),
        };
        let summary = report.summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("lensme"));
        assert!(lines[1].contains("error=promo-watch: list olens: timeout"));
        assert!(lines[1].contains("debug_files=1"));
        assert_eq!(
            lines[2],
            "sites=2 notified=2 failed=1 state_changed=true elapsed=1.5s"
        );
    }

    #[test]
    fn test_report_serializes_elapsed_as_seconds() {
        let report = RunReport {
            outcomes: vec![SiteOutcome::new("idol")],
            state_changed: false,
            elapsed: Duration::from_millis(250),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["elapsed"], serde_json::json!(0.25));
        assert_eq!(value["outcomes"][0]["site"], "idol");
        assert!(value["outcomes"][0].get("error").is_none());
    }
}
