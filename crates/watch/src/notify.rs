// ABOUTME: Webhook notifier with a production channel for new items and a test channel for warnings.
// ABOUTME: Delivery errors are returned to the caller, which logs them; nothing is retried.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use reqwest::blocking::Client;
use serde::Serialize;

use crate::error::NotifyError;
use crate::item::Item;
use crate::options::Config;

const TITLE_LIMIT: usize = 80;
const KST_OFFSET_SECS: i32 = 9 * 3600;
const WARNING_FILE_LIMIT: usize = 15;

/// Outbound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// New promotions, one message per item.
    Production,
    /// Operational warnings (new debug artifacts).
    Test,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// What happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The channel has no endpoint configured.
    Disabled,
    /// Dry-run mode: logged only.
    Logged,
}

/// Posts `{"text": ...}` to the configured webhooks.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    prod: Option<String>,
    test: Option<String>,
    dry_run: bool,
}

impl Notifier {
    pub fn new(config: &Config) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            prod: config.prod_webhook.clone(),
            test: config.test_webhook.clone(),
            dry_run: config.dry_run,
        })
    }

    fn endpoint(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Production => self.prod.as_deref(),
            Channel::Test => self.test.as_deref(),
        }
    }

    /// Sends `text` to `channel`.
    pub fn send(&self, channel: Channel, text: &str) -> Result<Delivery, NotifyError> {
        let Some(url) = self.endpoint(channel) else {
            tracing::debug!(?channel, "webhook not set, skip");
            return Ok(Delivery::Disabled);
        };
        if self.dry_run {
            tracing::info!(?channel, message = text, "dry run, not posting");
            return Ok(Delivery::Logged);
        }

        let res = self.client.post(url).json(&WebhookPayload { text }).send()?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body: String = res.text().unwrap_or_default().chars().take(200).collect();
            return Err(NotifyError::Status { status, body });
        }
        Ok(Delivery::Sent)
    }
}

/// Current time in KST, the monitored sites' local time.
pub fn now_kst() -> DateTime<FixedOffset> {
    let now = Utc::now();
    match FixedOffset::east_opt(KST_OFFSET_SECS) {
        Some(kst) => now.with_timezone(&kst),
        None => now.fixed_offset(),
    }
}

/// Current time in KST for message headers.
pub fn now_kst_string() -> String {
    now_kst().format("%Y-%m-%d %H:%M:%S KST").to_string()
}

/// Shortens `title` to the message limit, appending an ellipsis.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() <= TITLE_LIMIT {
        return title.to_string();
    }
    let mut out: String = title.chars().take(TITLE_LIMIT - 3).collect();
    out.push_str("...");
    out
}

/// Production message for one new item.
pub fn format_item_message(site_name: &str, item: &Item) -> String {
    format!(
        "[New promotion] {}\n{}\n{}",
        site_name,
        truncate_title(&item.title),
        item.url
    )
}

/// Test-channel warning for a site that produced new debug artifacts.
pub fn format_debug_warning(
    site_name: &str,
    files: &[String],
    hard_failure: bool,
    run_url: Option<&str>,
) -> String {
    let mut lines = Vec::new();
    lines.push(format!("[Scrape warning] {} ({})", site_name, now_kst_string()));
    if hard_failure {
        lines.push("Extraction failed; structure change or blocking is likely.".to_string());
    } else {
        lines.push("New debug files were written (fallback path or structure drift).".to_string());
    }
    let shown: Vec<&str> = files.iter().take(WARNING_FILE_LIMIT).map(String::as_str).collect();
    let mut listing = format!("New debug: {}", shown.join(", "));
    if files.len() > WARNING_FILE_LIMIT {
        listing.push_str(&format!(" (+{} more)", files.len() - WARNING_FILE_LIMIT));
    }
    lines.push(listing);
    if let Some(url) = run_url {
        lines.push(format!("Run: {}", url));
    }
    lines.join("\n")
}
