// ABOUTME: HTTP-scan strategy: fetch known endpoints without a browser and regex out event identifiers.
// ABOUTME: Falls back to a browser list scrape when the scan finds nothing.

use std::collections::HashMap;

use anyhow::anyhow;
use dom_query::Document;
use regex::Regex;
use url::Url;

use crate::error::ExtractionFailure;
use crate::extract::{list, ExtractContext, Extraction};
use crate::item::{collapse_whitespace, ItemList};
use crate::sites::compiled::CompiledScan;

/// Maps identifier to anchor text for links whose href carries an id.
fn anchor_titles(html: &str, id: &Regex) -> HashMap<String, String> {
    let doc = Document::from(html);
    let mut titles = HashMap::new();
    for el in doc.select("a[href]").iter() {
        let Some(href) = el.attr("href").map(|v| v.to_string()) else {
            continue;
        };
        let Some(caps) = id.captures(&href) else {
            continue;
        };
        let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
            continue;
        };
        let text = collapse_whitespace(&el.text());
        if !text.is_empty() {
            titles.entry(m.as_str().to_string()).or_insert(text);
        }
    }
    titles
}

/// Identifiers in order of first appearance.
pub fn scan_ids(text: &str, id: &Regex) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in id.captures_iter(text) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(0)) {
            let value = m.as_str().to_string();
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
    }
    seen
}

pub fn scrape_http_scan(
    ctx: &mut ExtractContext<'_>,
    scan: &CompiledScan,
) -> Result<Extraction, ExtractionFailure> {
    let spec = &scan.spec;
    let mut items = ItemList::new();
    let mut errors = Vec::new();

    for endpoint in &spec.endpoints {
        let body = match ctx.fetcher.get_text(endpoint) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(site = ctx.site_id(), endpoint = %endpoint, error = %e, "scan fetch failed");
                errors.push(format!("{}: {}", endpoint, e));
                continue;
            }
        };
        let titles = anchor_titles(&body, &scan.id);
        for id in scan_ids(&body, &scan.id) {
            let detail = spec.detail_template.replace("{id}", &id);
            let Ok(url) = Url::parse(&detail) else {
                tracing::debug!(site = ctx.site_id(), url = %detail, "bad detail url");
                continue;
            };
            let title = titles
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("Event {}", id));
            items.push(ctx.make_item(&url, title));
        }
    }

    if !items.is_empty() {
        tracing::info!(site = ctx.site_id(), count = items.len(), "http scan done");
        return Ok(Extraction {
            items: items.into_vec(),
            hard_failure: false,
            notes: errors,
        });
    }

    match &scan.fallback {
        Some(fallback) => {
            tracing::info!(site = ctx.site_id(), "http scan empty, using list fallback");
            let mut extraction = list::scrape_list(ctx, fallback)?;
            extraction.notes.extend(errors);
            extraction.notes.push("list fallback".to_string());
            Ok(extraction)
        }
        None if !errors.is_empty() => Err(ExtractionFailure::fetch(
            ctx.site_id(),
            "http_scan",
            Some(anyhow!(errors.join("; "))),
        )),
        None => Ok(Extraction::default()),
    }
}
