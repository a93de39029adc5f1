// ABOUTME: Banner strategy: probe selector candidates on the homepage for same-host image links.
// ABOUTME: The first candidate that yields at least one qualifying link wins.

use url::Url;

use crate::error::ExtractionFailure;
use crate::extract::{first_non_empty, ExtractContext, Extraction};
use crate::item::{resolve_href, ItemList, BANNER_PLACEHOLDER};
use crate::sites::compiled::CompiledBanner;

fn bare_host(url: &Url) -> Option<&str> {
    url.host_str().map(|h| h.strip_prefix("www.").unwrap_or(h))
}

/// True when both URLs point at the same host, ignoring a `www.` prefix.
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (bare_host(a), bare_host(b)) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

pub fn scrape_banner(
    ctx: &mut ExtractContext<'_>,
    banner: &CompiledBanner,
) -> Result<Extraction, ExtractionFailure> {
    let spec = &banner.spec;
    ctx.goto(&spec.home_url, "banner")?;

    for selector in &spec.selectors {
        let anchors = match ctx.page.anchors(selector) {
            Ok(a) => a,
            Err(e) => {
                tracing::debug!(site = ctx.site_id(), selector = %selector, error = %e, "selector skipped");
                continue;
            }
        };

        let mut items = ItemList::new();
        for anchor in &anchors {
            if items.len() >= spec.max_items {
                break;
            }
            if spec.image_links_only && !anchor.has_image {
                continue;
            }
            let Some(url) = resolve_href(&banner.base, &anchor.href) else {
                continue;
            };
            if spec.same_host && !same_host(&url, &banner.base) {
                continue;
            }
            if !banner.filter.accepts(url.as_str()) {
                continue;
            }
            let title = first_non_empty([
                anchor.aria_label.as_deref(),
                anchor.img_alt.as_deref(),
                Some(anchor.text.as_str()),
            ])
            .unwrap_or_else(|| BANNER_PLACEHOLDER.to_string());
            items.push(ctx.make_item(&url, title));
        }

        if !items.is_empty() {
            tracing::info!(site = ctx.site_id(), selector = %selector, count = items.len(), "banner scraped");
            return Ok(Extraction {
                items: items.into_vec(),
                hard_failure: false,
                notes: vec![format!("selector {}", selector)],
            });
        }
    }

    tracing::info!(site = ctx.site_id(), "no banner links matched");
    Ok(Extraction::default())
}
