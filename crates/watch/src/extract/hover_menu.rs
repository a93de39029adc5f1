// ABOUTME: Hover-menu strategy: reveal an event submenu by hovering, then check the fixed detail pages.
// ABOUTME: A fixed page failing its validity check is a hard failure even though the item is kept.

use url::Url;

use crate::browser::Page;
use crate::error::ExtractionFailure;
use crate::extract::{first_non_empty, ExtractContext, Extraction};
use crate::item::{capture_id, resolve_href, ItemList};
use crate::sites::catalog::ValiditySpec;
use crate::sites::compiled::CompiledHover;

/// Checks that a fixed event page rendered the real event app rather than
/// an error or redirect page.
pub fn looks_valid(page: &dyn Page, validity: &ValiditySpec) -> bool {
    let title = page.title().unwrap_or_default();
    let title_ok = validity.title_markers.is_empty()
        || validity.title_markers.iter().any(|m| title.contains(m.as_str()));
    let url_ok = page.current_url().contains(&validity.url_fragment);
    let app_ok = validity.app_marker.is_empty()
        || page
            .content()
            .map(|html| html.contains(&validity.app_marker))
            .unwrap_or(false);
    title_ok && url_ok && app_ok
}

fn menu_items(
    ctx: &mut ExtractContext<'_>,
    hover: &CompiledHover,
    items: &mut ItemList,
) -> Result<(), String> {
    let spec = &hover.spec;
    ctx.goto(&spec.home_url, "home").map_err(|e| e.to_string())?;
    ctx.page
        .hover(&spec.menu_selector, ctx.timeouts.action)
        .map_err(|e| format!("hover {}: {}", spec.menu_selector, e))?;
    ctx.page.settle(ctx.timeouts.settle);
    let anchors = ctx
        .page
        .anchors(&spec.submenu_selector)
        .map_err(|e| format!("submenu {}: {}", spec.submenu_selector, e))?;

    for anchor in &anchors {
        let Some(url) = resolve_href(&hover.base, &anchor.href) else {
            continue;
        };
        if !hover.detail.is_match(url.as_str()) {
            continue;
        }
        let title = first_non_empty([Some(anchor.text.as_str()), anchor.aria_label.as_deref()])
            .unwrap_or_else(|| fallback_title(hover, &url));
        items.push(ctx.make_item(&url, title));
    }
    Ok(())
}

fn fallback_title(hover: &CompiledHover, url: &Url) -> String {
    match capture_id(&hover.detail, url.as_str()) {
        Some(id) => format!("Event {}", id),
        None => url.to_string(),
    }
}

pub fn scrape_hover_menu(
    ctx: &mut ExtractContext<'_>,
    hover: &CompiledHover,
) -> Result<Extraction, ExtractionFailure> {
    let spec = &hover.spec;
    let mut items = ItemList::new();
    let mut notes = Vec::new();

    // Menu discovery is best effort; the fixed pages below are the baseline.
    if let Err(reason) = menu_items(ctx, hover, &mut items) {
        tracing::debug!(site = ctx.site_id(), reason = %reason, "menu discovery skipped");
        notes.push(format!("menu: {}", reason));
    }

    let mut bad = Vec::new();
    for fixed in &spec.fixed_urls {
        let Ok(url) = Url::parse(fixed) else {
            bad.push(format!("{} unparsable", fixed));
            continue;
        };
        match ctx.page.goto(fixed, ctx.timeouts.navigation) {
            Ok(nav) => {
                ctx.page.settle(ctx.timeouts.settle);
                if !looks_valid(&*ctx.page, &spec.validity) {
                    let title = ctx.page.title().unwrap_or_default();
                    bad.push(format!(
                        "{} status={} final={} title={:?}",
                        fixed,
                        nav.status.map(|s| s.to_string()).unwrap_or_else(|| "?".to_string()),
                        ctx.page.current_url(),
                        title
                    ));
                }
            }
            Err(e) => bad.push(format!("{} error={}", fixed, e)),
        }
        let title = fallback_title(hover, &url);
        items.push(ctx.make_item(&url, title));
    }

    let hard_failure = !bad.is_empty();
    if hard_failure {
        let report = bad.join("\n");
        tracing::warn!(site = ctx.site_id(), bad = bad.len(), "fixed event pages failed validation");
        ctx.capture("fixed_url_bad", &report);
        ctx.debug
            .capture_text(&format!("{}_fixed_url_bad_info", ctx.site_id()), &report);
        notes.extend(bad);
    }

    tracing::info!(site = ctx.site_id(), count = items.len(), "hover menu done");
    Ok(Extraction {
        items: items.into_vec(),
        hard_failure,
        notes,
    })
}
