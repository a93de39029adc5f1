// ABOUTME: List-page strategy: collect allow-listed anchors from a listing, optionally across pages.
// ABOUTME: Pagination stops after a run of pages without a single matching link.

use crate::browser::Anchor;
use crate::error::ExtractionFailure;
use crate::extract::{first_non_empty, ExtractContext, Extraction};
use crate::item::{resolve_href, Item, ItemList};
use crate::sites::compiled::CompiledList;

/// Converts an anchor into an item if it passes the site's filter and has
/// some title text.
pub(crate) fn anchor_to_item(
    ctx: &ExtractContext<'_>,
    list: &CompiledList,
    anchor: &Anchor,
) -> Option<Item> {
    let url = resolve_href(&list.base, &anchor.href)?;
    if !list.filter.accepts(url.as_str()) {
        return None;
    }
    let title = first_non_empty([
        Some(anchor.text.as_str()),
        anchor.aria_label.as_deref(),
        anchor.img_alt.as_deref(),
    ])?;
    Some(ctx.make_item(&url, title))
}

/// Adds matching anchors from the current page; returns how many matched,
/// counting links already collected from earlier pages.
fn collect_page(
    ctx: &mut ExtractContext<'_>,
    list: &CompiledList,
    items: &mut ItemList,
) -> Result<usize, ExtractionFailure> {
    let anchors = ctx
        .page
        .anchors(&list.spec.link_selector)
        .map_err(|e| ExtractionFailure::from_browser(ctx.site_id(), "anchors", e))?;
    let mut matched = 0;
    for anchor in &anchors {
        let Some(item) = anchor_to_item(ctx, list, anchor) else {
            continue;
        };
        matched += 1;
        if items.len() < list.spec.max_items {
            items.push(item);
        }
    }
    Ok(matched)
}

/// Runs the list-anchor strategy.
pub fn scrape_list(
    ctx: &mut ExtractContext<'_>,
    list: &CompiledList,
) -> Result<Extraction, ExtractionFailure> {
    let mut items = ItemList::new();
    let mut notes = Vec::new();

    match &list.spec.pagination {
        None => {
            ctx.goto(&list.spec.list_url, "list")?;
            collect_page(ctx, list, &mut items)?;
        }
        Some(pagination) => {
            let mut empty_streak = 0;
            for page_no in 1..=pagination.max_pages {
                let url = pagination.template.replace("{page}", &page_no.to_string());
                if let Err(e) = ctx.goto(&url, "list_page") {
                    if page_no == 1 {
                        return Err(e);
                    }
                    tracing::warn!(site = ctx.site_id(), page = page_no, error = %e, "pagination stopped");
                    notes.push(format!("pagination stopped at page {}", page_no));
                    break;
                }
                if collect_page(ctx, list, &mut items)? == 0 {
                    empty_streak += 1;
                    if empty_streak >= pagination.stop_after_empty {
                        break;
                    }
                } else {
                    empty_streak = 0;
                }
                if items.len() >= list.spec.max_items {
                    break;
                }
            }
        }
    }

    tracing::info!(site = ctx.site_id(), count = items.len(), "list scraped");
    Ok(Extraction {
        items: items.into_vec(),
        hard_failure: false,
        notes,
    })
}
