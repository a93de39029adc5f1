// ABOUTME: Click-through strategy for listings whose cards route in JavaScript and carry no hrefs.
// ABOUTME: Each card is clicked in turn, the detail URL is read, and the list is restored.

use url::Url;

use crate::error::ExtractionFailure;
use crate::extract::{ExtractContext, Extraction};
use crate::item::{collapse_whitespace, ItemList};
use crate::sites::compiled::CompiledClick;

/// Returns to the listing after a click, preferring history navigation.
fn back_to_list(ctx: &mut ExtractContext<'_>, list_url: &str) -> Result<(), ExtractionFailure> {
    if ctx.page.current_url() == list_url {
        return Ok(());
    }
    match ctx.page.go_back(ctx.timeouts.navigation) {
        Ok(()) if ctx.page.current_url() == list_url => {
            ctx.page.settle(ctx.timeouts.settle);
            Ok(())
        }
        _ => ctx.goto(list_url, "list_restore").map(|_| ()),
    }
}

pub fn scrape_click_through(
    ctx: &mut ExtractContext<'_>,
    click: &CompiledClick,
) -> Result<Extraction, ExtractionFailure> {
    let spec = &click.spec;
    ctx.goto(&spec.list_url, "list")?;

    let total = ctx
        .page
        .count(&spec.card_selector)
        .map_err(|e| ExtractionFailure::from_browser(ctx.site_id(), "cards", e))?;
    let limit = total.min(spec.max_cards);
    tracing::debug!(site = ctx.site_id(), total, limit, "cards found");

    let mut items = ItemList::new();
    let mut notes = Vec::new();
    let mut attempted = 0usize;
    let mut failed = 0usize;

    for index in 0..limit {
        // The DOM is rebuilt after every navigation, so re-query each time.
        let available = ctx.page.count(&spec.card_selector).unwrap_or(0);
        if index >= available {
            notes.push(format!("card list shrank to {} at {}", available, index));
            break;
        }
        let card_text = ctx
            .page
            .texts(&spec.card_selector)
            .ok()
            .and_then(|texts| texts.into_iter().nth(index))
            .map(|t| collapse_whitespace(&t))
            .filter(|t| !t.is_empty());

        attempted += 1;
        let clicked = ctx
            .page
            .click_nth(&spec.card_selector, index)
            .and_then(|()| ctx.page.wait_for_url(&click.detail, ctx.timeouts.click));

        match clicked {
            Ok(()) => {
                ctx.page.settle(ctx.timeouts.settle);
                let current = ctx.page.current_url();
                match Url::parse(&current) {
                    Ok(url) => {
                        let title = card_text
                            .or_else(|| ctx.page.title().ok().map(|t| collapse_whitespace(&t)))
                            .filter(|t| !t.is_empty())
                            .unwrap_or_else(|| current.clone());
                        items.push(ctx.make_item(&url, title));
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(site = ctx.site_id(), url = %current, error = %e, "detail url unparsable");
                    }
                }
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(site = ctx.site_id(), index, error = %e, "card click failed");
                ctx.capture(&format!("click_{}", index), &e.to_string());
            }
        }

        if let Err(e) = back_to_list(ctx, &spec.list_url) {
            tracing::warn!(site = ctx.site_id(), error = %e, "could not restore list");
            notes.push(format!("stopped after card {}: {}", index, e));
            break;
        }
    }

    let hard_failure = attempted > 0 && failed == attempted;
    if hard_failure {
        tracing::warn!(site = ctx.site_id(), attempted, "every card click failed");
    }
    tracing::info!(site = ctx.site_id(), count = items.len(), attempted, failed, "click-through done");
    Ok(Extraction {
        items: items.into_vec(),
        hard_failure,
        notes,
    })
}
