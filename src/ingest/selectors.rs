// src/ingest/selectors.rs
//! Selector-driven extraction for `generic_html` sources.
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::config::{SelectorSpec, SourceProfile};
use crate::error::MonitorError;
use crate::ingest::dom::{inline_text, DomNode};
use crate::ingest::extract::resolve_link;
use crate::ingest::types::CandidateItem;

pub const DEFAULT_TITLE_SELECTOR: &str = "h1, h2, h3";
pub const DEFAULT_DATE_SELECTOR: &str = "time";
pub const DEFAULT_LINK_SELECTOR: &str = "a[href]";

struct Compiled {
    item: Selector,
    title: Selector,
    date: Selector,
    link: Selector,
}

fn compile(spec: &SelectorSpec) -> Result<Compiled, String> {
    let parse = |css: &str| Selector::parse(css).map_err(|e| format!("{css:?}: {e}"));
    Ok(Compiled {
        item: parse(&spec.item)?,
        title: parse(spec.title.as_deref().unwrap_or(DEFAULT_TITLE_SELECTOR))?,
        date: parse(spec.date.as_deref().unwrap_or(DEFAULT_DATE_SELECTOR))?,
        link: parse(spec.link.as_deref().unwrap_or(DEFAULT_LINK_SELECTOR))?,
    })
}

/// Check that every selector in `spec` parses.
pub fn validate(spec: &SelectorSpec) -> Result<(), String> {
    compile(spec).map(|_| ())
}

/// One candidate per `item` match. Matches without a title are skipped.
pub fn extract_with_selectors(
    html: &Html,
    profile: &SourceProfile,
    spec: &SelectorSpec,
    base: &Url,
) -> Vec<CandidateItem> {
    let sel = match compile(spec) {
        Ok(s) => s,
        Err(e) => {
            warn!(source = %profile.name, error = %e, "invalid selector; source yields nothing");
            return Vec::new();
        }
    };

    let first_text = |item: &ElementRef<'_>, s: &Selector| {
        item.select(s)
            .map(|el| inline_text(&el))
            .find(|t| !t.is_empty())
    };

    html.select(&sel.item)
        .filter_map(|item| {
            let Some(title) = first_text(&item, &sel.title) else {
                let e = MonitorError::ExtractionAnomaly("item matched without a title".into());
                debug!(source = %profile.name, error = %e, "skipping item");
                return None;
            };
            let date = first_text(&item, &sel.date);
            let href = if item.tag_name() == "a" {
                item.attribute("href").map(str::to_string)
            } else {
                None
            }
            .or_else(|| {
                item.select(&sel.link)
                    .find_map(|a| a.attribute("href").map(str::to_string))
            });
            let link = href
                .map(|h| resolve_link(h.trim(), base))
                .unwrap_or_else(|| base.clone());

            Some(CandidateItem::new(
                &profile.name,
                profile.kind,
                title,
                date.unwrap_or_default(),
                link,
                String::new(),
            ))
        })
        .collect()
}
