// src/ingest/extract.rs
//! Date-anchor extraction.
//!
//! Pages rarely say what a "list item" is, but they almost always mark dates
//! with `<time>`. Every `<time>` element's parent becomes an anchor node, and
//! title and link are resolved outward from there through ordered resolver
//! chains. Each resolver either resolves or hands over to the next one.

use scraper::Html;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{SourceKind, SourceProfile};
use crate::error::MonitorError;
use crate::ingest::dom::{enclosing_link, find_all, find_first, find_first_by, inline_text, spaced_text, squash_whitespace, DomNode};
use crate::ingest::selectors;
use crate::ingest::types::{CandidateItem, NO_TITLE};

/// Summary cap for release-note entries, in characters.
pub const CONTENT_MAX_CHARS: usize = 200;
const ATTRIBUTION_MARKER: &str = "By ";

/// Outcome of one resolver in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Resolved(T),
    Next,
}

impl Resolution<String> {
    /// Empty or whitespace-only text counts as unresolved.
    fn non_empty(text: String) -> Self {
        if text.trim().is_empty() {
            Resolution::Next
        } else {
            Resolution::Resolved(text)
        }
    }
}

/// What resolvers can see about one date-anchored entry.
pub struct AnchorContext<N> {
    pub anchor: N,
    pub date_text: String,
}

pub type Resolver<N> = fn(&AnchorContext<N>) -> Resolution<String>;

/// Run resolvers in order, returning the first resolved value.
pub fn resolve_first<N>(ctx: &AnchorContext<N>, chain: &[Resolver<N>]) -> Option<String> {
    chain.iter().find_map(|r| match r(ctx) {
        Resolution::Resolved(v) => Some(v),
        Resolution::Next => None,
    })
}

/// Title resolvers for a source kind, most specific first.
pub fn title_chain<N: DomNode>(kind: SourceKind) -> Vec<Resolver<N>> {
    let mut chain: Vec<Resolver<N>> = vec![heading_in_anchor::<N>];
    if kind == SourceKind::Blog {
        chain.push(block_in_enclosing_link::<N>);
        chain.push(enclosing_link_text::<N>);
        chain.push(anchor_text_without_date::<N>);
    }
    chain
}

/// Link resolvers; each yields a raw `href`.
pub fn link_chain<N: DomNode>() -> Vec<Resolver<N>> {
    vec![
        anchor_href::<N>,
        descendant_href::<N>,
        enclosing_href::<N>,
    ]
}

fn heading_in_anchor<N: DomNode>(ctx: &AnchorContext<N>) -> Resolution<String> {
    match find_first(&ctx.anchor, &["h2", "h3"]) {
        Some(h) => Resolution::non_empty(inline_text(&h)),
        None => Resolution::Next,
    }
}

fn block_in_enclosing_link<N: DomNode>(ctx: &AnchorContext<N>) -> Resolution<String> {
    let Some(link) = enclosing_link(&ctx.anchor) else {
        return Resolution::Next;
    };
    match find_first(&link, &["h2", "h3", "div"]) {
        Some(block) => Resolution::non_empty(remove_text(&inline_text(&block), &ctx.date_text)),
        None => Resolution::Next,
    }
}

fn enclosing_link_text<N: DomNode>(ctx: &AnchorContext<N>) -> Resolution<String> {
    let Some(link) = enclosing_link(&ctx.anchor) else {
        return Resolution::Next;
    };
    let text = remove_text(&spaced_text(&link), &ctx.date_text);
    Resolution::non_empty(cut_attribution(&text))
}

fn anchor_text_without_date<N: DomNode>(ctx: &AnchorContext<N>) -> Resolution<String> {
    Resolution::non_empty(remove_text(&spaced_text(&ctx.anchor), &ctx.date_text))
}

fn anchor_href<N: DomNode>(ctx: &AnchorContext<N>) -> Resolution<String> {
    if ctx.anchor.tag_name() != "a" {
        return Resolution::Next;
    }
    href_of(&ctx.anchor)
}

fn descendant_href<N: DomNode>(ctx: &AnchorContext<N>) -> Resolution<String> {
    match find_first_by(&ctx.anchor, |n| n.tag_name() == "a" && n.attribute("href").is_some()) {
        Some(a) => href_of(&a),
        None => Resolution::Next,
    }
}

fn enclosing_href<N: DomNode>(ctx: &AnchorContext<N>) -> Resolution<String> {
    match enclosing_link(&ctx.anchor) {
        Some(a) => href_of(&a),
        None => Resolution::Next,
    }
}

fn href_of<N: DomNode>(node: &N) -> Resolution<String> {
    Resolution::non_empty(node.attribute("href").unwrap_or_default().trim().to_string())
}

/// Remove every occurrence of `needle` and re-squash whitespace.
fn remove_text(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        return squash_whitespace(haystack);
    }
    squash_whitespace(&haystack.replace(needle, ""))
}

/// Drop a trailing "By <author>" attribution.
fn cut_attribution(text: &str) -> String {
    match text.find(ATTRIBUTION_MARKER) {
        Some(i) => text[..i].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Cap at `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Absolute http(s) hrefs are kept; anything else is joined onto the source URL.
pub fn resolve_link(href: &str, base: &Url) -> Url {
    match Url::parse(href) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => u,
        Ok(_) => base.clone(),
        Err(_) => base.join(href).unwrap_or_else(|_| base.clone()),
    }
}

/// Extract candidates from a fetched document. Never fails: problems are logged
/// and yield fewer (or no) items.
pub fn extract(document: &str, profile: &SourceProfile) -> Vec<CandidateItem> {
    let base = match Url::parse(profile.url.trim()) {
        Ok(u) => u,
        Err(e) => {
            warn!(source = %profile.name, url = %profile.url, error = %e, "source url is not absolute; skipping extraction");
            return Vec::new();
        }
    };
    let html = Html::parse_document(document);

    let items = match profile.kind {
        SourceKind::GenericHtml => match &profile.selectors {
            Some(spec) => selectors::extract_with_selectors(&html, profile, spec, &base),
            None => {
                debug!(source = %profile.name, "generic_html source has no selectors yet");
                Vec::new()
            }
        },
        SourceKind::ReleaseNotes | SourceKind::Blog => {
            extract_date_anchored(&html.root_element(), profile, &base)
        }
    };

    info!(source = %profile.name, count = items.len(), "extracted candidates");
    items
}

/// Date-anchor heuristic over any element tree rooted at `root`.
pub fn extract_date_anchored<N: DomNode>(
    root: &N,
    profile: &SourceProfile,
    base: &Url,
) -> Vec<CandidateItem> {
    let titles = title_chain::<N>(profile.kind);
    let links = link_chain::<N>();
    let mut used_anchors: HashSet<usize> = HashSet::new();
    let mut out = Vec::new();

    for time_el in find_all(root, "time") {
        match extract_entry(&time_el, profile, base, &titles, &links, &mut used_anchors) {
            Ok(Some(item)) => out.push(item),
            Ok(None) => {}
            Err(e) => debug!(source = %profile.name, error = %e, "skipping date element"),
        }
    }
    out
}

fn extract_entry<N: DomNode>(
    time_el: &N,
    profile: &SourceProfile,
    base: &Url,
    titles: &[Resolver<N>],
    links: &[Resolver<N>],
    used_anchors: &mut HashSet<usize>,
) -> Result<Option<CandidateItem>, MonitorError> {
    let anchor = time_el
        .parent_element()
        .ok_or_else(|| MonitorError::ExtractionAnomaly("date element has no parent".into()))?;
    if !used_anchors.insert(anchor.node_key()) {
        return Ok(None);
    }

    let ctx = AnchorContext {
        anchor,
        date_text: inline_text(time_el),
    };

    let title = resolve_first(&ctx, titles).unwrap_or_else(|| NO_TITLE.to_string());
    let link = resolve_first(&ctx, links)
        .map(|href| resolve_link(&href, base))
        .unwrap_or_else(|| base.clone());

    let content = if profile.kind == SourceKind::ReleaseNotes {
        let body = remove_text(&spaced_text(&ctx.anchor), &title);
        truncate_chars(&remove_text(&body, &ctx.date_text), CONTENT_MAX_CHARS)
    } else {
        String::new()
    };

    Ok(Some(CandidateItem::new(
        &profile.name,
        profile.kind,
        title,
        ctx.date_text,
        link,
        content,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.figma.com/release-notes/").unwrap()
    }

    #[test]
    fn relative_links_join_onto_source() {
        assert_eq!(
            resolve_link("/blog/dev-mode/", &base()).as_str(),
            "https://www.figma.com/blog/dev-mode/"
        );
        assert_eq!(
            resolve_link("?id=4", &base()).as_str(),
            "https://www.figma.com/release-notes/?id=4"
        );
        assert_eq!(
            resolve_link("https://help.figma.com/x", &base()).as_str(),
            "https://help.figma.com/x"
        );
        assert_eq!(resolve_link("javascript:void(0)", &base()), base());
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let s = "é".repeat(201);
        let t = truncate_chars(&s, 200);
        assert_eq!(t.chars().count(), 203);
        assert!(t.ends_with("..."));
        assert_eq!(truncate_chars("short", 200), "short");
    }

    #[test]
    fn attribution_is_cut() {
        assert_eq!(cut_attribution("Designing at scale By Jane Doe"), "Designing at scale");
        assert_eq!(cut_attribution("No author here"), "No author here");
    }

    #[test]
    fn generic_without_selectors_is_empty_not_error() {
        let p = SourceProfile::new("Tableau", "https://www.tableau.com/blog", SourceKind::GenericHtml);
        let html = "<article><time>May 1</time><h2>Hello</h2></article>";
        assert!(extract(html, &p).is_empty());
    }

    #[test]
    fn bad_source_url_yields_nothing() {
        let p = SourceProfile::new("Broken", "not a url", SourceKind::ReleaseNotes);
        assert!(extract("<div><time>May 1</time><h2>x</h2></div>", &p).is_empty());
    }

    #[test]
    fn shared_parent_is_used_once() {
        let p = SourceProfile::new("Notes", "https://x.test/notes", SourceKind::ReleaseNotes);
        let html = r#"<div><time>May 1</time><time>May 2</time><h2>Only once</h2></div>"#;
        let items = extract(html, &p);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].date_text, "May 1");
    }

    #[test]
    fn inline_markup_in_titles_keeps_word_spacing() {
        let p = SourceProfile::new("Notes", "https://x.test/notes", SourceKind::ReleaseNotes);
        let html = "<div><time>May 1</time><h2>Auto <em>layout</em> wrap</h2></div>";
        let items = extract(html, &p);
        assert_eq!(items[0].title, "Auto layout wrap");
        assert_eq!(items[0].identity, "May 1-Auto layout wrap");
    }

    #[test]
    fn missing_heading_outside_blog_is_sentinel() {
        let p = SourceProfile::new("Notes", "https://x.test/notes", SourceKind::ReleaseNotes);
        let items = extract("<p><time>May 1</time> bare text</p>", &p);
        assert_eq!(items[0].title, NO_TITLE);
        assert_eq!(items[0].link.as_str(), "https://x.test/notes");
        assert_eq!(items[0].identity, "May 1-No Title");
    }
}
