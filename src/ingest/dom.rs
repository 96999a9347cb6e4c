// src/ingest/dom.rs
//! Element capability the extractor works against.
//!
//! The heuristics only need tag names, attributes, parent/children and text,
//! so they are written over [`DomNode`] instead of a concrete parser type.
//! `scraper` is the production implementation; tests can build synthetic trees.

use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::ElementRef;
use std::ops::Deref;

/// Upper bound for any upward walk through ancestors.
pub const MAX_ANCESTOR_DEPTH: usize = 32;

/// A DOM element. Equality must mean "same node", not "same content".
pub trait DomNode: Clone + PartialEq {
    /// Lowercase tag name, e.g. `"time"`.
    fn tag_name(&self) -> &str;
    fn attribute(&self, name: &str) -> Option<&str>;
    fn parent_element(&self) -> Option<Self>;
    fn child_elements(&self) -> Vec<Self>;
    /// All descendant text nodes in document order.
    fn text_fragments(&self) -> Vec<String>;
    /// Hashable key, equal for two handles exactly when they compare equal.
    fn node_key(&self) -> usize;
}

impl<'a> DomNode for ElementRef<'a> {
    fn tag_name(&self) -> &str {
        self.value().name()
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }

    fn parent_element(&self) -> Option<Self> {
        Deref::deref(self).parent().and_then(ElementRef::wrap)
    }

    fn child_elements(&self) -> Vec<Self> {
        Deref::deref(self)
            .children()
            .filter_map(ElementRef::wrap)
            .collect()
    }

    fn text_fragments(&self) -> Vec<String> {
        ElementRef::text(self).map(str::to_string).collect()
    }

    // Nodes live in the document's arena, so the address is stable per node.
    fn node_key(&self) -> usize {
        self.value() as *const scraper::node::Element as usize
    }
}

/// Collapse runs of whitespace (incl. nbsp) to one space and trim.
pub fn squash_whitespace(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re = RE_WS.get_or_init(|| Regex::new(r"[\s\u{00A0}]+").expect("whitespace regex"));
    re.replace_all(s, " ").trim().to_string()
}

/// Text as rendered inline: fragments concatenated. Used for titles and dates.
pub fn inline_text<N: DomNode>(node: &N) -> String {
    squash_whitespace(&node.text_fragments().concat())
}

/// Full visible text with fragments separated by a space. Used for whole blocks.
pub fn spaced_text<N: DomNode>(node: &N) -> String {
    squash_whitespace(&node.text_fragments().join(" "))
}

/// First descendant (document order, excluding `node`) whose tag is in `tags`.
pub fn find_first<N: DomNode>(node: &N, tags: &[&str]) -> Option<N> {
    let mut stack: Vec<N> = node.child_elements().into_iter().rev().collect();
    while let Some(el) = stack.pop() {
        if tags.contains(&el.tag_name()) {
            return Some(el);
        }
        stack.extend(el.child_elements().into_iter().rev());
    }
    None
}

/// First descendant satisfying `pred`, in document order.
pub fn find_first_by<N: DomNode>(node: &N, pred: impl Fn(&N) -> bool) -> Option<N> {
    let mut stack: Vec<N> = node.child_elements().into_iter().rev().collect();
    while let Some(el) = stack.pop() {
        if pred(&el) {
            return Some(el);
        }
        stack.extend(el.child_elements().into_iter().rev());
    }
    None
}

/// All descendants with the given tag, in document order.
pub fn find_all<N: DomNode>(node: &N, tag: &str) -> Vec<N> {
    find_all_of(node, &[tag])
}

/// All descendants whose tag is any of `tags`, in document order.
pub fn find_all_of<N: DomNode>(node: &N, tags: &[&str]) -> Vec<N> {
    let mut out = Vec::new();
    let mut stack: Vec<N> = node.child_elements().into_iter().rev().collect();
    while let Some(el) = stack.pop() {
        if tags.contains(&el.tag_name()) {
            out.push(el.clone());
        }
        stack.extend(el.child_elements().into_iter().rev());
    }
    out
}

/// Walk up from `start` (inclusive) to the nearest hyperlink.
///
/// Stops without a result at `body`/`html`, at the document root, or after
/// [`MAX_ANCESTOR_DEPTH`] steps.
pub fn enclosing_link<N: DomNode>(start: &N) -> Option<N> {
    let mut curr = Some(start.clone());
    for _ in 0..=MAX_ANCESTOR_DEPTH {
        let node = curr?;
        match node.tag_name() {
            "a" => return Some(node),
            "body" | "html" => return None,
            _ => curr = node.parent_element(),
        }
    }
    None
}

/// Nearest ancestor (exclusive) with the given tag, bounded like [`enclosing_link`].
pub fn nearest_ancestor<N: DomNode>(start: &N, tag: &str) -> Option<N> {
    let mut curr = start.parent_element();
    for _ in 0..MAX_ANCESTOR_DEPTH {
        let node = curr?;
        if node.tag_name() == tag {
            return Some(node);
        }
        curr = node.parent_element();
    }
    None
}
