// src/ingest/outline.rs
//! Page outline used when tuning a new source: which headings and date
//! elements the page has, and what wraps them.
use scraper::Html;
use serde::Serialize;

use crate::ingest::dom::{find_all, find_all_of, inline_text, nearest_ancestor, DomNode};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HeadingEntry {
    pub tag: String,
    pub text: String,
    /// `class` of the nearest enclosing `div`, if any.
    pub container_class: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DateEntry {
    pub text: String,
    pub datetime: Option<String>,
    pub parent_tag: Option<String>,
    pub parent_class: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PageOutline {
    pub headings: Vec<HeadingEntry>,
    pub dates: Vec<DateEntry>,
}

impl PageOutline {
    pub fn from_document(document: &str) -> Self {
        let html = Html::parse_document(document);
        Self::from_root(&html.root_element())
    }

    pub fn from_root<N: DomNode>(root: &N) -> Self {
        let headings = find_all_of(root, &["h2", "h3"])
            .into_iter()
            .map(|h| HeadingEntry {
                tag: h.tag_name().to_string(),
                text: inline_text(&h),
                container_class: nearest_ancestor(&h, "div")
                    .and_then(|d| d.attribute("class").map(str::to_string)),
            })
            .collect();

        let dates = find_all(root, "time")
            .into_iter()
            .map(|t| {
                let parent = t.parent_element();
                DateEntry {
                    text: inline_text(&t),
                    datetime: t.attribute("datetime").map(str::to_string),
                    parent_tag: parent.as_ref().map(|p| p.tag_name().to_string()),
                    parent_class: parent
                        .as_ref()
                        .and_then(|p| p.attribute("class").map(str::to_string)),
                }
            })
            .collect();

        Self { headings, dates }
    }

    /// Plain-text rendering for the CLI.
    pub fn to_text(&self) -> String {
        let mut out = format!("headings ({}):\n", self.headings.len());
        for h in &self.headings {
            out.push_str(&format!(
                "  <{}> {}  [div.{}]\n",
                h.tag,
                h.text,
                h.container_class.as_deref().unwrap_or("-")
            ));
        }
        out.push_str(&format!("dates ({}):\n", self.dates.len()));
        for d in &self.dates {
            out.push_str(&format!(
                "  {}  (parent <{}> class={})\n",
                d.text,
                d.parent_tag.as_deref().unwrap_or("?"),
                d.parent_class.as_deref().unwrap_or("-")
            ));
        }
        out
    }
}
