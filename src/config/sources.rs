// src/config/sources.rs
use serde::{Deserialize, Serialize};

/// How a source page is laid out, which picks the extraction heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[serde(alias = "figma_release_notes")]
    ReleaseNotes,
    #[serde(alias = "figma_blog")]
    Blog,
    #[serde(alias = "html_generic", alias = "generic")]
    GenericHtml,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ReleaseNotes => "release_notes",
            SourceKind::Blog => "blog",
            SourceKind::GenericHtml => "generic_html",
        }
    }
}

/// CSS selectors for a `generic_html` source. Only `item` is required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorSpec {
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// One monitored page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceProfile {
    pub name: String,
    pub url: String,
    #[serde(alias = "type")]
    pub kind: SourceKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<SelectorSpec>,
}

impl SourceProfile {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            enabled: true,
            selectors: None,
        }
    }

    pub fn with_selectors(mut self, selectors: SelectorSpec) -> Self {
        self.selectors = Some(selectors);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Built-in sources written into a fresh config file.
pub fn default_seed() -> Vec<SourceProfile> {
    vec![
        SourceProfile::new(
            "Release Notes",
            "https://www.figma.com/release-notes/",
            SourceKind::ReleaseNotes,
        ),
        SourceProfile::new("Blog", "https://www.figma.com/blog/", SourceKind::Blog),
    ]
}
