// src/ingest/types.rs
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::SourceKind;
use crate::error::Result;

/// Title used when no heading can be found for an entry.
pub const NO_TITLE: &str = "No Title";

/// One extracted entry, before dedup/filter/batch decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateItem {
    pub source_name: String,
    pub kind: SourceKind,
    pub title: String,
    pub date_text: String,
    pub link: Url,
    pub content_summary: String,
    pub identity: String,
}

impl CandidateItem {
    pub fn new(
        source_name: &str,
        kind: SourceKind,
        title: String,
        date_text: String,
        link: Url,
        content_summary: String,
    ) -> Self {
        let identity = identity_for(&date_text, &title);
        Self {
            source_name: source_name.to_string(),
            kind,
            title,
            date_text,
            link,
            content_summary,
            identity,
        }
    }
}

/// Natural key of an item across cycles. Same date text and title means same item.
pub fn identity_for(date_text: &str, title: &str) -> String {
    format!("{date_text}-{title}")
}

/// Result of a connectivity check against a URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeResult {
    pub ok: bool,
    pub status: Option<u16>,
    pub message: String,
}

/// Fetches a page body. Implementations must bound every request with a timeout.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;

    async fn probe(&self, url: &str) -> ProbeResult {
        match self.fetch(url).await {
            Ok(_) => ProbeResult {
                ok: true,
                status: None,
                message: "reachable".to_string(),
            },
            Err(e) => ProbeResult {
                ok: false,
                status: None,
                message: e.to_string(),
            },
        }
    }
}
