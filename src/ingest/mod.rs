// src/ingest/mod.rs
pub mod dom;
pub mod extract;
pub mod fetch;
pub mod outline;
pub mod selectors;
pub mod types;

pub use extract::extract;
pub use fetch::HttpFetcher;
pub use outline::PageOutline;
pub use types::{identity_for, CandidateItem, PageFetcher, ProbeResult, NO_TITLE};

use tracing::warn;

use crate::config::SourceProfile;
use crate::error::Result;

/// Fetch one source and extract its candidates.
///
/// A fetch failure is returned so the caller can record it; extraction itself
/// never fails.
pub async fn fetch_source(
    fetcher: &dyn PageFetcher,
    profile: &SourceProfile,
) -> Result<Vec<CandidateItem>> {
    let body = fetcher.fetch(&profile.url).await.inspect_err(|e| {
        warn!(source = %profile.name, error = %e, "fetch failed; source contributes nothing");
    })?;
    Ok(extract(&body, profile))
}
