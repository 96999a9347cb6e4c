// src/error.rs
//! Error taxonomy for one monitoring cycle.
//!
//! Only the delivery-state variants abort a cycle; everything else is scoped
//! to a single source, candidate, or message and is logged by the caller.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Network/HTTP failure for one source. The source contributes nothing this cycle.
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Unexpected DOM shape for one candidate or one document.
    #[error("unexpected document shape: {0}")]
    ExtractionAnomaly(String),

    /// Translation service failure. Callers fall back to the source text.
    #[error("translation failed: {0}")]
    Translation(String),

    /// Webhook delivery failed. Delivery state is still committed.
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("delivery state {}: {source}", .path.display())]
    StateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("delivery state {} is not valid JSON: {source}", .path.display())]
    StateCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "delivery state {} is locked by another run (remove {} if stale)",
        .path.display(),
        .lock.display()
    )]
    StateLocked { path: PathBuf, lock: PathBuf },
}

impl MonitorError {
    pub fn fetch(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// True for errors that must abort the whole cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StateIo { .. } | Self::StateCorrupt { .. } | Self::StateLocked { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_state_errors_are_fatal() {
        assert!(!MonitorError::fetch("https://x.test", "timeout").is_fatal());
        assert!(!MonitorError::Transport("502".into()).is_fatal());
        assert!(!MonitorError::Translation("quota".into()).is_fatal());
        assert!(MonitorError::StateLocked {
            path: "state/delivered.json".into(),
            lock: "state/delivered.json.lock".into(),
        }
        .is_fatal());
    }

    #[test]
    fn fetch_error_names_the_url() {
        let e = MonitorError::fetch("https://x.test/notes", "connection reset");
        assert_eq!(
            e.to_string(),
            "fetch failed for https://x.test/notes: connection reset"
        );
    }
}
