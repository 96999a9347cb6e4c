// tests/common/mod.rs
//
// Shared fakes for integration tests: an in-memory fetcher, a recording
// transport and a translator that tags its output.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use release_watch::config::{SourceKind, SourceProfile};
use release_watch::delivery::StateStore;
use release_watch::engine::{CycleSettings, Engine};
use release_watch::error::{MonitorError, Result};
use release_watch::ingest::PageFetcher;
use release_watch::notify::{Notifier, Passthrough, Transport, Translator};

pub const RELEASE_NOTES_HTML: &str = include_str!("../fixtures/release_notes.html");
pub const BLOG_HTML: &str = include_str!("../fixtures/blog.html");
pub const GENERIC_HTML: &str = include_str!("../fixtures/generic.html");

pub const RELEASE_NOTES_URL: &str = "https://www.figma.com/release-notes/";
pub const BLOG_URL: &str = "https://www.figma.com/blog/";

/// Serves canned pages by URL; unknown URLs fail like a network error.
#[derive(Default)]
pub struct FakeFetcher {
    pages: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: &str) -> Self {
        self.set_page(url, body);
        self
    }

    pub fn set_page(&self, url: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| MonitorError::fetch(url, "connection refused"))
    }
}

/// Keeps every markdown body it is asked to send.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, markdown: &str) -> Result<()> {
        self.sent.lock().unwrap().push(markdown.to_string());
        if self.fail {
            return Err(MonitorError::Transport("HTTP 502 Bad Gateway".into()));
        }
        Ok(())
    }
}

/// Prefixes text with the target language, e.g. `[zh-CN] Dev Mode`.
pub struct TaggingTranslator;

#[async_trait]
impl Translator for TaggingTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        Ok(format!("[{target_language}] {text}"))
    }
}

/// Always fails, to exercise the fallback to source text.
pub struct BrokenTranslator;

#[async_trait]
impl Translator for BrokenTranslator {
    async fn translate(&self, _text: &str, _target_language: &str) -> Result<String> {
        Err(MonitorError::Translation("quota exceeded".into()))
    }
}

pub fn release_notes_source() -> SourceProfile {
    SourceProfile::new("Release Notes", RELEASE_NOTES_URL, SourceKind::ReleaseNotes)
}

pub fn blog_source() -> SourceProfile {
    SourceProfile::new("Blog", BLOG_URL, SourceKind::Blog)
}

pub fn settings(denylist: &[&str], max_batch: usize) -> CycleSettings {
    CycleSettings {
        denylist: denylist.iter().map(|s| s.to_string()).collect(),
        max_batch,
        parallel: true,
    }
}

pub fn notifier_with(transport: Option<Arc<RecordingTransport>>) -> Arc<Notifier> {
    let transport = transport.map(|t| t as Arc<dyn Transport>);
    Arc::new(Notifier::new(Arc::new(Passthrough), transport))
}

pub fn engine(
    fetcher: Arc<FakeFetcher>,
    transport: Option<Arc<RecordingTransport>>,
    store: StateStore,
    settings: CycleSettings,
) -> Engine {
    Engine::new(fetcher, notifier_with(transport), store, settings)
}
