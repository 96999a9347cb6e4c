// src/config/monitor.rs
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::sources::SourceProfile;
use crate::notify::webhook::WebhookFormat;
use crate::notify::MessageLabels;

pub const ENV_WEBHOOK_URL: &str = "RELEASE_WATCH_WEBHOOK_URL";
/// Older deployments exported the WeCom hook under this name.
pub const ENV_WEBHOOK_URL_LEGACY: &str = "WECOM_WEBHOOK_URL";
pub const ENV_STATE_PATH: &str = "RELEASE_WATCH_STATE";

pub const DEFAULT_MAX_BATCH: usize = 5;

fn default_state_path() -> PathBuf {
    PathBuf::from("state/delivered.json")
}
fn default_max_batch() -> usize {
    DEFAULT_MAX_BATCH
}
fn default_denylist() -> Vec<String> {
    ["pricing", "education", "student", "teacher"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_fetch_timeout() -> u64 {
    15
}
fn default_user_agent() -> String {
    format!("release-watch/{}", env!("CARGO_PKG_VERSION"))
}
fn default_true() -> bool {
    true
}
fn default_target_language() -> String {
    "zh-CN".to_string()
}
fn default_translate_endpoint() -> String {
    "https://translate.googleapis.com/translate_a/single".to_string()
}
fn default_translate_timeout() -> u64 {
    10
}
fn default_digest_title() -> String {
    "Update digest".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorSection {
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Maximum items per notification. `0` is treated as the default.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Case-insensitive title keywords that suppress an item for good.
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            max_batch: default_max_batch(),
            denylist: default_denylist(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchSettings {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Fetch sources concurrently; results are merged in declaration order.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_target_language")]
    pub target_language: String,
    #[serde(default = "default_translate_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_translate_timeout")]
    pub timeout_secs: u64,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            target_language: default_target_language(),
            endpoint: default_translate_endpoint(),
            timeout_secs: default_translate_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifySettings {
    /// "ENV" means: read from RELEASE_WATCH_WEBHOOK_URL / WECOM_WEBHOOK_URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub format: WebhookFormat,
    #[serde(default = "default_digest_title")]
    pub digest_title: String,
    #[serde(default)]
    pub labels: MessageLabels,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            format: WebhookFormat::default(),
            digest_title: default_digest_title(),
            labels: MessageLabels::default(),
        }
    }
}

/// Whole config file. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub translation: TranslationSettings,
    #[serde(default)]
    pub notify: NotifySettings,
    #[serde(default)]
    pub sources: Vec<SourceProfile>,
}

impl MonitorConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: MonitorConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Clamp values that would make a cycle meaningless.
    pub fn sanitize(&mut self) {
        if self.monitor.max_batch == 0 {
            self.monitor.max_batch = DEFAULT_MAX_BATCH;
        }
        if self.fetch.timeout_secs == 0 {
            self.fetch.timeout_secs = default_fetch_timeout();
        }
        self.monitor.denylist = clean_keywords(std::mem::take(&mut self.monitor.denylist));
    }

    /// Webhook endpoint after env overrides; `None` means dry-run.
    pub fn webhook_url(&self) -> Option<String> {
        let from_env = || {
            std::env::var(ENV_WEBHOOK_URL)
                .or_else(|_| std::env::var(ENV_WEBHOOK_URL_LEGACY))
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        match self.notify.webhook_url.as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("env") => from_env(),
            Some(v) if !v.is_empty() => from_env().or_else(|| Some(v.to_string())),
            _ => from_env(),
        }
    }

    /// State file location after env overrides.
    pub fn state_path(&self) -> PathBuf {
        std::env::var(ENV_STATE_PATH)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.monitor.state_path.clone())
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceProfile> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn source(&self, name: &str) -> Option<&SourceProfile> {
        self.sources.iter().find(|s| s.name == name)
    }
}

fn clean_keywords(items: Vec<String>) -> Vec<String> {
    use std::collections::BTreeSet;
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() {
            set.insert(t.to_lowercase());
        }
    }
    set.into_iter().collect()
}
