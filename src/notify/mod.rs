// src/notify/mod.rs
//! Digest rendering and delivery.
//!
//! A batch is rendered into one markdown message (titles and summaries
//! translated, falling back to the source text) and handed to a [`Transport`].
//! Without a transport the message is logged instead of sent.

pub mod translate;
pub mod webhook;

use chrono::NaiveDate;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{MonitorConfig, SourceKind};
use crate::ingest::CandidateItem;
use crate::pipeline::NotificationBatch;

pub use translate::{GoogleTranslator, Passthrough, Translator};
pub use webhook::{Transport, WebhookFormat, WebhookTransport};

/// Characters kept from a summary without a sentence break.
pub const SUMMARY_FALLBACK_CHARS: usize = 100;

/// Fixed strings of the digest layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MessageLabels {
    pub tag_blog: String,
    pub tag_update: String,
    pub original: String,
    pub summary: String,
    pub details: String,
}

impl Default for MessageLabels {
    fn default() -> Self {
        Self {
            tag_blog: "[Blog]".into(),
            tag_update: "[Update]".into(),
            original: "Original".into(),
            summary: "Summary".into(),
            details: "View details".into(),
        }
    }
}

impl MessageLabels {
    pub fn tag_for(&self, kind: SourceKind) -> &str {
        match kind {
            SourceKind::Blog => &self.tag_blog,
            SourceKind::ReleaseNotes | SourceKind::GenericHtml => &self.tag_update,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MessageSection {
    pub tag: String,
    pub title: String,
    pub original_title: String,
    pub summary: String,
    pub link: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub sections: Vec<MessageSection>,
    pub markdown: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotifyOutcome {
    /// Empty batch; nothing rendered.
    Empty,
    Sent(Message),
    /// No endpoint configured; the message was only logged.
    DryRun(Message),
    Failed { message: Message, error: String },
}

impl NotifyOutcome {
    pub fn message(&self) -> Option<&Message> {
        match self {
            NotifyOutcome::Empty => None,
            NotifyOutcome::Sent(m) | NotifyOutcome::DryRun(m) => Some(m),
            NotifyOutcome::Failed { message, .. } => Some(message),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NotifyOutcome::Empty => "empty",
            NotifyOutcome::Sent(_) => "sent",
            NotifyOutcome::DryRun(_) => "dry_run",
            NotifyOutcome::Failed { .. } => "failed",
        }
    }
}

/// Text before the first period, or the first 100 characters when there is none.
pub fn summary_excerpt(content: &str) -> String {
    match content.split_once('.') {
        Some((head, _)) => head.trim().to_string(),
        None => content
            .chars()
            .take(SUMMARY_FALLBACK_CHARS)
            .collect::<String>()
            .trim()
            .to_string(),
    }
}

pub struct Notifier {
    translator: Arc<dyn Translator>,
    transport: Option<Arc<dyn Transport>>,
    target_language: String,
    labels: MessageLabels,
    digest_title: String,
}

impl Notifier {
    pub fn new(translator: Arc<dyn Translator>, transport: Option<Arc<dyn Transport>>) -> Self {
        Self {
            translator,
            transport,
            target_language: "zh-CN".into(),
            labels: MessageLabels::default(),
            digest_title: "Update digest".into(),
        }
    }

    pub fn with_labels(mut self, labels: MessageLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_digest_title(mut self, title: impl Into<String>) -> Self {
        self.digest_title = title.into();
        self
    }

    pub fn with_target_language(mut self, lang: impl Into<String>) -> Self {
        self.target_language = lang.into();
        self
    }

    /// Translator and webhook from config; no webhook URL means dry-run.
    pub fn from_config(cfg: &MonitorConfig) -> anyhow::Result<Self> {
        let translator: Arc<dyn Translator> = if cfg.translation.enabled {
            Arc::new(GoogleTranslator::new(&cfg.translation)?)
        } else {
            Arc::new(Passthrough)
        };
        let transport = cfg.webhook_url().map(|url| {
            Arc::new(WebhookTransport::new(url, cfg.notify.format)) as Arc<dyn Transport>
        });
        Ok(Self::new(translator, transport)
            .with_labels(cfg.notify.labels.clone())
            .with_digest_title(cfg.notify.digest_title.clone())
            .with_target_language(cfg.translation.target_language.clone()))
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    async fn translate_or_keep(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        match self.translator.translate(text, &self.target_language).await {
            Ok(t) if !t.trim().is_empty() => t,
            Ok(_) => text.to_string(),
            Err(e) => {
                counter!("monitor_translation_fallbacks_total").increment(1);
                debug!(error = %e, "translation failed; using source text");
                text.to_string()
            }
        }
    }

    async fn section(&self, item: &CandidateItem) -> MessageSection {
        let excerpt = summary_excerpt(&item.content_summary);
        MessageSection {
            tag: self.labels.tag_for(item.kind).to_string(),
            title: self.translate_or_keep(&item.title).await,
            original_title: item.title.clone(),
            summary: self.translate_or_keep(&excerpt).await,
            link: item.link.to_string(),
        }
    }

    /// Render the digest for `batch` dated `date`.
    pub async fn render(&self, batch: &NotificationBatch, date: NaiveDate) -> Message {
        let title = format!("{} ({})", self.digest_title, date.format("%Y-%m-%d"));
        let mut sections = Vec::with_capacity(batch.len());
        for item in batch {
            sections.push(self.section(item).await);
        }

        let mut markdown = format!("# {title}\n\n");
        for (i, s) in sections.iter().enumerate() {
            markdown.push_str(&format!("### {}. {} {}\n\n", i + 1, s.tag, s.title));
            markdown.push_str(&format!("> {}: {}\n", self.labels.original, s.original_title));
            markdown.push_str(&format!("> {}: {}\n", self.labels.summary, s.summary));
            markdown.push_str(&format!("> [{}]({})\n\n", self.labels.details, s.link));
        }

        Message {
            title,
            sections,
            markdown,
        }
    }

    /// Render and deliver one digest. Never fails; the outcome says what happened.
    pub async fn notify(&self, batch: &NotificationBatch) -> NotifyOutcome {
        if batch.is_empty() {
            return NotifyOutcome::Empty;
        }
        let message = self.render(batch, chrono::Local::now().date_naive()).await;

        let Some(transport) = &self.transport else {
            info!(
                target: "release_watch::notify",
                items = batch.len(),
                "no webhook configured; would send:\n{}",
                message.markdown
            );
            return NotifyOutcome::DryRun(message);
        };

        match transport.send(&message.markdown).await {
            Ok(()) => {
                counter!("monitor_notified_total").increment(batch.len() as u64);
                info!(items = batch.len(), "digest sent");
                NotifyOutcome::Sent(message)
            }
            Err(e) => {
                counter!("monitor_transport_errors_total").increment(1);
                error!(error = %e, items = batch.len(), "digest delivery failed");
                NotifyOutcome::Failed {
                    message,
                    error: e.to_string(),
                }
            }
        }
    }
}
