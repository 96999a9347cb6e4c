// src/notify/webhook.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{MonitorError, Result};

/// Discord rejects `content` longer than this.
pub const DISCORD_CONTENT_LIMIT: usize = 2000;
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookFormat {
    #[default]
    #[serde(alias = "wechat", alias = "wework")]
    WeCom,
    Slack,
    Discord,
}

impl WebhookFormat {
    /// Request body carrying `markdown` in this chat service's shape.
    pub fn payload(&self, markdown: &str) -> Value {
        match self {
            WebhookFormat::WeCom => json!({
                "msgtype": "markdown",
                "markdown": { "content": markdown }
            }),
            WebhookFormat::Slack => json!({ "text": markdown }),
            WebhookFormat::Discord => {
                let content: String = markdown.chars().take(DISCORD_CONTENT_LIMIT).collect();
                json!({ "content": content })
            }
        }
    }
}

/// Delivers rendered markdown somewhere. One attempt; failures are reported, not retried.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, markdown: &str) -> Result<()>;
}

pub struct WebhookTransport {
    url: String,
    format: WebhookFormat,
    client: Client,
    timeout: Duration,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>, format: WebhookFormat) -> Self {
        Self {
            url: url.into(),
            format,
            client: Client::new(),
            timeout: WEBHOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn format(&self) -> WebhookFormat {
        self.format
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn send(&self, markdown: &str) -> Result<()> {
        let payload = self.format.payload(markdown);
        let rsp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MonitorError::Transport(format!("request failed: {e}")))?;

        let status = rsp.status();
        let body = rsp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(MonitorError::Transport(format!("HTTP {status}: {body}")));
        }

        // WeCom answers 200 with an errcode in the body.
        if self.format == WebhookFormat::WeCom {
            if let Ok(v) = serde_json::from_str::<Value>(&body) {
                let code = v.get("errcode").and_then(Value::as_i64).unwrap_or(0);
                if code != 0 {
                    let msg = v.get("errmsg").and_then(Value::as_str).unwrap_or("");
                    return Err(MonitorError::Transport(format!("errcode {code}: {msg}")));
                }
            }
        }
        tracing::debug!(format = ?self.format, "webhook accepted message");
        Ok(())
    }
}
