// src/notify/translate.rs
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::config::TranslationSettings;
use crate::error::{MonitorError, Result};

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Returns the input unchanged. Used when translation is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl Translator for Passthrough {
    async fn translate(&self, text: &str, _target_language: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Google web translate endpoint (`client=gtx`), source language auto-detected.
#[derive(Clone)]
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(settings: &TranslationSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .context("building translation client")?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
        })
    }
}

/// Concatenate the translated segments of a gtx response (`v[0][*][0]`).
pub fn parse_gtx_response(v: &Value) -> Option<String> {
    let segments = v.get(0)?.as_array()?;
    let out: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();
    (!out.is_empty()).then_some(out)
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_language),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| MonitorError::Translation(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(MonitorError::Translation(format!("HTTP {status}")));
        }
        let body: Value = res
            .json()
            .await
            .map_err(|e| MonitorError::Translation(e.to_string()))?;
        parse_gtx_response(&body)
            .ok_or_else(|| MonitorError::Translation("unexpected response shape".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn segments_are_concatenated() {
        let v = json!([[["你好，", "Hello, ", null], ["世界", "world", null]], null, "en"]);
        assert_eq!(parse_gtx_response(&v).as_deref(), Some("你好，世界"));
        assert_eq!(parse_gtx_response(&json!({"error": 1})), None);
        assert_eq!(parse_gtx_response(&json!([[]])), None);
    }

    #[tokio::test]
    async fn passthrough_is_identity() {
        let t = Passthrough;
        assert_eq!(t.translate("Dev Mode", "zh-CN").await.unwrap(), "Dev Mode");
    }
}
