// src/ingest/fetch.rs
use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::FetchSettings;
use crate::error::{MonitorError, Result};
use crate::ingest::types::{PageFetcher, ProbeResult};

/// Timeout for admin reachability checks.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// `reqwest`-backed fetcher. One client per process; every request is bounded.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let t0 = Instant::now();
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MonitorError::fetch(url, e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(MonitorError::fetch(url, format!("HTTP {status}")));
        }
        let body = res.text().await.map_err(|e| MonitorError::fetch(url, e))?;

        let ms = t0.elapsed().as_secs_f64() * 1000.0;
        histogram!("monitor_fetch_ms").record(ms);
        debug!(url, bytes = body.len(), ms, "fetched page");
        Ok(body)
    }

    async fn probe(&self, url: &str) -> ProbeResult {
        match self.client.get(url).timeout(PROBE_TIMEOUT).send().await {
            Ok(res) => {
                let status = res.status();
                ProbeResult {
                    ok: status.is_success(),
                    status: Some(status.as_u16()),
                    message: status
                        .canonical_reason()
                        .unwrap_or("unknown status")
                        .to_string(),
                }
            }
            Err(e) => ProbeResult {
                ok: false,
                status: None,
                message: e.to_string(),
            },
        }
    }
}
