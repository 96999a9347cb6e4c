// src/engine.rs
//! # Monitoring cycle
//! One pass over all enabled sources:
//! `Loading → FetchingAll → Deduplicating → Filtering → Batching → Notifying → Persisting → Idle`.
//!
//! State is loaded once and persisted once. Every unique candidate seen in the
//! cycle is recorded as delivered, whether it was sent, suppressed or cut by
//! the batch cap. Only delivery-state failures abort a cycle.

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{MonitorConfig, SourceProfile};
use crate::delivery::StateStore;
use crate::error::Result;
use crate::ingest::{fetch_source, CandidateItem, HttpFetcher, PageFetcher};
use crate::notify::{Message, Notifier, NotifyOutcome};
use crate::pipeline::{self, NotificationBatch};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_cycles_total", "Completed monitoring cycles.");
        describe_counter!(
            "monitor_candidates_total",
            "Unique candidates seen across cycles."
        );
        describe_counter!(
            "monitor_suppressed_total",
            "New candidates dropped by the denylist."
        );
        describe_counter!(
            "monitor_notified_total",
            "Items included in a delivered digest."
        );
        describe_counter!(
            "monitor_deferred_total",
            "New candidates past the batch cap, recorded without being sent."
        );
        describe_counter!("monitor_fetch_errors_total", "Sources that failed to fetch.");
        describe_counter!(
            "monitor_transport_errors_total",
            "Digests the webhook did not accept."
        );
        describe_counter!(
            "monitor_translation_fallbacks_total",
            "Texts sent untranslated after a translation error."
        );
        describe_histogram!("monitor_fetch_ms", "Page fetch time in milliseconds.");
        describe_gauge!("monitor_last_cycle_ts", "Unix ts of the last completed cycle.");
        describe_gauge!("monitor_delivered_ids", "Identities in the delivery state.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Loading,
    FetchingAll,
    Deduplicating,
    Filtering,
    Batching,
    Notifying,
    Persisting,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub name: String,
    pub candidates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub phases: Vec<CyclePhase>,
    pub sources: Vec<SourceOutcome>,
    pub unique: usize,
    pub already_delivered: usize,
    pub suppressed: usize,
    pub deferred: usize,
    pub batch: NotificationBatch,
    pub notify: NotifyOutcome,
    pub delivered_before: usize,
    pub delivered_after: usize,
}

/// Knobs of a cycle that come from `[monitor]` and `[fetch]`.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub denylist: Vec<String>,
    pub max_batch: usize,
    pub parallel: bool,
}

impl CycleSettings {
    pub fn from_config(cfg: &MonitorConfig) -> Self {
        Self {
            denylist: cfg.monitor.denylist.clone(),
            max_batch: cfg.monitor.max_batch,
            parallel: cfg.fetch.parallel,
        }
    }
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

pub struct Engine {
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<Notifier>,
    store: StateStore,
    settings: CycleSettings,
}

impl Engine {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<Notifier>,
        store: StateStore,
        settings: CycleSettings,
    ) -> Self {
        ensure_metrics_described();
        Self {
            fetcher,
            notifier,
            store,
            settings,
        }
    }

    /// Real HTTP fetcher, translator and webhook from config.
    pub fn from_config(cfg: &MonitorConfig) -> anyhow::Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&cfg.fetch)?);
        let notifier = Arc::new(Notifier::from_config(cfg)?);
        Ok(Self::new(
            fetcher,
            notifier,
            StateStore::new(cfg.state_path()),
            CycleSettings::from_config(cfg),
        ))
    }

    pub fn fetcher(&self) -> &Arc<dyn PageFetcher> {
        &self.fetcher
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    fn enter(phases: &mut Vec<CyclePhase>, phase: CyclePhase) {
        debug!(phase = ?phase, "cycle phase");
        phases.push(phase);
    }

    /// Fetch every enabled source; results keep declaration order.
    async fn fetch_all(&self, sources: &[SourceProfile]) -> Vec<(String, Result<Vec<CandidateItem>>)> {
        let enabled: Vec<&SourceProfile> = sources.iter().filter(|s| s.enabled).collect();
        if self.settings.parallel {
            let futs = enabled
                .iter()
                .map(|p| fetch_source(self.fetcher.as_ref(), p));
            let results = join_all(futs).await;
            enabled
                .iter()
                .map(|p| p.name.clone())
                .zip(results)
                .collect()
        } else {
            let mut out = Vec::with_capacity(enabled.len());
            for p in enabled {
                out.push((p.name.clone(), fetch_source(self.fetcher.as_ref(), p).await));
            }
            out
        }
    }

    /// Run one full cycle. Fails only on delivery-state errors.
    pub async fn run_cycle(&self, sources: &[SourceProfile]) -> Result<CycleReport> {
        let mut phases = Vec::new();

        Self::enter(&mut phases, CyclePhase::Loading);
        let _lock = self.store.lock()?;
        let mut state = self.store.load()?;
        let delivered_before = state.len();

        Self::enter(&mut phases, CyclePhase::FetchingAll);
        let mut outcomes = Vec::new();
        let mut candidates = Vec::new();
        for (name, res) in self.fetch_all(sources).await {
            match res {
                Ok(items) => {
                    outcomes.push(SourceOutcome {
                        name,
                        candidates: items.len(),
                        error: None,
                    });
                    candidates.extend(items);
                }
                Err(e) => {
                    counter!("monitor_fetch_errors_total").increment(1);
                    outcomes.push(SourceOutcome {
                        name,
                        candidates: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        Self::enter(&mut phases, CyclePhase::Deduplicating);
        let unique = pipeline::dedupe(candidates);
        let unique_count = unique.len();

        Self::enter(&mut phases, CyclePhase::Filtering);
        let plan = pipeline::plan(
            unique,
            &state,
            &self.settings.denylist,
            self.settings.max_batch,
        );
        debug!(
            already_delivered = plan.already_delivered,
            suppressed = plan.suppressed.len(),
            "filtered candidates"
        );

        Self::enter(&mut phases, CyclePhase::Batching);
        debug!(
            batch = plan.batch.len(),
            deferred = plan.deferred.len(),
            "batch selected"
        );

        Self::enter(&mut phases, CyclePhase::Notifying);
        let notify = self.notifier.notify(&plan.batch).await;

        Self::enter(&mut phases, CyclePhase::Persisting);
        state.record_all(plan.seen_ids.iter().cloned());
        self.store.persist(&state)?;
        let delivered_after = state.len();

        Self::enter(&mut phases, CyclePhase::Idle);

        counter!("monitor_cycles_total").increment(1);
        counter!("monitor_candidates_total").increment(unique_count as u64);
        counter!("monitor_suppressed_total").increment(plan.suppressed.len() as u64);
        counter!("monitor_deferred_total").increment(plan.deferred.len() as u64);
        gauge!("monitor_delivered_ids").set(delivered_after as f64);
        gauge!("monitor_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);

        info!(
            sources = outcomes.len(),
            unique = unique_count,
            suppressed = plan.suppressed.len(),
            batch = plan.batch.len(),
            deferred = plan.deferred.len(),
            notify = notify.label(),
            delivered = delivered_after,
            "cycle complete"
        );

        Ok(CycleReport {
            phases,
            sources: outcomes,
            unique: unique_count,
            already_delivered: plan.already_delivered,
            suppressed: plan.suppressed.len(),
            deferred: plan.deferred.len(),
            batch: plan.batch,
            notify,
            delivered_before,
            delivered_after,
        })
    }

    /// Extract one source and take the first `max_batch` unique items.
    /// Delivery state is neither read nor written.
    pub async fn preview(&self, profile: &SourceProfile) -> Result<NotificationBatch> {
        let items = pipeline::dedupe(fetch_source(self.fetcher.as_ref(), profile).await?);
        Ok(pipeline::batch(items, self.settings.max_batch).0)
    }

    /// Preview plus the rendered digest for it.
    pub async fn preview_message(&self, profile: &SourceProfile) -> Result<(NotificationBatch, Message)> {
        let batch = self.preview(profile).await?;
        let message = self
            .notifier
            .render(&batch, chrono::Local::now().date_naive())
            .await;
        Ok((batch, message))
    }

    /// Send the preview batch right away. Delivery state is not touched.
    pub async fn send_now(&self, profile: &SourceProfile) -> Result<NotifyOutcome> {
        let batch = self.preview(profile).await?;
        Ok(self.notifier.notify(&batch).await)
    }
}

/// Convenience for callers holding only a config.
pub async fn run_once(cfg: &MonitorConfig) -> anyhow::Result<CycleReport> {
    let engine = Engine::from_config(cfg)?;
    Ok(engine.run_cycle(&cfg.sources).await?)
}
