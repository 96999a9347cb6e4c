// src/scheduler.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::ConfigStore;
use crate::engine::Engine;

/// Poll forever: every `interval`, reload config and run one cycle.
///
/// Ticks never overlap; a slow cycle delays the next tick instead of stacking.
/// A failing cycle is logged and the loop carries on.
pub async fn run_watch(config_path: PathBuf, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(path = %config_path.display(), every_secs = interval.as_secs(), "watch mode started");

    loop {
        ticker.tick().await;
        if let Err(e) = tick(&config_path).await {
            error!(error = %format!("{e:#}"), "cycle failed; retrying next tick");
        }
    }
}

async fn tick(config_path: &Path) -> anyhow::Result<()> {
    let store = ConfigStore::load_or_create(config_path)?;
    let cfg = store.config();
    if cfg.enabled_sources().next().is_none() {
        warn!("no enabled sources; nothing to do");
        return Ok(());
    }
    let engine = Engine::from_config(cfg)?;
    engine.run_cycle(&cfg.sources).await?;
    Ok(())
}

/// Spawn [`run_watch`] on the current runtime.
pub fn spawn_watch(config_path: PathBuf, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(run_watch(config_path, interval))
}
