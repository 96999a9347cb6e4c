// src/config/mod.rs
pub mod monitor;
pub mod sources;
pub mod store;

use std::path::PathBuf;

pub use monitor::{FetchSettings, MonitorConfig, MonitorSection, NotifySettings, TranslationSettings};
pub use sources::{SelectorSpec, SourceKind, SourceProfile};
pub use store::{ConfigStore, SourceEditError};

pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";
pub const ENV_CONFIG_PATH: &str = "RELEASE_WATCH_CONFIG";

/// Config path: explicit argument, then $RELEASE_WATCH_CONFIG, then `config/monitor.toml`.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
