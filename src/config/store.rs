// src/config/store.rs
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::monitor::MonitorConfig;
use crate::config::sources::{default_seed, SourceProfile};
use crate::delivery::write_atomic;

#[derive(Debug, thiserror::Error)]
pub enum SourceEditError {
    #[error("a source named {0:?} already exists")]
    Duplicate(String),
    #[error("no source named {0:?}")]
    NotFound(String),
    #[error("invalid source: {0}")]
    Invalid(String),
    #[error(transparent)]
    Save(#[from] anyhow::Error),
}

/// The configuration file plus the in-memory copy edits are applied to.
///
/// The monitoring core only reads from it; the admin surface edits sources
/// and every edit is written back atomically.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: MonitorConfig,
}

impl ConfigStore {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config = MonitorConfig::from_toml_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// Load the file, or write a seed config with the built-in sources when it is missing.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = MonitorConfig {
            sources: default_seed(),
            ..MonitorConfig::default()
        };
        config.sanitize();
        let store = Self {
            path: path.to_path_buf(),
            config,
        };
        store
            .save()
            .with_context(|| format!("creating seed config at {}", path.display()))?;
        info!(path = %path.display(), "wrote seed config");
        Ok(store)
    }

    /// Store backed by `path` that has not been written yet.
    pub fn in_memory(path: impl Into<PathBuf>, config: MonitorConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn sources(&self) -> &[SourceProfile] {
        &self.config.sources
    }

    pub fn save(&self) -> Result<()> {
        Self::write(&self.path, &self.config)
    }

    fn write(path: &Path, config: &MonitorConfig) -> Result<()> {
        let text = toml::to_string_pretty(config).context("serializing config")?;
        write_atomic(path, text.as_bytes())
            .with_context(|| format!("writing config {}", path.display()))
    }

    /// Apply `edit` to a copy, write it, and only then make it current.
    fn commit<T>(
        &mut self,
        edit: impl FnOnce(&mut MonitorConfig) -> Result<T, SourceEditError>,
    ) -> Result<T, SourceEditError> {
        let mut next = self.config.clone();
        let out = edit(&mut next)?;
        if next != self.config {
            Self::write(&self.path, &next)?;
            self.config = next;
        }
        Ok(out)
    }

    pub fn add_source(&mut self, profile: SourceProfile) -> Result<(), SourceEditError> {
        if profile.name.trim().is_empty() || profile.url.trim().is_empty() {
            return Err(SourceEditError::Invalid("name and url are required".into()));
        }
        if url::Url::parse(profile.url.trim()).is_err() {
            return Err(SourceEditError::Invalid(format!(
                "{:?} is not an absolute URL",
                profile.url
            )));
        }
        self.commit(|config| {
            if config.source(&profile.name).is_some() {
                return Err(SourceEditError::Duplicate(profile.name));
            }
            config.sources.push(profile);
            Ok(())
        })
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), SourceEditError> {
        self.commit(|config| {
            let source = config
                .sources
                .iter_mut()
                .find(|s| s.name == name)
                .ok_or_else(|| SourceEditError::NotFound(name.to_string()))?;
            source.enabled = enabled;
            Ok(())
        })
    }

    pub fn remove_source(&mut self, name: &str) -> Result<SourceProfile, SourceEditError> {
        self.commit(|config| {
            let idx = config
                .sources
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| SourceEditError::NotFound(name.to_string()))?;
            Ok(config.sources.remove(idx))
        })
    }
}
