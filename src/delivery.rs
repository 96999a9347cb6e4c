// src/delivery.rs
//! Durable record of identities already processed.
//!
//! Loaded once at the start of a cycle, mutated in memory, persisted once at
//! the end. The set only grows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{MonitorError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryState {
    #[serde(default, alias = "processed_ids")]
    delivered_ids: BTreeSet<String>,
}

impl DeliveryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.delivered_ids.contains(identity)
    }

    /// Returns true when the identity was not known yet.
    pub fn insert(&mut self, identity: impl Into<String>) -> bool {
        self.delivered_ids.insert(identity.into())
    }

    pub fn record_all<I, S>(&mut self, identities: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        identities
            .into_iter()
            .map(|id| self.insert(id))
            .filter(|added| *added)
            .count()
    }

    pub fn len(&self) -> usize {
        self.delivered_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered_ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.delivered_ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for DeliveryState {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            delivered_ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so a crash
/// leaves either the old or the new content.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = sibling(path, "tmp");
    {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)
}

fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// File-backed [`DeliveryState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    /// Missing file is the empty state; anything unreadable is an error.
    pub fn load(&self) -> Result<DeliveryState> {
        let raw = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no delivery state yet; starting empty");
                return Ok(DeliveryState::new());
            }
            Err(source) => {
                return Err(MonitorError::StateIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw).map_err(|source| MonitorError::StateCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    pub fn persist(&self, state: &DeliveryState) -> Result<()> {
        let io_err = |source: io::Error| MonitorError::StateIo {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        write_atomic(&self.path, &json).map_err(io_err)?;
        debug!(path = %self.path.display(), ids = state.len(), "delivery state persisted");
        Ok(())
    }

    /// Take the single-run guard for this state file.
    ///
    /// A lock left behind by a run that is no longer alive is taken over.
    pub fn lock(&self) -> Result<StateLock> {
        let lock = self.lock_path();
        if let Some(dir) = lock.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| MonitorError::StateIo {
                path: self.path.clone(),
                source,
            })?;
        }
        match self.try_create_lock(&lock) {
            Err(MonitorError::StateLocked { .. }) => {
                let Some(pid) = read_lock_owner(&lock) else {
                    return Err(self.locked(lock));
                };
                if process_alive(pid) {
                    return Err(self.locked(lock));
                }
                warn!(lock = %lock.display(), pid, "taking over stale state lock");
                match fs::remove_file(&lock) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => {
                        return Err(MonitorError::StateIo {
                            path: self.path.clone(),
                            source,
                        })
                    }
                }
                self.try_create_lock(&lock)
            }
            other => other,
        }
    }

    fn try_create_lock(&self, lock: &Path) -> Result<StateLock> {
        match OpenOptions::new().write(true).create_new(true).open(lock) {
            Ok(mut f) => {
                // Best effort; the file's existence is the lock.
                let _ = writeln!(f, "{}", std::process::id());
                Ok(StateLock {
                    path: lock.to_path_buf(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(self.locked(lock.to_path_buf()))
            }
            Err(source) => Err(MonitorError::StateIo {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn locked(&self, lock: PathBuf) -> MonitorError {
        MonitorError::StateLocked {
            path: self.path.clone(),
            lock,
        }
    }
}

/// Pid recorded in a lock file. `None` when unreadable or not yet written.
fn read_lock_owner(lock: &Path) -> Option<u32> {
    fs::read_to_string(lock).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 only checks for existence; EPERM means alive under another user.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Held for the duration of one cycle; removes the lock file on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "could not release state lock");
        }
    }
}
