// src/lib.rs
// Library surface shared by the binary and integration tests.

pub mod api;
pub mod config;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::delivery::{DeliveryState, StateStore};
pub use crate::engine::{CycleReport, Engine};
pub use crate::error::MonitorError;
pub use crate::ingest::{extract, CandidateItem};
pub use crate::notify::{Notifier, NotifyOutcome};
