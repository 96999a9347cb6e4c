// src/pipeline.rs
//! Dedup, denylist filter and batch cap: the pure part of a cycle.
//!
//! Nothing here touches I/O, so a cycle's decisions can be computed (and
//! tested) from a candidate list plus a [`DeliveryState`].

use serde::Serialize;
use std::collections::HashSet;

use crate::delivery::DeliveryState;
use crate::ingest::CandidateItem;

/// Keep the first occurrence of each identity, preserving order.
pub fn dedupe(items: Vec<CandidateItem>) -> Vec<CandidateItem> {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|it| seen.insert(it.identity.clone()))
        .collect()
}

/// Case-insensitive substring match of any denylist keyword against the title.
pub fn is_suppressed(title: &str, denylist: &[String]) -> bool {
    let t = title.to_lowercase();
    denylist
        .iter()
        .filter(|k| !k.is_empty())
        .any(|k| t.contains(&k.to_lowercase()))
}

/// Split into (suppressed, pending), both in input order.
pub fn filter(
    items: Vec<CandidateItem>,
    denylist: &[String],
) -> (Vec<CandidateItem>, Vec<CandidateItem>) {
    items
        .into_iter()
        .partition(|it| is_suppressed(&it.title, denylist))
}

/// Items sent in one notification, in pending order.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NotificationBatch {
    items: Vec<CandidateItem>,
}

impl NotificationBatch {
    pub fn new(items: Vec<CandidateItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CandidateItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CandidateItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a NotificationBatch {
    type Item = &'a CandidateItem;
    type IntoIter = std::slice::Iter<'a, CandidateItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// First `max` pending items; the rest are returned as deferred.
pub fn batch(mut pending: Vec<CandidateItem>, max: usize) -> (NotificationBatch, Vec<CandidateItem>) {
    let cut = pending.len().min(max);
    let deferred = pending.split_off(cut);
    (NotificationBatch::new(pending), deferred)
}

/// Every decision of one cycle, computed from unique candidates and prior state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CyclePlan {
    pub already_delivered: usize,
    pub suppressed: Vec<CandidateItem>,
    pub batch: NotificationBatch,
    /// Pending items past the cap. Recorded as delivered all the same.
    pub deferred: Vec<CandidateItem>,
    /// Identities to record after notifying: every unique candidate of the cycle.
    pub seen_ids: Vec<String>,
}

pub fn plan(
    unique: Vec<CandidateItem>,
    state: &DeliveryState,
    denylist: &[String],
    max_batch: usize,
) -> CyclePlan {
    let seen_ids = unique.iter().map(|it| it.identity.clone()).collect();
    let total = unique.len();
    let fresh: Vec<CandidateItem> = unique
        .into_iter()
        .filter(|it| !state.contains(&it.identity))
        .collect();
    let already_delivered = total - fresh.len();
    let (suppressed, pending) = filter(fresh, denylist);
    let (batch, deferred) = batch(pending, max_batch);
    CyclePlan {
        already_delivered,
        suppressed,
        batch,
        deferred,
        seen_ids,
    }
}
