//! Visited set for one crawl run
//!
//! `try_insert` is the single synchronization point that guarantees a
//! canonical key is scheduled at most once, whatever the interleaving of
//! concurrent discoveries. Keys are never removed during a run.

use crate::discovery::CanonicalKey;
use dashmap::DashSet;
use std::sync::Arc;

/// Concurrency-safe set of canonical keys already scheduled
///
/// Cloning shares the underlying set, which lets a retried run in the same
/// process continue with the keys the previous attempt already handled.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    keys: Arc<DashSet<CanonicalKey>>,
}

impl VisitedSet {
    /// Creates an empty set for a new crawl run
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` as seen
    ///
    /// Returns `true` if the key was not present (the caller should schedule
    /// it) and `false` if it was (the caller must drop the record). The test
    /// and the insert happen under one shard lock.
    pub fn try_insert(&self, key: CanonicalKey) -> bool {
        self.keys.insert(key)
    }

    pub fn contains(&self, key: &CanonicalKey) -> bool {
        self.keys.contains(key)
    }

    /// Number of distinct keys scheduled so far
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
