//! Notification channel between parsers and whoever consumes their output

use crate::discovery::DiscoveryRecord;
use std::sync::Mutex;

/// Receives every resource a parser (or the controller) reports
///
/// Listeners are notified synchronously, in discovery order. They must not
/// block for long and cannot alter the record.
pub trait DiscoveryListener: Send + Sync {
    fn on_discovery(&self, record: &DiscoveryRecord);
}

impl<F> DiscoveryListener for F
where
    F: Fn(&DiscoveryRecord) + Send + Sync,
{
    fn on_discovery(&self, record: &DiscoveryRecord) {
        self(record)
    }
}

/// A listener that keeps every record it is given
///
/// Workers parse responses into a batch and feed it back to the controller
/// once parsing is done.
#[derive(Debug, Default)]
pub struct DiscoveryBatch {
    records: Mutex<Vec<DiscoveryRecord>>,
}

impl DiscoveryBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the batch, returning records in the order they were reported
    pub fn into_records(self) -> Vec<DiscoveryRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DiscoveryListener for DiscoveryBatch {
    fn on_discovery(&self, record: &DiscoveryRecord) {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push(record.clone());
    }
}
