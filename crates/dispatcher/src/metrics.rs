//! Per-transport delivery counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::DeliveryStats;
use observability::record_delivery;

/// How one queued call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered,
    Failed,
    /// Rejected because the queue was full
    Dropped,
}

impl DeliveryResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Dropped => "dropped",
        }
    }
}

/// Counters shared by a [`TransportHandle`](crate::TransportHandle) and its worker
///
/// Every recorded result is also forwarded to the global `metrics` recorder.
#[derive(Debug)]
pub struct TransportMetrics {
    transport: String,
    pending: AtomicUsize,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl TransportMetrics {
    pub fn new(transport: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            pending: AtomicUsize::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn record(&self, result: DeliveryResult) {
        let counter = match result {
            DeliveryResult::Delivered => &self.delivered,
            DeliveryResult::Failed => &self.failed,
            DeliveryResult::Dropped => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        record_delivery(&self.transport, result.as_str());
    }

    /// Queue depth as last seen by the sender or the worker
    pub fn set_pending(&self, pending: usize) {
        self.pending.store(pending, Ordering::Relaxed);
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
        }
    }
}
