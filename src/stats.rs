//! Service statistics
//!
//! Process-wide counters plus the queue-wait histogram.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::namespace::NamespaceRegistry;

/// Counters shared by the dispatcher, workers and processor
#[derive(Default)]
pub struct Stats {
    /// Old-style batch requests the batch engine refused
    pub batch_errors: AtomicU64,

    /// Transactions processed on the submitting thread
    pub inline_transactions: AtomicU64,

    /// Transactions pushed onto a queue
    pub queued_transactions: AtomicU64,

    /// Time spent waiting on a queue (nanoseconds)
    pub svc_queue_hist: Histogram,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_errors(&self) -> u64 {
        self.batch_errors.load(Ordering::Relaxed)
    }

    /// Snapshot counters, including per-namespace query counters
    pub fn snapshot(&self, namespaces: &NamespaceRegistry) -> StatsSnapshot {
        StatsSnapshot {
            batch_errors: self.batch_errors(),
            inline_transactions: self.inline_transactions.load(Ordering::Relaxed),
            queued_transactions: self.queued_transactions.load(Ordering::Relaxed),
            svc_queue: self.svc_queue_hist.snapshot(),
            namespaces: namespaces
                .iter()
                .map(|ns| NamespaceStats {
                    name: ns.name.clone(),
                    query_reqs: ns.query_reqs(),
                    query_fail: ns.query_fail(),
                })
                .collect(),
        }
    }
}

/// Point-in-time copy of the statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub batch_errors: u64,
    pub inline_transactions: u64,
    pub queued_transactions: u64,
    pub svc_queue: HistogramSnapshot,
    pub namespaces: Vec<NamespaceStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub name: String,
    pub query_reqs: u64,
    pub query_fail: u64,
}

/// Log2-bucketed latency histogram
pub struct Histogram {
    inner: Mutex<HistogramInner>,
}

struct HistogramInner {
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
    /// Bucket i holds values in [2^(i-1), 2^i)
    buckets: [u64; 64],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Histogram {
            inner: Mutex::new(HistogramInner {
                count: 0,
                sum: 0,
                min: u64::MAX,
                max: 0,
                buckets: [0; 64],
            }),
        }
    }

    /// Record a value in nanoseconds.
    pub fn insert(&self, value_ns: u64) {
        let mut inner = self.inner.lock();
        inner.count += 1;
        inner.sum = inner.sum.saturating_add(value_ns);
        inner.min = inner.min.min(value_ns);
        inner.max = inner.max.max(value_ns);

        let bucket = (64 - value_ns.leading_zeros()).min(63) as usize;
        inner.buckets[bucket] += 1;
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let inner = self.inner.lock();
        let avg = if inner.count > 0 {
            inner.sum / inner.count
        } else {
            0
        };

        HistogramSnapshot {
            count: inner.count,
            min_ns: if inner.min == u64::MAX { 0 } else { inner.min },
            max_ns: inner.max,
            avg_ns: avg,
            p50_ns: percentile_from_buckets(&inner.buckets, inner.count, 0.5),
            p99_ns: percentile_from_buckets(&inner.buckets, inner.count, 0.99),
        }
    }
}

fn percentile_from_buckets(buckets: &[u64; 64], total: u64, percentile: f64) -> u64 {
    if total == 0 {
        return 0;
    }
    let target = ((total as f64 * percentile) as u64).max(1);
    let mut cumulative = 0u64;
    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return if i == 0 { 0 } else { 1u64 << (i - 1).min(62) };
        }
    }
    1u64 << 62
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub avg_ns: u64,
    pub p50_ns: u64,
    pub p99_ns: u64,
}
