//! Queue Dispatcher
//!
//! Picks the queue a transaction waits on, or decides it can run inline.
//!
//! ## Queue-per-device order (per namespace)
//! ```text
//! offset ─▶ read_dev0 .. read_devN-1, write_dev0 .. write_devN-1
//! memory-only namespace: read, write
//! ```
//!
//! All operations on one digest and one class (read/write) land on the same
//! queue, which the storage layer relies on for per-device I/O batching.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::Config;
use crate::namespace::NamespaceRegistry;
use crate::protocol::{peek_data_in_memory, Message, Peek};
use crate::transaction::Transaction;

/// Digest byte used to pick a device
pub const DEVICE_DIGEST_BYTE: usize = 8;

/// How transactions are spread over the queues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Round-robin over `n_queues` interchangeable queues
    Shared { n_queues: usize },

    /// Read/write queue pair per device per namespace
    PerDevice { n_queues: usize },
}

impl QueueMode {
    pub fn n_queues(&self) -> usize {
        match *self {
            QueueMode::Shared { n_queues } | QueueMode::PerDevice { n_queues } => n_queues,
        }
    }
}

/// Queue index for a peeked message in queue-per-device mode
pub fn device_queue_index(peek: &Peek) -> usize {
    if peek.ns_n_devices > 0 {
        let device = peek.keyd.as_bytes()[DEVICE_DIGEST_BYTE] as usize % peek.ns_n_devices;

        if peek.is_read() {
            peek.ns_queue_offset + device
        } else {
            peek.ns_queue_offset + peek.ns_n_devices + device
        }
    } else if peek.is_read() {
        peek.ns_queue_offset
    } else {
        peek.ns_queue_offset + 1
    }
}

/// Whether a message may skip the queues and run on the calling thread
pub fn inline_eligible(config: &Config, namespaces: &NamespaceRegistry, message: &Message) -> bool {
    config.allow_inline_transactions
        && namespaces.n_in_memory() != 0
        && (namespaces.n_not_in_memory() == 0 || peek_data_in_memory(message, namespaces))
}

/// Queue selection state
pub struct Dispatcher {
    mode: QueueMode,
    current_q: AtomicUsize,
}

impl Dispatcher {
    pub fn new(mode: QueueMode) -> Self {
        Self {
            mode,
            current_q: AtomicUsize::new(0),
        }
    }

    pub fn mode(&self) -> QueueMode {
        self.mode
    }

    /// Choose the queue for `tr`
    pub fn select_queue(&self, tr: &Transaction, namespaces: &NamespaceRegistry) -> usize {
        match self.mode {
            QueueMode::PerDevice { .. } => {
                let peek = match tr.message() {
                    Some(msg) => Peek::new(msg, namespaces, Some(tr.keyd)),
                    None => crash!("queued transaction has no message"),
                };
                device_queue_index(&peek)
            }
            QueueMode::Shared { n_queues } => self.next_round_robin(n_queues),
        }
    }

    /// Next queue in round-robin order
    pub fn next_round_robin(&self, n_queues: usize) -> usize {
        let n = self.current_q.fetch_add(1, Ordering::Relaxed);
        n % n_queues
    }
}
