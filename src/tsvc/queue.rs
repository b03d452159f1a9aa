//! Queue Pool
//!
//! Fixed array of unbounded FIFO queues holding pending transactions.

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::transaction::Transaction;

/// Entry on a transaction queue
pub enum QueueItem {
    Transaction(Box<Transaction>),
    /// Stop the worker that pops this
    Shutdown,
}

/// The transaction queues
pub struct QueuePool {
    senders: Vec<Sender<QueueItem>>,
    receivers: Vec<Receiver<QueueItem>>,
}

impl QueuePool {
    /// Create `n_queues` empty queues
    pub fn new(n_queues: usize) -> Self {
        let (senders, receivers) = (0..n_queues).map(|_| unbounded()).unzip();
        Self { senders, receivers }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Consumer end of queue `q`, for a worker
    pub fn receiver(&self, q: usize) -> Receiver<QueueItem> {
        self.receivers[q].clone()
    }

    /// Push a transaction onto queue `q`.
    ///
    /// Capacity is provisioned at start-up, so a missing queue or a failed
    /// push means the process is misconfigured.
    pub fn push(&self, q: usize, tr: Transaction) {
        let Some(sender) = self.senders.get(q) else {
            crash!("transaction queue #{} not initialized!", q);
        };

        if sender.send(QueueItem::Transaction(Box::new(tr))).is_err() {
            crash!("transaction queue #{} push failed", q);
        }
    }

    /// Ask one worker on queue `q` to stop
    pub fn push_shutdown(&self, q: usize) {
        // Workers may already be gone during teardown.
        let _ = self.senders[q].send(QueueItem::Shutdown);
    }

    /// Transactions waiting across all queues
    pub fn total_len(&self) -> usize {
        self.senders.iter().map(|s| s.len()).sum()
    }
}
