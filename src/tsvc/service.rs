//! Transaction Service
//!
//! The dispatch context: owns the queues, the workers, the round-robin
//! counter and the processor. Built once at node start-up and shared by every
//! thread that submits transactions.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::{Config, MAX_TRANSACTION_QUEUES};
use crate::error::{Result, TsvcError};
use crate::namespace::NamespaceRegistry;
use crate::stats::{Stats, StatsSnapshot};
use crate::subsystems::Subsystems;
use crate::transaction::{Processed, Transaction};

use super::dispatch::{inline_eligible, Dispatcher, QueueMode};
use super::processor::Processor;
use super::queue::QueuePool;
use super::worker::WorkerPool;

/// Where a submitted transaction went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Processed on the calling thread
    Inline(Processed),

    /// Pushed onto a queue
    Queued { queue: usize },
}

/// Transaction admission service
pub struct TransactionService {
    config: Arc<Config>,
    namespaces: Arc<NamespaceRegistry>,
    processor: Arc<Processor>,
    dispatcher: Dispatcher,
    queues: QueuePool,
    workers: WorkerPool,
    stats: Arc<Stats>,
}

impl TransactionService {
    /// Plan the queue layout, create the queues and start the workers
    pub fn start(config: Config, subsystems: Subsystems) -> Result<Self> {
        let namespaces = Arc::new(NamespaceRegistry::new(&config.namespaces)?);
        let mode = plan_queues(&config, &namespaces)?;

        if config.n_transaction_threads_per_queue == 0 {
            return Err(TsvcError::Config(
                "need at least one thread per transaction queue".to_string(),
            ));
        }

        match mode {
            QueueMode::PerDevice { n_queues } => tracing::info!(
                "device queues: {} queues with {} threads each",
                n_queues,
                config.n_transaction_threads_per_queue
            ),
            QueueMode::Shared { n_queues } => tracing::info!(
                "shared queues: {} queues with {} threads each",
                n_queues,
                config.n_transaction_threads_per_queue
            ),
        }

        let config = Arc::new(config);
        let stats = Arc::new(Stats::new());
        let processor = Arc::new(Processor::new(
            Arc::clone(&config),
            Arc::clone(&namespaces),
            subsystems,
            Arc::clone(&stats),
        ));

        let queues = QueuePool::new(mode.n_queues());
        let workers = WorkerPool::start(
            &queues,
            config.n_transaction_threads_per_queue,
            Arc::clone(&processor),
            Arc::clone(&stats),
            config.svc_benchmarks_enabled,
        )?;

        Ok(Self {
            config,
            namespaces,
            processor,
            dispatcher: Dispatcher::new(mode),
            queues,
            workers,
            stats,
        })
    }

    /// Run the transaction inline if its namespace is in memory, otherwise
    /// queue it.
    pub fn process_or_enqueue(&self, tr: Transaction) -> Dispatch {
        let inline = match tr.message() {
            Some(msg) => inline_eligible(&self.config, &self.namespaces, msg),
            None => false,
        };

        if inline {
            self.stats.inline_transactions.fetch_add(1, Ordering::Relaxed);
            return Dispatch::Inline(self.processor.process_transaction(tr));
        }

        Dispatch::Queued {
            queue: self.enqueue(tr),
        }
    }

    /// Pick a queue and push the transaction onto it; returns the queue index
    pub fn enqueue(&self, tr: Transaction) -> usize {
        let q = self.dispatcher.select_queue(&tr, &self.namespaces);
        tracing::trace!(queue = q, "enqueue transaction");

        self.queues.push(q, tr);
        self.stats.queued_transactions.fetch_add(1, Ordering::Relaxed);
        q
    }

    /// Transactions currently waiting across all queues
    pub fn queue_size(&self) -> usize {
        self.queues.total_len()
    }

    pub fn n_queues(&self) -> usize {
        self.queues.len()
    }

    pub fn n_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn queue_mode(&self) -> QueueMode {
        self.dispatcher.mode()
    }

    pub fn namespaces(&self) -> &Arc<NamespaceRegistry> {
        &self.namespaces
    }

    pub fn processor(&self) -> &Arc<Processor> {
        &self.processor
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(&self.namespaces)
    }

    /// Stop all workers once the transactions already queued are processed,
    /// and return the final stats
    pub fn shutdown(mut self) -> StatsSnapshot {
        self.stop_workers();
        self.stats()
    }

    fn stop_workers(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        // One marker per worker; FIFO order drains earlier transactions first.
        for q in 0..self.queues.len() {
            for _ in 0..self.config.n_transaction_threads_per_queue {
                self.queues.push_shutdown(q);
            }
        }

        self.workers.join();
        tracing::info!("transaction service stopped");
    }
}

impl Drop for TransactionService {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

/// Decide the queue mode and count for this configuration
pub fn plan_queues(config: &Config, namespaces: &NamespaceRegistry) -> Result<QueueMode> {
    if config.use_queue_per_device {
        let n_queues = namespaces.device_queue_count();

        if n_queues > MAX_TRANSACTION_QUEUES {
            return Err(TsvcError::Config(format!(
                "# of queues required for use-queue-per-device is too much {}, must be <= {} - reconfigure without use-queue-per-device",
                n_queues, MAX_TRANSACTION_QUEUES
            )));
        }
        if n_queues == 0 {
            return Err(TsvcError::Config(
                "use-queue-per-device needs at least one namespace".to_string(),
            ));
        }

        Ok(QueueMode::PerDevice { n_queues })
    } else {
        let n_queues = config.n_transaction_queues;

        if n_queues == 0 || n_queues > MAX_TRANSACTION_QUEUES {
            return Err(TsvcError::Config(format!(
                "transaction queue count {} must be in 1..={}",
                n_queues, MAX_TRANSACTION_QUEUES
            )));
        }

        Ok(QueueMode::Shared { n_queues })
    }
}
