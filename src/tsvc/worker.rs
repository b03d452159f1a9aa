//! Worker Pool
//!
//! Long-lived threads, N per queue. Each blocks on exactly one queue and runs
//! whatever it pops through the processor.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Receiver;

use crate::clock::now_ns;
use crate::error::Result;
use crate::stats::Stats;

use super::processor::Processor;
use super::queue::{QueueItem, QueuePool};

/// Handles of the running worker threads
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `threads_per_queue` workers on every queue in `queues`
    pub fn start(
        queues: &QueuePool,
        threads_per_queue: usize,
        processor: Arc<Processor>,
        stats: Arc<Stats>,
        benchmarks: bool,
    ) -> Result<Self> {
        let mut handles = Vec::with_capacity(queues.len() * threads_per_queue);

        for q in 0..queues.len() {
            for j in 0..threads_per_queue {
                let rx = queues.receiver(q);
                let processor = Arc::clone(&processor);
                let stats = Arc::clone(&stats);

                let handle = thread::Builder::new()
                    .name(format!("tsvc-{q}-{j}"))
                    .spawn(move || run_worker(q, rx, processor, stats, benchmarks))?;

                handles.push(handle);
            }
        }

        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit
    pub fn join(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("transaction worker panicked");
            }
        }
    }
}

/// Service one queue until told to stop
fn run_worker(
    q: usize,
    rx: Receiver<QueueItem>,
    processor: Arc<Processor>,
    stats: Arc<Stats>,
    benchmarks: bool,
) {
    tracing::trace!(queue = q, "transaction worker started");

    loop {
        let tr = match rx.recv() {
            Ok(QueueItem::Transaction(tr)) => *tr,
            Ok(QueueItem::Shutdown) => break,
            Err(_) => crash!("unable to pop from transaction queue {}", q),
        };

        if benchmarks && tr.benchmark_time != 0 && !tr.is_restart() {
            stats
                .svc_queue_hist
                .insert(now_ns().saturating_sub(tr.benchmark_time));
        }

        processor.process_transaction(tr);
    }

    tracing::trace!(queue = q, "transaction worker stopped");
}
