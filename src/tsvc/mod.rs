//! Transaction Service Module
//!
//! Admission and routing for every transaction entering the node.
//!
//! ## Architecture
//! - Dispatcher picks a queue (or inline execution)
//! - Worker threads drain the queues
//! - Processor validates, reserves a partition and hands off
//! - Recovery routes transactions for partitions held elsewhere

mod dispatch;
mod processor;
mod queue;
mod recovery;
mod service;
mod worker;

pub use dispatch::{device_queue_index, inline_eligible, Dispatcher, QueueMode, DEVICE_DIGEST_BYTE};
pub use processor::{single_record_deadline, Processor};
pub use queue::{QueueItem, QueuePool};
pub use service::{plan_queues, Dispatch, TransactionService};
pub use worker::WorkerPool;
