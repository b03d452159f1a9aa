//! External subsystems
//!
//! The transaction service only decides where a transaction goes. Everything
//! it hands work to lives behind these traits: security, execution engines,
//! proxying, replies, replication, and partition reservations.
//!
//! ## Message ownership
//! A handler that keeps the request (an execution engine returning
//! `InProgress`/`Waiting`, a multi-record engine returning `Ok`, a successful
//! proxy divert) takes it with `tr.msg.take()`. A handler returning
//! `InProgress` also takes `tr.rsv`.

use std::sync::Arc;

use crate::namespace::Namespace;
use crate::protocol::ResultCode;
use crate::transaction::{ConnHandle, NodeId, PartitionOracle, Transaction, TransactionStatus};

/// Permissions checked by the security layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Authenticated, nothing more
    None,
    Read,
    Write,
    Query,
    UdfQuery,
    Scan,
    UdfScan,
}

/// Authentication and authorization
pub trait Security: Send + Sync {
    /// Check that a connection holds `perm`
    fn check(&self, conn: ConnHandle, perm: Permission) -> ResultCode;

    /// Audit-log a failed check
    fn log(&self, conn: ConnHandle, result: ResultCode, perm: Permission);

    /// Check a data operation against a namespace
    fn check_data_op(&self, tr: &Transaction, ns: &Namespace, perm: Permission) -> Result<(), ResultCode>;
}

/// Replies to requesters
pub trait Responder: Send + Sync {
    /// Send a single-record error reply
    fn transaction_error(&self, tr: &mut Transaction, ns: Option<&Namespace>, code: ResultCode);

    /// Send a multi-record error reply
    fn multi_record_error(&self, tr: &mut Transaction, code: ResultCode);
}

/// Read/write/delete/UDF engines and the multi-record engines
pub trait Execution: Send + Sync {
    fn read_start(&self, tr: &mut Transaction) -> TransactionStatus;

    fn write_start(&self, tr: &mut Transaction) -> TransactionStatus;

    fn delete_start(&self, tr: &mut Transaction) -> TransactionStatus;

    fn udf_start(&self, tr: &mut Transaction) -> TransactionStatus;

    /// Queue an old-style batch request
    fn batch_direct_queue_task(&self, tr: &mut Transaction, ns: &Arc<Namespace>) -> Result<(), ResultCode>;

    fn query(&self, tr: &mut Transaction, ns: &Arc<Namespace>) -> Result<(), ResultCode>;

    fn scan(&self, tr: &mut Transaction, ns: &Arc<Namespace>) -> Result<(), ResultCode>;
}

/// Forwarding to other nodes
pub trait Proxy: Send + Sync {
    /// Forward to `dest`; `false` if the transaction could not be forwarded
    fn divert(&self, dest: NodeId, tr: &mut Transaction, ns: &Namespace, cluster_key: u64) -> bool;

    /// Tell the node that proxied this transaction to us that we can't serve it
    fn return_to_sender(&self, tr: &mut Transaction, ns: &Namespace);
}

/// Cross-datacenter replication channel
pub trait Replication: Send + Sync {
    fn handle_txn(&self, tr: Transaction);
}

/// Every subsystem the processor talks to
#[derive(Clone)]
pub struct Subsystems {
    pub partitions: Arc<dyn PartitionOracle>,
    pub security: Arc<dyn Security>,
    pub execution: Arc<dyn Execution>,
    pub proxy: Arc<dyn Proxy>,
    pub responder: Arc<dyn Responder>,
    pub replication: Arc<dyn Replication>,
}

impl Subsystems {
    /// Use one object for every subsystem
    pub fn uniform<T>(node: Arc<T>) -> Self
    where
        T: PartitionOracle + Security + Execution + Proxy + Responder + Replication + 'static,
    {
        Self {
            partitions: node.clone(),
            security: node.clone(),
            execution: node.clone(),
            proxy: node.clone(),
            responder: node.clone(),
            replication: node,
        }
    }
}
