//! Standalone node
//!
//! Single-node stand-ins for every external subsystem: this node owns every
//! partition, security allows everything, and execution completes at once.
//! Used by the `tsvc-node` binary and the benchmarks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::digest::PartitionId;
use crate::namespace::Namespace;
use crate::protocol::ResultCode;
use crate::subsystems::{Execution, Permission, Proxy, Replication, Responder, Security};
use crate::transaction::{
    ConnHandle, NodeId, PartitionOracle, Reservation, ReservationKind, Reserve, Transaction,
    TransactionStatus,
};

/// Counters kept by the standalone node
#[derive(Debug, Default)]
pub struct StandaloneCounters {
    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub deletes: AtomicU64,
    pub udfs: AtomicU64,
    pub multi_record: AtomicU64,
    pub errors: AtomicU64,
    pub reservations: AtomicU64,
    pub releases: AtomicU64,
}

impl StandaloneCounters {
    /// Transactions that reached an execution engine
    pub fn executed(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
            + self.writes.load(Ordering::Relaxed)
            + self.deletes.load(Ordering::Relaxed)
            + self.udfs.load(Ordering::Relaxed)
    }

    /// Reservations not yet released
    pub fn outstanding_reservations(&self) -> u64 {
        self.reservations.load(Ordering::Relaxed) - self.releases.load(Ordering::Relaxed)
    }
}

/// A one-node cluster
pub struct StandaloneNode {
    node: NodeId,
    cluster_key: u64,
    resolved: AtomicBool,
    pub counters: StandaloneCounters,
}

impl StandaloneNode {
    pub fn new(node: NodeId) -> Arc<Self> {
        Arc::new(Self {
            node,
            cluster_key: 1,
            resolved: AtomicBool::new(true),
            counters: StandaloneCounters::default(),
        })
    }

    /// Mark whether the initial partition balance has completed
    pub fn set_resolved(&self, resolved: bool) {
        self.resolved.store(resolved, Ordering::Release);
    }

    fn reserve(&self, ns: &Arc<Namespace>, pid: PartitionId, kind: ReservationKind) -> Reservation {
        self.counters.reservations.fetch_add(1, Ordering::Relaxed);
        Reservation::new(Arc::clone(ns), pid, kind, self.cluster_key)
    }

    fn complete(&self, counter: &AtomicU64) -> TransactionStatus {
        counter.fetch_add(1, Ordering::Relaxed);
        TransactionStatus::DoneSuccess
    }
}

impl PartitionOracle for StandaloneNode {
    fn is_init_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    fn reserve_read(&self, ns: &Arc<Namespace>, pid: PartitionId) -> Reserve {
        Reserve::Acquired {
            rsv: self.reserve(ns, pid, ReservationKind::Read),
            dest: self.node,
        }
    }

    fn reserve_write(&self, ns: &Arc<Namespace>, pid: PartitionId) -> Reserve {
        Reserve::Acquired {
            rsv: self.reserve(ns, pid, ReservationKind::Write),
            dest: self.node,
        }
    }

    fn reserve_migrate(&self, ns: &Arc<Namespace>, pid: PartitionId) -> (Reservation, NodeId) {
        (self.reserve(ns, pid, ReservationKind::Migrate), self.node)
    }

    fn release(&self, _rsv: Reservation) {
        self.counters.releases.fetch_add(1, Ordering::Relaxed);
    }
}

impl Security for StandaloneNode {
    fn check(&self, _conn: ConnHandle, _perm: Permission) -> ResultCode {
        ResultCode::Ok
    }

    fn log(&self, conn: ConnHandle, result: ResultCode, perm: Permission) {
        tracing::info!(?conn, ?result, ?perm, "security check failed");
    }

    fn check_data_op(&self, _tr: &Transaction, _ns: &Namespace, _perm: Permission) -> Result<(), ResultCode> {
        Ok(())
    }
}

impl Execution for StandaloneNode {
    fn read_start(&self, _tr: &mut Transaction) -> TransactionStatus {
        self.complete(&self.counters.reads)
    }

    fn write_start(&self, _tr: &mut Transaction) -> TransactionStatus {
        self.complete(&self.counters.writes)
    }

    fn delete_start(&self, _tr: &mut Transaction) -> TransactionStatus {
        self.complete(&self.counters.deletes)
    }

    fn udf_start(&self, _tr: &mut Transaction) -> TransactionStatus {
        self.complete(&self.counters.udfs)
    }

    fn batch_direct_queue_task(&self, tr: &mut Transaction, _ns: &Arc<Namespace>) -> Result<(), ResultCode> {
        self.counters.multi_record.fetch_add(1, Ordering::Relaxed);
        tr.msg.take();
        Ok(())
    }

    fn query(&self, tr: &mut Transaction, _ns: &Arc<Namespace>) -> Result<(), ResultCode> {
        self.counters.multi_record.fetch_add(1, Ordering::Relaxed);
        tr.msg.take();
        Ok(())
    }

    fn scan(&self, tr: &mut Transaction, _ns: &Arc<Namespace>) -> Result<(), ResultCode> {
        self.counters.multi_record.fetch_add(1, Ordering::Relaxed);
        tr.msg.take();
        Ok(())
    }
}

impl Proxy for StandaloneNode {
    fn divert(&self, dest: NodeId, _tr: &mut Transaction, ns: &Namespace, _cluster_key: u64) -> bool {
        tracing::warn!(%dest, ns = %ns.name, "no other nodes to proxy to");
        false
    }

    fn return_to_sender(&self, _tr: &mut Transaction, ns: &Namespace) {
        tracing::warn!(ns = %ns.name, "no proxying node to return to");
    }
}

impl Responder for StandaloneNode {
    fn transaction_error(&self, tr: &mut Transaction, _ns: Option<&Namespace>, code: ResultCode) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(origin = ?tr.origin, ?code, "transaction error");
    }

    fn multi_record_error(&self, tr: &mut Transaction, code: ResultCode) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(origin = ?tr.origin, ?code, "multi-record transaction error");
    }
}

impl Replication for StandaloneNode {
    fn handle_txn(&self, tr: Transaction) {
        tracing::warn!(origin = ?tr.origin, "replication not configured - dropping message");
    }
}
