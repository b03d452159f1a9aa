//! Partition reservations
//!
//! A reservation pins one partition's live state for the duration of a
//! transaction. The reservation subsystem owns all locking; this module only
//! describes what it hands back.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::digest::PartitionId;
use crate::namespace::Namespace;

/// Cluster node identifier; zero means "no node"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const NONE: NodeId = NodeId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// What a reservation allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationKind {
    Read,
    Write,
    /// Replay of an operation another node already decided
    Migrate,
}

/// A held partition reservation.
///
/// Not `Clone`: the only way to give one up is to hand it back to the
/// [`PartitionOracle`], so it cannot be released twice.
pub struct Reservation {
    pub ns: Arc<Namespace>,
    pub pid: PartitionId,
    pub kind: ReservationKind,

    /// Nodes holding duplicate versions of the partition
    pub n_dupl: u32,

    /// Cluster epoch the reservation was taken in
    pub cluster_key: u64,

    /// Partition index/tree handles, opaque to this layer
    pub tree: Option<Arc<dyn Any + Send + Sync>>,
}

impl Reservation {
    pub fn new(ns: Arc<Namespace>, pid: PartitionId, kind: ReservationKind, cluster_key: u64) -> Self {
        Self {
            ns,
            pid,
            kind,
            n_dupl: 0,
            cluster_key,
            tree: None,
        }
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("ns", &self.ns.name)
            .field("pid", &self.pid)
            .field("kind", &self.kind)
            .field("n_dupl", &self.n_dupl)
            .field("cluster_key", &self.cluster_key)
            .finish()
    }
}

/// Result of a read or write reservation attempt
#[derive(Debug)]
pub enum Reserve {
    /// This node can serve the partition
    Acquired { rsv: Reservation, dest: NodeId },

    /// Another node must serve it
    Elsewhere { dest: NodeId, cluster_key: u64 },
}

impl Reserve {
    /// Node the transaction should run on
    pub fn dest(&self) -> NodeId {
        match self {
            Reserve::Acquired { dest, .. } | Reserve::Elsewhere { dest, .. } => *dest,
        }
    }
}

/// Partition ownership and reservations (the cluster's routing oracle)
///
/// Calls may block while a migration decision is in flight.
pub trait PartitionOracle: Send + Sync {
    /// Whether the first partition-ownership view has been resolved
    fn is_init_resolved(&self) -> bool;

    fn reserve_read(&self, ns: &Arc<Namespace>, pid: PartitionId) -> Reserve;

    fn reserve_write(&self, ns: &Arc<Namespace>, pid: PartitionId) -> Reserve;

    /// Reserve for replaying a shipped operation; always succeeds locally
    fn reserve_migrate(&self, ns: &Arc<Namespace>, pid: PartitionId) -> (Reservation, NodeId);

    fn release(&self, rsv: Reservation);
}
