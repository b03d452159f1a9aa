//! Transaction Module
//!
//! The unit of work flowing through the service.
//!
//! ## Lifecycle
//! ```text
//! ingest ──▶ dispatcher ──▶ queue ──▶ worker ──▶ processor ──▶ execution
//!                 │                                  │
//!                 └──────── inline ──────────────────┴──▶ recovery
//! ```
//!
//! ## Ownership
//! - `msg` is exclusively owned until a downstream subsystem takes it out of
//!   the transaction. Batch sub-transactions share the batch's buffer.
//! - `rsv` holds at most one live reservation.

mod reservation;
mod status;

use std::fmt;
use std::sync::Arc;

pub use reservation::{NodeId, PartitionOracle, Reservation, ReservationKind, Reserve};
pub use status::{Disposal, Outcome, Processed, Recovery, TransactionStatus};

use crate::clock::now_ns;
use crate::digest::Digest;
use crate::namespace::Namespace;
use crate::protocol::{Message, ResultCode};

/// Client connection handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u64);

/// Completion hook for internal UDF sub-transactions
pub struct IudfOrigin {
    cb: Box<dyn Fn(ResultCode) + Send + Sync>,
}

impl IudfOrigin {
    pub fn new(cb: impl Fn(ResultCode) + Send + Sync + 'static) -> Self {
        Self { cb: Box::new(cb) }
    }

    pub fn complete(&self, result: ResultCode) {
        (self.cb)(result)
    }
}

impl fmt::Debug for IudfOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IudfOrigin")
    }
}

/// Where a transaction came from, with the context valid for that origin
#[derive(Debug, Clone)]
pub enum Origin {
    /// A client connection
    Client { conn: ConnHandle },

    /// A sub-transaction of a batch request; the message buffer belongs to
    /// the batch coordinator
    Batch { batch_id: u64, index: u32 },

    /// Proxied to us by another node
    Proxy { node: NodeId, tid: u32 },

    /// Spawned by an internal UDF (e.g. a background scan)
    InternalUdf { orig: Option<Arc<IudfOrigin>> },

    /// Expiration-driven delete
    NsUp,
}

impl Origin {
    pub fn is_client(&self) -> bool {
        matches!(self, Origin::Client { .. })
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Origin::Batch { .. })
    }

    pub fn is_internal_udf(&self) -> bool {
        matches!(self, Origin::InternalUdf { .. })
    }
}

/// Per-transaction flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FromFlags(u8);

impl FromFlags {
    /// Write replayed from the node that won conflict resolution
    pub const SHIPPED_OP: FromFlags = FromFlags(1 << 0);
    /// Re-queued after waiting
    pub const RESTART: FromFlags = FromFlags(1 << 1);

    pub const fn empty() -> Self {
        FromFlags(0)
    }

    pub fn contains(&self, other: FromFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: FromFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for FromFlags {
    type Output = FromFlags;

    fn bitor(self, rhs: FromFlags) -> FromFlags {
        FromFlags(self.0 | rhs.0)
    }
}

/// A transaction in flight
#[derive(Debug)]
pub struct Transaction {
    pub origin: Origin,

    /// Request buffer; `None` once a downstream subsystem has taken it
    pub msg: Option<Arc<Message>>,

    pub keyd: Digest,
    pub ns: Option<Arc<Namespace>>,

    /// Monotonic nanoseconds
    pub start_time: u64,
    pub end_time: u64,
    pub benchmark_time: u64,

    pub rsv: Option<Reservation>,
    pub result_code: ResultCode,
    pub from_flags: FromFlags,
}

impl Transaction {
    pub fn new(origin: Origin, msg: Arc<Message>) -> Self {
        Self {
            origin,
            msg: Some(msg),
            keyd: Digest::default(),
            ns: None,
            start_time: now_ns(),
            end_time: 0,
            benchmark_time: 0,
            rsv: None,
            result_code: ResultCode::Ok,
            from_flags: FromFlags::empty(),
        }
    }

    /// Supply the digest up front (batch sub-transactions)
    pub fn with_digest(mut self, keyd: Digest) -> Self {
        self.keyd = keyd;
        self
    }

    pub fn with_flags(mut self, flags: FromFlags) -> Self {
        self.from_flags.insert(flags);
        self
    }

    /// Stamp the queue-wait benchmark baseline
    pub fn with_benchmark(mut self) -> Self {
        self.benchmark_time = now_ns();
        self
    }

    pub fn message(&self) -> Option<&Arc<Message>> {
        self.msg.as_ref()
    }

    pub fn is_restart(&self) -> bool {
        self.from_flags.contains(FromFlags::RESTART)
    }

    pub fn is_shipped_op(&self) -> bool {
        self.from_flags.contains(FromFlags::SHIPPED_OP)
    }

    pub fn is_batch_sub(&self) -> bool {
        self.origin.is_batch()
    }

    pub fn is_nsup_delete(&self) -> bool {
        matches!(self.origin, Origin::NsUp)
    }

    /// Batch-direct, query or scan: no single record is addressed
    pub fn is_multi_record(&self) -> bool {
        match &self.msg {
            Some(m) => !m.has_digest() && !m.has_key() && !self.is_batch_sub(),
            None => false,
        }
    }
}
