//! Transaction status and outcomes

use crate::protocol::ResultCode;

/// What an execution handler did with a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Failed; the reply is already sent
    DoneError,

    /// Succeeded; the reply is already sent
    DoneSuccess,

    /// The handler now owns both the message and the reservation
    InProgress,

    /// Parked for re-queue; the handler owns the message, the reservation
    /// is released and re-acquired on redelivery
    Waiting,
}

/// How a reservation failure was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Forwarded to the owning node
    Proxied,

    /// Could not forward; an unknown-failure reply was sent
    ProxyFailed,

    /// Bounced back to the node that proxied it here
    ReturnedToSender,

    /// Internal UDF failure callback invoked
    CallbackInvoked,

    /// Expiration delete with nobody to tell
    Dropped,
}

/// Terminal disposition of one pass through the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handed to the cross-datacenter replication handler
    Replicated,

    /// Single-record error reply sent
    Rejected(ResultCode),

    /// Multi-record error reply sent
    MultiRecordRejected(ResultCode),

    /// Accepted by the batch, query or scan engine
    MultiRecordDispatched,

    /// Ran through an execution handler
    Executed(TransactionStatus),

    /// Reservation failed; routed by origin
    Recovered(Recovery),
}

/// What happened to the request message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// Released by the processor
    Freed,

    /// Now owned by a downstream subsystem
    Transferred,

    /// Owned by the batch coordinator; never released here
    Shared,
}

/// Result of processing one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Processed {
    pub outcome: Outcome,
    pub disposal: Disposal,
}
