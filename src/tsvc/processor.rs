//! Transaction Processor
//!
//! The admission state machine. Every transaction takes exactly one exit:
//! an error reply, hand-off to an execution engine, or hand-off to recovery.
//!
//! ## Pipeline
//! ```text
//! replication? ─▶ auth ─▶ namespace ─▶ cluster ready ─▶ multi-record? ──▶ engines
//!                                                           │
//!        reservation ◀─ read/write ◀─ digest ◀─ timeout ◀─ deadline
//!            │
//!            ├── acquired ─▶ execution
//!            └── elsewhere ─▶ recovery
//! ```
//!
//! Each stage returns a [`Step`]; `finalize` then disposes of the message
//! exactly once.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::clock::{now_ns, ttl_ms_to_ns};
use crate::config::Config;
use crate::digest::Digest;
use crate::namespace::{display_name, Namespace, NamespaceRegistry};
use crate::protocol::{FieldType, Message, ProtoType, ResultCode};
use crate::stats::Stats;
use crate::subsystems::{Permission, Subsystems};
use crate::transaction::{
    Disposal, Origin, Outcome, Processed, Reserve, Transaction, TransactionStatus,
};

use super::recovery;

/// Where a processing pass ended, and whether the message was handed on
pub(crate) struct Step {
    pub outcome: Outcome,
    pub keep_msg: bool,
}

impl Step {
    /// Message still ours to free
    pub fn done(outcome: Outcome) -> Self {
        Self {
            outcome,
            keep_msg: false,
        }
    }

    /// Message now owned elsewhere
    pub fn handed_off(outcome: Outcome) -> Self {
        Self {
            outcome,
            keep_msg: true,
        }
    }
}

/// Runs transactions through admission and routing
pub struct Processor {
    config: Arc<Config>,
    namespaces: Arc<NamespaceRegistry>,
    subsystems: Subsystems,
    stats: Arc<Stats>,
}

impl Processor {
    pub fn new(
        config: Arc<Config>,
        namespaces: Arc<NamespaceRegistry>,
        subsystems: Subsystems,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            config,
            namespaces,
            subsystems,
            stats,
        }
    }

    /// Handle a transaction, including proxying to another node if necessary.
    ///
    /// Safe to call concurrently from any thread.
    pub fn process_transaction(&self, mut tr: Transaction) -> Processed {
        let msg = match tr.msg.as_ref() {
            Some(msg) => Arc::clone(msg),
            None => crash!("transaction has no message"),
        };

        if msg.proto_type == ProtoType::InternalXdr {
            self.subsystems.replication.handle_txn(tr);
            return Processed {
                outcome: Outcome::Replicated,
                disposal: Disposal::Transferred,
            };
        }

        let step = self.run(&mut tr, &msg);
        drop(msg);

        let disposal = finalize(&mut tr, step.keep_msg);
        Processed {
            outcome: step.outcome,
            disposal,
        }
    }

    fn run(&self, tr: &mut Transaction, msg: &Message) -> Step {
        // Check that the connection is authenticated.
        if let Origin::Client { conn } = tr.origin {
            let result = self.subsystems.security.check(conn, Permission::None);

            if !result.is_ok() {
                self.subsystems.security.log(conn, result, Permission::None);
                return self.reject(tr, None, result);
            }
        }

        // All transactions must have a namespace.
        let Some(nf) = msg.field(FieldType::Namespace) else {
            tracing::warn!("no namespace in protocol request");
            return self.reject(tr, None, ResultCode::Namespace);
        };

        let Some(ns) = self.namespaces.get_by_name(&nf.data) else {
            tracing::warn!(
                "unknown namespace {} ({}) in protocol request - check configuration",
                display_name(&nf.data),
                nf.value_size()
            );
            return self.reject(tr, None, ResultCode::Namespace);
        };

        tr.ns = Some(Arc::clone(&ns));

        // Expiration deletes may run before the first partition balance.
        if !self.subsystems.partitions.is_init_resolved() && !tr.is_nsup_delete() {
            tracing::debug!("rejecting transaction - initial partition balance unresolved");
            return self.reject(tr, None, ResultCode::Unavailable);
        }

        if tr.is_multi_record() {
            return self.run_multi_record(tr, msg, &ns);
        }

        self.run_single_record(tr, msg, &ns)
    }

    // =========================================================================
    // Multi-record transactions
    // =========================================================================

    fn run_multi_record(&self, tr: &mut Transaction, msg: &Message, ns: &Arc<Namespace>) -> Step {
        // No default deadline here; callers supply generous explicit ones.
        if msg.transaction_ttl != 0 {
            tr.end_time = tr.start_time + ttl_ms_to_ns(msg.transaction_ttl);
        }

        let security = &self.subsystems.security;
        let execution = &self.subsystems.execution;

        if msg.is_batch_direct() {
            if let Err(code) = security.check_data_op(tr, ns, Permission::Read) {
                return self.reject_multi(tr, code);
            }

            if let Err(code) = execution.batch_direct_queue_task(tr, ns) {
                self.stats.batch_errors.fetch_add(1, Ordering::Relaxed);
                return self.reject_multi(tr, code);
            }
        } else if msg.is_query() {
            ns.query_reqs.fetch_add(1, Ordering::Relaxed);

            let perm = if msg.is_udf() {
                Permission::UdfQuery
            } else {
                Permission::Query
            };
            if let Err(code) = security.check_data_op(tr, ns, perm) {
                return self.reject_multi(tr, code);
            }

            if let Err(code) = execution.query(tr, ns) {
                ns.query_fail.fetch_add(1, Ordering::Relaxed);
                return self.reject_multi(tr, code);
            }
        } else {
            let perm = if msg.is_udf() {
                Permission::UdfScan
            } else {
                Permission::Scan
            };
            if let Err(code) = security.check_data_op(tr, ns, perm) {
                return self.reject_multi(tr, code);
            }

            if let Err(code) = execution.scan(tr, ns) {
                return self.reject_multi(tr, code);
            }
        }

        Step::handed_off(Outcome::MultiRecordDispatched)
    }

    // =========================================================================
    // Single-record transactions
    // =========================================================================

    fn run_single_record(&self, tr: &mut Transaction, msg: &Message, ns: &Arc<Namespace>) -> Step {
        // A restarted transaction keeps its original deadline.
        if !(tr.is_restart() && tr.end_time != 0) {
            tr.end_time = single_record_deadline(tr.start_time, msg.transaction_ttl, &self.config);
        }

        // Did the transaction time out while on the queue?
        if now_ns() > tr.end_time {
            tracing::debug!("transaction timed out in queue");
            return self.reject(tr, Some(ns), ResultCode::Timeout);
        }

        if let Err(code) = resolve_digest(tr, msg) {
            return self.reject(tr, Some(ns), code);
        }

        // Both bits may be set; the write bit puts us on the write path.
        let is_write = msg.is_write();
        let is_read = msg.is_read();
        let pid = tr.keyd.partition_id();
        let partitions = &self.subsystems.partitions;

        let reserve = if tr.is_shipped_op() {
            if !is_write {
                tracing::warn!("shipped-op is not write - unexpected");
                return self.reject(tr, Some(ns), ResultCode::Unknown);
            }

            let (rsv, dest) = partitions.reserve_migrate(ns, pid);

            if rsv.n_dupl != 0 {
                tracing::warn!("shipped-op rsv has duplicates - unexpected");
                partitions.release(rsv);
                return self.reject(tr, Some(ns), ResultCode::Unknown);
            }

            Reserve::Acquired { rsv, dest }
        } else if is_write {
            if let Err(code) = self.check_data_op(tr, ns, Permission::Write) {
                return self.reject(tr, Some(ns), code);
            }

            partitions.reserve_write(ns, pid)
        } else if is_read {
            if let Err(code) = self.check_data_op(tr, ns, Permission::Read) {
                return self.reject(tr, Some(ns), code);
            }

            // Duplicates are resolved under a write reservation.
            match partitions.reserve_read(ns, pid) {
                Reserve::Acquired { rsv, .. } if rsv.n_dupl > 0 => {
                    partitions.release(rsv);
                    partitions.reserve_write(ns, pid)
                }
                other => other,
            }
        } else {
            tracing::warn!("transaction is neither read nor write - unexpected");
            return self.reject(tr, Some(ns), ResultCode::Parameter);
        };

        if reserve.dest().is_none() {
            crash!("invalid destination while reserving partition");
        }

        tracing::trace!(?pid, dest = %reserve.dest(), "reserved partition");

        match reserve {
            Reserve::Acquired { rsv, .. } => {
                tr.rsv = Some(rsv);
                self.execute(tr, msg, is_write)
            }
            Reserve::Elsewhere { dest, cluster_key } => {
                recovery::dispatch(&self.subsystems, tr, ns, dest, cluster_key)
            }
        }
    }

    /// Run the transaction under the reservation it now holds
    fn execute(&self, tr: &mut Transaction, msg: &Message, is_write: bool) -> Step {
        if !tr.is_restart() {
            tr.benchmark_time = 0;
        }

        let execution = &self.subsystems.execution;

        let status = if is_write {
            if msg.is_delete() {
                execution.delete_start(tr)
            } else if tr.origin.is_internal_udf() || msg.is_udf() {
                execution.udf_start(tr)
            } else {
                execution.write_start(tr)
            }
        } else {
            execution.read_start(tr)
        };

        match status {
            TransactionStatus::DoneError | TransactionStatus::DoneSuccess => {
                self.release_reservation(tr);
                Step::done(Outcome::Executed(status))
            }
            TransactionStatus::InProgress => {
                if tr.rsv.is_some() {
                    crash!("execution handler reported in-progress but left reservation");
                }
                Step::handed_off(Outcome::Executed(status))
            }
            TransactionStatus::Waiting => {
                self.release_reservation(tr);
                Step::handed_off(Outcome::Executed(status))
            }
        }
    }

    fn release_reservation(&self, tr: &mut Transaction) {
        match tr.rsv.take() {
            Some(rsv) => self.subsystems.partitions.release(rsv),
            None => crash!("execution handler took reservation but reported completion"),
        }
    }

    /// Authorize a data operation; proxied and internal transactions were
    /// authorized where they originated.
    fn check_data_op(&self, tr: &Transaction, ns: &Namespace, perm: Permission) -> Result<(), ResultCode> {
        if tr.origin.is_client() || tr.origin.is_batch() {
            self.subsystems.security.check_data_op(tr, ns, perm)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Replies
    // =========================================================================

    fn reject(&self, tr: &mut Transaction, ns: Option<&Namespace>, code: ResultCode) -> Step {
        tr.result_code = code;
        self.subsystems.responder.transaction_error(tr, ns, code);
        Step::done(Outcome::Rejected(code))
    }

    fn reject_multi(&self, tr: &mut Transaction, code: ResultCode) -> Step {
        tr.result_code = code;
        self.subsystems.responder.multi_record_error(tr, code);
        Step::done(Outcome::MultiRecordRejected(code))
    }
}

/// Deadline for a single-record transaction: the client's TTL if given,
/// otherwise the configured maximum.
pub fn single_record_deadline(start_time: u64, transaction_ttl: u32, config: &Config) -> u64 {
    if transaction_ttl != 0 {
        start_time.saturating_add(ttl_ms_to_ns(transaction_ttl))
    } else {
        start_time.saturating_add(config.transaction_max_ns)
    }
}

/// Set `tr.keyd` from the digest field, or from set + key.
///
/// Batch sub-transactions arrive with their digest already set.
fn resolve_digest(tr: &mut Transaction, msg: &Message) -> Result<(), ResultCode> {
    if let Some(df) = msg.field(FieldType::Digest) {
        match Digest::from_slice(&df.data) {
            Some(keyd) => tr.keyd = keyd,
            None => {
                tracing::warn!("digest msg field size {}", df.value_size());
                return Err(ResultCode::Parameter);
            }
        }
    } else if !tr.is_batch_sub() {
        let Some(kf) = msg.field(FieldType::Key) else {
            tracing::warn!("no digest or key in single-record request");
            return Err(ResultCode::Parameter);
        };

        let set = msg
            .field(FieldType::Set)
            .map(|sf| sf.data.as_ref())
            .unwrap_or(&[]);

        tr.keyd = Digest::compute(set, &kf.data);
    }

    Ok(())
}

/// Free the message unless it was handed on or belongs to a batch.
fn finalize(tr: &mut Transaction, keep_msg: bool) -> Disposal {
    if tr.origin.is_batch() {
        tr.msg = None;
        return Disposal::Shared;
    }

    if keep_msg {
        return Disposal::Transferred;
    }

    drop(tr.msg.take());
    Disposal::Freed
}
