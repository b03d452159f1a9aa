//! Processor Tests
//!
//! Tests for the transaction admission state machine: validation, deadlines,
//! reservations, execution hand-off and message disposal.

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::Ordering;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{Event, MockNode, ReserveBehavior};
use tsvc::clock::now_ns;
use tsvc::protocol::{FieldType, Message, ProtoType, ResultCode};
use tsvc::transaction::{
    ConnHandle, Disposal, FromFlags, NodeId, Origin, Outcome, ReservationKind, Transaction,
    TransactionStatus,
};
use tsvc::tsvc::single_record_deadline;
use tsvc::Config;

fn client(msg: Arc<Message>) -> Transaction {
    Transaction::new(Origin::Client { conn: ConnHandle(7) }, msg)
}

fn batch_sub(msg: Arc<Message>) -> Transaction {
    Transaction::new(Origin::Batch { batch_id: 3, index: 1 }, msg)
}

fn proxied(msg: Arc<Message>) -> Transaction {
    Transaction::new(Origin::Proxy { node: NodeId(0xB2), tid: 11 }, msg)
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_missing_namespace() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = Arc::new(Message::builder().key(b"k").read().build());
    let result = processor.process_transaction(client(msg));

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Namespace));
    assert_eq!(result.disposal, Disposal::Freed);
    assert_eq!(mock.events(), vec![Event::Error(ResultCode::Namespace)]);
}

#[test]
fn test_unknown_namespace() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = Arc::new(Message::builder().namespace("nope").key(b"k").read().build());
    let result = processor.process_transaction(client(msg));

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Namespace));
    assert_eq!(mock.reserve_count(), 0);
}

#[test]
fn test_namespace_with_embedded_nul() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = Arc::new(
        Message::builder()
            .field(FieldType::Namespace, &b"test\0"[..])
            .key(b"k")
            .read()
            .build(),
    );
    let result = processor.process_transaction(client(msg));

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Namespace));
}

#[test]
fn test_bad_digest_size() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = Arc::new(Message::builder().namespace("test").digest(&[1u8; 19]).read().build());
    let result = processor.process_transaction(client(msg));

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Parameter));
    assert_eq!(mock.reserve_count(), 0);
}

#[test]
fn test_neither_read_nor_write() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = Arc::new(Message::builder().namespace("test").key(b"k").build());
    let result = processor.process_transaction(client(msg));

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Parameter));
    assert_eq!(mock.reserve_count(), 0);
    assert_eq!(mock.replies(), vec![ResultCode::Parameter]);
}

#[test]
fn test_cluster_not_resolved() {
    let mock = MockNode::new();
    mock.resolved.store(false, Ordering::SeqCst);
    let processor = common::processor(&mock);

    let result = processor.process_transaction(client(common::read_msg(b"k")));

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Unavailable));
    assert_eq!(mock.reserve_count(), 0);
}

#[test]
fn test_nsup_delete_runs_before_resolution() {
    let mock = MockNode::new();
    mock.resolved.store(false, Ordering::SeqCst);
    let processor = common::processor(&mock);

    let msg = Arc::new(Message::builder().namespace("test").digest(&[5u8; 20]).delete().build());
    let result = processor.process_transaction(Transaction::new(Origin::NsUp, msg));

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::DoneSuccess));
    assert_eq!(mock.count(&Event::DeleteStart), 1);
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[test]
fn test_unauthenticated_client() {
    let mock = MockNode::new();
    *mock.auth_result.lock() = ResultCode::NotAuthenticated;
    let processor = common::processor(&mock);

    let result = processor.process_transaction(client(common::read_msg(b"k")));

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::NotAuthenticated));
    assert_eq!(
        mock.events(),
        vec![
            Event::SecurityLog(ResultCode::NotAuthenticated),
            Event::Error(ResultCode::NotAuthenticated),
        ]
    );
}

#[test]
fn test_auth_skipped_for_proxied() {
    let mock = MockNode::new();
    *mock.auth_result.lock() = ResultCode::NotAuthenticated;
    let processor = common::processor(&mock);

    let result = processor.process_transaction(proxied(common::read_msg(b"k")));

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::DoneSuccess));
}

#[test]
fn test_data_op_denied() {
    let mock = MockNode::new();
    *mock.data_op_result.lock() = Err(ResultCode::RoleViolation);
    let processor = common::processor(&mock);

    let result = processor.process_transaction(client(common::write_msg(b"k")));

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::RoleViolation));
    assert_eq!(mock.reserve_count(), 0);
}

#[test]
fn test_data_op_not_checked_for_proxied() {
    let mock = MockNode::new();
    *mock.data_op_result.lock() = Err(ResultCode::RoleViolation);
    let processor = common::processor(&mock);

    let result = processor.process_transaction(proxied(common::write_msg(b"k")));

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::DoneSuccess));
    assert_eq!(mock.count(&Event::WriteStart), 1);
}

// =============================================================================
// Deadline Tests
// =============================================================================

#[test]
fn test_deadline_from_ttl_or_default() {
    let config = Config::builder().transaction_max_ns(5_000).build();

    assert_eq!(single_record_deadline(100, 0, &config), 5_100);
    assert_eq!(single_record_deadline(100, 2, &config), 2_000_100);
}

#[test]
fn test_deadline_saturates() {
    let config = Config::builder().transaction_max_ns(u64::MAX).build();

    assert_eq!(single_record_deadline(100, 0, &config), u64::MAX);
    assert_eq!(single_record_deadline(u64::MAX - 1, 2, &config), u64::MAX);
}

#[test]
fn test_unbounded_max_deadline_executes() {
    let mock = MockNode::new();
    let mut config = common::test_config();
    config.transaction_max_ns = u64::MAX;
    let processor = common::processor_with(&mock, config).0;

    let result = processor.process_transaction(client(common::read_msg(b"k")));

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::DoneSuccess));
    assert_eq!(mock.release_count(), 1);
}

#[test]
fn test_timed_out_in_queue() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = Arc::new(
        Message::builder()
            .namespace("test")
            .key(b"k")
            .read()
            .transaction_ttl(1)
            .build(),
    );
    let tr = client(msg);
    thread::sleep(Duration::from_millis(5));

    let result = processor.process_transaction(tr);

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Timeout));
    assert_eq!(mock.reserve_count(), 0);
    assert_eq!(mock.release_count(), 0);
}

#[test]
fn test_restart_keeps_original_deadline() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let mut tr = client(common::read_msg(b"k")).with_flags(FromFlags::RESTART);
    tr.end_time = tr.start_time;
    thread::sleep(Duration::from_millis(1));

    let result = processor.process_transaction(tr);
    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Timeout));
}

#[test]
fn test_restart_without_deadline_gets_one() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let tr = client(common::read_msg(b"k")).with_flags(FromFlags::RESTART);
    let result = processor.process_transaction(tr);

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::DoneSuccess));
}

#[test]
fn test_stale_deadline_recomputed_for_fresh_transaction() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let mut tr = client(common::read_msg(b"k"));
    thread::sleep(Duration::from_millis(1));
    tr.end_time = 1;
    assert!(now_ns() > tr.end_time);

    let result = processor.process_transaction(tr);
    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::DoneSuccess));
}

// =============================================================================
// Reservation Tests
// =============================================================================

#[test]
fn test_read_reserves_and_releases() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    processor.process_transaction(client(common::read_msg(b"k")));

    assert_eq!(
        mock.events(),
        vec![
            Event::Reserve(ReservationKind::Read),
            Event::ReadStart,
            Event::Release(ReservationKind::Read),
        ]
    );
}

#[test]
fn test_read_with_duplicates_upgrades_to_write() {
    let mock = MockNode::new();
    *mock.read_reserve.lock() = ReserveBehavior::Local { n_dupl: 2 };
    let processor = common::processor(&mock);

    let result = processor.process_transaction(client(common::read_msg(b"k")));

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::DoneSuccess));
    assert_eq!(
        mock.events(),
        vec![
            Event::Reserve(ReservationKind::Read),
            Event::Release(ReservationKind::Read),
            Event::Reserve(ReservationKind::Write),
            Event::ReadStart,
            Event::Release(ReservationKind::Write),
        ]
    );
}

#[test]
fn test_read_and_write_bits_take_write_path() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = Arc::new(Message::builder().namespace("test").key(b"k").read().write().build());
    processor.process_transaction(client(msg));

    assert_eq!(mock.count(&Event::Reserve(ReservationKind::Write)), 1);
    assert_eq!(mock.count(&Event::WriteStart), 1);
    assert_eq!(mock.count(&Event::ReadStart), 0);
}

#[test]
fn test_every_reservation_released_once() {
    let mock = MockNode::new();
    *mock.read_reserve.lock() = ReserveBehavior::Local { n_dupl: 1 };
    let processor = common::processor(&mock);

    for i in 0u32..50 {
        let key = i.to_be_bytes();
        let msg = if i % 3 == 0 {
            common::write_msg(&key)
        } else {
            common::read_msg(&key)
        };
        processor.process_transaction(client(msg));
    }

    assert_eq!(mock.reserve_count(), mock.release_count());
}

#[test]
fn test_batch_sub_uses_preset_digest() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = Arc::new(Message::builder().namespace("test").read().build());
    let tr = batch_sub(msg).with_digest(tsvc::Digest([4u8; 20]));
    let result = processor.process_transaction(tr);

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::DoneSuccess));
    assert_eq!(result.disposal, Disposal::Shared);
}

// =============================================================================
// Shipped Op Tests
// =============================================================================

#[test]
fn test_shipped_op_must_be_write() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let tr = proxied(common::read_msg(b"k")).with_flags(FromFlags::SHIPPED_OP);
    let result = processor.process_transaction(tr);

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Unknown));
    assert_eq!(mock.reserve_count(), 0);
}

#[test]
fn test_shipped_op_with_duplicates() {
    let mock = MockNode::new();
    *mock.migrate_dupl.lock() = 1;
    let processor = common::processor(&mock);

    let tr = proxied(common::write_msg(b"k")).with_flags(FromFlags::SHIPPED_OP);
    let result = processor.process_transaction(tr);

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Unknown));
    assert_eq!(
        mock.events(),
        vec![
            Event::Reserve(ReservationKind::Migrate),
            Event::Release(ReservationKind::Migrate),
            Event::Error(ResultCode::Unknown),
        ]
    );
}

#[test]
fn test_shipped_op_executes_under_migrate() {
    let mock = MockNode::new();
    *mock.data_op_result.lock() = Err(ResultCode::RoleViolation);
    let processor = common::processor(&mock);

    let tr = client(common::write_msg(b"k")).with_flags(FromFlags::SHIPPED_OP);
    let result = processor.process_transaction(tr);

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::DoneSuccess));
    assert_eq!(
        mock.events(),
        vec![
            Event::Reserve(ReservationKind::Migrate),
            Event::WriteStart,
            Event::Release(ReservationKind::Migrate),
        ]
    );
}

// =============================================================================
// Execution Tests
// =============================================================================

#[test]
fn test_handler_selection() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let delete = Arc::new(Message::builder().namespace("test").key(b"k").delete().build());
    processor.process_transaction(client(delete));
    assert_eq!(mock.count(&Event::DeleteStart), 1);

    let udf = Arc::new(
        Message::builder()
            .namespace("test")
            .key(b"k")
            .write()
            .field(FieldType::UdfFilename, "lib")
            .build(),
    );
    processor.process_transaction(client(udf));
    assert_eq!(mock.count(&Event::UdfStart), 1);

    let iudf = Transaction::new(Origin::InternalUdf { orig: None }, common::write_msg(b"k"));
    processor.process_transaction(iudf);
    assert_eq!(mock.count(&Event::UdfStart), 2);

    processor.process_transaction(client(common::write_msg(b"k")));
    assert_eq!(mock.count(&Event::WriteStart), 1);
}

#[test]
fn test_done_frees_message() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = common::read_msg(b"k");
    let weak = Arc::downgrade(&msg);
    let result = processor.process_transaction(client(msg));

    assert_eq!(result.disposal, Disposal::Freed);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_done_error_releases() {
    let mock = MockNode::new();
    *mock.exec_status.lock() = TransactionStatus::DoneError;
    let processor = common::processor(&mock);

    let result = processor.process_transaction(client(common::write_msg(b"k")));

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::DoneError));
    assert_eq!(result.disposal, Disposal::Freed);
    assert_eq!(mock.release_count(), 1);
}

#[test]
fn test_in_progress_transfers_message_and_reservation() {
    let mock = MockNode::new();
    *mock.exec_status.lock() = TransactionStatus::InProgress;
    let processor = common::processor(&mock);

    let msg = common::write_msg(b"k");
    let weak = Arc::downgrade(&msg);
    let result = processor.process_transaction(client(msg));

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::InProgress));
    assert_eq!(result.disposal, Disposal::Transferred);
    assert_eq!(mock.release_count(), 0);
    assert_eq!(mock.held_rsvs.lock().len(), 1);
    assert!(weak.upgrade().is_some());
}

#[test]
fn test_in_progress_with_reservation_left_aborts() {
    // The abort is observed from a child copy of this test binary.
    if std::env::var_os("TSVC_ABORT_CHILD").is_some() {
        let mock = MockNode::new();
        *mock.exec_status.lock() = TransactionStatus::InProgress;
        mock.take_rsv.store(false, Ordering::SeqCst);
        let processor = common::processor(&mock);

        processor.process_transaction(client(common::write_msg(b"k")));
        return;
    }

    let status = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "test_in_progress_with_reservation_left_aborts", "--test-threads=1"])
        .env("TSVC_ABORT_CHILD", "1")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();

    assert!(!status.success());
}

#[test]
fn test_waiting_releases_but_keeps_message() {
    let mock = MockNode::new();
    *mock.exec_status.lock() = TransactionStatus::Waiting;
    let processor = common::processor(&mock);

    let msg = common::write_msg(b"k");
    let weak = Arc::downgrade(&msg);
    let result = processor.process_transaction(client(msg));

    assert_eq!(result.outcome, Outcome::Executed(TransactionStatus::Waiting));
    assert_eq!(result.disposal, Disposal::Transferred);
    assert_eq!(mock.release_count(), 1);
    assert!(weak.upgrade().is_some());
}

#[test]
fn test_batch_message_never_freed() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = Arc::new(Message::builder().namespace("nope").read().build());
    let batch_copy = Arc::clone(&msg);
    let result = processor.process_transaction(batch_sub(msg));

    assert_eq!(result.outcome, Outcome::Rejected(ResultCode::Namespace));
    assert_eq!(result.disposal, Disposal::Shared);
    assert_eq!(Arc::strong_count(&batch_copy), 1);
}

// =============================================================================
// Replication Tests
// =============================================================================

#[test]
fn test_internal_xdr_goes_to_replication() {
    let mock = MockNode::new();
    *mock.auth_result.lock() = ResultCode::NotAuthenticated;
    let processor = common::processor(&mock);

    let msg = Arc::new(Message::builder().proto_type(ProtoType::InternalXdr).build());
    let result = processor.process_transaction(client(msg));

    assert_eq!(result.outcome, Outcome::Replicated);
    assert_eq!(result.disposal, Disposal::Transferred);
    assert_eq!(mock.events(), vec![Event::Replicated]);
    assert_eq!(mock.held_msgs.lock().len(), 1);
}

// =============================================================================
// Multi-Record Tests
// =============================================================================

fn batch_direct_msg() -> Arc<Message> {
    Arc::new(
        Message::builder()
            .namespace("test")
            .field(FieldType::DigestArray, vec![0u8; 40])
            .read()
            .build(),
    )
}

fn query_msg() -> Arc<Message> {
    Arc::new(
        Message::builder()
            .namespace("test")
            .field(FieldType::IndexName, "by_age")
            .build(),
    )
}

#[test]
fn test_batch_direct_dispatched() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let result = processor.process_transaction(client(batch_direct_msg()));

    assert_eq!(result.outcome, Outcome::MultiRecordDispatched);
    assert_eq!(result.disposal, Disposal::Transferred);
    assert_eq!(mock.events(), vec![Event::BatchDirect]);
}

#[test]
fn test_batch_direct_refused() {
    let mock = MockNode::new();
    *mock.multi_result.lock() = Err(ResultCode::Unknown);
    let (processor, stats, _) = common::processor_with(&mock, common::test_config());

    let result = processor.process_transaction(client(batch_direct_msg()));

    assert_eq!(result.outcome, Outcome::MultiRecordRejected(ResultCode::Unknown));
    assert_eq!(result.disposal, Disposal::Freed);
    assert_eq!(stats.batch_errors(), 1);
    assert_eq!(mock.events(), vec![Event::BatchDirect, Event::MultiError(ResultCode::Unknown)]);
}

#[test]
fn test_query_counters() {
    let mock = MockNode::new();
    let (processor, _, namespaces) = common::processor_with(&mock, common::test_config());
    let ns = namespaces.get_by_name(b"test").unwrap();

    processor.process_transaction(client(query_msg()));
    assert_eq!(ns.query_reqs(), 1);
    assert_eq!(ns.query_fail(), 0);

    *mock.multi_result.lock() = Err(ResultCode::Parameter);
    let result = processor.process_transaction(client(query_msg()));

    assert_eq!(result.outcome, Outcome::MultiRecordRejected(ResultCode::Parameter));
    assert_eq!(ns.query_reqs(), 2);
    assert_eq!(ns.query_fail(), 1);
}

#[test]
fn test_query_denied_counts_request_only() {
    let mock = MockNode::new();
    *mock.data_op_result.lock() = Err(ResultCode::RoleViolation);
    let (processor, _, namespaces) = common::processor_with(&mock, common::test_config());
    let ns = namespaces.get_by_name(b"test").unwrap();

    let result = processor.process_transaction(client(query_msg()));

    assert_eq!(result.outcome, Outcome::MultiRecordRejected(ResultCode::RoleViolation));
    assert_eq!(ns.query_reqs(), 1);
    assert_eq!(ns.query_fail(), 0);
    assert_eq!(mock.count(&Event::Query), 0);
}

#[test]
fn test_scan_dispatched() {
    let mock = MockNode::new();
    let processor = common::processor(&mock);

    let msg = Arc::new(Message::builder().namespace("test").set("users").build());
    let result = processor.process_transaction(client(msg));

    assert_eq!(result.outcome, Outcome::MultiRecordDispatched);
    assert_eq!(mock.events(), vec![Event::Scan]);
    assert_eq!(mock.reserve_count(), 0);
}

#[test]
fn test_multi_record_ignores_expired_queue_time() {
    let mock = MockNode::new();
    let config = Config::builder()
        .transaction_max_ns(1)
        .namespace(tsvc::NamespaceConfig::in_memory("test"))
        .build();
    let (processor, _, _) = common::processor_with(&mock, config);

    let tr = client(query_msg());
    thread::sleep(Duration::from_millis(1));
    let result = processor.process_transaction(tr);

    assert_eq!(result.outcome, Outcome::MultiRecordDispatched);
}
