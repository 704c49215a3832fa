//! Integration tests for the audit ledger.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use serde_json::json;
use test_fixtures::{flip_byte_at_marker, truncate_tail};
use verdict_audit::{AuditLedger, VerificationResult};
use verdict_core::config::{AuditConfig, StoreConfig};
use verdict_core::constants::{AUDIT_CHAIN_FILE, GENESIS_HASH};
use verdict_core::errors::AuditError;
use verdict_core::models::AuditActor;

fn store_config() -> StoreConfig {
    StoreConfig {
        lock_timeout_ms: Some(5_000),
        lock_poll_ms: Some(1),
        fsync: Some(false),
        ..StoreConfig::default()
    }
}

fn open(dir: &Path) -> AuditLedger {
    AuditLedger::open(dir, &store_config(), &AuditConfig::default()).unwrap()
}

fn write_n(ledger: &AuditLedger, n: usize) {
    for i in 0..n {
        ledger
            .record(AuditActor::Coordinator, "feedback.ingested", json!({ "n": i, "subject_id": format!("subject-{i:04}") }))
            .unwrap();
    }
}

#[test]
fn first_record_links_to_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open(dir.path());
    let r = ledger
        .record(AuditActor::Store, "store.opened", json!({}))
        .unwrap();
    assert_eq!(r.sequence_no, 0);
    assert_eq!(r.prev_hash, GENESIS_HASH);
    let next = ledger.record(AuditActor::Store, "store.compacted", json!({})).unwrap();
    assert_eq!(next.prev_hash, r.this_hash);
}

#[test]
fn clean_chain_verifies_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open(dir.path());
    write_n(&ledger, 25);
    assert_eq!(
        ledger.verify(0..=u64::MAX).unwrap(),
        VerificationResult::Ok { checked: 25 }
    );
    assert_eq!(
        ledger.verify(10..=14).unwrap(),
        VerificationResult::Ok { checked: 5 }
    );
}

#[test]
fn flipped_byte_is_localized_and_halts_writes() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open(dir.path());
    write_n(&ledger, 10);
    flip_byte_at_marker(&dir.path().join(AUDIT_CHAIN_FILE), "subject-0006");

    match ledger.verify(0..=u64::MAX).unwrap() {
        VerificationResult::Broken { first_break_at, .. } => assert_eq!(first_break_at, 6),
        other => panic!("expected a break, got {other:?}"),
    }
    // Records after the break still link to the stored hash.
    assert!(ledger.verify(7..=9).unwrap().is_ok());

    assert_eq!(ledger.halted(), Some(6));
    let err = ledger
        .record(AuditActor::Coordinator, "feedback.ingested", json!({}))
        .unwrap_err();
    assert!(matches!(err, AuditError::Halted { first_break_at: 6 }));

    let ack = ledger.acknowledge_tamper("oncall").unwrap().unwrap();
    assert_eq!(ack.sequence_no, 10);
    assert_eq!(ack.payload["first_break_at"], 6);
    assert!(ledger.halted().is_none());
}

#[test]
fn reopening_a_tampered_chain_starts_halted() {
    let dir = tempfile::tempdir().unwrap();
    write_n(&open(dir.path()), 4);
    flip_byte_at_marker(&dir.path().join(AUDIT_CHAIN_FILE), "subject-0002");
    assert_eq!(open(dir.path()).halted(), Some(2));
}

#[test]
fn sensitive_values_never_reach_disk() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open(dir.path());
    let r = ledger
        .record(
            AuditActor::Operator,
            "feedback.ingested",
            json!({ "raw_payload": "hunter22 leaked", "note": "from ops@corp.example" }),
        )
        .unwrap();
    assert_eq!(r.payload["raw_payload"], "[REDACTED]");
    assert_eq!(r.payload["note"], "from [EMAIL]");

    let on_disk = std::fs::read(dir.path().join(AUDIT_CHAIN_FILE)).unwrap();
    let on_disk = String::from_utf8_lossy(&on_disk);
    assert!(!on_disk.contains("hunter22"));
    assert!(!on_disk.contains("ops@corp.example"));
    assert!(ledger.verify(0..=0).unwrap().is_ok());
}

#[test]
fn independent_handles_share_one_total_order() {
    let dir = tempfile::tempdir().unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dir = dir.path().to_path_buf();
            thread::spawn(move || write_n(&open(&dir), 25))
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let ledger = open(dir.path());
    let records = ledger.records(0..=u64::MAX).unwrap();
    let seqs: Vec<u64> = records.iter().map(|r| r.sequence_no).collect();
    assert_eq!(seqs, (0..100).collect::<Vec<_>>());
    assert!(ledger.verify(0..=u64::MAX).unwrap().is_ok());
}

#[test]
fn shared_handle_is_safe_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(open(dir.path()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || write_n(&ledger, 10))
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(ledger.next_sequence(), 80);
    assert_eq!(
        ledger.verify(0..=u64::MAX).unwrap(),
        VerificationResult::Ok { checked: 80 }
    );
}

#[test]
fn torn_tail_is_repaired_on_open() {
    let dir = tempfile::tempdir().unwrap();
    write_n(&open(dir.path()), 3);
    truncate_tail(&dir.path().join(AUDIT_CHAIN_FILE), 5);

    let ledger = open(dir.path());
    assert!(ledger.halted().is_none());
    assert_eq!(ledger.next_sequence(), 2);
    let r = ledger.record(AuditActor::Store, "store.recovered", json!({})).unwrap();
    assert_eq!(r.sequence_no, 2);
    assert!(ledger.verify(0..=u64::MAX).unwrap().is_ok());
}

#[test]
fn staged_intent_is_deterministic_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open(dir.path());
    let payload = json!({ "subject_id": "alert-1", "severity": "high" });
    let a = ledger
        .stage_intent(AuditActor::Coordinator, "feedback.ingest", &payload)
        .unwrap();
    let b = ledger
        .stage_intent(AuditActor::Coordinator, "feedback.ingest", &payload)
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(ledger.next_sequence(), 0);
}

#[test]
fn inverted_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = open(dir.path()).verify(5..=1).unwrap_err();
    assert!(matches!(err, AuditError::InvalidRange { from: 5, to: 1 }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn arbitrary_payload_text_reverifies(texts in prop::collection::vec(".{0,64}", 1..8)) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open(dir.path());
        for t in &texts {
            ledger.record(AuditActor::Operator, "note", json!({ "text": t })).unwrap();
        }
        let reopened = open(dir.path());
        prop_assert!(reopened.halted().is_none());
        prop_assert_eq!(
            reopened.verify(0..=u64::MAX).unwrap(),
            VerificationResult::Ok { checked: texts.len() as u64 }
        );
    }
}
