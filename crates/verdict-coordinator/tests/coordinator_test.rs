//! Integration tests for the feedback loop coordinator.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use test_fixtures::{draft, flip_byte_at_marker, load_fixture, temp_config, DEFAULT_ANOMALY};
use verdict_audit::VerificationResult;
use verdict_coordinator::{
    ActionContext, FeedbackFilter, FeedbackLoopCoordinator, FeedbackSubmission, IngestionOutcome,
    IngestionState, INGEST_ACTION, POLICY_ACTION,
};
use verdict_core::constants::{AUDIT_CHAIN_FILE, FEEDBACK_LOG_FILE};
use verdict_core::errors::VerdictErrorCode;
use verdict_core::events::{
    FeedbackAcknowledgedEvent, FeedbackEventHandler, PolicyChangedEvent, TamperDetectedEvent,
};
use verdict_core::models::{FeedbackDraft, FeedbackEvent, FeedbackSource, OperatorVerdict, Severity};
use verdict_core::traits::CancellationToken;
use verdict_core::VerdictConfig;
use verdict_pinner::MemoryPressure;
use verdict_storage::LockFile;

fn open(dir: &Path) -> FeedbackLoopCoordinator {
    FeedbackLoopCoordinator::open(temp_config(dir), dir).unwrap()
}

fn ingest(coordinator: &FeedbackLoopCoordinator, draft: FeedbackDraft) -> IngestionOutcome {
    coordinator.ingest(draft, &CancellationToken::new()).unwrap()
}

fn correction(subject: &str, delta: f64) -> FeedbackDraft {
    FeedbackDraft::new(subject, DEFAULT_ANOMALY, OperatorVerdict::FalseNegative, Severity::Medium)
        .with_delta(delta)
}

fn stored(coordinator: &FeedbackLoopCoordinator, filter: FeedbackFilter) -> Vec<FeedbackEvent> {
    coordinator
        .list_feedback(filter)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

/// Holds a data file's lock from another handle until released.
struct ExternalHolder {
    release: mpsc::Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl ExternalHolder {
    fn hold(data_dir: &Path) -> Self {
        Self::hold_file(data_dir.join(FEEDBACK_LOG_FILE))
    }

    fn hold_chain(data_dir: &Path) -> Self {
        Self::hold_file(data_dir.join(AUDIT_CHAIN_FILE))
    }

    fn hold_file(log: std::path::PathBuf) -> Self {
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release, release_rx) = mpsc::channel::<()>();
        let thread = thread::spawn(move || {
            let lock = LockFile::for_data_file(&log).unwrap();
            lock.with_exclusive(Duration::from_secs(5), Duration::from_millis(1), || {
                locked_tx.send(()).unwrap();
                let _ = release_rx.recv();
                Ok(())
            })
            .unwrap();
        });
        locked_rx.recv().unwrap();
        Self { release, thread }
    }

    fn release(self) {
        self.release.send(()).unwrap();
        self.thread.join().unwrap();
    }
}

#[derive(Default)]
struct Recorder {
    acknowledged: AtomicUsize,
    tampers: Mutex<Vec<u64>>,
    policies: Mutex<Vec<u64>>,
}

impl FeedbackEventHandler for Recorder {
    fn on_feedback_acknowledged(&self, _event: &FeedbackAcknowledgedEvent) {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
    }

    fn on_tamper_detected(&self, event: &TamperDetectedEvent) {
        self.tampers.lock().unwrap().push(event.first_break_at);
    }

    fn on_policy_changed(&self, event: &PolicyChangedEvent) {
        self.policies.lock().unwrap().push(event.version);
    }
}

#[test]
fn acknowledged_ingestion_visits_every_state_and_writes_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = open(dir.path());

    let outcome = ingest(&coordinator, draft("alert-1", Severity::Low));

    assert_eq!(
        outcome.trail,
        vec![
            IngestionState::Received,
            IngestionState::AuditedIntent,
            IngestionState::Persisted,
            IngestionState::PinEvaluated,
            IngestionState::AuditedOutcome,
            IngestionState::Acknowledged,
        ]
    );
    assert_eq!(outcome.append_attempts, 1);
    assert_eq!(outcome.audit_sequence, Some(0));

    let records = coordinator.ledger().records(0..=u64::MAX).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, INGEST_ACTION);
    let payload = &records[0].payload;
    assert_eq!(payload["event_id"], outcome.event_id.unwrap().to_string());
    assert_eq!(payload["intent_digest"].as_str().map(str::len), Some(64));
}

#[test]
fn malformed_then_valid_yields_one_record_and_one_rejection() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = open(dir.path());

    let mut malformed = draft("ignored", Severity::Medium);
    malformed.subject_id = None;
    let rejected = ingest(&coordinator, malformed);
    let accepted = ingest(&coordinator, draft("alert-2", Severity::Medium));

    let reason = rejected.rejection().unwrap();
    assert_eq!(reason.code, "VALIDATION_ERROR");
    assert_eq!(rejected.trail.len(), 2);
    assert!(rejected.receipt.is_none());
    assert!(accepted.is_acknowledged());

    assert_eq!(coordinator.ledger().next_sequence(), 1);
    assert_eq!(coordinator.rejections().len(), 1);
    assert_eq!(stored(&coordinator, FeedbackFilter::default()).len(), 1);
}

#[test]
fn adversarial_submissions_are_all_rejected_before_storage() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = open(dir.path());
    let submissions: Vec<FeedbackSubmission> = load_fixture("feedback/adversarial_drafts.json");

    for submission in submissions.clone() {
        let response = coordinator.submit_feedback(submission);
        assert!(!response.accepted);
        assert_eq!(response.code.as_deref(), Some("VALIDATION_ERROR"));
        assert_eq!(response.state, "rejected");
    }

    assert_eq!(coordinator.rejections().len(), submissions.len());
    assert!(stored(&coordinator, FeedbackFilter::default()).is_empty());
    assert_eq!(coordinator.ledger().next_sequence(), 0);
}

#[test]
fn critical_feedback_under_contention_is_all_pinned() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(dir.path());
    config.store.lock_timeout_ms = Some(5);
    config.coordinator.max_append_attempts = Some(2_000);
    config.coordinator.backoff_max_ms = Some(5);
    let coordinator = Arc::new(FeedbackLoopCoordinator::open(config, dir.path()).unwrap());

    // Another handle keeps grabbing the log's lock while producers run.
    let running = Arc::new(AtomicBool::new(true));
    let contender = {
        let running = Arc::clone(&running);
        let log = dir.path().join(FEEDBACK_LOG_FILE);
        thread::spawn(move || {
            let lock = LockFile::for_data_file(&log).unwrap();
            while running.load(Ordering::SeqCst) {
                let _ = lock.with_exclusive(Duration::from_secs(1), Duration::from_millis(1), || {
                    thread::sleep(Duration::from_millis(5));
                    Ok(())
                });
                thread::sleep(Duration::from_millis(3));
            }
        })
    };

    let producers: Vec<_> = (0..10)
        .map(|p| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                (0..5)
                    .map(|i| ingest(&coordinator, draft(&format!("crit-{p}-{i}"), Severity::Critical)))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let outcomes: Vec<_> = producers
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    running.store(false, Ordering::SeqCst);
    contender.join().unwrap();

    assert_eq!(outcomes.len(), 50);
    assert!(outcomes.iter().all(|o| o.is_acknowledged()));
    assert!(outcomes.iter().all(|o| o.decision.is_some_and(|d| d.is_pinned())));
    assert!(outcomes.iter().all(|o| o.decision.and_then(|d| d.evicted()).is_none()));
    assert_eq!(coordinator.pinner().pinned_len().unwrap(), 50);
    assert_eq!(
        coordinator.verify_audit(0..=u64::MAX).unwrap(),
        VerificationResult::Ok { checked: 50 }
    );
}

#[test]
fn a_thousand_producers_store_exactly_what_was_acknowledged() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = Arc::new(open(dir.path()));

    let mut acknowledged = 0usize;
    for wave in 0..20 {
        let handles: Vec<_> = (0..50)
            .map(|p| {
                let coordinator = Arc::clone(&coordinator);
                let severity = Severity::ALL[(wave + p) % Severity::ALL.len()];
                thread::spawn(move || {
                    ingest(&coordinator, draft(&format!("p-{wave}-{p}"), severity)).is_acknowledged()
                })
            })
            .collect();
        acknowledged += handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
    }

    let events = stored(&coordinator, FeedbackFilter::default());
    assert_eq!(events.len(), acknowledged);
    assert_eq!(coordinator.acknowledged() as usize, acknowledged);
    let ids: BTreeSet<_> = events.iter().map(FeedbackEvent::id).collect();
    assert_eq!(ids.len(), events.len());
}

#[test]
fn exhausted_retry_budget_rejects_with_lock_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(dir.path());
    config.store.lock_timeout_ms = Some(5);
    config.coordinator.max_append_attempts = Some(3);
    config.coordinator.backoff_base_ms = Some(1);
    config.coordinator.backoff_max_ms = Some(2);
    let coordinator = FeedbackLoopCoordinator::open(config, dir.path()).unwrap();

    let holder = ExternalHolder::hold(dir.path());
    let outcome = ingest(&coordinator, draft("alert-busy", Severity::High));
    holder.release();

    let reason = outcome.rejection().unwrap();
    assert_eq!(reason.code, "LOCK_TIMEOUT");
    assert_eq!(outcome.append_attempts, 3);
    assert_eq!(outcome.trail[outcome.trail.len() - 2], IngestionState::AuditedIntent);
    assert!(!outcome.persisted());

    let rejections = coordinator.rejections();
    assert_eq!(rejections.len(), 1);
    assert!(!rejections[0].persisted);
    assert!(stored(&coordinator, FeedbackFilter::default()).is_empty());
    assert_eq!(coordinator.ledger().next_sequence(), 0);

    // The budget is per ingestion; the next one goes through.
    assert!(ingest(&coordinator, draft("alert-free", Severity::High)).is_acknowledged());
}

#[test]
fn cancellation_before_persistence_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = open(dir.path());

    let token = CancellationToken::new();
    token.cancel();
    let outcome = coordinator
        .ingest(draft("alert-c", Severity::Low), &token)
        .unwrap();
    assert!(outcome.is_cancelled());
    assert_eq!(outcome.trail, vec![IngestionState::Received, IngestionState::Cancelled]);
    assert!(stored(&coordinator, FeedbackFilter::default()).is_empty());
    assert!(coordinator.rejections().is_empty());
}

#[test]
fn cancellation_while_waiting_for_the_lock_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(dir.path());
    config.store.lock_timeout_ms = Some(5);
    config.coordinator.max_append_attempts = Some(10_000);
    config.coordinator.backoff_max_ms = Some(5);
    let coordinator = FeedbackLoopCoordinator::open(config, dir.path()).unwrap();

    let holder = ExternalHolder::hold(dir.path());
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            token.cancel();
        })
    };
    let outcome = coordinator
        .ingest(draft("alert-wait", Severity::Medium), &token)
        .unwrap();
    canceller.join().unwrap();
    holder.release();

    assert!(outcome.is_cancelled());
    assert!(outcome.append_attempts >= 1);
    assert_eq!(
        outcome.trail,
        vec![
            IngestionState::Received,
            IngestionState::AuditedIntent,
            IngestionState::Cancelled
        ]
    );
    assert!(stored(&coordinator, FeedbackFilter::default()).is_empty());
    assert_eq!(coordinator.ledger().next_sequence(), 0);
}

/// Cancels a shared token as soon as the event is acknowledged.
struct CancelOnAck(CancellationToken);

impl FeedbackEventHandler for CancelOnAck {
    fn on_feedback_acknowledged(&self, _event: &FeedbackAcknowledgedEvent) {
        self.0.cancel();
    }
}

#[test]
fn cancellation_after_persistence_is_reported_and_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    let coordinator = FeedbackLoopCoordinator::open_with_handlers(
        temp_config(dir.path()),
        dir.path(),
        vec![Arc::new(CancelOnAck(token.clone()))],
    )
    .unwrap();

    let outcome = coordinator
        .ingest(draft("alert-late", Severity::High), &token)
        .unwrap();

    assert!(outcome.is_acknowledged());
    assert!(outcome.cancellation_ignored);
    assert_eq!(stored(&coordinator, FeedbackFilter::default()).len(), 1);
}

#[test]
fn policy_recomputes_on_schedule_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(dir.path());
    config.coordinator.recompute_every = Some(3);
    let recorder = Arc::new(Recorder::default());
    let coordinator =
        FeedbackLoopCoordinator::open_with_handlers(config, dir.path(), vec![recorder.clone()])
            .unwrap();

    for i in 0..3 {
        assert!(ingest(&coordinator, correction(&format!("fn-{i}"), 0.02)).is_acknowledged());
    }

    let policy = coordinator.get_policy(None).unwrap();
    assert_eq!(policy.version, 1);
    assert_eq!(policy.parent_version, Some(0));
    assert_eq!(policy.supporting_event_ids.len(), 3);
    // Net +0.06 is clamped to the 0.05 step.
    let root = coordinator.get_policy(Some(0)).unwrap().parameter_map[DEFAULT_ANOMALY];
    assert!((policy.parameter_map[DEFAULT_ANOMALY] - (root + 0.05)).abs() < 1e-9);
    assert_eq!(*recorder.policies.lock().unwrap(), vec![1]);

    let again = coordinator.recompute_policy().unwrap();
    assert_eq!(again.snapshot.version, 2);
    assert!(again.report.is_noop());
    assert_eq!(again.report.already_applied, 3);
    assert_eq!(again.snapshot.parameter_map, policy.parameter_map);

    let policy_records = coordinator
        .ledger()
        .records(0..=u64::MAX)
        .unwrap()
        .into_iter()
        .filter(|r| r.action == POLICY_ACTION)
        .count();
    assert_eq!(policy_records, 2);
}

fn policy_records(coordinator: &FeedbackLoopCoordinator) -> usize {
    coordinator
        .ledger()
        .records(0..=u64::MAX)
        .unwrap()
        .iter()
        .filter(|r| r.action == POLICY_ACTION)
        .count()
}

#[test]
fn unrecorded_recompute_leaves_the_policy_alone() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(dir.path());
    config.store.lock_timeout_ms = Some(20);
    let recorder = Arc::new(Recorder::default());
    let coordinator =
        FeedbackLoopCoordinator::open_with_handlers(config, dir.path(), vec![recorder.clone()])
            .unwrap();
    for i in 0..2 {
        assert!(ingest(&coordinator, correction(&format!("fn-{i}"), 0.02)).is_acknowledged());
    }
    let before = coordinator.get_policy(None).unwrap();

    let holder = ExternalHolder::hold_chain(dir.path());
    let err = coordinator.recompute_policy().unwrap_err();
    holder.release();

    assert_eq!(err.error_code(), "LOCK_TIMEOUT");
    assert_eq!(coordinator.get_policy(None).unwrap(), before);
    assert!(recorder.policies.lock().unwrap().is_empty());
    assert_eq!(policy_records(&coordinator), 0);

    // The same events fold into the next successful recompute.
    let update = coordinator.recompute_policy().unwrap();
    assert_eq!(update.snapshot.version, before.version + 1);
    assert_eq!(update.report.folded, 2);
    assert_eq!(policy_records(&coordinator), 1);
}

#[test]
fn unrecorded_sweep_readmits_the_evicted_events() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(dir.path());
    config.store.lock_timeout_ms = Some(20);
    let coordinator = FeedbackLoopCoordinator::open(config, dir.path()).unwrap();
    for i in 0..4 {
        ingest(&coordinator, draft(&format!("low-{i}"), Severity::Low));
    }
    let before = coordinator.pinner().retained_ids();
    let non_critical = coordinator.pinner().non_critical_len().unwrap();
    assert_eq!(non_critical, 4);

    let holder = ExternalHolder::hold_chain(dir.path());
    assert!(coordinator.sweep(MemoryPressure::Critical).is_err());
    holder.release();

    assert_eq!(coordinator.pinner().retained_ids(), before);
    assert_eq!(coordinator.pinner().non_critical_len().unwrap(), non_critical);
    let evictions = coordinator
        .ledger()
        .records(0..=u64::MAX)
        .unwrap()
        .iter()
        .filter(|r| r.action == "pinner.evicted")
        .count();
    assert_eq!(evictions, 0);

    let swept = coordinator.sweep(MemoryPressure::Critical).unwrap();
    assert!(!swept.evicted.is_empty());
    assert!(swept.evicted.iter().all(|id| before.contains(id)));
}

#[test]
fn unrecorded_outcome_withdraws_the_admission() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(dir.path());
    config.store.lock_timeout_ms = Some(20);
    let coordinator = FeedbackLoopCoordinator::open(config, dir.path()).unwrap();
    let kept = ingest(&coordinator, correction("fix-kept", 0.02)).event_id.unwrap();

    // The log stays free, so the event is persisted and admitted before
    // the outcome record times out on the chain.
    let holder = ExternalHolder::hold_chain(dir.path());
    let outcome = ingest(&coordinator, correction("fix-lost", 0.02));
    holder.release();

    assert_eq!(outcome.rejection().unwrap().code, "LOCK_TIMEOUT");
    assert!(outcome.persisted());
    assert_eq!(outcome.trail[outcome.trail.len() - 2], IngestionState::PinEvaluated);
    let lost = outcome.event_id.unwrap();
    assert!(!coordinator.pinner().contains(&lost));
    assert!(coordinator.pinner().contains(&kept));

    let policy = coordinator.recompute_policy().unwrap().snapshot;
    assert!(policy.supporting_event_ids.contains(&kept));
    assert!(!policy.supporting_event_ids.contains(&lost));
    drop(coordinator);

    // The event is still in the log, but nothing acknowledged it.
    let reopened = open(dir.path());
    let ids: BTreeSet<_> = stored(&reopened, FeedbackFilter::default())
        .iter()
        .map(FeedbackEvent::id)
        .collect();
    assert!(ids.contains(&lost));
    assert!(!reopened.pinner().contains(&lost));
    assert!(reopened.pinner().contains(&kept));
    let rebuilt = reopened
        .ledger()
        .records(0..=u64::MAX)
        .unwrap()
        .into_iter()
        .find(|r| r.action == "pinner.rebuilt")
        .unwrap();
    assert_eq!(rebuilt.payload["unacknowledged"], 1);
}

#[test]
fn policy_dimensions_named_like_secrets_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(dir.path());
    config.policy.parameters = BTreeMap::from([
        ("credential_stuffing".to_string(), 0.5),
        ("token_replay".to_string(), 0.3),
    ]);
    let policy = {
        let coordinator = FeedbackLoopCoordinator::open(config.clone(), dir.path()).unwrap();
        for (subject, dimension, delta) in [
            ("cs-1", "credential_stuffing", 0.02),
            ("cs-2", "credential_stuffing", 0.01),
            ("tr-1", "token_replay", -0.01),
        ] {
            let draft =
                FeedbackDraft::new(subject, dimension, OperatorVerdict::FalseNegative, Severity::Medium)
                    .with_delta(delta);
            assert!(ingest(&coordinator, draft).is_acknowledged());
        }
        let update = coordinator.recompute_policy().unwrap();
        assert_eq!(update.report.folded, 3);

        let record = coordinator
            .ledger()
            .records(0..=u64::MAX)
            .unwrap()
            .into_iter()
            .find(|r| r.action == POLICY_ACTION)
            .unwrap();
        let parameters = record.payload["parameters"].as_array().unwrap();
        assert_eq!(parameters[0]["dimension"], "credential_stuffing");
        assert!((parameters[0]["value"].as_f64().unwrap() - 0.53).abs() < 1e-9);
        assert!(record.payload["delta"].as_array().unwrap().iter().all(|d| d["value"].is_f64()));
        update.snapshot
    };

    let reopened = FeedbackLoopCoordinator::open(config, dir.path()).unwrap();
    let restored = reopened.get_policy(None).unwrap();
    assert_eq!(restored.version, policy.version);
    assert_eq!(restored.parameter_map, policy.parameter_map);
    assert!((restored.parameter_map["token_replay"] - 0.29).abs() < 1e-9);
}

#[test]
fn compaction_keeps_events_the_policy_depends_on() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(dir.path());
    config.pinner.info_capacity = Some(1);
    config.pinner.medium_capacity = Some(2);
    let coordinator = FeedbackLoopCoordinator::open(config, dir.path()).unwrap();

    // Three info events into a one-slot tier: two are displaced.
    let displaced: BTreeSet<_> = (0..3)
        .filter_map(|i| {
            ingest(&coordinator, draft(&format!("info-{i}"), Severity::Info))
                .decision
                .and_then(|d| d.evicted())
        })
        .collect();
    assert_eq!(displaced.len(), 2);

    let corrections: Vec<_> = (0..2)
        .map(|i| ingest(&coordinator, correction(&format!("fix-{i}"), -0.01)).event_id.unwrap())
        .collect();
    let policy = coordinator.recompute_policy().unwrap().snapshot;
    for id in &corrections {
        assert!(policy.supporting_event_ids.contains(id));
    }

    // Drop the corrections from the working set; the policy still needs them.
    let swept = coordinator.sweep(MemoryPressure::Critical).unwrap();
    assert!(!swept.evicted.is_empty());
    assert!(swept.audit_sequence.is_some());

    let outcome = coordinator.compact(&BTreeSet::new()).unwrap();
    let removed: BTreeSet<_> = outcome.receipt.removed_ids.iter().copied().collect();
    assert_eq!(removed, displaced);

    let remaining: BTreeSet<_> = stored(&coordinator, FeedbackFilter::default())
        .iter()
        .map(FeedbackEvent::id)
        .collect();
    assert!(policy.supporting_event_ids.is_subset(&remaining));
    assert!(coordinator.verify_audit(0..=u64::MAX).unwrap().is_ok());
}

#[test]
fn reopening_restores_pinner_and_policy() {
    let dir = tempfile::tempdir().unwrap();
    let (policy, pinned) = {
        let coordinator = open(dir.path());
        for i in 0..3 {
            ingest(&coordinator, draft(&format!("crit-{i}"), Severity::Critical));
            ingest(&coordinator, correction(&format!("fix-{i}"), 0.01));
        }
        let policy = coordinator.recompute_policy().unwrap().snapshot;
        (policy, coordinator.pinner().pinned_len().unwrap())
    };

    let reopened = open(dir.path());
    assert_eq!(reopened.pinner().pinned_len().unwrap(), pinned);
    let restored = reopened.get_policy(None).unwrap();
    assert_eq!(restored.version, policy.version);
    assert_eq!(restored.parameter_map, policy.parameter_map);
    assert_eq!(restored.supporting_event_ids, policy.supporting_event_ids);

    // Nothing new to fold after a restart.
    let update = reopened.recompute_policy().unwrap();
    assert_eq!(update.snapshot.version, policy.version + 1);
    assert!(update.report.is_noop());

    let actions: Vec<_> = reopened
        .ledger()
        .records(0..=u64::MAX)
        .unwrap()
        .into_iter()
        .map(|r| r.action)
        .collect();
    assert!(actions.iter().any(|a| a == "pinner.rebuilt"));
    assert!(reopened.verify_audit(0..=u64::MAX).unwrap().is_ok());
}

#[test]
fn torn_feedback_tail_is_recovered_on_open() {
    let dir = tempfile::tempdir().unwrap();
    {
        let coordinator = open(dir.path());
        for i in 0..4 {
            ingest(&coordinator, draft(&format!("alert-{i}"), Severity::Low));
        }
    }
    test_fixtures::truncate_tail(&dir.path().join(FEEDBACK_LOG_FILE), 7);

    let reopened = open(dir.path());
    assert_eq!(stored(&reopened, FeedbackFilter::default()).len(), 3);
    let recovered = reopened
        .ledger()
        .records(0..=u64::MAX)
        .unwrap()
        .into_iter()
        .find(|r| r.action == "store.recovered")
        .unwrap();
    assert_eq!(recovered.payload["recovered"], 3);
    assert!(ingest(&reopened, draft("alert-after", Severity::Low)).is_acknowledged());
}

#[test]
fn tracked_actions_record_their_outcome_and_pass_values_through() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = open(dir.path());
    let ctx = ActionContext::new("restart_service", "fault-7", "process_anomaly");

    let ok: bool = coordinator.track_action(&ctx, || true);
    assert!(ok);
    let failed: Result<u32, String> =
        coordinator.track_action(&ctx.clone().with_mission_phase("DOCKING"), || Err("still down".to_string()));
    assert_eq!(failed, Err("still down".to_string()));

    let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        coordinator.track_action(&ctx, || -> Option<u8> { panic!("watchdog fired") })
    }));
    assert!(panicked.is_err());

    let hooked = stored(
        &coordinator,
        FeedbackFilter {
            source: Some(FeedbackSource::ActionHook),
            ..Default::default()
        },
    );
    assert_eq!(hooked.len(), 3);

    let success = &hooked[0];
    assert_eq!(success.operator_verdict(), OperatorVerdict::Confirm);
    assert_eq!(success.severity(), Severity::Info);
    assert_eq!(success.confidence_delta(), 0.0);
    assert_eq!(success.mission_phase(), Some("NOMINAL_OPS"));
    assert!(success.raw_payload().contains("recovery_action=restart_service"));

    let failure = &hooked[1];
    assert_eq!(failure.operator_verdict(), OperatorVerdict::Escalate);
    assert_eq!(failure.severity(), Severity::Medium);
    assert_eq!(failure.confidence_delta(), -0.5);
    assert_eq!(failure.mission_phase(), Some("DOCKING"));
    assert!(failure.raw_payload().contains("still down"));

    assert!(hooked[2].raw_payload().contains("watchdog fired"));
    assert_eq!(hooked[2].subject_id(), "fault-7");
}

#[test]
fn list_feedback_filters_lazily_with_a_limit() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = open(dir.path());
    for i in 0..6 {
        let severity = if i % 2 == 0 { Severity::High } else { Severity::Low };
        ingest(&coordinator, draft(&format!("alert-{i}"), severity));
    }

    let high = stored(
        &coordinator,
        FeedbackFilter {
            severity: Some(Severity::High),
            ..Default::default()
        },
    );
    assert_eq!(high.len(), 3);
    assert!(high.iter().all(|e| e.severity() == Severity::High));

    let first_two = stored(
        &coordinator,
        FeedbackFilter {
            severity: Some(Severity::Low),
            limit: Some(2),
            ..Default::default()
        },
    );
    let subjects: Vec<_> = first_two.iter().map(|e| e.subject_id().to_string()).collect();
    assert_eq!(subjects, vec!["alert-1", "alert-3"]);
}

#[test]
fn tampered_ledger_halts_ingestion_until_acknowledged() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let coordinator = FeedbackLoopCoordinator::open_with_handlers(
        temp_config(dir.path()),
        dir.path(),
        vec![recorder.clone()],
    )
    .unwrap();
    for subject in ["alert-a", "tamper-target", "alert-c"] {
        ingest(&coordinator, draft(subject, Severity::Medium));
    }

    flip_byte_at_marker(&dir.path().join(AUDIT_CHAIN_FILE), "tamper-target");
    let result = coordinator.verify_audit(0..=u64::MAX).unwrap();
    assert!(matches!(result, VerificationResult::Broken { first_break_at: 1, .. }));
    assert_eq!(*recorder.tampers.lock().unwrap(), vec![1]);

    let blocked = ingest(&coordinator, draft("alert-d", Severity::Critical));
    assert_eq!(blocked.rejection().unwrap().code, "AUDIT_HALTED");
    assert!(!blocked.persisted());
    assert!(coordinator.recompute_policy().is_err());
    assert!(coordinator.sweep(MemoryPressure::High).is_err());

    let ack = coordinator.acknowledge_tamper("duty-officer").unwrap().unwrap();
    assert_eq!(ack.action, "audit.tamper_acknowledged");
    assert!(ingest(&coordinator, draft("alert-e", Severity::Critical)).is_acknowledged());
    assert_eq!(recorder.acknowledged.load(Ordering::SeqCst), 4);
}

#[test]
fn reopening_a_tampered_chain_starts_halted() {
    let dir = tempfile::tempdir().unwrap();
    {
        let coordinator = open(dir.path());
        for subject in ["tamper-target", "alert-b"] {
            ingest(&coordinator, draft(subject, Severity::Low));
        }
    }
    flip_byte_at_marker(&dir.path().join(AUDIT_CHAIN_FILE), "tamper-target");

    let recorder = Arc::new(Recorder::default());
    let reopened = FeedbackLoopCoordinator::open_with_handlers(
        temp_config(dir.path()),
        dir.path(),
        vec![recorder.clone()],
    )
    .unwrap();
    assert_eq!(reopened.ledger().halted(), Some(0));
    assert_eq!(*recorder.tampers.lock().unwrap(), vec![0]);
    assert!(!ingest(&reopened, draft("alert-c", Severity::Low)).is_acknowledged());
}

#[test]
fn invalid_config_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut config: VerdictConfig = temp_config(dir.path());
    config.pinner.low_capacity = Some(0);
    let err = FeedbackLoopCoordinator::open(config, dir.path()).err().unwrap();
    assert!(err.to_string().contains("pinner.low_capacity"));
}
