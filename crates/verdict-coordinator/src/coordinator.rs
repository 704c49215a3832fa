//! FeedbackLoopCoordinator: drives each submission through the ingestion
//! state machine and owns every subsystem.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use serde_json::{json, Value};
use verdict_audit::{AuditLedger, IntentToken};
use verdict_core::errors::{CoordinatorError, StoreError, VerdictErrorCode};
use verdict_core::events::{
    EventDispatcher, EventsEvictedEvent, FeedbackAcknowledgedEvent, FeedbackEventHandler,
    FeedbackRejectedEvent, TamperDetectedEvent,
};
use verdict_core::models::{
    AuditActor, AuditRecord, EventId, FeedbackDraft, FeedbackEvent, FeedbackSource,
    OperatorVerdict, PolicySnapshot, Severity,
};
use verdict_core::traits::{CancellationToken, ISanitizer};
use verdict_core::VerdictConfig;
use verdict_pinner::{FeedbackPinner, PinDecision, RebuildReport};
use verdict_policy::{PolicyHistory, PolicySchema, PolicyUpdater};
use verdict_privacy::PrivacyEngine;
use verdict_storage::{FeedbackStore, RecoveryReport, StoreReceipt};

use crate::action_hook::{panic_message, ActionContext, ActionOutcome};
use crate::backoff::Backoff;
use crate::outcome::IngestionOutcome;
use crate::rejection_log::{RejectionEntry, RejectionLog};
use crate::state::{IngestionState, RejectReason, Trail};

/// Audit action of the single outcome record per acknowledged event.
pub const INGEST_ACTION: &str = "feedback.ingested";
/// Audit action of a committed policy version.
pub const POLICY_ACTION: &str = "policy.recomputed";

/// Confidence reduction recorded when a tracked action fails.
const FAILED_ACTION_DELTA: f64 = -0.5;

/// Central orchestrator of the feedback loop.
///
/// Shared by reference across producer threads; every method takes `&self`.
/// The feedback log and the audit chain are coordinated across processes
/// through their lock files. Pinner and policy state are process-local.
pub struct FeedbackLoopCoordinator {
    pub(crate) data_dir: PathBuf,
    pub(crate) sanitizer: PrivacyEngine,
    pub(crate) store: FeedbackStore,
    pub(crate) ledger: AuditLedger,
    pub(crate) pinner: FeedbackPinner,
    pub(crate) updater: PolicyUpdater,
    pub(crate) history: PolicyHistory,
    pub(crate) rejections: RejectionLog,
    pub(crate) events: EventDispatcher,
    /// Shared from append through admission, exclusive for compaction, so a
    /// compaction never drops an event that is about to enter the pinner.
    pub(crate) compaction_gate: RwLock<()>,
    pub(crate) recompute_lock: Mutex<()>,
    acknowledged: AtomicU64,
    backoff: Backoff,
    max_append_attempts: u32,
    max_payload_bytes: usize,
    recompute_every: u64,
}

impl FeedbackLoopCoordinator {
    pub fn open(config: VerdictConfig, root: &Path) -> Result<Self, CoordinatorError> {
        Self::open_with_handlers(config, root, Vec::new())
    }

    /// Open the data directory under `root`: recover the feedback log's tail,
    /// verify the audit chain (per `audit.verify_on_open`), restore the last
    /// committed policy, and rebuild the pinner from the store.
    pub fn open_with_handlers(
        config: VerdictConfig,
        root: &Path,
        handlers: Vec<Arc<dyn FeedbackEventHandler>>,
    ) -> Result<Self, CoordinatorError> {
        VerdictConfig::validate(&config)?;
        let data_dir = config.data_dir(root);

        let mut events = EventDispatcher::new();
        for handler in handlers {
            events.register(handler);
        }

        let store = FeedbackStore::open(&data_dir, &config.store)?;
        let recovery = store.recover()?;

        let ledger = AuditLedger::open(&data_dir, &config.store, &config.audit)?;
        if let Some(first_break_at) = ledger.halted() {
            events.emit_tamper_detected(&TamperDetectedEvent {
                first_break_at,
                reason: "audit chain failed verification on open".to_string(),
            });
        }

        let records = ledger.records(0..=u64::MAX)?;
        let schema = PolicySchema::from_config(&config.policy)?;
        let history = restore_policy(&records, &schema);

        // Only events whose outcome record made it into the ledger were ever
        // acknowledged; the rest stay in the store but never drive policy.
        let acknowledged = acknowledged_ids(&records);
        let (admissible, unacknowledged): (Vec<_>, Vec<_>) = stored_events(&store)?
            .into_iter()
            .partition(|event| acknowledged.contains(&event.id()));
        if !unacknowledged.is_empty() {
            tracing::warn!(
                unacknowledged = unacknowledged.len(),
                "stored feedback without an outcome record left out of the working set"
            );
        }
        let pinner = FeedbackPinner::new(&config.pinner);
        let rebuilt = pinner.rebuild(admissible)?;

        let coordinator = Self {
            data_dir,
            sanitizer: PrivacyEngine::new(),
            store,
            ledger,
            pinner,
            updater: PolicyUpdater::new(schema),
            history,
            rejections: RejectionLog::default(),
            events,
            compaction_gate: RwLock::new(()),
            recompute_lock: Mutex::new(()),
            acknowledged: AtomicU64::new(0),
            backoff: Backoff::from_config(&config.coordinator),
            max_append_attempts: config.coordinator.effective_max_append_attempts(),
            max_payload_bytes: config.store.effective_max_payload_bytes(),
            recompute_every: config.coordinator.effective_recompute_every(),
        };
        coordinator.audit_open(recovery, &rebuilt, unacknowledged.len())?;

        tracing::info!(
            data_dir = %coordinator.data_dir.display(),
            recovered_records = recovery.recovered,
            retained = rebuilt.admitted.saturating_sub(rebuilt.evicted.len()),
            policy_version = coordinator.history.current().version,
            halted = coordinator.ledger.halted().is_some(),
            "feedback loop opened"
        );
        Ok(coordinator)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn store(&self) -> &FeedbackStore {
        &self.store
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    pub fn pinner(&self) -> &FeedbackPinner {
        &self.pinner
    }

    pub fn rejections(&self) -> Vec<RejectionEntry> {
        self.rejections.entries()
    }

    /// Acknowledged ingestions since open.
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged.load(Ordering::Acquire)
    }

    /// Drive one draft to a terminal state.
    ///
    /// Validation failures, a halted ledger, and an exhausted retry budget
    /// all end in `Rejected` and are reported through the outcome, not as
    /// errors. `Err` means the state machine itself was misused.
    pub fn ingest(
        &self,
        draft: FeedbackDraft,
        cancel: &CancellationToken,
    ) -> Result<IngestionOutcome, CoordinatorError> {
        let subject_id = draft
            .subject_id
            .as_deref()
            .map(|s| self.sanitizer.sanitize(s).text);
        let mut run = Ingestion::new(subject_id);
        if cancel.checkpoint().is_err() {
            return run.cancel();
        }

        let event = match draft.build(&self.sanitizer, self.max_payload_bytes) {
            Ok(event) => event,
            Err(e) => return self.reject(run, &e),
        };
        run.event_id = Some(event.id());

        let summary = event_summary(&event);
        let intent = match self
            .ledger
            .stage_intent(AuditActor::Coordinator, INGEST_ACTION, &summary)
        {
            Ok(intent) => intent,
            Err(e) => return self.reject(run, &e),
        };
        run.advance(IngestionState::AuditedIntent)?;

        let gate = self
            .compaction_gate
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let receipt = match self.append_with_retry(&event, cancel, &mut run) {
            Ok(Some(receipt)) => receipt,
            Ok(None) => return run.cancel(),
            Err(e) => return self.reject(run, &e),
        };
        run.receipt = Some(receipt);
        run.advance(IngestionState::Persisted)?;

        let severity = event.severity();
        let decision = match self.pinner.admit(event) {
            Ok(decision) => decision,
            Err(e) => return self.reject(run, &e),
        };
        drop(gate);
        run.decision = Some(decision);
        run.advance(IngestionState::PinEvaluated)?;

        let payload = outcome_payload(summary, &intent, &receipt, &decision);
        let record = match self
            .ledger
            .record(AuditActor::Coordinator, INGEST_ACTION, payload)
        {
            Ok(record) => record,
            Err(e) => {
                self.undo_admission(receipt.event_id, &decision);
                return self.reject(run, &e);
            }
        };
        run.audit_sequence = Some(record.sequence_no);
        run.advance(IngestionState::AuditedOutcome)?;
        run.advance(IngestionState::Acknowledged)?;

        tracing::info!(
            event_id = %receipt.event_id,
            severity = %severity,
            pinned = decision.is_pinned(),
            audit_sequence = record.sequence_no,
            append_attempts = run.append_attempts,
            "feedback acknowledged"
        );
        self.events
            .emit_feedback_acknowledged(&FeedbackAcknowledgedEvent {
                event_id: receipt.event_id,
                severity,
                pinned: decision.is_pinned(),
                audit_sequence: record.sequence_no,
            });
        if let Some(evicted) = decision.evicted() {
            self.events.emit_events_evicted(&EventsEvictedEvent {
                event_ids: vec![evicted],
                audit_sequence: record.sequence_no,
            });
        }

        // Durable by now: a late cancellation is reported, never acted on.
        if cancel.is_cancelled() {
            run.cancellation_ignored = true;
            tracing::info!(event_id = %receipt.event_id, "cancellation requested after persistence; ignored");
        }

        let outcome = run.finish();
        self.after_acknowledged();
        Ok(outcome)
    }

    /// Run a recovery action and record feedback on how it went.
    ///
    /// Success records a `confirm` at `info` with no confidence change.
    /// Failure, including a panic, records an `escalate` at `medium` with a
    /// reduced confidence. The action's value is returned untouched and a
    /// panic is resumed after recording.
    pub fn track_action<T, F>(&self, ctx: &ActionContext, action: F) -> T
    where
        T: ActionOutcome,
        F: FnOnce() -> T,
    {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(action)) {
            Ok(value) => {
                self.record_action(ctx, value.succeeded(), value.detail());
                value
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.record_action(ctx, false, Some(format!("panicked: {message}")));
                std::panic::resume_unwind(payload)
            }
        }
    }

    fn record_action(&self, ctx: &ActionContext, succeeded: bool, detail: Option<String>) {
        let (verdict, severity, delta) = if succeeded {
            (OperatorVerdict::Confirm, Severity::Info, 0.0)
        } else {
            (OperatorVerdict::Escalate, Severity::Medium, FAILED_ACTION_DELTA)
        };
        let mut text = format!(
            "recovery_action={} outcome={}",
            ctx.action,
            if succeeded { "success" } else { "failure" }
        );
        if let Some(detail) = detail {
            text.push_str(" detail=");
            text.push_str(&detail);
        }

        let draft = FeedbackDraft::new(&ctx.subject_id, &ctx.anomaly_type, verdict, severity)
            .with_delta(delta)
            .with_text(text)
            .with_source(FeedbackSource::ActionHook)
            .with_mission_phase(&ctx.mission_phase);

        match self.ingest(draft, &CancellationToken::new()) {
            Ok(outcome) if outcome.is_acknowledged() => {
                tracing::debug!(action = %ctx.action, succeeded, "action outcome recorded");
            }
            Ok(outcome) => {
                tracing::warn!(action = %ctx.action, state = %outcome.state, "action outcome not recorded");
            }
            Err(e) => {
                tracing::warn!(action = %ctx.action, error = %e, "action outcome not recorded");
            }
        }
    }

    /// `Ok(None)` when cancelled before an attempt. Every attempt is a
    /// checkpoint, including the first.
    fn append_with_retry(
        &self,
        event: &FeedbackEvent,
        cancel: &CancellationToken,
        run: &mut Ingestion,
    ) -> Result<Option<StoreReceipt>, StoreError> {
        loop {
            if cancel.checkpoint().is_err() {
                return Ok(None);
            }
            run.append_attempts += 1;
            match self.store.append(event) {
                Ok(receipt) => return Ok(Some(receipt)),
                Err(e) if e.is_transient() && run.append_attempts < self.max_append_attempts => {
                    let delay = self.backoff.delay(run.append_attempts);
                    tracing::debug!(
                        event_id = %event.id(),
                        append_attempts = run.append_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "feedback log contended; backing off"
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn reject<E>(&self, mut run: Ingestion, err: &E) -> Result<IngestionOutcome, CoordinatorError>
    where
        E: VerdictErrorCode + Display,
    {
        let reason = RejectReason {
            code: err.error_code(),
            message: err.to_string(),
        };
        run.advance(IngestionState::Rejected(reason.clone()))?;

        self.rejections.push(RejectionEntry {
            at: Utc::now(),
            subject_id: run.subject_id.clone(),
            code: reason.code,
            message: reason.message.clone(),
            persisted: run.receipt.is_some(),
        });
        self.events.emit_feedback_rejected(&FeedbackRejectedEvent {
            subject_id: run.subject_id.clone(),
            code: reason.code,
            reason: reason.message,
        });
        Ok(run.finish())
    }

    /// Take an unacknowledged event back out of the pinner, and bring back
    /// the event its admission displaced, if any.
    fn undo_admission(&self, id: EventId, decision: &PinDecision) {
        if let Err(e) = self.pinner.withdraw(&id) {
            tracing::error!(event_id = %id, error = %e, "could not withdraw unacknowledged event");
        }
        let Some(displaced) = decision.evicted().filter(|d| *d != id) else {
            return;
        };
        let restored = self
            .store
            .read_all()
            .map_err(CoordinatorError::from)
            .and_then(|events| {
                let found = events.filter_map(Result::ok).find(|e| e.id() == displaced);
                match found {
                    Some(event) => Ok(Some(self.pinner.admit(event)?)),
                    None => Ok(None),
                }
            });
        match restored {
            Ok(Some(_)) => tracing::debug!(event_id = %displaced, "displaced event re-admitted"),
            Ok(None) => tracing::warn!(event_id = %displaced, "displaced event no longer stored"),
            Err(e) => tracing::warn!(event_id = %displaced, error = %e, "could not re-admit displaced event"),
        }
    }

    fn after_acknowledged(&self) {
        let count = self.acknowledged.fetch_add(1, Ordering::AcqRel) + 1;
        if self.recompute_every > 0 && count % self.recompute_every == 0 {
            if let Err(e) = self.recompute_policy() {
                tracing::warn!(error = %e, "scheduled policy recompute failed");
            }
        }
    }

    /// Records for what `open` changed. A fresh directory writes none.
    fn audit_open(
        &self,
        recovery: RecoveryReport,
        rebuilt: &RebuildReport,
        unacknowledged: usize,
    ) -> Result<(), CoordinatorError> {
        if let Some(first_break_at) = self.ledger.halted() {
            tracing::warn!(first_break_at, "audit ledger halted; open not recorded");
            return Ok(());
        }
        if !recovery.was_clean() {
            self.ledger.record(
                AuditActor::Store,
                "store.recovered",
                json!({
                    "recovered": recovery.recovered,
                    "discarded_bytes": recovery.discarded_bytes,
                }),
            )?;
        }
        if rebuilt.admitted > 0 {
            self.ledger.record(
                AuditActor::Pinner,
                "pinner.rebuilt",
                json!({
                    "admitted": rebuilt.admitted,
                    "unacknowledged": unacknowledged,
                    "evicted": rebuilt.evicted.iter().map(ToString::to_string).collect::<Vec<_>>(),
                }),
            )?;
        }
        Ok(())
    }
}

/// Progress of one ingestion.
struct Ingestion {
    trail: Trail,
    subject_id: Option<String>,
    event_id: Option<EventId>,
    receipt: Option<StoreReceipt>,
    decision: Option<PinDecision>,
    audit_sequence: Option<u64>,
    append_attempts: u32,
    cancellation_ignored: bool,
}

impl Ingestion {
    fn new(subject_id: Option<String>) -> Self {
        Self {
            trail: Trail::new(),
            subject_id,
            event_id: None,
            receipt: None,
            decision: None,
            audit_sequence: None,
            append_attempts: 0,
            cancellation_ignored: false,
        }
    }

    fn advance(&mut self, next: IngestionState) -> Result<(), CoordinatorError> {
        self.trail.advance(next)
    }

    fn cancel(mut self) -> Result<IngestionOutcome, CoordinatorError> {
        self.advance(IngestionState::Cancelled)?;
        tracing::info!(
            subject_id = self.subject_id.as_deref().unwrap_or("<missing>"),
            "ingestion cancelled before persistence"
        );
        Ok(self.finish())
    }

    fn finish(self) -> IngestionOutcome {
        IngestionOutcome {
            state: self.trail.current().clone(),
            trail: self.trail.into_states(),
            event_id: self.event_id,
            receipt: self.receipt,
            decision: self.decision,
            audit_sequence: self.audit_sequence,
            append_attempts: self.append_attempts,
            cancellation_ignored: self.cancellation_ignored,
        }
    }
}

/// Fields of an event that the intent digest and the outcome record commit to.
fn event_summary(event: &FeedbackEvent) -> Value {
    json!({
        "event_id": event.id().to_string(),
        "subject_id": event.subject_id(),
        "anomaly_type": event.anomaly_type(),
        "verdict": event.operator_verdict(),
        "severity": event.severity(),
        "confidence_delta": event.confidence_delta(),
        "source": event.source(),
    })
}

fn outcome_payload(
    mut summary: Value,
    intent: &IntentToken,
    receipt: &StoreReceipt,
    decision: &PinDecision,
) -> Value {
    if let Value::Object(map) = &mut summary {
        map.insert("intent_digest".into(), json!(intent.digest));
        map.insert("offset".into(), json!(receipt.offset));
        map.insert("length".into(), json!(receipt.length));
        map.insert("pinned".into(), json!(decision.is_pinned()));
        map.insert(
            "evicted".into(),
            json!(decision.evicted().map(|id| id.to_string())),
        );
    }
    summary
}

/// Every decodable event in the store. Undecodable frames are logged and
/// skipped; `recover` has already cut any torn tail.
fn stored_events(store: &FeedbackStore) -> Result<Vec<FeedbackEvent>, CoordinatorError> {
    let mut events = Vec::new();
    for item in store.read_all()? {
        match item {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(error = %e, "skipping unreadable feedback record"),
        }
    }
    Ok(events)
}

/// Resume from the last committed policy in the ledger, or start at the
/// schema's root.
fn restore_policy(records: &[AuditRecord], schema: &PolicySchema) -> PolicyHistory {
    let last = records.iter().rev().find(|r| r.action == POLICY_ACTION);

    let Some(record) = last else {
        return PolicyHistory::new(schema.root_snapshot());
    };
    match snapshot_from_record(record, schema) {
        Some(snapshot) => {
            tracing::info!(
                policy_version = snapshot.version,
                audit_sequence = record.sequence_no,
                "policy restored from audit chain"
            );
            PolicyHistory::resume(snapshot)
        }
        None => {
            tracing::warn!(audit_sequence = record.sequence_no, "unreadable policy record; starting from root");
            PolicyHistory::new(schema.root_snapshot())
        }
    }
}

/// Ids named by `feedback.ingested` records.
fn acknowledged_ids(records: &[AuditRecord]) -> BTreeSet<EventId> {
    records
        .iter()
        .filter(|r| r.action == INGEST_ACTION)
        .filter_map(|r| r.payload.get("event_id")?.as_str()?.parse().ok())
        .collect()
}

/// Parameters the schema no longer names are dropped and new ones start at
/// their configured value, so the restored head always fits the schema.
fn snapshot_from_record(record: &AuditRecord, schema: &PolicySchema) -> Option<PolicySnapshot> {
    let payload = &record.payload;
    let version = payload.get("version")?.as_u64()?;
    let parent_version = payload.get("parent_version").and_then(Value::as_u64);
    let stored: BTreeMap<&str, f64> = payload
        .get("parameters")?
        .as_array()?
        .iter()
        .filter_map(|entry| Some((entry.get("dimension")?.as_str()?, entry.get("value")?.as_f64()?)))
        .collect();

    let mut parameter_map: BTreeMap<String, f64> = schema.root_snapshot().parameter_map;
    for (key, value) in parameter_map.iter_mut() {
        match stored.get(key.as_str()) {
            Some(v) if schema.in_range(*v) => *value = *v,
            Some(v) => tracing::warn!(dimension = %key, value = *v, "restored parameter out of bounds; using configured value"),
            None => {}
        }
    }

    let supporting_event_ids = payload
        .get("supporting_event_ids")?
        .as_array()?
        .iter()
        .map(|id| id.as_str().and_then(|s| s.parse::<EventId>().ok()))
        .collect::<Option<BTreeSet<_>>>()?;

    Some(PolicySnapshot {
        version,
        parent_version,
        created_at: record.recorded_at,
        parameter_map,
        supporting_event_ids,
    })
}
