//! AuditLedger: append, verify, and halt on tamper.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use verdict_core::config::{AuditConfig, StoreConfig};
use verdict_core::constants::{AUDIT_CHAIN_FILE, GENESIS_HASH};
use verdict_core::errors::{AuditError, StoreError};
use verdict_core::models::{monotonic_now, AuditActor, AuditRecord};
use verdict_privacy::{PayloadRedactor, PrivacyEngine};
use verdict_storage::frame::{self, FrameKind, FrameRead, FrameReader};
use verdict_storage::LockFile;

use crate::chain::{self, canonicalize};
use crate::intent::IntentToken;
use crate::verification::VerificationResult;

const NOT_HALTED: u64 = u64::MAX;

/// Cached view of the chain tail, valid while the file length matches.
#[derive(Debug)]
struct Tail {
    file_len: u64,
    next_seq: u64,
    hash: String,
}

impl Tail {
    fn genesis() -> Self {
        Self {
            file_len: 0,
            next_seq: 0,
            hash: GENESIS_HASH.to_string(),
        }
    }
}

/// Append-only, hash-chained ledger of state changes.
///
/// Sequence numbers are assigned under the chain's advisory lock, so they
/// are total and gap-free across every process sharing the file.
pub struct AuditLedger {
    path: PathBuf,
    lock: LockFile,
    lock_timeout: Duration,
    lock_poll: Duration,
    fsync: bool,
    redactor: PayloadRedactor<PrivacyEngine>,
    tail: Mutex<Tail>,
    halted_at: AtomicU64,
}

impl AuditLedger {
    /// Open the chain in `data_dir`. A torn tail from a crashed writer is
    /// truncated; with `verify_on_open` a broken chain leaves the ledger halted.
    pub fn open(
        data_dir: &Path,
        store: &StoreConfig,
        audit: &AuditConfig,
    ) -> Result<Self, AuditError> {
        fs::create_dir_all(data_dir).map_err(|e| StoreError::io(data_dir, e))?;
        let path = data_dir.join(AUDIT_CHAIN_FILE);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;

        let ledger = Self {
            lock: LockFile::for_data_file(&path)?,
            path,
            lock_timeout: Duration::from_millis(store.effective_lock_timeout_ms()),
            lock_poll: Duration::from_millis(store.effective_lock_poll_ms().max(1)),
            fsync: store.effective_fsync(),
            redactor: PayloadRedactor::new(PrivacyEngine::new(), &audit.extra_sensitive_keys),
            tail: Mutex::new(Tail::genesis()),
            halted_at: AtomicU64::new(NOT_HALTED),
        };

        ledger.lock.with_exclusive(ledger.lock_timeout, ledger.lock_poll, || {
            let mut tail = ledger.tail.lock().unwrap_or_else(PoisonError::into_inner);
            ledger.catch_up(&mut tail, true)
        })?;

        if audit.effective_verify_on_open() {
            ledger.verify(0..=u64::MAX)?;
        }
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number the next record will receive.
    pub fn next_sequence(&self) -> u64 {
        self.tail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_seq
    }

    /// Append one record. The payload is redacted before hashing.
    pub fn record(
        &self,
        actor: AuditActor,
        action: &str,
        payload: Value,
    ) -> Result<AuditRecord, AuditError> {
        self.ensure_writable()?;
        let payload = canonicalize(&self.redactor.redact(&payload));

        let record = self.lock.with_exclusive(self.lock_timeout, self.lock_poll, || {
            let mut tail = self.tail.lock().unwrap_or_else(PoisonError::into_inner);
            self.catch_up(&mut tail, false)?;

            let recorded_at = monotonic_now();
            let body = chain::record_body(tail.next_seq, actor, action, recorded_at, &payload);
            let record = AuditRecord {
                sequence_no: tail.next_seq,
                prev_hash: tail.hash.clone(),
                this_hash: chain::chain_hash(&tail.hash, &body),
                actor,
                action: action.to_string(),
                recorded_at,
                payload: payload.clone(),
            };

            let bytes = frame::encode(FrameKind::Audit, &serde_json::to_vec(&record)?)?;
            let mut file = OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map_err(|e| StoreError::io(&self.path, e))?;
            let written = file
                .write_all(&bytes)
                .and_then(|()| file.flush())
                .and_then(|()| if self.fsync { file.sync_data() } else { Ok(()) });
            if let Err(e) = written {
                // A partial frame would otherwise block every later record.
                if let Err(undo) = file.set_len(tail.file_len) {
                    tracing::error!(offset = tail.file_len, error = %undo, "could not roll back failed audit write");
                }
                return Err(StoreError::io(&self.path, e));
            }

            tail.file_len += bytes.len() as u64;
            tail.next_seq += 1;
            tail.hash = record.this_hash.clone();
            Ok(record)
        })?;

        tracing::debug!(audit_sequence = record.sequence_no, actor = actor.as_str(), action, "audit record written");
        Ok(record)
    }

    /// Digest an operation before performing it. Writes nothing.
    pub fn stage_intent(
        &self,
        actor: AuditActor,
        action: &str,
        payload: &Value,
    ) -> Result<IntentToken, AuditError> {
        self.ensure_writable()?;
        let body = chain::canonical_json(&serde_json::json!({
            "actor": actor.as_str(),
            "action": action,
            "payload": self.redactor.redact(payload),
        }));
        Ok(IntentToken {
            actor,
            action: action.to_string(),
            digest: blake3::hash(body.as_bytes()).to_hex().to_string(),
        })
    }

    /// Walk `range` and report the first record that fails to recompute,
    /// link, or decode. A break halts the ledger.
    pub fn verify(&self, range: RangeInclusive<u64>) -> Result<VerificationResult, AuditError> {
        let (from, to) = (*range.start(), *range.end());
        if from > to {
            return Err(AuditError::InvalidRange { from, to });
        }

        let mut frames = self.frames()?;
        let mut expected_prev: Option<String> = Some(GENESIS_HASH.to_string());
        let mut checked = 0u64;
        let mut seq = 0u64;

        while seq <= to {
            let raw = match frames.next_frame().map_err(|e| StoreError::io(&self.path, e))? {
                FrameRead::End => break,
                FrameRead::Torn { details, .. } if seq >= from => {
                    return Ok(self.broken(seq, format!("torn frame: {details}")));
                }
                FrameRead::Torn { .. } => break,
                FrameRead::Frame(raw) => raw,
            };

            let record = serde_json::from_slice::<AuditRecord>(&raw.body);
            if seq < from {
                // Before the range only the stored hash matters, as the next link.
                expected_prev = record.ok().map(|r| r.this_hash);
                seq += 1;
                continue;
            }

            let record = match record {
                Ok(record) => record,
                Err(e) => return Ok(self.broken(seq, format!("undecodable record: {e}"))),
            };
            if record.sequence_no != seq {
                return Ok(self.broken(
                    seq,
                    format!("sequence {} stored at position {seq}", record.sequence_no),
                ));
            }
            if let Some(expected) = &expected_prev {
                if &record.prev_hash != expected {
                    return Ok(self.broken(seq, "prev_hash does not match predecessor".into()));
                }
            }
            if chain::recompute(&record) != record.this_hash {
                return Ok(self.broken(seq, "stored hash does not match contents".into()));
            }

            expected_prev = Some(record.this_hash);
            checked += 1;
            seq += 1;
        }

        tracing::debug!(from, to, checked, "audit chain verified");
        Ok(VerificationResult::Ok { checked })
    }

    /// Records whose sequence number falls in `range`, skipping any that
    /// no longer decode.
    pub fn records(&self, range: RangeInclusive<u64>) -> Result<Vec<AuditRecord>, AuditError> {
        let mut frames = self.frames()?;
        let mut out = Vec::new();
        let mut seq = 0u64;
        while seq <= *range.end() {
            let raw = match frames.next_frame().map_err(|e| StoreError::io(&self.path, e))? {
                FrameRead::Frame(raw) => raw,
                FrameRead::End | FrameRead::Torn { .. } => break,
            };
            if range.contains(&seq) {
                if let Ok(record) = serde_json::from_slice::<AuditRecord>(&raw.body) {
                    out.push(record);
                }
            }
            seq += 1;
        }
        Ok(out)
    }

    /// Sequence of the first detected break while halted.
    pub fn halted(&self) -> Option<u64> {
        match self.halted_at.load(Ordering::Acquire) {
            NOT_HALTED => None,
            at => Some(at),
        }
    }

    /// Resume writes after an operator has reviewed a break. The
    /// acknowledgment is itself recorded.
    pub fn acknowledge_tamper(&self, operator: &str) -> Result<Option<AuditRecord>, AuditError> {
        let Some(first_break_at) = self.halted() else {
            return Ok(None);
        };
        self.halted_at.store(NOT_HALTED, Ordering::Release);
        tracing::warn!(first_break_at, operator, "audit halt acknowledged");
        self.record(
            AuditActor::Operator,
            "audit.tamper_acknowledged",
            serde_json::json!({ "first_break_at": first_break_at, "operator": operator }),
        )
        .map(Some)
    }

    fn ensure_writable(&self) -> Result<(), AuditError> {
        match self.halted() {
            Some(first_break_at) => Err(AuditError::Halted { first_break_at }),
            None => Ok(()),
        }
    }

    fn broken(&self, first_break_at: u64, reason: String) -> VerificationResult {
        // Keep the earliest break if several verifications race.
        let _ = self.halted_at.fetch_min(first_break_at, Ordering::AcqRel);
        tracing::error!(first_break_at, reason = %reason, "audit chain broken; ledger halted");
        VerificationResult::Broken {
            first_break_at,
            reason,
        }
    }

    fn frames(&self) -> Result<FrameReader<BufReader<File>>, AuditError> {
        let file = File::open(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        Ok(FrameReader::new(BufReader::new(file)))
    }

    /// Bring `tail` up to date with records other handles appended.
    /// Must run under the chain lock.
    fn catch_up(&self, tail: &mut Tail, repair_torn: bool) -> Result<(), StoreError> {
        let mut file = File::open(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let len = file
            .metadata()
            .map_err(|e| StoreError::io(&self.path, e))?
            .len();
        if len == tail.file_len {
            return Ok(());
        }
        if len < tail.file_len {
            *tail = Tail::genesis();
        }

        file.seek(SeekFrom::Start(tail.file_len))
            .map_err(|e| StoreError::io(&self.path, e))?;
        let base = tail.file_len;
        let mut frames = FrameReader::new(BufReader::new(file));
        loop {
            match frames.next_frame().map_err(|e| StoreError::io(&self.path, e))? {
                FrameRead::End => break,
                FrameRead::Frame(raw) => {
                    // An undecodable record still occupies a sequence slot;
                    // verification reports it.
                    if let Ok(record) = serde_json::from_slice::<AuditRecord>(&raw.body) {
                        tail.hash = record.this_hash;
                    }
                    tail.next_seq += 1;
                    tail.file_len = base + frames.offset();
                }
                FrameRead::Torn { offset, details } if repair_torn => {
                    let valid = base + offset;
                    tracing::warn!(offset = valid, details = %details, "truncating torn audit tail");
                    let file = OpenOptions::new()
                        .write(true)
                        .open(&self.path)
                        .map_err(|e| StoreError::io(&self.path, e))?;
                    file.set_len(valid)
                        .and_then(|()| file.sync_all())
                        .map_err(|e| StoreError::io(&self.path, e))?;
                    break;
                }
                FrameRead::Torn { offset, details } => {
                    return Err(StoreError::Corruption {
                        recovered: tail.next_seq as usize,
                        offset: base + offset,
                        details,
                    });
                }
            }
        }
        Ok(())
    }
}
