//! FeedbackStore: the append-only, cross-process-safe feedback log.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use verdict_core::config::StoreConfig;
use verdict_core::constants::FEEDBACK_LOG_FILE;
use verdict_core::errors::StoreError;
use verdict_core::models::{EventId, FeedbackEvent};

use crate::frame::{self, FrameKind, FrameRead, FrameReader};
use crate::lock::LockFile;
use crate::reader::FeedbackReader;
use crate::receipts::{CompactionReceipt, RecoveryReport, StoreReceipt};

/// Durable, append-only log of feedback events.
///
/// Every mutation runs under the log's advisory lock. Handles are cheap to
/// open; independent handles (in this or other processes) on the same path
/// exclude each other through the OS lock.
pub struct FeedbackStore {
    path: PathBuf,
    lock: LockFile,
    lock_timeout: Duration,
    lock_poll: Duration,
    fsync: bool,
    /// Log length this handle last saw ending on a frame boundary, after its
    /// own write, recovery or compaction. Only trusted while it matches.
    boundary: Mutex<Option<u64>>,
}

impl FeedbackStore {
    /// Open the log in `data_dir`, creating the directory if needed.
    pub fn open(data_dir: &Path, config: &StoreConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|e| StoreError::io(data_dir, e))?;
        Self::open_file(&data_dir.join(FEEDBACK_LOG_FILE), config)
    }

    /// Open a log at an explicit path.
    pub fn open_file(path: &Path, config: &StoreConfig) -> Result<Self, StoreError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        let lock = LockFile::for_data_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            lock,
            lock_timeout: Duration::from_millis(config.effective_lock_timeout_ms()),
            lock_poll: Duration::from_millis(config.effective_lock_poll_ms().max(1)),
            fsync: config.effective_fsync(),
            boundary: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append one event.
    ///
    /// The frame is encoded before the lock is taken and written with one
    /// `write_all`. Under the lock the log is first checked to end on a frame
    /// boundary: a torn tail left by a crashed writer is cut off, so the new
    /// frame never lands behind bytes that would hide it from readers. A
    /// failed write or sync is rolled back to the same boundary.
    pub fn append(&self, event: &FeedbackEvent) -> Result<StoreReceipt, StoreError> {
        let body = serde_json::to_vec(event)?;
        let bytes = frame::encode(FrameKind::Feedback, &body)?;
        let length = bytes.len() as u64;

        let offset = self.lock.with_exclusive(self.lock_timeout, self.lock_poll, || {
            let mut boundary = self.boundary.lock().unwrap_or_else(PoisonError::into_inner);
            // Reopened under the lock: compaction may have replaced the file.
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&self.path)
                .map_err(|e| StoreError::io(&self.path, e))?;
            let offset = self.frame_boundary(&file, *boundary)?;

            let written = file
                .seek(SeekFrom::Start(offset))
                .and_then(|_| file.write_all(&bytes))
                .and_then(|()| file.flush())
                .and_then(|()| if self.fsync { file.sync_data() } else { Ok(()) });
            if let Err(e) = written {
                *boundary = None;
                if let Err(undo) = file.set_len(offset) {
                    tracing::error!(offset, error = %undo, "could not roll back failed append");
                } else {
                    *boundary = Some(offset);
                }
                return Err(StoreError::io(&self.path, e));
            }
            *boundary = Some(offset + length);
            Ok(offset)
        })?;

        tracing::debug!(event_id = %event.id(), offset, append_bytes = length, "feedback appended");
        Ok(StoreReceipt {
            event_id: event.id(),
            offset,
            length,
        })
    }

    /// Where the next frame goes. Trusts `known` only while the file still
    /// has exactly that length; otherwise rescans and cuts a torn tail.
    /// Must run under the lock.
    fn frame_boundary(&self, file: &File, known: Option<u64>) -> Result<u64, StoreError> {
        let len = file
            .metadata()
            .map_err(|e| StoreError::io(&self.path, e))?
            .len();
        if known == Some(len) {
            return Ok(len);
        }
        // Another handle may have appended or compacted since, so the cached
        // length says nothing about where frames start. Nothing is written
        // behind a torn frame any more, so structure alone finds the tear.
        let prefix = self.scan_valid_prefix(false)?;
        if prefix.valid_len < len {
            tracing::warn!(
                offset = prefix.valid_len,
                discarded_bytes = len - prefix.valid_len,
                "cutting torn tail before append"
            );
            file.set_len(prefix.valid_len)
                .map_err(|e| StoreError::io(&self.path, e))?;
        }
        Ok(prefix.valid_len)
    }

    /// Lazily iterate every stored event in append order.
    pub fn read_all(&self) -> Result<FeedbackReader, StoreError> {
        FeedbackReader::open(&self.path)
    }

    /// Truncate a torn tail left by a crashed writer.
    pub fn recover(&self) -> Result<RecoveryReport, StoreError> {
        let report = self.lock.with_exclusive(self.lock_timeout, self.lock_poll, || {
            let mut boundary = self.boundary.lock().unwrap_or_else(PoisonError::into_inner);
            let ValidPrefix {
                recovered,
                valid_len,
                total_len,
            } = self.scan_valid_prefix(true)?;
            if valid_len < total_len {
                let file = OpenOptions::new()
                    .write(true)
                    .open(&self.path)
                    .map_err(|e| StoreError::io(&self.path, e))?;
                file.set_len(valid_len)
                    .and_then(|()| file.sync_all())
                    .map_err(|e| StoreError::io(&self.path, e))?;
            }
            *boundary = Some(valid_len);
            Ok(RecoveryReport {
                recovered,
                discarded_bytes: total_len - valid_len,
            })
        })?;

        if report.was_clean() {
            tracing::debug!(recovered_records = report.recovered, "feedback log clean");
        } else {
            tracing::warn!(
                recovered_records = report.recovered,
                discarded_bytes = report.discarded_bytes,
                "truncated torn tail of feedback log"
            );
        }
        Ok(report)
    }

    /// Rewrite the log keeping only events in `retain`.
    ///
    /// The rewrite goes to a sibling file that atomically replaces the log,
    /// so readers see either the old or the new file, never a mix.
    pub fn compact(&self, retain: &BTreeSet<EventId>) -> Result<CompactionReceipt, StoreError> {
        let receipt = self.lock.with_exclusive(self.lock_timeout, self.lock_poll, || {
            let mut boundary = self.boundary.lock().unwrap_or_else(PoisonError::into_inner);
            let source = File::open(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
            let bytes_before = source
                .metadata()
                .map_err(|e| StoreError::io(&self.path, e))?
                .len();
            let mut frames = FrameReader::new(BufReader::new(source));

            let tmp_path = self.path.with_extension("compact");
            let mut out = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
            let mut receipt = CompactionReceipt {
                bytes_before,
                ..CompactionReceipt::default()
            };

            loop {
                let frame = match frames.next_frame().map_err(|e| StoreError::io(&self.path, e))? {
                    FrameRead::Frame(frame) => frame,
                    FrameRead::End | FrameRead::Torn { .. } => break,
                };
                let Ok(event) = serde_json::from_slice::<FeedbackEvent>(&frame.body) else {
                    receipt.dropped_undecodable += 1;
                    continue;
                };
                if retain.contains(&event.id()) {
                    let bytes = frame::encode(frame.kind, &frame.body)?;
                    out.write_all(&bytes).map_err(|e| StoreError::io(&tmp_path, e))?;
                    receipt.retained += 1;
                    receipt.bytes_after += bytes.len() as u64;
                } else {
                    receipt.removed_ids.push(event.id());
                }
            }

            out.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
            drop(out);
            fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
            sync_parent_dir(&self.path);
            *boundary = Some(receipt.bytes_after);
            Ok(receipt)
        })?;

        tracing::info!(
            retained = receipt.retained,
            removed = receipt.removed_ids.len(),
            bytes_before = receipt.bytes_before,
            bytes_after = receipt.bytes_after,
            "feedback log compacted"
        );
        Ok(receipt)
    }

    /// Current size of the log in bytes.
    pub fn len_bytes(&self) -> Result<u64, StoreError> {
        fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| StoreError::io(&self.path, e))
    }

    /// Walk the log from the start.
    ///
    /// With `check_bodies` the valid prefix ends after the last frame that
    /// decodes as an event. Undecodable frames followed by a good one are
    /// kept (the reader reports them), but trailing ones are not: a torn
    /// frame that was later written over can swallow the next frame's bytes
    /// and still look complete.
    fn scan_valid_prefix(&self, check_bodies: bool) -> Result<ValidPrefix, StoreError> {
        let file = File::open(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let total_len = file
            .metadata()
            .map_err(|e| StoreError::io(&self.path, e))?
            .len();
        let mut frames = FrameReader::new(BufReader::new(file));
        let mut recovered = 0;
        let mut valid_len = 0;
        let mut pending = 0;
        loop {
            match frames.next_frame().map_err(|e| StoreError::io(&self.path, e))? {
                FrameRead::Frame(raw)
                    if !check_bodies
                        || (raw.kind == FrameKind::Feedback
                            && serde_json::from_slice::<FeedbackEvent>(&raw.body).is_ok()) =>
                {
                    recovered += pending + 1;
                    pending = 0;
                    valid_len = frames.offset();
                }
                FrameRead::Frame(_) => pending += 1,
                FrameRead::End | FrameRead::Torn { .. } => break,
            }
        }
        Ok(ValidPrefix {
            recovered,
            valid_len,
            total_len,
        })
    }
}

struct ValidPrefix {
    /// Frames inside the valid prefix.
    recovered: usize,
    valid_len: u64,
    total_len: u64,
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
