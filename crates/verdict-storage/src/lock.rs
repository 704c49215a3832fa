//! Cross-process advisory lock scoped to one critical section.
//!
//! The lock lives in a sidecar file (`<log>.lock`) so the data file can be
//! replaced by compaction while the lock identity stays stable.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use verdict_core::constants::LOCK_FILE_SUFFIX;
use verdict_core::errors::StoreError;

/// Exclusive OS-level lock on a sidecar file.
///
/// The `Mutex` serializes threads sharing this handle; the OS lock excludes
/// other handles, including other processes and other `LockFile`s on the
/// same path in this process. Both waits count against the same deadline.
pub struct LockFile {
    path: PathBuf,
    inner: Mutex<fd_lock::RwLock<File>>,
}

impl LockFile {
    /// Open (creating if needed) the lock file guarding `data_path`.
    pub fn for_data_file(data_path: &Path) -> Result<Self, StoreError> {
        Self::open(&sidecar_path(data_path))
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(fd_lock::RwLock::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` while holding the lock, waiting at most `timeout`.
    ///
    /// The lock is released when this returns, on success, error, or panic
    /// inside `f`.
    pub fn with_exclusive<T>(
        &self,
        timeout: Duration,
        poll: Duration,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let started = Instant::now();
        let deadline = started + timeout;

        let mut guard = loop {
            match self.inner.try_lock() {
                Ok(guard) => break guard,
                // A panic inside a previous critical section released the OS
                // lock with the guard; the file handle itself is still sound.
                Err(TryLockError::Poisoned(poisoned)) => break poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => self.wait(started, deadline, poll)?,
            }
        };

        loop {
            match guard.try_write() {
                Ok(_held) => {
                    let waited = started.elapsed().as_millis() as u64;
                    if waited > 0 {
                        tracing::trace!(path = %self.path.display(), lock_wait_ms = waited, "lock acquired");
                    }
                    return f();
                }
                Err(e) if is_contended(&e) => self.wait(started, deadline, poll)?,
                Err(e) => return Err(StoreError::io(&self.path, e)),
            }
        }
    }

    fn wait(&self, started: Instant, deadline: Instant, poll: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        if now >= deadline {
            let waited_ms = started.elapsed().as_millis() as u64;
            tracing::debug!(path = %self.path.display(), lock_wait_ms = waited_ms, "lock wait expired");
            return Err(StoreError::LockTimeout {
                path: self.path.display().to_string(),
                waited_ms,
            });
        }
        thread::sleep(poll.min(deadline - now));
        Ok(())
    }
}

/// `feedback.log` -> `feedback.log.lock`.
pub fn sidecar_path(data_path: &Path) -> PathBuf {
    let mut name = data_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(LOCK_FILE_SUFFIX);
    data_path.with_file_name(name)
}

fn is_contended(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    // ERROR_LOCK_VIOLATION
    cfg!(windows) && e.raw_os_error() == Some(33)
}
