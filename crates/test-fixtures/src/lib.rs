//! Shared builders and fixture loading for verdict tests.
//!
//! Events are built through `FeedbackDraft::build`, the same path the
//! coordinator uses, so fixtures never bypass validation.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use verdict_core::config::VerdictConfig;
use verdict_core::constants::DEFAULT_MAX_PAYLOAD_BYTES;
use verdict_core::models::{FeedbackDraft, FeedbackEvent, OperatorVerdict, Severity};
use verdict_core::traits::NoopSanitizer;

/// Dimension used by builders that don't name one.
pub const DEFAULT_ANOMALY: &str = "network_anomaly";

/// Root of the JSON fixture files.
pub fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data")
}

/// Load and deserialize a JSON fixture file.
///
/// # Panics
/// Panics if the file doesn't exist or can't be deserialized.
pub fn load_fixture<T: DeserializeOwned>(relative_path: &str) -> T {
    let path = fixtures_root().join(relative_path);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

/// Build a validated event.
///
/// # Panics
/// Panics if the arguments fail validation.
pub fn event(
    subject: &str,
    anomaly: &str,
    verdict: OperatorVerdict,
    severity: Severity,
    delta: f64,
) -> FeedbackEvent {
    FeedbackDraft::new(subject, anomaly, verdict, severity)
        .with_delta(delta)
        .build(&NoopSanitizer, DEFAULT_MAX_PAYLOAD_BYTES)
        .unwrap_or_else(|e| panic!("fixture event {subject} invalid: {e}"))
}

pub fn event_with_severity(subject: &str, severity: Severity) -> FeedbackEvent {
    event(subject, DEFAULT_ANOMALY, OperatorVerdict::Confirm, severity, 0.0)
}

pub fn critical_event(subject: &str) -> FeedbackEvent {
    event_with_severity(subject, Severity::Critical)
}

pub fn info_event(subject: &str) -> FeedbackEvent {
    event_with_severity(subject, Severity::Info)
}

/// A correction that moves `anomaly` by `delta`.
pub fn correction(subject: &str, anomaly: &str, delta: f64) -> FeedbackEvent {
    let verdict = if delta < 0.0 {
        OperatorVerdict::FalsePositive
    } else {
        OperatorVerdict::FalseNegative
    };
    event(subject, anomaly, verdict, Severity::Medium, delta)
}

/// A well-formed draft for ingestion tests.
pub fn draft(subject: &str, severity: Severity) -> FeedbackDraft {
    FeedbackDraft::new(subject, DEFAULT_ANOMALY, OperatorVerdict::Confirm, severity)
}

/// Config rooted in `dir` with short lock waits, suitable for tests.
pub fn temp_config(dir: &Path) -> VerdictConfig {
    let mut config = VerdictConfig::default();
    config.store.data_dir = Some(dir.display().to_string());
    config.store.lock_timeout_ms = Some(500);
    config.store.lock_poll_ms = Some(1);
    config.store.fsync = Some(false);
    config.coordinator.backoff_base_ms = Some(1);
    config.coordinator.backoff_max_ms = Some(20);
    config
}

/// Overwrite the first byte of the first occurrence of `marker` in `path`.
///
/// # Panics
/// Panics if the file can't be read or written or the marker is absent.
pub fn flip_byte_at_marker(path: &Path, marker: &str) {
    let mut bytes = std::fs::read(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    let at = bytes
        .windows(marker.len())
        .position(|w| w == marker.as_bytes())
        .unwrap_or_else(|| panic!("marker {marker:?} not found in {}", path.display()));
    bytes[at] ^= 0x01;
    std::fs::write(path, bytes)
        .unwrap_or_else(|e| panic!("Failed to write {}: {}", path.display(), e));
}

/// Cut `n` bytes off the end of `path`, simulating a crashed writer.
pub fn truncate_tail(path: &Path, n: u64) {
    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap_or_else(|e| panic!("Failed to open {}: {}", path.display(), e));
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    file.set_len(len.saturating_sub(n))
        .unwrap_or_else(|e| panic!("Failed to truncate {}: {}", path.display(), e));
}
