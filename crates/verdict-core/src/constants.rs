/// File name of the feedback log inside a data directory.
pub const FEEDBACK_LOG_FILE: &str = "feedback.log";

/// File name of the audit chain inside a data directory.
pub const AUDIT_CHAIN_FILE: &str = "audit.chain";

/// Suffix appended to a log path to form its advisory lock file.
pub const LOCK_FILE_SUFFIX: &str = "lock";

/// `prev_hash` of the first audit record: 64 hex zeros.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Placeholder written in place of sensitive payload values.
pub const REDACTED: &str = "[REDACTED]";

/// Largest accepted `raw_payload`, in bytes, unless configured otherwise.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 16 * 1024;

/// Bounds for an operator's proposed `confidence_delta`.
pub const MIN_CONFIDENCE_DELTA: f64 = -1.0;
pub const MAX_CONFIDENCE_DELTA: f64 = 1.0;

/// Upper bound on a single framed record body. Larger declared lengths are
/// treated as corruption rather than allocation requests.
pub const MAX_FRAME_BODY_BYTES: u32 = 8 * 1024 * 1024;

/// Detection dimensions known to the classifier, with their starting
/// threshold. Used when no `[policy.parameters]` table is configured.
pub const DEFAULT_POLICY_PARAMETERS: &[(&str, f64)] = &[
    ("auth_anomaly", 0.5),
    ("file_integrity", 0.5),
    ("network_anomaly", 0.5),
    ("privilege_escalation", 0.5),
    ("process_anomaly", 0.5),
];
