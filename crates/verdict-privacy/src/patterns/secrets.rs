use regex::Regex;
use std::sync::LazyLock;

use super::Pattern;

macro_rules! secret_pattern {
    ($name:ident, $regex_str:expr) => {
        pub static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

// ── Connection strings (user:pass@host) ────────────────────────────────────
secret_pattern!(
    RE_CONNECTION_STRING,
    r"(?i)\b(?:postgres(?:ql)?|mysql|mongodb(?:\+srv)?|redis|amqp)://[^\s:@/]+:[^\s@/]+@[^\s/]+\S*"
);

// ── AWS ────────────────────────────────────────────────────────────────────
secret_pattern!(RE_AWS_ACCESS_KEY, r"\bAKIA[0-9A-Z]{16}\b");

// ── JWT ────────────────────────────────────────────────────────────────────
secret_pattern!(
    RE_JWT,
    r"\beyJ[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\b"
);

// ── Private keys (PEM) ────────────────────────────────────────────────────
secret_pattern!(
    RE_PRIVATE_KEY,
    r"-----BEGIN (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----"
);

// ── Bearer tokens in pasted headers ────────────────────────────────────────
secret_pattern!(RE_BEARER, r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]{16,}=*");

// ── Generic password in assignment ─────────────────────────────────────────
secret_pattern!(
    RE_PASSWORD_ASSIGN,
    r#"(?i)\b(?:password|passwd|pwd)\s*[=:]\s*['"]?[^\s'"]{4,}['"]?"#
);

// ── Generic API key / secret / token in assignment ─────────────────────────
secret_pattern!(
    RE_GENERIC_SECRET,
    r#"(?i)\b(?:api[_-]?key|apikey|secret|token|auth_token|access_token)\s*[=:]\s*['"]?[A-Za-z0-9_\-]{16,}['"]?"#
);

// ── GitHub ─────────────────────────────────────────────────────────────────
secret_pattern!(RE_GITHUB_TOKEN, r"\bgh[pousr]_[A-Za-z0-9]{36}\b");

// ── Slack ──────────────────────────────────────────────────────────────────
secret_pattern!(RE_SLACK_TOKEN, r"\bxox[baprs]-[A-Za-z0-9-]{10,}\b");

/// All secret patterns. Connection strings come first because their
/// `user:pass@host` part also looks like an email.
pub fn all_patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            name: "connection_string",
            regex: &RE_CONNECTION_STRING,
            placeholder: "[CONNECTION_STRING]",
        },
        Pattern {
            name: "private_key",
            regex: &RE_PRIVATE_KEY,
            placeholder: "[PRIVATE_KEY]",
        },
        Pattern {
            name: "aws_access_key",
            regex: &RE_AWS_ACCESS_KEY,
            placeholder: "[AWS_KEY]",
        },
        Pattern {
            name: "jwt",
            regex: &RE_JWT,
            placeholder: "[JWT]",
        },
        Pattern {
            name: "github_token",
            regex: &RE_GITHUB_TOKEN,
            placeholder: "[GITHUB_TOKEN]",
        },
        Pattern {
            name: "slack_token",
            regex: &RE_SLACK_TOKEN,
            placeholder: "[SLACK_TOKEN]",
        },
        Pattern {
            name: "bearer",
            regex: &RE_BEARER,
            placeholder: "[BEARER_TOKEN]",
        },
        Pattern {
            name: "password_assignment",
            regex: &RE_PASSWORD_ASSIGN,
            placeholder: "[PASSWORD]",
        },
        Pattern {
            name: "generic_secret",
            regex: &RE_GENERIC_SECRET,
            placeholder: "[SECRET]",
        },
    ]
}
