use regex::Regex;
use std::sync::LazyLock;

use super::Pattern;

macro_rules! pii_pattern {
    ($name:ident, $regex_str:expr) => {
        pub static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

// ── Email ──────────────────────────────────────────────────────────────────
pii_pattern!(
    RE_EMAIL,
    r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}"
);

// ── Phone numbers (international + US formats) ────────────────────────────
pii_pattern!(
    RE_PHONE,
    r"(?:\+?1[-.\s]?)?\(?\b\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b"
);

// ── SSN ────────────────────────────────────────────────────────────────────
pii_pattern!(RE_SSN, r"\b\d{3}-\d{2}-\d{4}\b");

// ── Credit card (Visa, MC, Amex, Discover) ─────────────────────────────────
pii_pattern!(
    RE_CREDIT_CARD,
    r"\b(?:4\d{3}|5[1-5]\d{2}|3[47]\d{2}|6(?:011|5\d{2}))[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{3,4}\b"
);

// ── IPv4 ───────────────────────────────────────────────────────────────────
pii_pattern!(
    RE_IPV4,
    r"\b(?:(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\b"
);

// ── IPv6 (full form) ───────────────────────────────────────────────────────
pii_pattern!(RE_IPV6, r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b");

// ── MAC Address ────────────────────────────────────────────────────────────
pii_pattern!(
    RE_MAC_ADDRESS,
    r"\b(?:[0-9A-Fa-f]{2}[:\-]){5}[0-9A-Fa-f]{2}\b"
);

/// All PII patterns, most specific first.
pub fn all_patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            name: "email",
            regex: &RE_EMAIL,
            placeholder: "[EMAIL]",
        },
        Pattern {
            name: "ssn",
            regex: &RE_SSN,
            placeholder: "[SSN]",
        },
        Pattern {
            name: "credit_card",
            regex: &RE_CREDIT_CARD,
            placeholder: "[CREDIT_CARD]",
        },
        Pattern {
            name: "mac_address",
            regex: &RE_MAC_ADDRESS,
            placeholder: "[MAC_ADDRESS]",
        },
        Pattern {
            name: "ipv6",
            regex: &RE_IPV6,
            placeholder: "[IPV6]",
        },
        Pattern {
            name: "ipv4",
            regex: &RE_IPV4,
            placeholder: "[IP_ADDRESS]",
        },
        Pattern {
            name: "phone",
            regex: &RE_PHONE,
            placeholder: "[PHONE]",
        },
    ]
}
