pub mod pii;
pub mod secrets;

use regex::Regex;
use std::sync::LazyLock;
use verdict_core::traits::Redaction;

/// A named regex with its replacement placeholder.
pub struct Pattern {
    pub name: &'static str,
    pub regex: &'static LazyLock<Option<Regex>>,
    pub placeholder: &'static str,
}

/// Unified pattern match result before replacement.
#[derive(Debug, Clone)]
pub struct RawMatch {
    pub category: &'static str,
    pub pattern_name: &'static str,
    pub placeholder: &'static str,
    pub start: usize,
    pub end: usize,
    /// Scan order; lower wins ties between equal-length overlaps.
    pub priority: usize,
}

/// Run all pattern categories against the input text, returning raw matches
/// sorted by start position (descending) for safe replacement.
pub fn scan_all(text: &str) -> Vec<RawMatch> {
    let mut matches = Vec::new();
    let mut priority = 0;

    // Secrets FIRST. Connection strings contain user:pass@host which looks like email.
    for pat in secrets::all_patterns() {
        collect_matches(text, &pat, "secret", priority, &mut matches);
        priority += 1;
    }

    // PII LAST. Broadest patterns.
    for pat in pii::all_patterns() {
        collect_matches(text, &pat, "pii", priority, &mut matches);
        priority += 1;
    }

    matches.sort_by(|a, b| b.start.cmp(&a.start).then(a.priority.cmp(&b.priority)));
    dedup_overlapping(&mut matches);
    matches
}

fn collect_matches(
    text: &str,
    pat: &Pattern,
    category: &'static str,
    priority: usize,
    out: &mut Vec<RawMatch>,
) {
    let Some(re) = pat.regex.as_ref() else { return };
    for m in re.find_iter(text) {
        if looks_like_placeholder(m.as_str()) {
            continue;
        }
        out.push(RawMatch {
            category,
            pattern_name: pat.name,
            placeholder: pat.placeholder,
            start: m.start(),
            end: m.end(),
            priority,
        });
    }
}

/// Remove overlapping matches, keeping the longer (more specific) one,
/// or the earlier-scanned one if lengths are equal.
fn dedup_overlapping(matches: &mut Vec<RawMatch>) {
    let mut i = 0;
    while i + 1 < matches.len() {
        let current = &matches[i];
        let next = &matches[i + 1];

        // Sorted desc by start, so next.start <= current.start.
        if next.end > current.start {
            let current_len = current.end - current.start;
            let next_len = next.end - next.start;
            if next_len > current_len
                || (next_len == current_len && next.priority < current.priority)
            {
                matches.remove(i);
                i = i.saturating_sub(1);
            } else {
                matches.remove(i + 1);
            }
        } else {
            i += 1;
        }
    }
}

/// Bracketed placeholder text such as `[EMAIL]` or `[REDACTED]`.
pub fn looks_like_placeholder(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.len() > 2
        && trimmed.starts_with('[')
        && trimmed.ends_with(']')
        && trimmed[1..trimmed.len() - 1]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_')
}

/// Convert raw matches to `Redaction`s, ordered by position in the input.
pub fn to_redactions(matches: &[RawMatch]) -> Vec<Redaction> {
    let mut out: Vec<Redaction> = matches
        .iter()
        .map(|m| Redaction {
            category: format!("{}:{}", m.category, m.pattern_name),
            placeholder: m.placeholder.to_string(),
            start: m.start,
            end: m.end,
        })
        .collect();
    out.sort_by_key(|r| r.start);
    out
}
