mod cancellation;
mod sanitizer;

pub use cancellation::{Cancelled, CancellationToken};
pub use sanitizer::{ISanitizer, NoopSanitizer, Redaction, SanitizedText};
