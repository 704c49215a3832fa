//! Process-wide monotonic timestamps.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

static LAST_ISSUED_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current UTC time at microsecond resolution, strictly greater than every
/// value previously returned in this process. Wall-clock steps backwards are
/// absorbed by advancing one microsecond past the last issued value.
pub fn monotonic_now() -> DateTime<Utc> {
    let wall = Utc::now().timestamp_micros();
    let mut prev = LAST_ISSUED_MICROS.load(Ordering::Acquire);
    loop {
        let next = if prev == i64::MIN { wall } else { wall.max(prev + 1) };
        match LAST_ISSUED_MICROS.compare_exchange_weak(
            prev,
            next,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => return DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now),
            Err(actual) => prev = actual,
        }
    }
}
