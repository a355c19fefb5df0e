//! Wall-clock instants recorded at the causal points of a run.
//!
//! All values are Unix epoch based so they can be compared across hops. They are
//! not monotonic across processes; consumers must tolerate negative deltas.

use chrono::Utc;

pub const NANOS_PER_MS: i64 = 1_000_000;

pub fn now_unix_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

pub fn now_unix_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Truncating conversion, matching integer division toward zero.
pub fn nanos_to_ms(nanos: i64) -> i64 {
    nanos / NANOS_PER_MS
}

pub fn ms_to_nanos(ms: i64) -> i64 {
    ms.saturating_mul(NANOS_PER_MS)
}
