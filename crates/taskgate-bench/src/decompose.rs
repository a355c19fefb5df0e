//! Per-run latency decomposition.
//!
//! The timestamp set comes from independently clocked hops. Every segment is derived on
//! its own, degrades to a substitute field or zero when an input is missing, and is
//! clamped at zero when skew makes the difference negative. Totals are not reconciled
//! against the segment sum beyond the overhead clamp.

use serde::Serialize;

use taskgate_common::clock::{ms_to_nanos, nanos_to_ms};
use taskgate_common::TimestampSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRow {
    pub iteration: usize,
    pub total_ms: i64,
    pub send_to_queue_ms: i64,
    pub queue_wait_ms: i64,
    pub worker_ms: i64,
    pub overhead_ms: i64,
    /// Observed by the caller around the whole request.
    pub wall_ms: i64,
    /// Reported by the synchronous boundary.
    pub reported_ms: i64,
}

fn non_negative_ms(delta_nanos: i64) -> i64 {
    nanos_to_ms(delta_nanos).max(0)
}

pub fn send_to_queue_ms(ts: &TimestampSet) -> i64 {
    let queue_sent = ms_to_nanos(ts.queue_sent_timestamp_ms);
    if ts.send_start_unix_nano <= 0 || queue_sent <= 0 {
        return 0;
    }
    non_negative_ms(queue_sent - ts.send_start_unix_nano)
}

pub fn queue_wait_ms(ts: &TimestampSet) -> i64 {
    if ts.receive_unix_nano <= 0 {
        return 0;
    }
    let queue_sent = ms_to_nanos(ts.queue_sent_timestamp_ms);
    let base = if queue_sent > 0 {
        queue_sent
    } else {
        ts.send_unix_nano
    };
    if base <= 0 {
        return 0;
    }
    non_negative_ms(ts.receive_unix_nano - base)
}

pub fn worker_ms(ts: &TimestampSet) -> i64 {
    if ts.worker_done_unix_nano <= 0 || ts.receive_unix_nano <= 0 {
        return 0;
    }
    non_negative_ms(ts.worker_done_unix_nano - ts.receive_unix_nano)
}

pub fn overhead_ms(total_ms: i64, send_to_queue_ms: i64, queue_wait_ms: i64, worker_ms: i64) -> i64 {
    (total_ms - (send_to_queue_ms + queue_wait_ms + worker_ms)).max(0)
}

/// Build the row for one run. `reported_ms` is preferred as the total; the wall time
/// stands in when it is not positive.
pub fn decompose(ts: &TimestampSet, reported_ms: i64, wall_ms: i64) -> MetricRow {
    let total_ms = if reported_ms > 0 { reported_ms } else { wall_ms };
    let send = send_to_queue_ms(ts);
    let wait = queue_wait_ms(ts);
    let worker = worker_ms(ts);
    MetricRow {
        iteration: 0,
        total_ms,
        send_to_queue_ms: send,
        queue_wait_ms: wait,
        worker_ms: worker,
        overhead_ms: overhead_ms(total_ms, send, wait, worker),
        wall_ms,
        reported_ms,
    }
}
