use anyhow::{anyhow, bail, Result};
use tokio::time::Instant;
use tracing::{info, warn};

use taskgate_common::clock::now_unix_nanos;
use taskgate_common::{RunRequest, RunStatus, TimestampSet};

use crate::client::RunClient;
use crate::decompose::{decompose, MetricRow};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStats {
    pub avg: f64,
    pub min: i64,
    pub max: i64,
}

impl SegmentStats {
    fn from_values(values: impl Iterator<Item = i64>) -> Option<Self> {
        let mut count = 0i64;
        let mut sum = 0i64;
        let mut min = i64::MAX;
        let mut max = i64::MIN;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        (count > 0).then(|| Self {
            avg: sum as f64 / count as f64,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupStats {
    pub count: usize,
    pub total: SegmentStats,
    pub send_to_queue: SegmentStats,
    pub queue_wait: SegmentStats,
    pub worker: SegmentStats,
    pub overhead: SegmentStats,
}

impl GroupStats {
    /// `None` for an empty group.
    pub fn from_rows(rows: &[MetricRow]) -> Option<Self> {
        let seg = |f: fn(&MetricRow) -> i64| SegmentStats::from_values(rows.iter().map(f));
        Some(Self {
            count: rows.len(),
            total: seg(|r| r.total_ms)?,
            send_to_queue: seg(|r| r.send_to_queue_ms)?,
            queue_wait: seg(|r| r.queue_wait_ms)?,
            worker: seg(|r| r.worker_ms)?,
            overhead: seg(|r| r.overhead_ms)?,
        })
    }
}

/// Rows of one batch split into the cold sample, the warm group and everything.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub rows: Vec<MetricRow>,
    pub cold: MetricRow,
    /// `None` when the batch had a single run.
    pub warm: Option<GroupStats>,
    pub all: GroupStats,
}

impl BatchReport {
    pub fn from_rows(rows: Vec<MetricRow>) -> Result<Self> {
        let Some(cold) = rows.first().copied() else {
            bail!("no runs to aggregate");
        };
        let warm = GroupStats::from_rows(&rows[1..]);
        let all = GroupStats::from_rows(&rows).ok_or_else(|| anyhow!("no runs to aggregate"))?;
        Ok(Self {
            rows,
            cold,
            warm,
            all,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Values below 1 run once.
    pub repeat: usize,
    pub max_wait_ms: i64,
    pub delay_seconds: i64,
    pub payload_bytes: i64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            repeat: 10,
            max_wait_ms: 25_000,
            delay_seconds: 0,
            payload_bytes: 0,
        }
    }
}

/// Run the pipeline `repeat` times, one after another, and aggregate.
///
/// Stops at the first run that does not succeed; nothing is aggregated in that case.
pub async fn run_batch(client: &dyn RunClient, opts: &BatchOptions) -> Result<BatchReport> {
    let n = opts.repeat.max(1);
    let mut rows = Vec::with_capacity(n);

    for i in 0..n {
        let req = RunRequest {
            run_id: Some(format!("run-{i}-{}", now_unix_nanos())),
            delay_seconds: opts.delay_seconds,
            payload_bytes: opts.payload_bytes,
            max_wait_ms: Some(opts.max_wait_ms),
        };

        let wall_start = Instant::now();
        let resp = client
            .run(&req)
            .await
            .map_err(|e| anyhow!("call api [{}/{n}]: {e}", i + 1))?;
        if resp.status != RunStatus::Succeeded {
            bail!(
                "api status not succeeded [{}/{n}]: status={} error={}",
                i + 1,
                resp.status,
                resp.error.as_deref().unwrap_or("")
            );
        }
        if resp.execution_id.as_deref().map_or(true, str::is_empty) {
            bail!("api missing execution id [{}/{n}]", i + 1);
        }

        let ts = match resp.output {
            Some(v) => serde_json::from_value::<TimestampSet>(v).unwrap_or_else(|e| {
                warn!(iteration = i + 1, error=%e, "unreadable run output, segments will be zero");
                TimestampSet::default()
            }),
            None => TimestampSet::default(),
        };
        let wall_ms = wall_start.elapsed().as_millis() as i64;

        let mut row = decompose(&ts, resp.total_ms, wall_ms);
        row.iteration = i + 1;
        info!(
            iteration = row.iteration,
            total_ms = row.total_ms,
            queue_wait_ms = row.queue_wait_ms,
            "run complete"
        );
        rows.push(row);
    }

    BatchReport::from_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(iteration: usize, total: i64, send: i64, wait: i64, worker: i64) -> MetricRow {
        MetricRow {
            iteration,
            total_ms: total,
            send_to_queue_ms: send,
            queue_wait_ms: wait,
            worker_ms: worker,
            overhead_ms: (total - send - wait - worker).max(0),
            wall_ms: total + 1,
            reported_ms: total,
        }
    }

    #[test]
    fn test_group_stats() {
        let rows = [row(1, 10, 1, 2, 3), row(2, 20, 3, 2, 1), row(3, 15, 2, 2, 2)];
        let g = GroupStats::from_rows(&rows).unwrap();
        assert_eq!(g.count, 3);
        assert_eq!(g.total, SegmentStats { avg: 15.0, min: 10, max: 20 });
        assert_eq!(g.send_to_queue.min, 1);
        assert_eq!(g.send_to_queue.max, 3);
        assert_eq!(g.queue_wait.avg, 2.0);
        assert_eq!(g.overhead.min, 4);
        assert_eq!(g.overhead.max, 14);
        assert!(GroupStats::from_rows(&[]).is_none());
    }

    #[test]
    fn test_single_run_has_no_warm_group() {
        let r = row(1, 10, 1, 2, 3);
        let report = BatchReport::from_rows(vec![r]).unwrap();
        assert_eq!(report.cold, r);
        assert!(report.warm.is_none());
        assert_eq!(report.all.count, 1);
        assert_eq!(report.all.total.avg, 10.0);
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        assert!(BatchReport::from_rows(Vec::new()).is_err());
    }

    proptest! {
        #[test]
        fn prop_cold_warm_partition(totals in proptest::collection::vec(0i64..10_000, 1..40)) {
            let rows: Vec<_> = totals
                .iter()
                .enumerate()
                .map(|(i, t)| row(i + 1, *t, 0, 0, 0))
                .collect();
            let n = rows.len();
            let report = BatchReport::from_rows(rows).unwrap();
            prop_assert_eq!(report.cold.iteration, 1);
            prop_assert_eq!(report.warm.map(|w| w.count).unwrap_or(0), n - 1);
            prop_assert_eq!(report.all.count, n);
            prop_assert!(report.all.total.min <= report.all.total.max);
        }
    }
}
