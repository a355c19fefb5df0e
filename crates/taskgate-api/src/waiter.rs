//! Blocking wait over an asynchronous execution.
//!
//! The timing policy lives in two pure functions, [`effective_timeout`] and
//! [`transition`]; [`wait_for_completion`] only drives them against the engine.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use taskgate_common::{CallContext, CoordError, ExecutionStatus};
use taskgate_engine::ExecutionEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Used when the caller does not ask for a budget.
    pub default_wait: Duration,
    /// Platform ceiling. Larger requests are clamped, not rejected.
    pub max_wait: Duration,
    /// Kept free before an ambient deadline.
    pub deadline_margin: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            default_wait: Duration::from_secs(25),
            max_wait: Duration::from_secs(28),
            deadline_margin: Duration::from_millis(250),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Caller budget in milliseconds; non-positive means "use the default".
pub fn requested_wait(max_wait_ms: Option<i64>) -> Option<Duration> {
    max_wait_ms
        .filter(|ms| *ms > 0)
        .map(|ms| Duration::from_millis(ms as u64))
}

/// Budget for one blocking call, or `None` when the ambient deadline is too close to try.
pub fn effective_timeout(
    requested: Option<Duration>,
    ambient_remaining: Option<Duration>,
    policy: &WaitPolicy,
) -> Option<Duration> {
    let requested = requested
        .filter(|d| !d.is_zero())
        .unwrap_or(policy.default_wait)
        .min(policy.max_wait);

    let Some(remaining) = ambient_remaining else {
        return Some(requested);
    };
    let usable = remaining.checked_sub(policy.deadline_margin)?;
    if usable.is_zero() {
        return None;
    }
    Some(usable.min(requested))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Nothing observed yet: query right away.
    Started,
    Polling,
    Succeeded,
    /// `FAILED`, `ABORTED` or `TIMED_OUT` on the engine side.
    Failed,
    /// The local budget ran out first.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: PollPhase,
    /// Pause before the next status query. Only set while still waiting.
    pub sleep: Option<Duration>,
}

/// One step of the poll state machine.
///
/// `observed` is the status from the latest query, `None` before the first one. A terminal
/// status wins over an expired budget: the answer is already in hand.
pub fn transition(
    observed: Option<ExecutionStatus>,
    elapsed: Duration,
    budget: Duration,
    interval: Duration,
) -> Transition {
    match observed {
        Some(ExecutionStatus::Succeeded) => Transition {
            next: PollPhase::Succeeded,
            sleep: None,
        },
        Some(s) if s.is_terminal() => Transition {
            next: PollPhase::Failed,
            sleep: None,
        },
        _ if elapsed >= budget => Transition {
            next: PollPhase::TimedOut,
            sleep: None,
        },
        None => Transition {
            next: PollPhase::Started,
            sleep: Some(Duration::ZERO),
        },
        Some(_) => Transition {
            next: PollPhase::Polling,
            sleep: Some(interval.min(budget - elapsed)),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitOutcome {
    pub execution_id: String,
    pub elapsed_ms: i64,
    pub output: Option<Value>,
}

fn elapsed_ms(start: Instant) -> i64 {
    start.elapsed().as_millis() as i64
}

/// Poll `execution_id` until it finishes or `ctx` runs out.
///
/// `start` is when the execution was started, so elapsed time covers the start call too.
pub async fn wait_for_completion(
    engine: &dyn ExecutionEngine,
    execution_id: &str,
    ctx: &CallContext,
    start: Instant,
    poll_interval: Duration,
) -> Result<WaitOutcome, CoordError> {
    let Some(deadline) = ctx.deadline() else {
        return Err(CoordError::Validation(
            "waiting requires a deadline".to_string(),
        ));
    };
    let budget = deadline.saturating_duration_since(start);
    let timeout = |reason: &str| CoordError::Timeout {
        execution_id: Some(execution_id.to_string()),
        elapsed_ms: elapsed_ms(start),
        reason: reason.to_string(),
    };

    let mut observed = None;
    let mut polls = 0u64;
    loop {
        if let Some(reason) = ctx.done_reason() {
            return Err(timeout(reason));
        }

        // `observed` is never terminal here, so leaving the waiting phases means the budget is gone.
        let step = transition(observed, start.elapsed(), budget, poll_interval);
        if !matches!(step.next, PollPhase::Started | PollPhase::Polling) {
            return Err(timeout("context deadline exceeded"));
        }

        if let Some(pause) = step.sleep.filter(|d| !d.is_zero()) {
            tokio::select! {
                _ = ctx.cancellation().cancelled() => return Err(timeout("context canceled")),
                _ = tokio::time::sleep(pause) => {}
            }
            if let Some(reason) = ctx.done_reason() {
                return Err(timeout(reason));
            }
        }

        let described = tokio::select! {
            _ = ctx.cancellation().cancelled() => return Err(timeout("context canceled")),
            r = tokio::time::timeout_at(deadline, engine.describe(execution_id)) => r,
        };
        polls += 1;
        let record = match described {
            Err(_) => return Err(timeout("context deadline exceeded")),
            Ok(Err(e)) => {
                return Err(CoordError::Transport {
                    op: "describe execution",
                    execution_id: Some(execution_id.to_string()),
                    elapsed_ms: elapsed_ms(start),
                    message: e.to_string(),
                })
            }
            Ok(Ok(record)) => record,
        };

        match transition(Some(record.status), start.elapsed(), budget, poll_interval).next {
            PollPhase::Succeeded => {
                debug!(execution_id, polls, "execution succeeded");
                return Ok(WaitOutcome {
                    execution_id: execution_id.to_string(),
                    elapsed_ms: elapsed_ms(start),
                    output: record.output,
                });
            }
            PollPhase::Failed => {
                debug!(execution_id, polls, status=%record.status, "execution failed");
                return Err(CoordError::Terminal {
                    status: record.status,
                    execution_id: execution_id.to_string(),
                    elapsed_ms: elapsed_ms(start),
                    cause: record.failure_message(),
                });
            }
            _ => observed = Some(record.status),
        }
    }
}
