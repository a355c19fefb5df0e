//! Ambient call context: an optional deadline plus a cancellation signal.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    /// No deadline, never cancelled unless `cancel` is called.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Derive a context whose deadline is the earlier of ours and `now + timeout`.
    /// Cancelling the parent cancels the child.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(d) if d < candidate => d,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed. `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Reason the context is finished, if it is.
    pub fn done_reason(&self) -> Option<&'static str> {
        if self.cancel.is_cancelled() {
            return Some("context canceled");
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some("context deadline exceeded"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_and_remaining() {
        let ctx = CallContext::with_timeout(Duration::from_secs(2));
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(2)));
        assert_eq!(ctx.done_reason(), None);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
        assert_eq!(ctx.done_reason(), Some("context deadline exceeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_takes_earlier_deadline() {
        let parent = CallContext::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let parent = CallContext::background();
        let child = parent.child_with_timeout(Duration::from_secs(10));
        assert_eq!(child.remaining(), Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_child() {
        let parent = CallContext::background();
        assert_eq!(parent.remaining(), None);
        let child = parent.child_with_timeout(Duration::from_secs(1));
        parent.cancel();
        assert!(child.is_cancelled());
        assert_eq!(child.done_reason(), Some("context canceled"));
    }
}
