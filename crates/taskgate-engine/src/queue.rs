use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use taskgate_common::clock::now_unix_ms;

pub const ATTR_SENT_TIMESTAMP: &str = "SentTimestamp";
pub const ATTR_APPROX_FIRST_RECEIVE_TIMESTAMP: &str = "ApproximateFirstReceiveTimestamp";
pub const ATTR_APPROX_RECEIVE_COUNT: &str = "ApproximateReceiveCount";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMetadata {
    pub message_id: String,
    pub sent_timestamp_ms: i64,
}

/// One delivery of a queued message. The same message may be delivered more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
    pub body: String,
    /// Queue-supplied metadata, string valued as brokers report it.
    pub attributes: BTreeMap<String, String>,
    /// Identifier of the queue the message came from.
    pub source_queue: String,
}

impl Delivery {
    pub fn sent_timestamp_ms(&self) -> i64 {
        self.attr_i64(ATTR_SENT_TIMESTAMP)
    }

    pub fn first_receive_timestamp_ms(&self) -> i64 {
        self.attr_i64(ATTR_APPROX_FIRST_RECEIVE_TIMESTAMP)
    }

    pub fn approx_receive_count(&self) -> i64 {
        self.attr_i64(ATTR_APPROX_RECEIVE_COUNT)
    }

    fn attr_i64(&self, key: &str) -> i64 {
        parse_i64_or_zero(self.attributes.get(key).map(String::as_str).unwrap_or(""))
    }
}

/// Blank or malformed values count as "not recorded".
pub fn parse_i64_or_zero(s: &str) -> i64 {
    let s = s.trim();
    if s.is_empty() {
        return 0;
    }
    s.parse::<i64>().unwrap_or(0)
}

/// Producer side of the queue.
#[async_trait]
pub trait QueueTransit: Send + Sync {
    fn queue_url(&self) -> &str;

    async fn send(&self, body: String, delay: Duration) -> Result<SentMetadata>;
}

/// Consumer side of the queue. Delivery is at-least-once.
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Wait for the next visible message. `None` once the queue is closed.
    async fn receive(&self) -> Option<Delivery>;

    /// Make a delivery visible again after a failed attempt.
    async fn redeliver(&self, delivery: Delivery) -> Result<()>;
}

#[derive(Debug)]
struct Stored {
    message_id: String,
    body: String,
    sent_timestamp_ms: i64,
    first_receive_timestamp_ms: i64,
    receive_count: i64,
}

/// In-process queue with per-message delay and receive bookkeeping.
#[derive(Clone)]
pub struct MemoryQueue {
    name: String,
    url: String,
    source_id: String,
    tx: mpsc::UnboundedSender<Stored>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Stored>>>,
    closed: CancellationToken,
}

impl MemoryQueue {
    pub fn new(name: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name: name.to_string(),
            url: format!("memory://local/{name}"),
            source_id: format!("arn:memory:queue:local:{name}"),
            tx,
            rx: Arc::new(Mutex::new(rx)),
            closed: CancellationToken::new(),
        }
    }

    /// Stop accepting messages. Pending and later `receive` calls return `None`.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn enqueue(&self, stored: Stored, delay: Duration) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(anyhow!("queue {} is closed", self.name));
        }
        if delay.is_zero() {
            return self
                .tx
                .send(stored)
                .map_err(|_| anyhow!("queue {} is closed", self.name));
        }
        let tx = self.tx.clone();
        let name = self.name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(stored).is_err() {
                tracing::warn!(queue=%name, "queue closed before delayed message became visible");
            }
        });
        Ok(())
    }
}

#[async_trait]
impl QueueTransit for MemoryQueue {
    fn queue_url(&self) -> &str {
        &self.url
    }

    async fn send(&self, body: String, delay: Duration) -> Result<SentMetadata> {
        let meta = SentMetadata {
            message_id: Uuid::new_v4().to_string(),
            sent_timestamp_ms: now_unix_ms(),
        };
        self.enqueue(
            Stored {
                message_id: meta.message_id.clone(),
                body,
                sent_timestamp_ms: meta.sent_timestamp_ms,
                first_receive_timestamp_ms: 0,
                receive_count: 0,
            },
            delay,
        )?;
        Ok(meta)
    }
}

#[async_trait]
impl QueueSource for MemoryQueue {
    async fn receive(&self) -> Option<Delivery> {
        let mut rx = self.rx.lock().await;
        let mut stored = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return None,
            stored = rx.recv() => stored?,
        };
        drop(rx);
        if stored.first_receive_timestamp_ms == 0 {
            stored.first_receive_timestamp_ms = now_unix_ms();
        }
        stored.receive_count += 1;

        let attributes = BTreeMap::from([
            (
                ATTR_SENT_TIMESTAMP.to_string(),
                stored.sent_timestamp_ms.to_string(),
            ),
            (
                ATTR_APPROX_FIRST_RECEIVE_TIMESTAMP.to_string(),
                stored.first_receive_timestamp_ms.to_string(),
            ),
            (
                ATTR_APPROX_RECEIVE_COUNT.to_string(),
                stored.receive_count.to_string(),
            ),
        ]);
        Some(Delivery {
            message_id: stored.message_id,
            body: stored.body,
            attributes,
            source_queue: self.source_id.clone(),
        })
    }

    async fn redeliver(&self, delivery: Delivery) -> Result<()> {
        let stored = Stored {
            sent_timestamp_ms: delivery.sent_timestamp_ms(),
            first_receive_timestamp_ms: delivery.first_receive_timestamp_ms(),
            receive_count: delivery.approx_receive_count(),
            message_id: delivery.message_id,
            body: delivery.body,
        };
        self.enqueue(stored, Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_i64_or_zero() {
        assert_eq!(parse_i64_or_zero("123"), 123);
        assert_eq!(parse_i64_or_zero(" 7 "), 7);
        assert_eq!(parse_i64_or_zero(""), 0);
        assert_eq!(parse_i64_or_zero("abc"), 0);
        assert_eq!(parse_i64_or_zero("1.5"), 0);
    }

    #[tokio::test]
    async fn test_send_receive_metadata() {
        let q = MemoryQueue::new("requests");
        assert_eq!(q.queue_url(), "memory://local/requests");

        let meta = q.send("hello".to_string(), Duration::ZERO).await.unwrap();
        let d = q.receive().await.unwrap();
        assert_eq!(d.body, "hello");
        assert_eq!(d.message_id, meta.message_id);
        assert_eq!(d.sent_timestamp_ms(), meta.sent_timestamp_ms);
        assert!(d.first_receive_timestamp_ms() >= meta.sent_timestamp_ms);
        assert_eq!(d.approx_receive_count(), 1);
        assert_eq!(d.source_queue, "arn:memory:queue:local:requests");
    }

    #[tokio::test]
    async fn test_redeliver_keeps_first_receive_and_counts() {
        let q = MemoryQueue::new("requests");
        q.send("m".to_string(), Duration::ZERO).await.unwrap();
        let first = q.receive().await.unwrap();
        let first_receive = first.first_receive_timestamp_ms();
        q.redeliver(first).await.unwrap();

        let second = q.receive().await.unwrap();
        assert_eq!(second.approx_receive_count(), 2);
        assert_eq!(second.first_receive_timestamp_ms(), first_receive);
    }

    #[tokio::test]
    async fn test_close_ends_receive() {
        let q = MemoryQueue::new("requests");
        let waiting = tokio::spawn({
            let q = q.clone();
            async move { q.receive().await }
        });
        tokio::task::yield_now().await;
        q.close();
        assert!(waiting.await.unwrap().is_none());
        assert!(q.receive().await.is_none());

        let err = q.send("late".to_string(), Duration::ZERO).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_hides_message() {
        let q = MemoryQueue::new("requests");
        q.send("later".to_string(), Duration::from_secs(5))
            .await
            .unwrap();

        let early = tokio::time::timeout(Duration::from_secs(4), q.receive()).await;
        assert!(early.is_err());

        let d = tokio::time::timeout(Duration::from_secs(2), q.receive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(d.body, "later");
    }
}
