use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use taskgate_engine::QueueSource;

use crate::consumer::Consumer;

/// Receive deliveries until the queue closes or `cancel` fires.
///
/// A delivery whose handling fails is made visible again until it has been received
/// `max_receive_count` times, after which it is dropped as dead-lettered.
pub async fn worker_loop(
    source: Arc<dyn QueueSource>,
    consumer: Arc<Consumer>,
    max_receive_count: i64,
    cancel: CancellationToken,
) {
    info!(max_receive_count, "worker loop started");
    loop {
        let delivery = tokio::select! {
            _ = cancel.cancelled() => {
                info!("worker loop cancelled");
                return;
            }
            d = source.receive() => d,
        };
        let Some(delivery) = delivery else {
            info!("queue closed, worker loop exiting");
            return;
        };

        let consumer = consumer.clone();
        let source = source.clone();
        tokio::spawn(async move {
            let Err(e) = consumer.handle(&delivery).await else {
                return;
            };
            let count = delivery.approx_receive_count();
            if count < max_receive_count {
                warn!(message_id=%delivery.message_id, receive_count=count, error=%e, "delivery failed, redelivering");
                let message_id = delivery.message_id.clone();
                if let Err(re) = source.redeliver(delivery).await {
                    error!(message_id=%message_id, error=%re, "redeliver failed");
                }
            } else {
                error!(
                    message_id=%delivery.message_id,
                    receive_count=count,
                    error=%e,
                    "delivery exhausted retries, dead-lettering"
                );
            }
        });
    }
}
