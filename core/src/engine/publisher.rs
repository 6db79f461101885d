use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::bus::{BusChannel, OutgoingMessage, EVENTS_EXCHANGE};
use crate::error::BusError;
use crate::protocol::LogEvent;

/// Publishes playback events on whichever channel the control consumer holds
/// right now.
///
/// Playbacks outlive the connection they were started on. A failed publish is
/// retried after `retry` on the channel attached at that point, so a running
/// playback resumes once the supervisor has reconnected.
pub struct EventPublisher {
    channel: RwLock<Option<Arc<dyn BusChannel>>>,
    retry: Duration,
}

impl EventPublisher {
    pub fn new(retry: Duration) -> Self {
        Self {
            channel: RwLock::new(None),
            retry,
        }
    }

    /// Swap in a freshly connected channel.
    pub async fn attach(&self, channel: Arc<dyn BusChannel>) {
        *self.channel.write().await = Some(channel);
    }

    pub async fn is_attached(&self) -> bool {
        self.channel.read().await.is_some()
    }

    /// Publish `event` to the events exchange, retrying transport failures
    /// until one attempt succeeds. Only an encode failure is returned.
    pub async fn publish(&self, event: &LogEvent) -> Result<(), BusError> {
        let message = OutgoingMessage::json(event)?;
        let mut attempt: u32 = 0;
        loop {
            let current = self.channel.read().await.clone();
            let result = match current {
                Some(channel) => channel.publish(EVENTS_EXCHANGE, "", message.clone()).await,
                None => Err(BusError::Disconnected),
            };
            match result {
                Ok(()) => {
                    if attempt > 0 {
                        tracing::info!(
                            run_id = %event.run_id,
                            step = event.step,
                            attempt,
                            "event published after retry"
                        );
                    }
                    return Ok(());
                }
                Err(e @ BusError::Encode(_)) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        run_id = %event.run_id,
                        step = event.step,
                        attempt,
                        error = %e,
                        "event publish failed; retrying"
                    );
                    tokio::time::sleep(self.retry).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{events_exchange, BusConnector, MemoryBus, QueueBinding};
    use crate::protocol::Severity;

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_first_attach() {
        let bus = MemoryBus::new();
        let publisher = Arc::new(EventPublisher::new(Duration::from_secs(1)));
        assert!(!publisher.is_attached().await);

        let event = LogEvent::new("db_latency", "run-1", Severity::Info, 1, "hello");
        let pending = {
            let publisher = publisher.clone();
            let event = event.clone();
            tokio::spawn(async move { publisher.publish(&event).await })
        };

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!pending.is_finished());

        let channel = bus.connect().await.unwrap();
        channel.declare_exchange(&events_exchange()).await.unwrap();
        let mut sub = channel
            .subscribe(&QueueBinding::exclusive(EVENTS_EXCHANGE))
            .await
            .unwrap();
        publisher.attach(channel).await;

        pending.await.unwrap().unwrap();
        let delivery = sub.next().await.unwrap().unwrap();
        let received: LogEvent = serde_json::from_slice(&delivery.body).unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switches_to_reattached_channel() {
        let bus = MemoryBus::new();
        let publisher = EventPublisher::new(Duration::from_secs(2));
        let old = bus.connect().await.unwrap();
        old.declare_exchange(&events_exchange()).await.unwrap();
        publisher.attach(old).await;
        bus.disconnect_all();

        let fresh = bus.connect().await.unwrap();
        let mut sub = fresh
            .subscribe(&QueueBinding::exclusive(EVENTS_EXCHANGE))
            .await
            .unwrap();

        let event = LogEvent::new("cpu_spike", "run-2", Severity::Warn, 3, "hot");
        let attach_later = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            publisher.attach(fresh.clone()).await;
        };
        let (result, ()) = tokio::join!(publisher.publish(&event), attach_later);
        result.unwrap();

        let delivery = sub.next().await.unwrap().unwrap();
        let received: LogEvent = serde_json::from_slice(&delivery.body).unwrap();
        assert_eq!(received.step, 3);
    }
}
