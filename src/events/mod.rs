use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Events announcing lifecycle changes to downstream fulfillment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        source_session_id: String,
    },
    DistributorEventLogged {
        event_id: Uuid,
        event_type: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Background consumer; fulfillment integration hangs off this loop. For now
/// events are surfaced in the logs only.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                source_session_id,
            } => {
                info!(%order_id, %source_session_id, "event: order created");
            }
            Event::DistributorEventLogged {
                event_id,
                event_type,
            } => {
                info!(%event_id, %event_type, "event: distributor notification logged");
            }
        }
    }
    info!("event channel closed, consumer stopping");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender
            .send(Event::OrderCreated {
                order_id: Uuid::new_v4(),
                source_session_id: "sess_1".into(),
            })
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(Event::OrderCreated { .. })
        ));
    }
}
