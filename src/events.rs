use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

/// Order lifecycle events emitted by the services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: String,
    },
    PaymentCaptured {
        processor_order_id: String,
        orders_updated: usize,
        orders_created: usize,
    },
    OrderStatusChanged {
        order_id: String,
        old_status: String,
        new_status: String,
    },
    OrderCompleted {
        order_id: String,
    },
}

/// Cloneable sender handle over the event channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.tx.send(event).await
    }
}

/// Drains the event channel, logging each event. Runs until every sender
/// is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated { order_id } => {
                info!(order_id = %order_id, "event: order created");
            }
            Event::PaymentCaptured {
                processor_order_id,
                orders_updated,
                orders_created,
            } => {
                info!(
                    processor_order_id = %processor_order_id,
                    orders_updated,
                    orders_created,
                    "event: payment captured"
                );
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id = %order_id, %old_status, %new_status, "event: order status changed");
            }
            Event::OrderCompleted { order_id } => {
                info!(order_id = %order_id, "event: order completed");
            }
        }
    }
}
