use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing the caller. Event delivery
    /// is best-effort and must never roll back the transaction that emitted it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded {
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        cart_id: Uuid,
        product_id: Uuid,
    },
    CartCleared(Uuid),
    CartSynced {
        cart_id: Uuid,
        lines_dropped: usize,
    },

    // Order events
    OrderCreated(Uuid),
    OrderPaid {
        order_id: Uuid,
        payment_id: String,
    },
    OrderPaymentFailed {
        order_id: Uuid,
        reason: String,
    },
    OrderCancelled(Uuid),
    OrderRefunded {
        order_id: Uuid,
        refund_id: String,
    },

    // Payout events
    PayoutCreated {
        payout_id: Uuid,
        seller_id: Uuid,
        net_paise: i64,
    },
    PayoutCompleted {
        payout_id: Uuid,
        transfer_id: String,
    },
    PayoutFailed {
        payout_id: Uuid,
        reason: String,
    },

    // Webhook events
    WebhookProcessed {
        event_type: String,
        received_at: DateTime<Utc>,
    },
}

// Function to process incoming events. Handlers only observe; the emitting
// transaction has already committed by the time an event lands here.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::CartItemAdded {
                cart_id,
                product_id,
                quantity,
            } => {
                info!(
                    cart_id = %cart_id,
                    product_id = %product_id,
                    quantity,
                    "Cart item added"
                );
            }
            Event::CartItemRemoved {
                cart_id,
                product_id,
            } => {
                info!(cart_id = %cart_id, product_id = %product_id, "Cart item removed");
            }
            Event::CartCleared(cart_id) => {
                info!(cart_id = %cart_id, "Cart cleared");
            }
            Event::CartSynced {
                cart_id,
                lines_dropped,
            } => {
                if lines_dropped > 0 {
                    warn!(cart_id = %cart_id, lines_dropped, "Cart synced with stale lines dropped");
                } else {
                    info!(cart_id = %cart_id, "Cart synced");
                }
            }
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Order created, awaiting payment");
            }
            Event::OrderPaid {
                order_id,
                payment_id,
            } => {
                info!(order_id = %order_id, payment_id = %payment_id, "Order paid");
            }
            Event::OrderPaymentFailed { order_id, reason } => {
                error!(order_id = %order_id, reason = %reason, "Order payment failed");
            }
            Event::OrderCancelled(order_id) => {
                info!(order_id = %order_id, "Order cancelled");
            }
            Event::OrderRefunded {
                order_id,
                refund_id,
            } => {
                info!(order_id = %order_id, refund_id = %refund_id, "Order refunded");
            }
            Event::PayoutCreated {
                payout_id,
                seller_id,
                net_paise,
            } => {
                info!(
                    payout_id = %payout_id,
                    seller_id = %seller_id,
                    net_paise,
                    "Payout batch created"
                );
            }
            Event::PayoutCompleted {
                payout_id,
                transfer_id,
            } => {
                info!(payout_id = %payout_id, transfer_id = %transfer_id, "Payout completed");
            }
            Event::PayoutFailed { payout_id, reason } => {
                error!(payout_id = %payout_id, reason = %reason, "Payout failed");
            }
            Event::WebhookProcessed {
                event_type,
                received_at,
            } => {
                info!(event_type = %event_type, received_at = %received_at, "Webhook processed");
            }
        }
    }

    info!("Event processing loop stopped");
}
