use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
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
}

// The events the fulfillment pipeline can emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Booking lifecycle
    BookingCreated(Uuid),
    BookingCancelled {
        booking_id: Uuid,
        cancelled_by: String,
    },

    // Invoice / notification outcomes
    InvoiceIssued {
        booking_id: Uuid,
        invoice_reference: String,
    },
    BuyerConfirmationSent(Uuid),
    BuyerConfirmationSkipped {
        booking_id: Uuid,
        reason: String,
    },
    VendorNotified {
        booking_id: Uuid,
        vendor_id: Uuid,
    },
    NotificationFailureSuppressed {
        booking_id: Uuid,
        detail: String,
    },
}

/// Background consumer for pipeline events. Purely observational: failures to
/// process an event never feed back into the pipeline.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::NotificationFailureSuppressed { booking_id, detail } => {
                warn!(booking_id = %booking_id, detail = %detail, "notification failure suppressed");
            }
            other => {
                info!(event = ?other, "fulfillment event");
            }
        }
    }
    info!("Event channel closed; event processor exiting");
}
