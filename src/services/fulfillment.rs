use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::booking,
    errors::ServiceError,
    events::{Event, EventSender},
    services::bookings::BookingService,
    services::invoicing::InvoiceRenderer,
    services::notifications::{FanoutReport, NotificationFanout},
    services::resolver::EntityResolver,
    services::schedule,
};

/// The wire shape delivered by the payment provider's webhook or posted by
/// the client fallback. Everything is optional here; `into_event` is the
/// validation boundary that turns it into a typed event or rejects it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RawFulfillmentPayload {
    /// Upstream transaction/session reference used as the idempotency key
    #[serde(default, alias = "session_id", alias = "payment_reference")]
    pub transaction_ref: Option<String>,
    #[serde(default)]
    pub offer_id: Option<Uuid>,
    #[serde(default)]
    pub buyer_id: Option<Uuid>,
    #[serde(default)]
    pub vendor_id: Option<Uuid>,
    #[serde(default)]
    pub captured_amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meeting_location: Option<String>,
}

impl RawFulfillmentPayload {
    /// Validates the envelope into a typed event. An unkeyed or unreferenced
    /// payload is rejected outright so nothing downstream has to null-check.
    pub fn into_event(self) -> Result<FulfillmentEvent, ServiceError> {
        let mut missing = Vec::new();
        if self.transaction_ref.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("transaction_ref");
        }
        if self.offer_id.is_none() {
            missing.push("offer_id");
        }
        if self.buyer_id.is_none() {
            missing.push("buyer_id");
        }
        if self.vendor_id.is_none() {
            missing.push("vendor_id");
        }
        if !missing.is_empty() {
            return Err(ServiceError::InvalidEvent(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        Ok(FulfillmentEvent {
            idempotency_key: self.transaction_ref.unwrap_or_default(),
            offer_id: self.offer_id.unwrap_or_default(),
            buyer_id: self.buyer_id.unwrap_or_default(),
            vendor_id: self.vendor_id.unwrap_or_default(),
            captured_amount: self.captured_amount,
            currency: self.currency,
            variant_id: self.variant_id,
            scheduled_at: self.scheduled_at,
            meeting_location: self.meeting_location,
        })
    }
}

/// A validated fulfillment event: the pipeline's own entry contract.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct FulfillmentEvent {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Idempotency key must be between 1 and 255 characters"
    ))]
    pub idempotency_key: String,
    pub offer_id: Uuid,
    pub buyer_id: Uuid,
    pub vendor_id: Uuid,
    pub captured_amount: Option<Decimal>,
    #[validate(length(equal = 3, message = "Currency must be 3 characters"))]
    pub currency: Option<String>,
    pub variant_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub meeting_location: Option<String>,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub booking: booking::Model,
    /// Whether this run created the booking. Duplicate deliveries locate the
    /// existing row and suppress notifications.
    pub created: bool,
    pub fanout: Option<FanoutReport>,
}

/// The booking fulfillment pipeline: reconcile → resolve → render → fan out.
///
/// Notification failures are absorbed before this returns; an `Err` from
/// `process` means the booking itself could not be established (invalid
/// event, storage failure) and is the caller's signal to allow redelivery.
#[derive(Clone)]
pub struct FulfillmentPipeline {
    bookings: Arc<BookingService>,
    resolver: EntityResolver,
    renderer: InvoiceRenderer,
    fanout: NotificationFanout,
    event_sender: Option<Arc<EventSender>>,
}

impl FulfillmentPipeline {
    pub fn new(
        bookings: Arc<BookingService>,
        resolver: EntityResolver,
        renderer: InvoiceRenderer,
        fanout: NotificationFanout,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            bookings,
            resolver,
            renderer,
            fanout,
            event_sender,
        }
    }

    #[instrument(skip(self, event), fields(idempotency_key = %event.idempotency_key))]
    pub async fn process(&self, event: FulfillmentEvent) -> Result<PipelineOutcome, ServiceError> {
        event
            .validate()
            .map_err(|e| ServiceError::InvalidEvent(e.to_string()))?;

        let (booking, created) = self.bookings.reconcile(&event).await?;

        if !created {
            info!(
                booking_id = %booking.id,
                "duplicate delivery; notifications already handled by the winning run"
            );
            return Ok(PipelineOutcome {
                booking,
                created,
                fanout: None,
            });
        }

        let entities = self.resolver.resolve(&booking).await?;
        let facts = schedule::resolve_schedule(&booking, &entities.offer, &entities.vendor);
        let invoice = self.renderer.render(
            &booking,
            &entities.buyer,
            &entities.offer,
            entities.variant.as_ref(),
            &entities.vendor,
        );

        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::InvoiceIssued {
                    booking_id: booking.id,
                    invoice_reference: InvoiceRenderer::invoice_reference(booking.id),
                })
                .await;
        }

        let fanout = self.fanout.notify(&booking, &entities, &facts, &invoice).await;

        Ok(PipelineOutcome {
            booking,
            created,
            fanout: Some(fanout),
        })
    }

    /// Re-derives the invoice for an existing booking. Deterministic: the
    /// bytes match what was attached to the original confirmation.
    pub async fn render_invoice(&self, booking: &booking::Model) -> Result<Vec<u8>, ServiceError> {
        let entities = self.resolver.resolve(booking).await?;
        Ok(self.renderer.render(
            booking,
            &entities.buyer,
            &entities.offer,
            entities.variant.as_ref(),
            &entities.vendor,
        ))
    }

    pub fn bookings(&self) -> &BookingService {
        &self.bookings
    }
}
