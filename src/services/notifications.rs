use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{booking, vendor_notification},
    events::{Event, EventSender},
    services::email::{EmailAttachment, EmailError, EmailTransport, OutboundEmail},
    services::invoicing::InvoiceRenderer,
    services::pricing,
    services::resolver::ResolvedEntities,
    services::schedule::ScheduleFacts,
};

pub const VENDOR_NOTIFICATION_KIND_BOOKING: &str = "booking_confirmed";

/// Outcome of one fan-out action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    Sent,
    Skipped(String),
    Failed { detail: String, quota: bool },
}

impl BranchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, BranchOutcome::Sent)
    }
}

/// What happened to each of the three independent side effects.
#[derive(Debug, Clone)]
pub struct FanoutReport {
    pub buyer_email: BranchOutcome,
    pub vendor_email: BranchOutcome,
    pub vendor_record: BranchOutcome,
}

impl FanoutReport {
    /// True when any branch hit the transport's quota/rate limit; the
    /// governor uses this to suppress redelivery.
    pub fn quota_exhausted(&self) -> bool {
        [&self.buyer_email, &self.vendor_email, &self.vendor_record]
            .iter()
            .any(|outcome| matches!(outcome, BranchOutcome::Failed { quota: true, .. }))
    }
}

/// Sends the buyer confirmation (with invoice attached) and, independently,
/// a best-effort vendor notification (email + persisted in-app record).
///
/// Failures never escape this service: each branch is absorbed into its
/// outcome and logged, because a notification-channel outage must not corrupt
/// the booking or trigger redelivery storms.
#[derive(Clone)]
pub struct NotificationFanout {
    db_pool: Arc<DbPool>,
    email: Arc<dyn EmailTransport>,
    event_sender: Option<Arc<EventSender>>,
}

impl NotificationFanout {
    pub fn new(
        db_pool: Arc<DbPool>,
        email: Arc<dyn EmailTransport>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            email,
            event_sender,
        }
    }

    #[instrument(skip_all, fields(booking_id = %booking.id))]
    pub async fn notify(
        &self,
        booking: &booking::Model,
        entities: &ResolvedEntities,
        facts: &ScheduleFacts,
        invoice: &[u8],
    ) -> FanoutReport {
        // Buyer-critical and vendor-best-effort branches are independent.
        let (buyer_email, (vendor_email, vendor_record)) = tokio::join!(
            self.buyer_branch(booking, entities, facts, invoice),
            self.vendor_branch(booking, entities, facts),
        );

        FanoutReport {
            buyer_email,
            vendor_email,
            vendor_record,
        }
    }

    async fn buyer_branch(
        &self,
        booking: &booking::Model,
        entities: &ResolvedEntities,
        facts: &ScheduleFacts,
        invoice: &[u8],
    ) -> BranchOutcome {
        let Some(to) = entities.buyer.email.clone() else {
            warn!(
                target: "audit",
                booking_id = %booking.id,
                buyer_id = %entities.buyer.id,
                error_class = "NoRecipientEmail",
                "buyer confirmation skipped: no usable email"
            );
            self.emit(Event::BuyerConfirmationSkipped {
                booking_id: booking.id,
                reason: "no recipient email".to_string(),
            })
            .await;
            return BranchOutcome::Skipped("no recipient email".to_string());
        };

        let reference = InvoiceRenderer::invoice_reference(booking.id);
        let message = OutboundEmail {
            to,
            subject: format!("Your booking is confirmed: {}", entities.offer.title),
            html_body: buyer_email_html(booking, entities, facts),
            attachments: vec![EmailAttachment {
                filename: format!("invoice-{reference}.html"),
                content_type: "text/html".to_string(),
                content: invoice.to_vec(),
            }],
        };

        match self.email.send(&message).await {
            Ok(()) => {
                info!(booking_id = %booking.id, "buyer confirmation sent");
                self.emit(Event::BuyerConfirmationSent(booking.id)).await;
                BranchOutcome::Sent
            }
            Err(e) => self.absorb_email_failure(booking.id, "buyer confirmation", e).await,
        }
    }

    async fn vendor_branch(
        &self,
        booking: &booking::Model,
        entities: &ResolvedEntities,
        facts: &ScheduleFacts,
    ) -> (BranchOutcome, BranchOutcome) {
        if !entities.vendor.booking_emails_enabled {
            info!(
                vendor_id = %entities.vendor.id,
                "vendor disabled booking notifications; skipping vendor branch"
            );
            let skipped = BranchOutcome::Skipped("vendor preference".to_string());
            return (skipped.clone(), skipped);
        }

        // The email send and the in-app insert must not block each other.
        let (email_outcome, record_outcome) = tokio::join!(
            self.vendor_email(booking, entities, facts),
            self.vendor_record(booking, entities, facts),
        );

        if email_outcome.is_sent() || record_outcome.is_sent() {
            self.emit(Event::VendorNotified {
                booking_id: booking.id,
                vendor_id: entities.vendor.id,
            })
            .await;
        }

        (email_outcome, record_outcome)
    }

    async fn vendor_email(
        &self,
        booking: &booking::Model,
        entities: &ResolvedEntities,
        facts: &ScheduleFacts,
    ) -> BranchOutcome {
        let Some(to) = entities.vendor.contact_email.clone() else {
            warn!(vendor_id = %entities.vendor.id, "vendor has no contact email; skipping email");
            return BranchOutcome::Skipped("no vendor contact email".to_string());
        };

        let message = OutboundEmail {
            to,
            subject: format!("New booking: {}", entities.offer.title),
            html_body: vendor_email_html(booking, entities, facts),
            attachments: Vec::new(),
        };

        match self.email.send(&message).await {
            Ok(()) => {
                info!(booking_id = %booking.id, vendor_id = %entities.vendor.id, "vendor email sent");
                BranchOutcome::Sent
            }
            Err(e) => self.absorb_email_failure(booking.id, "vendor email", e).await,
        }
    }

    async fn vendor_record(
        &self,
        booking: &booking::Model,
        entities: &ResolvedEntities,
        facts: &ScheduleFacts,
    ) -> BranchOutcome {
        let db = &*self.db_pool;
        let amount = pricing::authoritative_amount(booking, entities.variant.as_ref());

        let record = vendor_notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            vendor_id: Set(entities.vendor.id),
            kind: Set(VENDOR_NOTIFICATION_KIND_BOOKING.to_string()),
            title: Set(format!("New booking: {}", entities.offer.title)),
            body: Set(format!(
                "{} booked {} ({}) for {:.2} {}",
                entities.buyer.display_name,
                entities.offer.title,
                facts.date_display,
                amount,
                booking.currency,
            )),
            read: Set(false),
            payload: Set(json!({
                "booking_id": booking.id,
                "buyer_name": entities.buyer.display_name,
                "buyer_email": entities.buyer.email,
                "amount": amount,
                "currency": booking.currency,
                "date": facts.date_display,
                "location": facts.location_display,
            })),
            created_at: Set(Utc::now()),
        };

        match record.insert(db).await {
            Ok(_) => {
                info!(booking_id = %booking.id, vendor_id = %entities.vendor.id, "vendor in-app notification persisted");
                BranchOutcome::Sent
            }
            Err(e) => {
                error!(
                    target: "audit",
                    booking_id = %booking.id,
                    vendor_id = %entities.vendor.id,
                    error_class = "NotificationPersistFailed",
                    error = %e,
                    "vendor in-app notification insert failed"
                );
                BranchOutcome::Failed {
                    detail: e.to_string(),
                    quota: false,
                }
            }
        }
    }

    /// Logs and classifies a transport failure without letting it escape.
    async fn absorb_email_failure(
        &self,
        booking_id: Uuid,
        action: &str,
        err: EmailError,
    ) -> BranchOutcome {
        let quota = matches!(err, EmailError::Quota(_));
        let error_class = if quota {
            "TransportQuotaExceeded"
        } else {
            "TransportFailed"
        };

        error!(
            target: "audit",
            booking_id = %booking_id,
            error_class = error_class,
            error = %err,
            "{action} failed; absorbed by fan-out"
        );
        self.emit(Event::NotificationFailureSuppressed {
            booking_id,
            detail: format!("{action}: {err}"),
        })
        .await;

        BranchOutcome::Failed {
            detail: err.to_string(),
            quota,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to emit fan-out event");
            }
        }
    }
}

fn buyer_email_html(
    booking: &booking::Model,
    entities: &ResolvedEntities,
    facts: &ScheduleFacts,
) -> String {
    let amount = format!("{:.2}", pricing::authoritative_amount(booking, entities.variant.as_ref()));
    format!(
        "<p>Hi {name},</p>\
         <p>Your booking for <strong>{title}</strong> is confirmed.</p>\
         <ul>\
         <li>Date: {date}</li>\
         <li>Location: {location}</li>\
         <li>Amount: {amount} {currency}</li>\
         </ul>\
         <p>Your invoice is attached.</p>",
        name = entities.buyer.display_name,
        title = entities.offer.title,
        date = facts.date_display,
        location = facts.location_display,
        amount = amount,
        currency = booking.currency,
    )
}

fn vendor_email_html(
    booking: &booking::Model,
    entities: &ResolvedEntities,
    facts: &ScheduleFacts,
) -> String {
    let amount = format!("{:.2}", pricing::authoritative_amount(booking, entities.variant.as_ref()));
    let buyer_email = entities.buyer.email.as_deref().unwrap_or("not provided");
    format!(
        "<p>You have a new booking for <strong>{title}</strong>.</p>\
         <ul>\
         <li>Member: {name} ({email})</li>\
         <li>Date: {date}</li>\
         <li>Location: {location}</li>\
         <li>Amount: {amount} {currency}</li>\
         </ul>",
        title = entities.offer.title,
        name = entities.buyer.display_name,
        email = buyer_email,
        date = facts.date_display,
        location = facts.location_display,
        amount = amount,
        currency = booking.currency,
    )
}
