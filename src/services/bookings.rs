use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set, SqlErr};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::booking::{self, BookingStatus, CancelledBy, Entity as BookingEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::fulfillment::FulfillmentEvent,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub offer_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub vendor_id: Uuid,
    pub idempotency_key: String,
    pub amount: Option<Decimal>,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub meeting_location: Option<String>,
    pub cancelled_by: Option<String>,
}

impl From<booking::Model> for BookingResponse {
    fn from(model: booking::Model) -> Self {
        Self {
            id: model.id,
            buyer_id: model.buyer_id,
            offer_id: model.offer_id,
            variant_id: model.variant_id,
            vendor_id: model.vendor_id,
            idempotency_key: model.idempotency_key,
            amount: model.amount,
            currency: model.currency,
            status: model.status,
            created_at: model.created_at,
            scheduled_at: model.scheduled_at,
            meeting_location: model.meeting_location,
            cancelled_by: model.cancelled_by,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelBookingRequest {
    /// Who cancelled: "buyer", "vendor", or "platform"
    pub cancelled_by: String,
}

/// The initial status for a freshly reconciled booking. A captured amount
/// means the payment provider has confirmed the charge.
fn initial_status(event: &FulfillmentEvent) -> BookingStatus {
    if event.captured_amount.is_some() {
        BookingStatus::Paid
    } else {
        BookingStatus::Pending
    }
}

/// Service owning the bookings table: reconciliation (the dedup point between
/// the webhook path and the client fallback path), reads, and cancellation.
#[derive(Clone)]
pub struct BookingService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl BookingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Upserts exactly one booking row per idempotency key.
    ///
    /// Returns the winning row and whether this call created it. When the row
    /// already exists it is returned unchanged: the two write paths race and
    /// the first write wins, never a merge. The insert uses conflict-ignore
    /// semantics on the idempotency key, so the losing side of a concurrent
    /// race lands here without an error and re-reads the winner.
    #[instrument(skip(self, event), fields(idempotency_key = %event.idempotency_key))]
    pub async fn reconcile(
        &self,
        event: &FulfillmentEvent,
    ) -> Result<(booking::Model, bool), ServiceError> {
        let db = &*self.db_pool;

        if let Some(existing) = self.get_by_idempotency_key(&event.idempotency_key).await? {
            info!(booking_id = %existing.id, "booking already reconciled; returning existing row");
            return Ok((existing, false));
        }

        let booking_id = Uuid::new_v4();
        let candidate = booking::ActiveModel {
            id: Set(booking_id),
            buyer_id: Set(event.buyer_id),
            offer_id: Set(event.offer_id),
            variant_id: Set(event.variant_id),
            vendor_id: Set(event.vendor_id),
            idempotency_key: Set(event.idempotency_key.clone()),
            amount: Set(event.captured_amount),
            currency: Set(event
                .currency
                .clone()
                .unwrap_or_else(|| "EUR".to_string())),
            status: Set(initial_status(event).to_string()),
            created_at: Set(Utc::now()),
            scheduled_at: Set(event.scheduled_at),
            meeting_location: Set(event.meeting_location.clone()),
            cancelled_by: Set(None),
        };

        let insert = BookingEntity::insert(candidate)
            .on_conflict(
                OnConflict::column(booking::Column::IdempotencyKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await;

        match insert {
            Ok(_) => {}
            // Conflict-ignore fired: the other write path won the race.
            Err(DbErr::RecordNotInserted) => {
                info!("lost reconciliation race; reusing winner");
            }
            Err(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    info!("unique violation on idempotency key; reusing winner");
                }
                _ => {
                    error!(error = %e, "booking insert failed outside the dedup case");
                    return Err(ServiceError::PersistenceError(e.to_string()));
                }
            },
        }

        let winner = self
            .get_by_idempotency_key(&event.idempotency_key)
            .await?
            .ok_or_else(|| {
                ServiceError::PersistenceError(format!(
                    "booking missing after reconciliation for key {}",
                    event.idempotency_key
                ))
            })?;

        let created = winner.id == booking_id;
        if created {
            info!(booking_id = %winner.id, "booking created");
            if let Some(event_sender) = &self.event_sender {
                if let Err(e) = event_sender.send(Event::BookingCreated(winner.id)).await {
                    warn!(error = %e, booking_id = %winner.id, "failed to send booking created event");
                }
            }
        }

        Ok((winner, created))
    }

    #[instrument(skip(self))]
    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Option<booking::Model>, ServiceError> {
        let db = &*self.db_pool;
        BookingEntity::find_by_id(booking_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn get_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<booking::Model>, ServiceError> {
        let db = &*self.db_pool;
        BookingEntity::find()
            .filter(booking::Column::IdempotencyKey.eq(key))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Cancels a booking with attribution. The only mutation this service
    /// performs after creation; allowed from any non-terminal status.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        cancelled_by: CancelledBy,
    ) -> Result<booking::Model, ServiceError> {
        let db = &*self.db_pool;

        let booking = self
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {booking_id} not found")))?;

        if booking.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "Booking {booking_id} is already cancelled"
            )));
        }

        let mut active: booking::ActiveModel = booking.into();
        active.status = Set(BookingStatus::Cancelled.to_string());
        active.cancelled_by = Set(Some(cancelled_by.to_string()));

        let cancelled = active.update(db).await.map_err(ServiceError::DatabaseError)?;

        info!(booking_id = %booking_id, cancelled_by = %cancelled_by, "booking cancelled");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::BookingCancelled {
                    booking_id,
                    cancelled_by: cancelled_by.to_string(),
                })
                .await
            {
                warn!(error = %e, booking_id = %booking_id, "failed to send booking cancelled event");
            }
        }

        Ok(cancelled)
    }
}
