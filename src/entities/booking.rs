use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// One confirmed reservation/purchase. Exactly one row exists per
/// idempotency key; the unique constraint is what makes the webhook path and
/// the client fallback path race-safe.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub buyer_id: Uuid,
    pub offer_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub vendor_id: Uuid,

    /// Upstream payment/session reference. Unique.
    #[sea_orm(unique)]
    #[validate(length(
        min = 1,
        max = 255,
        message = "Idempotency key must be between 1 and 255 characters"
    ))]
    pub idempotency_key: String,

    /// Amount actually captured by the payment provider. Null until a payment
    /// record supplies it; immutable once set.
    pub amount: Option<Decimal>,
    pub currency: String,

    pub status: String,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub meeting_location: Option<String>,
    pub cancelled_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::offer::Entity",
        from = "Column::OfferId",
        to = "super::offer::Column::Id"
    )]
    Offer,
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id"
    )]
    Vendor,
}

impl Related<super::offer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offer.def()
    }
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Paid,
    Confirmed,
    Cancelled,
}

/// Which party cancelled the booking.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Buyer,
    Vendor,
    Platform,
}

impl Model {
    pub fn status_kind(&self) -> BookingStatus {
        self.status.parse().unwrap_or(BookingStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        self.status_kind() == BookingStatus::Cancelled
    }
}
