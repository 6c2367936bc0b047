use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Catalog description of a bookable offer. Owned by catalog management;
/// read-only to the fulfillment pipeline.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub vendor_id: Uuid,
    pub title: String,

    /// Delivery modality: "online", "in_person", or "at_home".
    pub modality: String,

    /// Fixed start for event-style offers.
    pub event_start: Option<DateTime<Utc>>,

    /// Video-conference link for online offers.
    pub connection_link: Option<String>,

    /// External scheduling page; its presence means the buyer still has to
    /// book a slot after purchase.
    pub scheduling_link: Option<String>,

    /// Catalog list price. A default for display, never a charge record: the
    /// price authority does not consult it.
    pub list_price: Option<Decimal>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::offer_variant::Entity")]
    Variants,
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::offer_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variants.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OfferModality {
    Online,
    InPerson,
    AtHome,
}

impl Model {
    pub fn modality_kind(&self) -> OfferModality {
        self.modality.parse().unwrap_or(OfferModality::InPerson)
    }

    /// True when the buyer still has to pick a slot after purchase: the offer
    /// points at a scheduling page or is delivered at the buyer's home.
    pub fn requires_scheduling(&self) -> bool {
        self.scheduling_link.is_some() || self.modality_kind() == OfferModality::AtHome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(modality: &str, scheduling_link: Option<&str>) -> Model {
        Model {
            id: Uuid::nil(),
            vendor_id: Uuid::nil(),
            title: "Pilates discovery".to_string(),
            modality: modality.to_string(),
            event_start: None,
            connection_link: None,
            scheduling_link: scheduling_link.map(str::to_string),
            list_price: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn at_home_offers_require_scheduling() {
        assert!(offer("at_home", None).requires_scheduling());
    }

    #[test]
    fn scheduling_link_forces_scheduling_regardless_of_modality() {
        assert!(offer("online", Some("https://cal.example/s")).requires_scheduling());
        assert!(!offer("online", None).requires_scheduling());
    }
}
