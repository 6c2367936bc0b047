use sea_orm::EntityTrait;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{booking, offer, offer_variant, profile, vendor},
    errors::ServiceError,
    services::identity::IdentityClient,
};

/// Buyer identity as needed downstream: a display name and, when one can be
/// found anywhere, a contact email.
#[derive(Debug, Clone)]
pub struct BuyerContact {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
}

/// Everything the renderer and fan-out need for one booking.
#[derive(Debug, Clone)]
pub struct ResolvedEntities {
    pub buyer: BuyerContact,
    pub offer: offer::Model,
    pub variant: Option<offer_variant::Model>,
    pub vendor: vendor::Model,
}

/// Gathers buyer, offer, variant, and vendor records for a booking.
///
/// Missing non-buyer records degrade to named placeholders rather than
/// failing the operation: the invoice and notifications must still go out in
/// degraded form. Database errors, by contrast, propagate (retryable).
#[derive(Clone)]
pub struct EntityResolver {
    db_pool: Arc<DbPool>,
    identity: Option<Arc<IdentityClient>>,
}

impl EntityResolver {
    pub fn new(db_pool: Arc<DbPool>, identity: Option<Arc<IdentityClient>>) -> Self {
        Self { db_pool, identity }
    }

    #[instrument(skip(self, booking), fields(booking_id = %booking.id))]
    pub async fn resolve(&self, booking: &booking::Model) -> Result<ResolvedEntities, ServiceError> {
        let db = &*self.db_pool;

        // Independent reads, no ordering requirement.
        let (profile_row, offer_row, vendor_row, variant_row) = tokio::join!(
            profile::Entity::find_by_id(booking.buyer_id).one(db),
            offer::Entity::find_by_id(booking.offer_id).one(db),
            vendor::Entity::find_by_id(booking.vendor_id).one(db),
            async {
                match booking.variant_id {
                    Some(variant_id) => offer_variant::Entity::find_by_id(variant_id).one(db).await,
                    None => Ok(None),
                }
            },
        );

        let profile_row = profile_row.map_err(ServiceError::DatabaseError)?;
        let offer_row = offer_row.map_err(ServiceError::DatabaseError)?;
        let vendor_row = vendor_row.map_err(ServiceError::DatabaseError)?;
        let variant_row = variant_row.map_err(ServiceError::DatabaseError)?;

        let offer_row = offer_row.unwrap_or_else(|| {
            warn!(offer_id = %booking.offer_id, "offer missing; using placeholder");
            placeholder_offer(booking)
        });
        let vendor_row = vendor_row.unwrap_or_else(|| {
            warn!(vendor_id = %booking.vendor_id, "vendor missing; using placeholder");
            placeholder_vendor(booking)
        });

        let buyer = self.resolve_buyer(booking, profile_row).await;

        Ok(ResolvedEntities {
            buyer,
            offer: offer_row,
            variant: variant_row,
            vendor: vendor_row,
        })
    }

    /// Buyer contact resolution: profile first, identity provider second.
    /// A buyer with no email anywhere is still returned; the fan-out is the
    /// one that refuses to attempt delivery.
    async fn resolve_buyer(
        &self,
        booking: &booking::Model,
        profile_row: Option<profile::Model>,
    ) -> BuyerContact {
        let (display_name, mut email) = match profile_row {
            Some(p) => (p.full_name, p.email),
            None => {
                warn!(buyer_id = %booking.buyer_id, "profile missing; using placeholder");
                ("Member".to_string(), None)
            }
        };

        if email.is_none() {
            if let Some(identity) = &self.identity {
                match identity.email_for_user(booking.buyer_id).await {
                    Ok(found) => email = found,
                    Err(e) => {
                        warn!(buyer_id = %booking.buyer_id, error = %e, "identity email lookup failed");
                    }
                }
            }
        }

        BuyerContact {
            id: booking.buyer_id,
            display_name,
            email,
        }
    }
}

fn placeholder_offer(booking: &booking::Model) -> offer::Model {
    offer::Model {
        id: booking.offer_id,
        vendor_id: booking.vendor_id,
        title: "Reserved experience".to_string(),
        modality: "in_person".to_string(),
        event_start: None,
        connection_link: None,
        scheduling_link: None,
        list_price: None,
        created_at: booking.created_at,
    }
}

fn placeholder_vendor(booking: &booking::Model) -> vendor::Model {
    vendor::Model {
        id: booking.vendor_id,
        legal_name: "Partner pending registration".to_string(),
        address: String::new(),
        siret: String::new(),
        vat_number: None,
        contact_email: None,
        booking_emails_enabled: true,
        created_at: booking.created_at,
    }
}
