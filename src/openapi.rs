use utoipa::OpenApi;

use crate::errors::ErrorResponse;
use crate::services::bookings::{BookingResponse, CancelBookingRequest};
use crate::services::fulfillment::{FulfillmentEvent, RawFulfillmentPayload};

/// OpenAPI documentation for the fulfillment API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ClubHub Fulfillment API",
        description = "Booking fulfillment and mandated-invoice notification pipeline"
    ),
    paths(
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::fulfillment::confirm_fulfillment,
        crate::handlers::bookings::get_booking,
        crate::handlers::bookings::cancel_booking,
        crate::handlers::bookings::get_booking_invoice,
        crate::handlers::vendors::list_vendor_notifications,
        crate::handlers::health::health,
    ),
    components(schemas(
        RawFulfillmentPayload,
        FulfillmentEvent,
        BookingResponse,
        CancelBookingRequest,
        ErrorResponse,
    )),
    tags(
        (name = "Payments", description = "Payment provider webhook entry point"),
        (name = "Fulfillment", description = "Client fallback confirmation"),
        (name = "Bookings", description = "Booking reads, cancellation, invoice re-render"),
        (name = "Vendors", description = "Vendor in-app notifications"),
        (name = "Health", description = "Liveness probes"),
    )
)]
pub struct ApiDoc;
