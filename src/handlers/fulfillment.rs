use axum::{extract::State, Json};
use tracing::info;

use crate::{
    errors::ServiceError,
    services::bookings::BookingResponse,
    services::fulfillment::RawFulfillmentPayload,
    ApiResponse, AppState,
};

// POST /api/v1/fulfillment/confirm
//
// Synchronous client fallback: invoked by the web client right after a
// redirect-based payment completion, in case the webhook is delayed or lost.
// Races the webhook path; the reconciler makes the race harmless.
#[utoipa::path(
    post,
    path = "/api/v1/fulfillment/confirm",
    request_body = RawFulfillmentPayload,
    responses(
        (status = 200, description = "Booking reconciled", body = BookingResponse),
        (status = 422, description = "Invalid event payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Fulfillment"
)]
pub async fn confirm_fulfillment(
    State(state): State<AppState>,
    Json(payload): Json<RawFulfillmentPayload>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let event = payload.into_event()?;
    let outcome = state.pipeline.process(event).await?;

    info!(
        booking_id = %outcome.booking.id,
        created = outcome.created,
        "client fallback confirmation processed"
    );

    Ok(Json(ApiResponse::success(BookingResponse::from(
        outcome.booking,
    ))))
}
