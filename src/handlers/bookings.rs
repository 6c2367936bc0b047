use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::{
    entities::booking::CancelledBy,
    errors::ServiceError,
    services::bookings::{BookingResponse, CancelBookingRequest},
    ApiResponse, AppState,
};

// GET /api/v1/bookings/{id}
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking found", body = BookingResponse),
        (status = 404, description = "Booking not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = state
        .bookings
        .get_booking(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Booking {id} not found")))?;

    Ok(Json(ApiResponse::success(BookingResponse::from(booking))))
}

// POST /api/v1/bookings/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/cancel",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = BookingResponse),
        (status = 400, description = "Booking already cancelled or invalid attribution", body = crate::errors::ErrorResponse),
        (status = 404, description = "Booking not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let cancelled_by: CancelledBy = request.cancelled_by.parse().map_err(|_| {
        ServiceError::ValidationError(format!(
            "Unknown cancellation party: {}",
            request.cancelled_by
        ))
    })?;

    let booking = state.bookings.cancel_booking(id, cancelled_by).await?;

    Ok(Json(ApiResponse::success(BookingResponse::from(booking))))
}

// GET /api/v1/bookings/{id}/invoice
//
// Re-derives the invoice from the booking and its resolved entities. The
// bytes are identical to what was attached to the original confirmation.
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}/invoice",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Rendered invoice document", content_type = "text/html"),
        (status = 404, description = "Booking not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn get_booking_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let booking = state
        .bookings
        .get_booking(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Booking {id} not found")))?;

    let document = state.pipeline.render_invoice(&booking).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        document,
    )
        .into_response())
}
