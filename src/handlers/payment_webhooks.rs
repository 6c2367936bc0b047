use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

use crate::{
    errors::ServiceError,
    services::{fulfillment::RawFulfillmentPayload, governor},
    AppState,
};

type HmacSha256 = Hmac<Sha256>;

// POST /api/v1/payments/webhook
//
// The at-least-once entry point. The response status is the governor's
// acknowledgment decision: 2xx suppresses redelivery, anything else invites
// it. Duplicate deliveries are harmless by construction (idempotency key).
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = RawFulfillmentPayload,
    responses(
        (status = 200, description = "Event processed or acknowledged as handled"),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid event payload; redeliver with corrected input", body = crate::errors::ErrorResponse),
        (status = 500, description = "Storage failure; safe to redeliver", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Verify signature if configured
    if let Some(secret) = state.config.payment_webhook_secret.clone() {
        let tolerance = state.config.payment_webhook_tolerance_secs.unwrap_or(300);
        if !verify_signature(&headers, &body, &secret, tolerance) {
            warn!("Payment webhook signature verification failed");
            return (StatusCode::UNAUTHORIZED, "invalid webhook signature").into_response();
        }
    }

    let payload: RawFulfillmentPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return ServiceError::InvalidEvent(format!("invalid json: {e}")).into_response();
        }
    };

    let event = match payload.into_event() {
        Ok(event) => event,
        Err(e) => {
            let disposition = governor::classify(None, &e);
            return (disposition.ack_status, e.response_message()).into_response();
        }
    };

    match state.pipeline.process(event).await {
        Ok(outcome) => {
            info!(
                booking_id = %outcome.booking.id,
                created = outcome.created,
                "payment webhook processed"
            );
            (StatusCode::OK, "ok").into_response()
        }
        Err(e) => {
            let disposition = governor::classify(None, &e);
            if disposition.retry {
                e.into_response()
            } else {
                (disposition.ack_status, "acknowledged").into_response()
            }
        }
    }
}

fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str, tolerance_secs: u64) -> bool {
    let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) else {
        return false;
    };
    let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) else {
        return false;
    };

    // Reject stale timestamps
    if let Ok(ts_i) = ts.parse::<i64>() {
        let now = chrono::Utc::now().timestamp();
        if (now - ts_i).unsigned_abs() > tolerance_secs {
            return false;
        }
    } else {
        return false;
    }

    let signed = format!("{}.{}", ts, std::str::from_utf8(payload).unwrap_or(""));
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(signed.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, sig)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
