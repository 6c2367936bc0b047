use axum::http::StatusCode;
use tracing::error;
use uuid::Uuid;

use crate::errors::ServiceError;

/// What the webhook entry point should answer the at-least-once delivery
/// system: propagate failure (it will redeliver) or acknowledge success
/// (suppressing redelivery).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disposition {
    pub retry: bool,
    pub ack_status: StatusCode,
}

/// Classifies a pipeline failure into a redelivery decision.
///
/// Only invalid input and genuine storage conflicts propagate: redelivery is
/// meaningful for them. A transport quota will not clear faster by retrying,
/// and an unclassified failure must not turn one poison-pill event into a
/// redelivery storm; both are acknowledged as handled, with a distinguishable
/// audit record so an absorbed failure is never mistaken for true success.
pub fn classify(booking_id: Option<Uuid>, error: &ServiceError) -> Disposition {
    if error.is_redeliverable() {
        return Disposition {
            retry: true,
            ack_status: error.status_code(),
        };
    }

    let error_class = match error {
        ServiceError::TransportQuotaExceeded(_) => "TransportQuotaExceeded",
        ServiceError::NoRecipientEmail(_) => "NoRecipientEmail",
        _ => "UnclassifiedException",
    };

    error!(
        target: "audit",
        booking_id = ?booking_id,
        error_class = error_class,
        error = %error,
        "pipeline failure acknowledged as handled; redelivery suppressed"
    );

    Disposition {
        retry: false,
        ack_status: StatusCode::OK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_events_propagate_for_redelivery() {
        let d = classify(None, &ServiceError::InvalidEvent("missing offer reference".into()));
        assert!(d.retry);
        assert_eq!(d.ack_status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn persistence_conflicts_propagate_for_redelivery() {
        let d = classify(None, &ServiceError::PersistenceError("serialization failure".into()));
        assert!(d.retry);
        assert_eq!(d.ack_status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn quota_errors_are_acknowledged() {
        let d = classify(
            Some(Uuid::new_v4()),
            &ServiceError::TransportQuotaExceeded("monthly send limit".into()),
        );
        assert!(!d.retry);
        assert_eq!(d.ack_status, StatusCode::OK);
    }

    #[test]
    fn unclassified_failures_are_acknowledged() {
        let d = classify(None, &ServiceError::InternalError("surprise".into()));
        assert!(!d.retry);
        assert_eq!(d.ack_status, StatusCode::OK);
    }
}
