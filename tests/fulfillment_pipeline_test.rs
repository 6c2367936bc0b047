mod common;

use assert_matches::assert_matches;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use clubhub_api::entities::{booking, vendor_notification};
use clubhub_api::errors::ServiceError;
use common::{fulfillment_event, seed_catalog, seed_offer, seed_profile, seed_vendor, TestApp};

async fn booking_count(db: &clubhub_api::db::DbPool) -> u64 {
    booking::Entity::find().count(db).await.unwrap()
}

async fn notification_count(db: &clubhub_api::db::DbPool, vendor_id: Uuid) -> u64 {
    vendor_notification::Entity::find()
        .filter(vendor_notification::Column::VendorId.eq(vendor_id))
        .count(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn double_delivery_produces_one_booking_and_one_fanout() {
    let app = TestApp::new().await;
    let catalog = seed_catalog(app.db()).await;
    let event = fulfillment_event(&catalog, "evt_1", Some(dec!(59.00)));

    // The webhook path and the client fallback race on the same event.
    let pipeline_a = app.state.pipeline.clone();
    let pipeline_b = app.state.pipeline.clone();
    let (first, second) = tokio::join!(
        pipeline_a.process(event.clone()),
        pipeline_b.process(event.clone()),
    );

    let first = first.expect("first delivery should succeed");
    let second = second.expect("second delivery should succeed");

    assert_eq!(booking_count(app.db()).await, 1);
    assert_eq!(first.booking.id, second.booking.id);
    assert_eq!(first.booking.amount, Some(dec!(59.00)));

    // Exactly one run created the row; only that run fans out.
    assert!(first.created ^ second.created);
    assert_eq!(app.email.sent_to(&catalog.buyer_email), 1);
    assert_eq!(app.email.sent_to(&catalog.vendor_email), 1);
    assert_eq!(notification_count(app.db(), catalog.vendor_id).await, 1);
}

#[tokio::test]
async fn reconciliation_is_first_write_wins_never_a_merge() {
    let app = TestApp::new().await;
    let catalog = seed_catalog(app.db()).await;

    let first = fulfillment_event(&catalog, "evt_replay", Some(dec!(59.00)));
    let mut second = fulfillment_event(&catalog, "evt_replay", Some(dec!(99.00)));
    second.meeting_location = Some("41 rue du Nord, Lille".to_string());

    let outcome_a = app.state.pipeline.process(first).await.unwrap();
    let outcome_b = app.state.pipeline.process(second).await.unwrap();

    assert!(outcome_a.created);
    assert!(!outcome_b.created);
    // Candidate fields from the losing call are discarded wholesale.
    assert_eq!(outcome_b.booking.amount, Some(dec!(59.00)));
    assert_eq!(outcome_b.booking.meeting_location, None);
    assert_eq!(booking_count(app.db()).await, 1);
}

#[tokio::test]
async fn vendor_email_failure_still_persists_the_notification_row() {
    let app = TestApp::new().await;
    let catalog = seed_catalog(app.db()).await;
    app.email.fail_recipient(&catalog.vendor_email);

    let event = fulfillment_event(&catalog, "evt_vendor_down", Some(dec!(59.00)));
    let outcome = app.state.pipeline.process(event).await.unwrap();

    let fanout = outcome.fanout.expect("creating run must fan out");
    assert!(fanout.buyer_email.is_sent());
    assert!(!fanout.vendor_email.is_sent());
    assert!(fanout.vendor_record.is_sent());

    assert_eq!(app.email.sent_to(&catalog.buyer_email), 1);
    assert_eq!(notification_count(app.db(), catalog.vendor_id).await, 1);
}

#[tokio::test]
async fn quota_exhaustion_is_absorbed_and_acknowledged() {
    let app = TestApp::new().await;
    let catalog = seed_catalog(app.db()).await;
    app.email.exhaust_quota();

    let body = json!({
        "transaction_ref": "evt_quota",
        "offer_id": catalog.offer_id,
        "buyer_id": catalog.buyer_id,
        "vendor_id": catalog.vendor_id,
        "captured_amount": "59.00",
    });

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/api/v1/payments/webhook")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    // The delivery system must not redeliver against an exhausted quota.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.email.sent_count(), 0);
    // The booking itself is untouched by the notification outage.
    assert_eq!(booking_count(app.db()).await, 1);
}

#[tokio::test]
async fn invalid_events_propagate_for_redelivery() {
    let app = TestApp::new().await;

    // No transaction reference anywhere in the payload.
    let body = json!({
        "offer_id": Uuid::new_v4(),
        "buyer_id": Uuid::new_v4(),
        "vendor_id": Uuid::new_v4(),
    });

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/api/v1/payments/webhook")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(booking_count(app.db()).await, 0);
}

#[tokio::test]
async fn client_fallback_confirms_and_returns_the_booking() {
    let app = TestApp::new().await;
    let catalog = seed_catalog(app.db()).await;

    let body = json!({
        "session_id": "cs_fallback_1",
        "offer_id": catalog.offer_id,
        "buyer_id": catalog.buyer_id,
        "vendor_id": catalog.vendor_id,
        "captured_amount": "59.00",
        "variant_id": catalog.variant_id,
    });

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/api/v1/fulfillment/confirm")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["success"], json!(true));
    assert_eq!(parsed["data"]["idempotency_key"], json!("cs_fallback_1"));
    assert_eq!(parsed["data"]["status"], json!("paid"));

    assert_eq!(app.email.sent_to(&catalog.buyer_email), 1);
}

#[tokio::test]
async fn missing_buyer_email_skips_buyer_branch_but_keeps_the_booking() {
    let app = TestApp::new().await;

    let buyer_id = Uuid::new_v4();
    let vendor_id = Uuid::new_v4();
    let offer_id = Uuid::new_v4();
    seed_profile(app.db(), buyer_id, "No Mail", None).await;
    seed_vendor(app.db(), vendor_id, Some("hello@grimpe.example"), true).await;
    seed_offer(app.db(), offer_id, vendor_id, "in_person", None, None).await;

    let event = clubhub_api::services::fulfillment::FulfillmentEvent {
        idempotency_key: "evt_no_email".to_string(),
        offer_id,
        buyer_id,
        vendor_id,
        captured_amount: Some(dec!(20.00)),
        currency: Some("EUR".to_string()),
        variant_id: None,
        scheduled_at: None,
        meeting_location: None,
    };

    let outcome = app.state.pipeline.process(event).await.unwrap();
    let fanout = outcome.fanout.unwrap();

    assert!(!fanout.buyer_email.is_sent());
    assert!(fanout.vendor_email.is_sent());
    assert_eq!(booking_count(app.db()).await, 1);
    assert_eq!(app.email.sent_to("hello@grimpe.example"), 1);
}

#[tokio::test]
async fn vendor_preference_disables_the_vendor_branch() {
    let app = TestApp::new().await;

    let buyer_id = Uuid::new_v4();
    let vendor_id = Uuid::new_v4();
    let offer_id = Uuid::new_v4();
    seed_profile(app.db(), buyer_id, "Ana Martín", Some("ana@example.com")).await;
    seed_vendor(app.db(), vendor_id, Some("hello@grimpe.example"), false).await;
    seed_offer(app.db(), offer_id, vendor_id, "in_person", None, None).await;

    let event = clubhub_api::services::fulfillment::FulfillmentEvent {
        idempotency_key: "evt_muted_vendor".to_string(),
        offer_id,
        buyer_id,
        vendor_id,
        captured_amount: Some(dec!(20.00)),
        currency: Some("EUR".to_string()),
        variant_id: None,
        scheduled_at: None,
        meeting_location: None,
    };

    let outcome = app.state.pipeline.process(event).await.unwrap();
    let fanout = outcome.fanout.unwrap();

    assert!(fanout.buyer_email.is_sent());
    assert!(!fanout.vendor_email.is_sent());
    assert!(!fanout.vendor_record.is_sent());
    assert_eq!(app.email.sent_to("hello@grimpe.example"), 0);
    assert_eq!(notification_count(app.db(), vendor_id).await, 0);
}

#[tokio::test]
async fn invoice_rerender_is_byte_identical() {
    let app = TestApp::new().await;
    let catalog = seed_catalog(app.db()).await;

    let event = fulfillment_event(&catalog, "evt_invoice", Some(dec!(59.00)));
    let outcome = app.state.pipeline.process(event).await.unwrap();
    let booking_id = outcome.booking.id;

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::get(format!("/api/v1/bookings/{booking_id}/invoice"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        bodies.push(
            axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap(),
        );
    }

    assert_eq!(bodies[0], bodies[1]);

    // The re-render also matches the bytes attached to the confirmation.
    let attached = app
        .email
        .last_message_to(&catalog.buyer_email)
        .and_then(|m| m.attachments.into_iter().next())
        .expect("buyer confirmation carries the invoice");
    assert_eq!(attached.content.as_slice(), bodies[0].as_ref());
}

#[tokio::test]
async fn cancellation_is_attributed_and_terminal() {
    let app = TestApp::new().await;
    let catalog = seed_catalog(app.db()).await;

    let event = fulfillment_event(&catalog, "evt_cancel", Some(dec!(59.00)));
    let outcome = app.state.pipeline.process(event).await.unwrap();
    let booking_id = outcome.booking.id;

    let cancelled = app
        .state
        .bookings
        .cancel_booking(booking_id, clubhub_api::entities::booking::CancelledBy::Buyer)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(cancelled.cancelled_by.as_deref(), Some("buyer"));

    // Cancellation is terminal: a second attempt is rejected.
    let err = app
        .state
        .bookings
        .cancel_booking(booking_id, clubhub_api::entities::booking::CancelledBy::Vendor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    // The amount is untouched by cancellation.
    assert_eq!(cancelled.amount, Some(dec!(59.00)));
}

#[tokio::test]
async fn missing_catalog_records_degrade_to_placeholders() {
    let app = TestApp::new().await;

    // Only the buyer exists; offer and vendor rows are gone.
    let buyer_id = Uuid::new_v4();
    seed_profile(app.db(), buyer_id, "Ana Martín", Some("ana@example.com")).await;

    let event = clubhub_api::services::fulfillment::FulfillmentEvent {
        idempotency_key: "evt_degraded".to_string(),
        offer_id: Uuid::new_v4(),
        buyer_id,
        vendor_id: Uuid::new_v4(),
        captured_amount: Some(dec!(15.00)),
        currency: Some("EUR".to_string()),
        variant_id: None,
        scheduled_at: None,
        meeting_location: None,
    };

    // The invoice and buyer confirmation still go out in degraded form.
    let outcome = app.state.pipeline.process(event).await.unwrap();
    let fanout = outcome.fanout.unwrap();
    assert!(fanout.buyer_email.is_sent());

    let message = app.email.last_message_to("ana@example.com").unwrap();
    assert!(message.subject.contains("Reserved experience"));
}

#[tokio::test]
async fn identity_provider_supplies_missing_buyer_email() {
    use clubhub_api::config::IdentityConfig;
    use clubhub_api::services::{identity::IdentityClient, resolver::EntityResolver};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let app = TestApp::new().await;
    let buyer_id = Uuid::new_v4();
    seed_profile(app.db(), buyer_id, "Ana Martín", None).await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/admin/users/{buyer_id}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "email": "ana@account.example" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let identity = IdentityClient::new(&IdentityConfig {
        api_base_url: server.uri(),
        service_token: "service-token".to_string(),
        timeout_secs: 5,
    })
    .unwrap();
    let resolver = EntityResolver::new(app.state.db.clone(), Some(Arc::new(identity)));

    let booking = booking::Model {
        id: Uuid::new_v4(),
        buyer_id,
        offer_id: Uuid::new_v4(),
        variant_id: None,
        vendor_id: Uuid::new_v4(),
        idempotency_key: "evt_identity".to_string(),
        amount: None,
        currency: "EUR".to_string(),
        status: "pending".to_string(),
        created_at: chrono::Utc::now(),
        scheduled_at: None,
        meeting_location: None,
        cancelled_by: None,
    };

    let resolved = resolver.resolve(&booking).await.unwrap();
    assert_eq!(resolved.buyer.email.as_deref(), Some("ana@account.example"));
    assert_eq!(resolved.buyer.display_name, "Ana Martín");
}

#[tokio::test]
async fn get_booking_returns_404_for_unknown_id() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/bookings/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
