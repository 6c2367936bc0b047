#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

use clubhub_api::{
    api_v1_routes,
    config::{AppConfig, PlatformIdentity},
    db::{self, DbPool},
    entities::{offer, offer_variant, profile, vendor},
    events::{self, EventSender},
    handlers,
    services::{
        bookings::BookingService,
        email::{EmailError, EmailTransport, OutboundEmail},
        fulfillment::{FulfillmentEvent, FulfillmentPipeline},
        invoicing::InvoiceRenderer,
        notifications::NotificationFanout,
        resolver::EntityResolver,
    },
    AppState,
};

/// Email transport double: records every accepted message and can be told to
/// fail one recipient or to behave as if the provider quota were exhausted.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundEmail>>,
    fail_recipient: Mutex<Option<String>>,
    quota_exhausted: AtomicBool,
}

impl RecordingTransport {
    pub fn fail_recipient(&self, to: &str) {
        *self.fail_recipient.lock().unwrap() = Some(to.to_string());
    }

    pub fn exhaust_quota(&self) {
        self.quota_exhausted.store(true, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent_to(&self, to: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.to == to)
            .count()
    }

    pub fn last_message_to(&self, to: &str) -> Option<OutboundEmail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, message: &OutboundEmail) -> Result<(), EmailError> {
        if self.quota_exhausted.load(Ordering::SeqCst) {
            return Err(EmailError::Quota("monthly send limit reached".to_string()));
        }
        if let Some(fail) = self.fail_recipient.lock().unwrap().as_deref() {
            if fail == message.to {
                return Err(EmailError::Transport("connection reset".to_string()));
            }
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Helper harness spinning up application state backed by a file-based SQLite
/// database and a recording email transport.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub email: Arc<RecordingTransport>,
    _event_task: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let db_file = tmp.path().join("clubhub_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "127.0.0.1",
            18_080,
            "test",
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let event_sender_arc = Arc::new(event_sender.clone());

        let email = Arc::new(RecordingTransport::default());

        let bookings = Arc::new(BookingService::new(
            db_arc.clone(),
            Some(event_sender_arc.clone()),
        ));
        let resolver = EntityResolver::new(db_arc.clone(), None);
        let renderer = InvoiceRenderer::new(PlatformIdentity::default());
        let fanout = NotificationFanout::new(
            db_arc.clone(),
            email.clone() as Arc<dyn EmailTransport>,
            Some(event_sender_arc.clone()),
        );
        let pipeline = Arc::new(FulfillmentPipeline::new(
            bookings.clone(),
            resolver,
            renderer,
            fanout,
            Some(event_sender_arc),
        ));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            pipeline,
            bookings,
        };

        let router = Router::new()
            .route("/health", get(handlers::health::health))
            .nest("/api/v1", api_v1_routes())
            .with_state(state.clone());

        Self {
            state,
            router,
            email,
            _event_task: event_task,
            _tmp: tmp,
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }
}

pub struct SeededCatalog {
    pub buyer_id: Uuid,
    pub vendor_id: Uuid,
    pub offer_id: Uuid,
    pub variant_id: Uuid,
    pub buyer_email: String,
    pub vendor_email: String,
}

/// Seeds a buyer, vendor, offer, and variant ready for fulfillment events.
pub async fn seed_catalog(db: &DbPool) -> SeededCatalog {
    let buyer_id = Uuid::new_v4();
    let vendor_id = Uuid::new_v4();
    let offer_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();
    let buyer_email = "ana@example.com".to_string();
    let vendor_email = "hello@grimpe.example".to_string();

    seed_profile(db, buyer_id, "Ana Martín", Some(&buyer_email)).await;
    seed_vendor(db, vendor_id, Some(&vendor_email), true).await;
    seed_offer(db, offer_id, vendor_id, "in_person", None, None).await;
    seed_variant(db, variant_id, offer_id, Some(Decimal::new(30, 0))).await;

    SeededCatalog {
        buyer_id,
        vendor_id,
        offer_id,
        variant_id,
        buyer_email,
        vendor_email,
    }
}

pub async fn seed_profile(db: &DbPool, id: Uuid, name: &str, email: Option<&str>) {
    profile::ActiveModel {
        id: Set(id),
        full_name: Set(name.to_string()),
        email: Set(email.map(str::to_string)),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("failed to seed profile");
}

pub async fn seed_vendor(db: &DbPool, id: Uuid, contact_email: Option<&str>, enabled: bool) {
    vendor::ActiveModel {
        id: Set(id),
        legal_name: Set("Grimpe & Cie".to_string()),
        address: Set("8 quai Sud, 13002 Marseille, France".to_string()),
        siret: Set("123 456 789 00012".to_string()),
        vat_number: Set(Some("FR00123456789".to_string())),
        contact_email: Set(contact_email.map(str::to_string)),
        booking_emails_enabled: Set(enabled),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("failed to seed vendor");
}

pub async fn seed_offer(
    db: &DbPool,
    id: Uuid,
    vendor_id: Uuid,
    modality: &str,
    event_start: Option<DateTime<Utc>>,
    scheduling_link: Option<&str>,
) {
    offer::ActiveModel {
        id: Set(id),
        vendor_id: Set(vendor_id),
        title: Set("Climbing initiation".to_string()),
        modality: Set(modality.to_string()),
        event_start: Set(event_start),
        connection_link: Set(None),
        scheduling_link: Set(scheduling_link.map(str::to_string)),
        list_price: Set(Some(Decimal::new(80, 0))),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("failed to seed offer");
}

pub async fn seed_variant(db: &DbPool, id: Uuid, offer_id: Uuid, price: Option<Decimal>) {
    offer_variant::ActiveModel {
        id: Set(id),
        offer_id: Set(offer_id),
        name: Set("Duo".to_string()),
        price: Set(price),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("failed to seed variant");
}

/// A fully-populated fulfillment event against the seeded catalog.
pub fn fulfillment_event(catalog: &SeededCatalog, key: &str, amount: Option<Decimal>) -> FulfillmentEvent {
    FulfillmentEvent {
        idempotency_key: key.to_string(),
        offer_id: catalog.offer_id,
        buyer_id: catalog.buyer_id,
        vendor_id: catalog.vendor_id,
        captured_amount: amount,
        currency: Some("EUR".to_string()),
        variant_id: Some(catalog.variant_id),
        scheduled_at: None,
        meeting_location: None,
    }
}
