use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{routing::get, Router};
use http::{HeaderValue, Method};
use tokio::{signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use clubhub_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));
    let event_sender_arc = Arc::new(event_sender.clone());

    // External transports
    let email_transport: Arc<dyn api::services::email::EmailTransport> =
        Arc::new(api::services::email::HttpEmailTransport::new(&cfg.email)?);
    let identity_client = Arc::new(api::services::identity::IdentityClient::new(&cfg.identity)?);

    // Pipeline wiring
    let bookings = Arc::new(api::services::bookings::BookingService::new(
        db_arc.clone(),
        Some(event_sender_arc.clone()),
    ));
    let resolver = api::services::resolver::EntityResolver::new(
        db_arc.clone(),
        Some(identity_client),
    );
    let renderer = api::services::invoicing::InvoiceRenderer::new(cfg.platform.clone());
    let fanout = api::services::notifications::NotificationFanout::new(
        db_arc.clone(),
        email_transport,
        Some(event_sender_arc.clone()),
    );
    let pipeline = Arc::new(api::services::fulfillment::FulfillmentPipeline::new(
        bookings.clone(),
        resolver,
        renderer,
        fanout,
        Some(event_sender_arc),
    ));

    let app_state = api::AppState {
        db: db_arc.clone(),
        config: cfg.clone(),
        event_sender,
        pipeline,
        bookings,
    };

    // CORS: explicit origins in production, permissive in development
    let cors = match cfg.cors_allowed_origins.as_deref() {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse::<HeaderValue>().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    };

    let app = Router::new()
        .route("/health", get(api::handlers::health::health))
        .nest("/api/v1", api::api_v1_routes())
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", api::openapi::ApiDoc::openapi()),
        )
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("ClubHub fulfillment API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
