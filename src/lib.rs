//! ClubHub Fulfillment API Library
//!
//! Booking fulfillment and mandated-invoice notification pipeline for the
//! ClubHub membership marketplace.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::services::{bookings::BookingService, fulfillment::FulfillmentPipeline};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub pipeline: Arc<FulfillmentPipeline>,
    pub bookings: Arc<BookingService>,
}

// Common response wrapper
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<axum::Json<ApiResponse<T>>, errors::ServiceError>;

// API routes
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/payments/webhook",
            post(handlers::payment_webhooks::payment_webhook),
        )
        .route(
            "/fulfillment/confirm",
            post(handlers::fulfillment::confirm_fulfillment),
        )
        .route("/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/bookings/:id/invoice",
            get(handlers::bookings::get_booking_invoice),
        )
        .route(
            "/vendors/:id/notifications",
            get(handlers::vendors::list_vendor_notifications),
        )
}
