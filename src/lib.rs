//! RepairDesk API Library
//!
//! Repair-service lifecycle engine: bookings, work orders, quotes, the parts
//! ledger and the activity log, exposed over HTTP/JSON.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod migrator;
pub mod models;
pub mod services;

use axum::{
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::RepairServices;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub services: RepairServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig, event_sender: Arc<EventSender>) -> Self {
        let policy = Arc::new(config.repair.clone());
        Self {
            services: RepairServices::new(db.clone(), event_sender, policy),
            db,
            config: Arc::new(config),
        }
    }
}

// Common response wrappers
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{bookings, quotes, technicians, work_orders};

    let booking_routes = Router::new()
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/approve", post(bookings::approve_booking))
        .route("/bookings/:id/reject", post(bookings::reject_booking))
        .route("/bookings/:id/convert", post(bookings::convert_booking))
        .route(
            "/customers/:id/bookings",
            get(bookings::list_customer_bookings),
        );

    let work_order_routes = Router::new()
        .route("/work-orders", post(work_orders::create_work_order))
        .route(
            "/work-orders/unassigned",
            get(work_orders::list_unassigned_work_orders),
        )
        .route("/work-orders/:id", get(work_orders::get_work_order))
        .route("/work-orders/:id/assign", post(work_orders::assign_technician))
        .route("/work-orders/:id/accept", post(work_orders::accept_assignment))
        .route("/work-orders/:id/decline", post(work_orders::decline_assignment))
        .route("/work-orders/:id/diagnose", post(work_orders::diagnose))
        .route(
            "/work-orders/:id/await-approval",
            post(work_orders::await_approval),
        )
        .route("/work-orders/:id/start", post(work_orders::start_repair))
        .route("/work-orders/:id/hold", post(work_orders::put_on_hold))
        .route("/work-orders/:id/complete", post(work_orders::complete_repair))
        .route("/work-orders/:id/cancel", post(work_orders::cancel_work_order))
        .route("/work-orders/:id/notes", post(work_orders::add_note))
        .route("/work-orders/:id/activity", get(work_orders::list_activity))
        .route(
            "/work-orders/:id/parts",
            get(work_orders::list_parts).post(work_orders::add_part),
        )
        .route(
            "/work-orders/:id/parts/:part_id",
            axum::routing::delete(work_orders::remove_part),
        )
        .route(
            "/customers/:id/work-orders",
            get(work_orders::list_customer_work_orders),
        )
        .route(
            "/technicians/:id/work-orders",
            get(work_orders::list_technician_work_orders),
        );

    let quote_routes = Router::new()
        .route(
            "/work-orders/:id/quotes",
            get(quotes::list_work_order_quotes).post(quotes::create_quote),
        )
        .route(
            "/work-orders/:id/approve-quote",
            post(quotes::approve_current_quote),
        )
        .route(
            "/work-orders/:id/reject-quote",
            post(quotes::reject_current_quote),
        )
        .route(
            "/quotes/:id",
            get(quotes::get_quote).patch(quotes::update_quote_costs),
        )
        .route("/quotes/:id/approve", post(quotes::approve_quote))
        .route("/quotes/:id/reject", post(quotes::reject_quote));

    let technician_routes = Router::new()
        .route(
            "/technicians",
            get(technicians::list_available_technicians).post(technicians::register_technician),
        )
        .route("/technicians/:id", get(technicians::get_technician))
        .route(
            "/technicians/:id/availability",
            put(technicians::set_availability),
        );

    Router::new()
        .route("/status", get(api_status))
        .merge(booking_routes)
        .merge(work_order_routes)
        .merge(quote_routes)
        .merge(technician_routes)
}

/// Full application router: health probes plus the versioned API.
pub fn app_router(state: AppState) -> Router {
    let db = state.db.clone();
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
        .merge(health::health_routes(db))
}

async fn api_status() -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "repairdesk-api",
        "timestamp": Utc::now().to_rfc3339(),
    }))))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn success_response_carries_data_and_timestamp() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, Some("ok"));

        let meta = response.meta.expect("metadata expected");
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn error_response_has_no_data() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("oops"));
    }
}
