//! Liveness and readiness endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::db;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<HealthStatus>,
}

impl HealthInfo {
    fn new(status: HealthStatus, database: Option<HealthStatus>) -> Self {
        Self {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            database,
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(HealthInfo::new(HealthStatus::Up, None))
}

/// Ready once the database answers.
async fn readiness(State(db_pool): State<Arc<DatabaseConnection>>) -> impl IntoResponse {
    match db::check_connection(&db_pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthInfo::new(HealthStatus::Up, Some(HealthStatus::Up))),
        ),
        Err(e) => {
            error!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthInfo::new(HealthStatus::Down, Some(HealthStatus::Down))),
            )
        }
    }
}

pub fn health_routes(db_pool: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .with_state(db_pool)
}
