use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::Actor, errors::ServiceError, services::technicians::RegisterTechnicianInput,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

pub async fn register_technician(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<RegisterTechnicianInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let technician = state
        .services
        .technicians
        .register(&actor, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(technician))))
}

// Directory reads only need an authenticated actor.
pub async fn get_technician(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let technician = state.services.technicians.get(id).await?;
    Ok(Json(ApiResponse::success(technician)))
}

pub async fn list_available_technicians(
    State(state): State<AppState>,
    _actor: Actor,
) -> Result<impl IntoResponse, ServiceError> {
    let technicians = state.services.technicians.list_available().await?;
    Ok(Json(ApiResponse::success(technicians)))
}

pub async fn set_availability(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let technician = state
        .services
        .technicians
        .set_availability(&actor, id, payload.is_available)
        .await?;
    Ok(Json(ApiResponse::success(technician)))
}
