use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::Actor,
    errors::ServiceError,
    services::bookings::CreateBookingInput,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct RejectBookingRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertBookingRequest {
    pub technician_id: Option<Uuid>,
}

/// Customer intake
pub async fn create_booking(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateBookingInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let booking = state.services.bookings.create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(booking))))
}

pub async fn get_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let booking = state.services.bookings.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(booking)))
}

pub async fn approve_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let booking = state.services.bookings.approve(&actor, id).await?;
    Ok(Json(ApiResponse::success(booking)))
}

pub async fn reject_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectBookingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let booking = state
        .services
        .bookings
        .reject(&actor, id, payload.reason)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Creates the work order for a booking. The body is optional.
pub async fn convert_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    payload: Option<Json<ConvertBookingRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let technician_id = payload.and_then(|Json(body)| body.technician_id);
    let result = state
        .services
        .bookings
        .convert(&actor, id, technician_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(result))))
}

pub async fn list_customer_bookings(
    State(state): State<AppState>,
    actor: Actor,
    Path(customer_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let bookings = state
        .services
        .bookings
        .list_for_customer(&actor, customer_id)
        .await?;
    Ok(Json(ApiResponse::success(bookings)))
}
