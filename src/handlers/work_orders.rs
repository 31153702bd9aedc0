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
    services::{
        parts::AddPartInput,
        work_orders::{CompleteRepairInput, CreateWorkOrderInput},
    },
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct AssignTechnicianRequest {
    pub technician_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiagnoseRequest {
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HoldRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub text: String,
}

/// Self-service work order
pub async fn create_work_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateWorkOrderInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let work_order = state
        .services
        .work_orders
        .create_direct(&actor, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(work_order))))
}

pub async fn get_work_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let work_order = state.services.work_orders.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(work_order)))
}

pub async fn list_customer_work_orders(
    State(state): State<AppState>,
    actor: Actor,
    Path(customer_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state
        .services
        .work_orders
        .list_for_customer(&actor, customer_id)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn list_technician_work_orders(
    State(state): State<AppState>,
    actor: Actor,
    Path(technician_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state
        .services
        .work_orders
        .list_for_technician(&actor, technician_id)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn list_unassigned_work_orders(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.work_orders.list_unassigned(&actor).await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn assign_technician(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignTechnicianRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let work_order = state
        .services
        .work_orders
        .assign_technician(&actor, id, payload.technician_id)
        .await?;
    Ok(Json(ApiResponse::success(work_order)))
}

pub async fn accept_assignment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let work_order = state
        .services
        .work_orders
        .accept_assignment(&actor, id)
        .await?;
    Ok(Json(ApiResponse::success(work_order)))
}

pub async fn decline_assignment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let work_order = state
        .services
        .work_orders
        .decline_assignment(&actor, id, reason)
        .await?;
    Ok(Json(ApiResponse::success(work_order)))
}

pub async fn diagnose(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<DiagnoseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let work_order = state
        .services
        .work_orders
        .mark_as_diagnosed(&actor, id, payload.notes)
        .await?;
    Ok(Json(ApiResponse::success(work_order)))
}

pub async fn await_approval(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let work_order = state
        .services
        .work_orders
        .mark_awaiting_approval(&actor, id)
        .await?;
    Ok(Json(ApiResponse::success(work_order)))
}

pub async fn start_repair(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let work_order = state.services.work_orders.start_repair(&actor, id).await?;
    Ok(Json(ApiResponse::success(work_order)))
}

pub async fn put_on_hold(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    payload: Option<Json<HoldRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let notes = payload.and_then(|Json(body)| body.notes);
    let work_order = state
        .services
        .work_orders
        .put_on_hold(&actor, id, notes)
        .await?;
    Ok(Json(ApiResponse::success(work_order)))
}

pub async fn complete_repair(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    payload: Option<Json<CompleteRepairInput>>,
) -> Result<impl IntoResponse, ServiceError> {
    let input = payload.map(|Json(body)| body).unwrap_or_default();
    let work_order = state
        .services
        .work_orders
        .complete_repair(&actor, id, input)
        .await?;
    Ok(Json(ApiResponse::success(work_order)))
}

pub async fn cancel_work_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let work_order = state
        .services
        .work_orders
        .cancel(&actor, id, payload.reason)
        .await?;
    Ok(Json(ApiResponse::success(work_order)))
}

pub async fn add_note(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<NoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let entry = state
        .services
        .work_orders
        .add_note(&actor, id, payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

/// History, newest first
pub async fn list_activity(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let entries = state
        .services
        .activity_log
        .list_for_work_order(&actor, id)
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

pub async fn list_parts(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let parts = state.services.parts.list_parts(&actor, id).await?;
    Ok(Json(ApiResponse::success(parts)))
}

/// Adds a part and returns the updated work order.
pub async fn add_part(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddPartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let (_, work_order) = state.services.parts.add_part(&actor, id, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(work_order))))
}

pub async fn remove_part(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, part_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let work_order = state
        .services
        .parts
        .remove_part(&actor, id, part_id)
        .await?;
    Ok(Json(ApiResponse::success(work_order)))
}
