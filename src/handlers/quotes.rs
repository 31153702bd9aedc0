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
    services::quotes::{CreateQuoteInput, UpdateQuoteCostsInput},
    ApiResponse, AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct RejectQuoteRequest {
    pub reason: Option<String>,
}

pub async fn create_quote(
    State(state): State<AppState>,
    actor: Actor,
    Path(work_order_id): Path<Uuid>,
    Json(payload): Json<CreateQuoteInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state
        .services
        .quotes
        .create_quote(&actor, work_order_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(quote))))
}

pub async fn list_work_order_quotes(
    State(state): State<AppState>,
    actor: Actor,
    Path(work_order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let quotes = state
        .services
        .quotes
        .list_for_work_order(&actor, work_order_id)
        .await?;
    Ok(Json(ApiResponse::success(quotes)))
}

/// Reading a quote past its deadline records the expiry.
pub async fn get_quote(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state.services.quotes.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(quote)))
}

pub async fn update_quote_costs(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuoteCostsInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state
        .services
        .quotes
        .update_costs(&actor, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}

pub async fn approve_quote(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state.services.quotes.approve(&actor, id).await?;
    Ok(Json(ApiResponse::success(quote)))
}

pub async fn reject_quote(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    payload: Option<Json<RejectQuoteRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let quote = state.services.quotes.reject(&actor, id, reason).await?;
    Ok(Json(ApiResponse::success(quote)))
}

/// Decision on the work order's current quote.
pub async fn approve_current_quote(
    State(state): State<AppState>,
    actor: Actor,
    Path(work_order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state
        .services
        .quotes
        .approve_current(&actor, work_order_id)
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}

pub async fn reject_current_quote(
    State(state): State<AppState>,
    actor: Actor,
    Path(work_order_id): Path<Uuid>,
    payload: Option<Json<RejectQuoteRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let quote = state
        .services
        .quotes
        .reject_current(&actor, work_order_id, reason)
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}
