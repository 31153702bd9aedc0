use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Conflict", "Bad Request")
    pub error: String,
    /// Machine-readable error code (e.g. "invalid_transition")
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Current status of the entity, present for rejected transitions so the
    /// client can resynchronise its view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_status: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Cannot {action} {entity} {id} while it is {current_status}")]
    InvalidTransition {
        entity: &'static str,
        id: Uuid,
        current_status: String,
        action: &'static str,
    },

    #[error("Quote {quote_id} has expired; request a new quote")]
    QuoteExpired { quote_id: Uuid },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Builds an `InvalidTransition` from any displayable status.
    pub fn invalid_transition(
        entity: &'static str,
        id: Uuid,
        current_status: impl ToString,
        action: &'static str,
    ) -> Self {
        ServiceError::InvalidTransition {
            entity,
            id,
            current_status: current_status.to_string(),
            action,
        }
    }

    /// True for the typed, caller-recoverable outcomes. Everything else is an
    /// unexpected failure that deserves operator attention.
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            Self::DatabaseError(_) | Self::EventError(_) | Self::InternalError(_) | Self::Other(_)
        )
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. } | Self::ConcurrentModification(_) => {
                StatusCode::CONFLICT
            }
            Self::QuoteExpired { .. } => StatusCode::GONE,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::QuoteExpired { .. } => "quote_expired",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::ConcurrentModification(_) => "concurrency_conflict",
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "internal_error",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::ConcurrentModification(id) => format!(
                "Concurrent modification for ID {}; reload and retry",
                id
            ),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if !self.is_expected() {
            error!(error = %self, "request failed with internal error");
        }

        let current_status = match &self {
            ServiceError::InvalidTransition { current_status, .. } => Some(current_status.clone()),
            ServiceError::QuoteExpired { .. } => Some("Expired".to_string()),
            _ => None,
        };

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            current_status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::invalid_transition("work order", Uuid::nil(), "Requested", "complete")
                .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::QuoteExpired {
                quote_id: Uuid::nil()
            }
            .status_code(),
            StatusCode::GONE
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::ConcurrentModification(Uuid::nil()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InternalError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("connection refused".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::InternalError("stack".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::NotFound("Work order 1 not found".into()).response_message(),
            "Not found: Work order 1 not found"
        );
    }

    #[test]
    fn only_infrastructure_failures_are_unexpected() {
        assert!(ServiceError::ValidationError("x".into()).is_expected());
        assert!(ServiceError::ConcurrentModification(Uuid::nil()).is_expected());
        assert!(!ServiceError::InternalError("x".into()).is_expected());
        assert!(!ServiceError::DatabaseError(DbErr::Custom("x".into())).is_expected());
    }

    #[tokio::test]
    async fn invalid_transition_response_carries_current_status() {
        let response =
            ServiceError::invalid_transition("work order", Uuid::nil(), "Requested", "complete")
                .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.code, "invalid_transition");
        assert_eq!(payload.current_status.as_deref(), Some("Requested"));
    }
}
