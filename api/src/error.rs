use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hcp_core::error::{self, ApiError};
use hcp_core::form::ValidationError;

use crate::store::StoreError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Unknown interaction id (404)
    NotFound { id: i64 },
    /// Database error (500)
    Database(sqlx::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.into()),
            received: None,
            docs_hint: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { id } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("Interaction with ID {id} not found"),
                    field: Some("id".to_string()),
                    received: Some(serde_json::Value::from(id)),
                    request_id,
                    docs_hint: Some(
                        "Look the record up with GET /v1/interactions/hcp/{name} to find its id."
                            .to_string(),
                    ),
                },
            ),
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound { id },
            StoreError::Database(err) => AppError::Database(err),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let (received, docs_hint) = match &err {
            ValidationError::InvalidDate { value } => (
                Some(serde_json::Value::String(value.clone())),
                "Dates may be YYYY-MM-DD, MM/DD/YYYY, 'Month D, YYYY', today or yesterday.",
            ),
            ValidationError::MissingRequired { .. } => {
                (None, "hcpName, interactionType and date are required.")
            }
        };
        AppError::Validation {
            message: err.to_string(),
            field: Some(err.field().as_str().to_string()),
            received,
            docs_hint: Some(docs_hint.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_404() {
        let response = AppError::from(StoreError::NotFound(7)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_maps_to_400() {
        let response = AppError::validation("hcpName is required", "hcpName").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
