use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name -> messages, rendered as-is in 400 bodies.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("permission denied: {0}")]
    Authorization(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Single-field validation failure.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field(NON_FIELD_ERRORS, message)
    }

    pub fn not_authenticated() -> Self {
        ApiError::Authentication("Authentication credentials were not provided.".into())
    }

    pub fn forbidden() -> Self {
        ApiError::Authorization("You do not have permission to perform this action.".into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::Conflict(message) => json!({ "error": message }),
            ApiError::Authentication(message) | ApiError::Authorization(message) => {
                json!({ "detail": message })
            }
            ApiError::NotFound => json!({ "detail": "Not found." }),
            ApiError::Storage(e) => {
                error!("[API] Storage failure: {:?}", e);
                json!({ "detail": "Internal server error" })
            }
            ApiError::Internal(reason) => {
                error!("[API] Internal failure: {}", reason);
                json!({ "detail": "Internal server error" })
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.error_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn validation_errors_are_keyed_by_field() {
        let (status, body) = body_of(ApiError::field("rating", "Rating must be between 1 and 5")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["rating"][0], "Rating must be between 1 and 5");
    }

    #[actix_web::test]
    async fn conflict_uses_error_key() {
        let (status, body) = body_of(ApiError::Conflict("duplicate".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "duplicate");
    }

    #[actix_web::test]
    async fn storage_errors_hide_details() {
        let (status, body) = body_of(ApiError::Storage(rusqlite::Error::QueryReturnedNoRows)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Internal server error");
    }
}
