use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::db::StoreError;
use crate::storage::BlobError;
use crate::validation::FieldErrors;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(FieldErrors),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Blob(#[from] BlobError),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: Value,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) | ApiError::Blob(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            ApiError::Validation(errors) => {
                tracing::warn!("Validation failed: {:?}", errors);
                serde_json::to_value(errors).unwrap_or(Value::Null)
            }
            ApiError::NotFound(_) => Value::String(self.to_string()),
            ApiError::BadRequest(message) => {
                tracing::warn!("Rejected request: {}", message);
                Value::String(message.clone())
            }
            ApiError::Store(_) | ApiError::Blob(_) => {
                tracing::error!("Request failed: {}", self);
                Value::String(self.to_string())
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error,
        });

        (status, body).into_response()
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let mut fields = FieldErrors::new();
        fields.add("age", "The age field must be an integer.");

        assert_eq!(ApiError::Validation(fields).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::NotFound("Player").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Store(StoreError::Decode("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Blob(BlobError::InvalidPath("..".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_resource() {
        assert_eq!(ApiError::NotFound("Event").to_string(), "Event not found");
    }
}
