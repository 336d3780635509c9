//! HTTP error mapping.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use nexus_protocol::AccessError;
use nexus_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by REST handlers. Bodies use the `{"detail": ...}`
/// shape clients already parse.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Access(AccessError::Unauthenticated) => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::Access(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Store(StoreError::DuplicateEmail) => {
                (StatusCode::BAD_REQUEST, "Email already registered".into())
            }
            ApiError::Store(
                StoreError::AlreadyMember | StoreError::LastAdmin | StoreError::PersonalWorkspace,
            ) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Store(err) => {
                error!("store error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".into())
            }
        };

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
