use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Error taxonomy crossing the API boundary. Internal store detail stays
/// in the logs; clients only ever see these shapes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("notification not found for this user")]
    Unauthorized,
    #[error("no admin is available to take the conversation")]
    NoAdminAvailable,
    #[error("backing store unavailable")]
    Transient(#[source] anyhow::Error),
}

impl Error {
    pub fn from_store(err: StoreError, entity: &'static str) -> Self {
        match err {
            StoreError::NotFound => Error::NotFound(entity),
            StoreError::Unavailable(source) => Error::Transient(source),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Error::Unauthorized => (StatusCode::FORBIDDEN, self.to_string()),
            Error::NoAdminAvailable => (StatusCode::CONFLICT, self.to_string()),
            Error::Transient(source) => {
                tracing::error!("store failure: {:#}", source);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "temporary backend failure, please retry".to_string(),
                )
            }
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
