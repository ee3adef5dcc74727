//! Errors surfaced to API clients

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::types::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Client id absent from the table being queried
    #[error("SK_ID_CURR {0} not found in the dataset")]
    ClientNotFound(i64),

    /// Feature name not a column of the feature table
    #[error("Feature {0} not found in the dataset")]
    FeatureNotFound(String),

    /// Body is not JSON, or lacks a required field
    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),

    /// Model runtime failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ClientNotFound(_)
            | ApiError::FeatureNotFound(_)
            | ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidPayload(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
