use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mixdeck_core::MixError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Mix(#[from] MixError),
}

impl ServerError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::Mix(MixError::StemNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::Mix(MixError::NoStems | MixError::Decode { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::Mix(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
