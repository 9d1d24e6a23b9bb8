use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::error;

use obstacle_common::ObstacleError;

/// Response wrapper for domain errors.
#[derive(Debug)]
pub struct ApiError(pub ObstacleError);

impl From<ObstacleError> for ApiError {
    fn from(e: ObstacleError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ObstacleError::Validation(_) => StatusCode::BAD_REQUEST,
            ObstacleError::NotFound(_) => StatusCode::NOT_FOUND,
            ObstacleError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ObstacleError::NoIdentityAvailable
            | ObstacleError::Config(_)
            | ObstacleError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            ObstacleError::NoIdentityAvailable | ObstacleError::Config(_) => {
                error!(error = %self.0, "Server misconfigured");
                "Server configuration error".to_string()
            }
            e if e.is_internal() => {
                error!(error = %e, "Request failed");
                "Internal error".to_string()
            }
            e => e.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
