use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use veil_engine::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Missing or invalid x-user-id header")]
    Unauthenticated,

    #[error("Too many messages, slow down")]
    RateLimited,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Engine(e) => match e {
                EngineError::ChatNotFound | EngineError::MessageNotFound => {
                    (StatusCode::NOT_FOUND, self.to_string())
                }
                EngineError::NotAuthorized | EngineError::InvalidSender => {
                    (StatusCode::FORBIDDEN, self.to_string())
                }
                // The caller acted on stale state: refetch and re-decide.
                EngineError::InvalidState { .. } => (StatusCode::CONFLICT, self.to_string()),
                EngineError::NotEligible { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
                }
                EngineError::SameUser | EngineError::InvalidCursor(_) => {
                    (StatusCode::BAD_REQUEST, self.to_string())
                }
                EngineError::Store(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                ),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
