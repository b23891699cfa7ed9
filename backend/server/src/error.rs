use axum::{
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use scoring::ScoringError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid input: {0}")]
    Input(#[from] ScoringError),

    #[error("Storage unavailable: {0}, retry later")]
    StorageUnavailable(String),

    #[error("Training queue is full, retry later")]
    QueueFull,

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StorageUnavailable(_) | AppError::QueueFull)
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::StorageUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::InternalError(Box::new(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::Input { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::StorageUnavailable { .. } | AppError::QueueFull => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let retryable = self.is_retryable();
        let mut response = (status, self.to_string()).into_response();

        if retryable {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }

        response
    }
}
