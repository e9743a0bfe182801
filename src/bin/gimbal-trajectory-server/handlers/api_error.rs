use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use gimbal_trajectory::{api::ErrorResponse, Error};

/// Every failure is answered with `{"error": message}`
#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Validation(msg) => {
                tracing::warn!("{}", msg);
                ApiError::BadRequest(msg)
            }
            e @ (Error::Expression(_) | Error::TrajFile(_)) => {
                tracing::warn!("{}", e);
                ApiError::BadRequest(e.to_string())
            }
            e => {
                tracing::error!("{}", e);
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        tracing::error!("worker task failed: {}", e);
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, error),
            ApiError::Internal(error) => (StatusCode::INTERNAL_SERVER_ERROR, error),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Run CPU heavy work off the async executor
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> gimbal_trajectory::Result<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
