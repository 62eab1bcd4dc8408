use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use service::{ErrorStatus, ServiceError};
use tracing::error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// A [`ServiceError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

fn status_code(status: ErrorStatus) -> StatusCode {
    match status {
        ErrorStatus::NotFound => StatusCode::NOT_FOUND,
        ErrorStatus::Conflict => StatusCode::CONFLICT,
        ErrorStatus::BadRequest => StatusCode::BAD_REQUEST,
        ErrorStatus::Forbidden => StatusCode::FORBIDDEN,
        ErrorStatus::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let detail = match status {
            ErrorStatus::Internal => {
                error!("Request failed: {}", self.0);
                "Internal server error".to_string()
            }
            _ => self.0.to_string(),
        };
        (status_code(status), Json(ErrorBody { detail })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
