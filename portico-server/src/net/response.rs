use crate::services::ServiceError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

/// `{ status, message, data? }` envelope used by the profile endpoints.
#[derive(Debug, Serialize)]
pub struct StatusBody<T: Serialize> {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl StatusBody<()> {
    pub fn success(message: &'static str) -> Self {
        Self { status: "success", message, data: None }
    }
}

impl<T: Serialize> StatusBody<T> {
    pub fn success_with(message: &'static str, data: T) -> Self {
        Self { status: "success", message, data: Some(data) }
    }
}

/// `{ data }` envelope for reads.
#[derive(Debug, Serialize)]
pub struct DataBody<T: Serialize> {
    pub data: T,
}

fn error_status(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Validation(messages) => (StatusCode::FORBIDDEN, Json(messages)).into_response(),
            ServiceError::CredentialMismatch => {
                (StatusCode::FORBIDDEN, Json(json!([{ "message": self.to_string() }]))).into_response()
            }
            ServiceError::Upload(upload) => (StatusCode::BAD_REQUEST, Json(upload)).into_response(),
            ServiceError::CurrentPasswordMismatch | ServiceError::Persistence(_) | ServiceError::MalformedBody => {
                error_status(StatusCode::BAD_REQUEST, self.to_string())
            }
            ServiceError::PayloadTooLarge => error_status(StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            ServiceError::Unauthorized => error_status(StatusCode::UNAUTHORIZED, self.to_string()),
            ServiceError::NotFound => StatusCode::NOT_FOUND.into_response(),
        }
    }
}
