use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize)]
pub struct AppSuccess {
    pub status: u16,
    pub message: String,
    pub data: serde_json::Value,
}

impl AppSuccess {
    pub fn new(status: StatusCode, message: &str, data: serde_json::Value) -> Self {
        Self { status: status.as_u16(), message: message.to_string(), data }
    }
}

impl IntoResponse for AppSuccess {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Wrapper around `anyhow::Error` so handlers can use `?` freely.
#[derive(Debug)]
pub struct AppError(pub StatusCode, pub anyhow::Error);

impl AppError {
    pub fn new(status: StatusCode, err: anyhow::Error) -> Self {
        Self(status, err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("CODE: {}, MESSAGE: {}", self.0.as_u16(), self.1);
        let body = json!({
            "status": self.0.as_u16(),
            "message": self.1.to_string(),
        });
        (self.0, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(StatusCode::BAD_REQUEST, err.into())
    }
}
