//! HTTP error mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Errors returned by handlers. The body is always `{"error": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    Store(kgraph_core::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl ApiError {
    pub fn bad_parameter(name: &str) -> Self {
        ApiError::BadRequest(format!("Bad parameter: {}", name))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl From<kgraph_core::Error> for ApiError {
    fn from(err: kgraph_core::Error) -> Self {
        use kgraph_core::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(format!("Not found: {}", msg)),
            Error::TopicNotFound(id) => ApiError::NotFound(format!("Topic {} not found", id)),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Store(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Store(err) => {
                tracing::error!(subsystem = "api", error = %err, "Store operation failed");
                "Internal server error".to_string()
            }
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Conflict(msg) => msg,
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
