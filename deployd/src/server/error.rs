//! Mapping of platform errors onto HTTP responses

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::errors::PlatformError;

/// Error returned by control API handlers
#[derive(Debug)]
pub enum ApiError {
    Platform(PlatformError),
    RateLimited(Duration),
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Platform(e) => match e {
                PlatformError::NotFound(_) => StatusCode::NOT_FOUND,
                PlatformError::Busy(_)
                | PlatformError::Conflict(_)
                | PlatformError::InvalidTransition(_) => StatusCode::CONFLICT,
                PlatformError::ValidationError(_) | PlatformError::JsonError(_) => {
                    StatusCode::BAD_REQUEST
                }
                PlatformError::PortExhaustion { .. }
                | PlatformError::SupervisorConnection(_) => StatusCode::SERVICE_UNAVAILABLE,
                PlatformError::SourceControlError(_) | PlatformError::HttpError(_) => {
                    StatusCode::BAD_GATEWAY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Platform(e) => e.to_string(),
            ApiError::RateLimited(_) => "Too many log requests, slow down".to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl From<PlatformError> for ApiError {
    fn from(err: PlatformError) -> Self {
        ApiError::Platform(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.message() }));
        let mut response = (status, body).into_response();

        if let ApiError::RateLimited(retry_after) = self {
            let secs = retry_after.as_secs().max(1).to_string();
            if let Ok(value) = HeaderValue::from_str(&secs) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
