//! Error responses for the HTTP surface.
//!
//! Every failed request answers with the mapped status code and a one-line
//! ASCII body, `error=<message>`.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::ascii::AsciiError;
use crate::infra::LogError;

/// An error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    /// Set only for 405 responses.
    allow: Option<Method>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            allow: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            allow: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            allow: None,
        }
    }

    /// Wrong method on a known endpoint; carries the `Allow` header.
    pub fn method_not_allowed(allow: Method) -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: "method not allowed".to_string(),
            allow: Some(allow),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AsciiError> for ApiError {
    fn from(err: AsciiError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<LogError> for ApiError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Ascii(_)
            | LogError::Codec(_)
            | LogError::Proof(_)
            | LogError::InvalidCosignature
            | LogError::Timeout
            | LogError::NotIncluded => Self::bad_request(err.to_string()),
            LogError::NoCosignatures
            | LogError::Signing(_)
            | LogError::Backend(_)
            | LogError::Transport(_)
            | LogError::Config(_)
            | LogError::Io(_)
            | LogError::Internal(_) => Self::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = format!("error={}\n", self.message);
        let mut response = (self.status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        if let Some(method) = self.allow {
            if let Ok(value) = HeaderValue::from_str(method.as_str()) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}
