//! Response building helpers for the admin API.

use http::{header, HeaderValue, Response, StatusCode};
use serde::Serialize;

/// Standard content types
pub mod content_type {
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const APPLICATION_JSON: &str = "application/json";
}

pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Build an HTTP response with an optional content type
    pub fn http(status: StatusCode, body: Vec<u8>, content_type: Option<&str>) -> Response<Vec<u8>> {
        let mut builder = Response::builder().status(status);

        if let Some(ct) = content_type {
            match HeaderValue::from_str(ct) {
                Ok(header_value) => {
                    builder = builder.header(header::CONTENT_TYPE, header_value);
                }
                Err(e) => {
                    log::error!("Invalid content type '{}': {}", ct, e);
                }
            }
        }

        builder.body(body).unwrap_or_else(|e| {
            log::error!("Failed to build response: {}", e);
            internal_server_error_fallback()
        })
    }

    /// Build a plain text error response
    pub fn error_http(status: StatusCode, message: &str) -> Response<Vec<u8>> {
        Self::http(
            status,
            message.as_bytes().to_vec(),
            Some(content_type::TEXT_PLAIN),
        )
    }

    /// Build a JSON response with the given status
    pub fn json<T: Serialize>(status: StatusCode, data: &T) -> Response<Vec<u8>> {
        match serde_json::to_vec(data) {
            Ok(json_body) => Self::http(status, json_body, Some(content_type::APPLICATION_JSON)),
            Err(e) => {
                log::error!("Failed to serialize JSON response: {}", e);
                Self::error_http(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "JSON serialization failed",
                )
            }
        }
    }
}

fn internal_server_error_fallback() -> Response<Vec<u8>> {
    let mut response = Response::new(b"Internal Server Error".to_vec());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Common error response helpers
pub struct CommonErrors;

impl CommonErrors {
    pub fn bad_request(message: &str) -> Response<Vec<u8>> {
        ResponseBuilder::error_http(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: &str) -> Response<Vec<u8>> {
        ResponseBuilder::error_http(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: &str) -> Response<Vec<u8>> {
        ResponseBuilder::error_http(StatusCode::NOT_FOUND, message)
    }

    pub fn method_not_allowed() -> Response<Vec<u8>> {
        ResponseBuilder::http(StatusCode::METHOD_NOT_ALLOWED, Vec::new(), None)
    }

    pub fn internal_server_error(message: &str) -> Response<Vec<u8>> {
        ResponseBuilder::error_http(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}
