//! Request extraction.
//!
//! # Design Decisions
//! - An absent header and an empty header are both "missing"; the resolver decides
//! - A header with non-UTF-8 bytes is still a key (lossily decoded), never "missing"

use axum::http::HeaderMap;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Read the API key header, if present.
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// Correlation id set by the request-id middleware.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
