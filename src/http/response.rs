//! Response assembly.
//!
//! # Responsibilities
//! - Deflate response bodies (zlib stream, as HTTP `deflate` expects)
//! - Build the canned 400/404/500 responses
//! - Attach collected headers and the default HTML content type
//!
//! # Design Decisions
//! - Empty bodies are never compressed and never carry `Content-Encoding`
//! - Error bodies are short HTML strings; they are not compressed

use std::io::Write;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Content type of rendered pages unless a callback sets another one.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Value of `Content-Encoding` for compressed bodies.
pub const DEFLATE: &str = "deflate";

/// Compress `bytes` into a zlib stream.
pub fn deflate(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// 400 with the reason as body.
pub fn bad_request(why: &str) -> Response {
    error_page(StatusCode::BAD_REQUEST, why.to_string())
}

/// 404 naming the requested target.
pub fn not_found(target: &str) -> Response {
    error_page(
        StatusCode::NOT_FOUND,
        format!("The resource '{}' was not found.", target),
    )
}

/// 500 carrying the underlying error message.
pub fn server_error(what: &str) -> Response {
    error_page(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("An error occurred: '{}'", what),
    )
}

/// 500 that reveals nothing about the failure.
pub fn internal_error() -> Response {
    error_page(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error".to_string(),
    )
}

fn error_page(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/html"))],
        body,
    )
        .into_response()
}

/// Status and headers only.
pub fn headers_only(status: StatusCode, headers: HeaderMap) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Rendered page response.
///
/// Sets the HTML content type unless `headers` already has one. A non-empty
/// `body` is deflated and marked with `Content-Encoding: deflate`.
pub fn page(status: StatusCode, mut headers: HeaderMap, body: &[u8]) -> std::io::Result<Response> {
    headers
        .entry(header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(HTML_CONTENT_TYPE));

    if body.is_empty() {
        return Ok(headers_only(status, headers));
    }

    let compressed = deflate(body)?;
    headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(DEFLATE));

    let mut response = Response::new(Body::from(compressed));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
