//! Static file responses.
//!
//! # Responsibilities
//! - Map a request path onto the public root
//! - Refuse private (`_`-prefixed) files and anything outside the root
//! - Serve binaries byte for byte and deflate everything else
//!
//! # Design Decisions
//! - The root and the candidate are both canonicalized, so symlinks cannot
//!   lead outside the root
//! - A missing file and an unsafe path look the same to the client (404)

use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::Response;
use percent_encoding::percent_decode_str;

use crate::http::response;
use crate::routing::target::RequestTarget;

/// Extensions whose content is already compressed.
const PRECOMPRESSED: &[&str] = &[
    "png", "jpg", "jpeg", "jpe", "gif", "ico", "tif", "tiff", "webp", "flv", "woff", "woff2",
    "gz", "zip",
];

/// Content type of a file and whether it is served as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeClass {
    pub content_type: String,
    pub precompressed: bool,
}

/// Classify a file by extension.
pub fn classify(path: &Path) -> MimeClass {
    let ext = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let guess = mime_guess::from_ext(&ext).first_or_octet_stream();

    let textual = guess.type_().as_str() == "text"
        || matches!(
            guess.essence_str(),
            "application/javascript" | "application/json" | "application/xml"
        );
    let content_type = if textual {
        format!("{}; charset=utf-8", guess.essence_str())
    } else {
        guess.essence_str().to_string()
    };

    MimeClass {
        content_type,
        precompressed: PRECOMPRESSED.contains(&ext.as_str()),
    }
}

/// Files under one public root.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Respond to a GET or HEAD for `target`.
    pub fn serve(&self, method: &Method, target: &RequestTarget) -> Response {
        let Some(path) = self.candidate(target.path()) else {
            return response::not_found(target.as_str());
        };
        let Some(path) = self.confine(&path) else {
            tracing::debug!(target = %target.as_str(), "Refusing path outside public root");
            return response::not_found(target.as_str());
        };

        let class = classify(&path);
        let head = method == Method::HEAD;

        let result = if class.precompressed {
            binary(&path, &class, head)
        } else {
            text(&path, &class, head)
        };

        match result {
            Ok(response) => response,
            Err(e) if e.kind() == ErrorKind::NotFound => response::not_found(target.as_str()),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read static file");
                response::server_error(&e.to_string())
            }
        }
    }

    /// Filesystem path for a URL path, or `None` for private or malformed
    /// paths.
    fn candidate(&self, url_path: &str) -> Option<PathBuf> {
        let mut segments = Vec::new();
        for raw in url_path.split('/').filter(|s| !s.is_empty()) {
            let segment = percent_decode_str(raw).decode_utf8().ok()?;
            if segment == ".." || segment.contains(['/', '\\', '\0']) {
                return None;
            }
            segments.push(segment.into_owned());
        }

        let directory = url_path.ends_with('/');
        if !directory {
            if let Some(last) = segments.last() {
                if last.starts_with('_') {
                    return None;
                }
            }
        }

        let mut path = self.root.clone();
        path.extend(&segments);
        if directory {
            path.push("index.html");
        }
        Some(path)
    }

    /// Canonical form of `path` if it stays inside the canonical root.
    fn confine(&self, path: &Path) -> Option<PathBuf> {
        let root = fs::canonicalize(&self.root).ok()?;
        let path = fs::canonicalize(path).ok()?;
        if path.starts_with(&root) && path.is_file() {
            Some(path)
        } else {
            None
        }
    }
}

fn binary(path: &Path, class: &MimeClass, head: bool) -> std::io::Result<Response> {
    if head {
        let size = fs::metadata(path)?.len();
        return Ok(file_response(class, size, None, Body::empty()));
    }
    let bytes = fs::read(path)?;
    let size = bytes.len() as u64;
    Ok(file_response(class, size, None, Body::from(bytes)))
}

fn text(path: &Path, class: &MimeClass, head: bool) -> std::io::Result<Response> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Ok(file_response(class, 0, None, Body::empty()));
    }

    let compressed = response::deflate(&bytes)?;
    let size = compressed.len() as u64;
    let body = if head { Body::empty() } else { Body::from(compressed) };
    Ok(file_response(class, size, Some(response::DEFLATE), body))
}

fn file_response(class: &MimeClass, size: u64, encoding: Option<&'static str>, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&class.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    if let Some(encoding) = encoding {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let html = classify(Path::new("index.HTML"));
        assert_eq!(html.content_type, "text/html; charset=utf-8");
        assert!(!html.precompressed);

        let png = classify(Path::new("logo.png"));
        assert_eq!(png.content_type, "image/png");
        assert!(png.precompressed);

        let json = classify(Path::new("data.json"));
        assert_eq!(json.content_type, "application/json; charset=utf-8");

        let unknown = classify(Path::new("blob"));
        assert_eq!(unknown.content_type, "application/octet-stream");
        assert!(!unknown.precompressed);
    }

    #[test]
    fn test_candidate_paths() {
        let files = StaticFiles::new("/srv/www");
        assert_eq!(files.candidate("/"), Some(PathBuf::from("/srv/www/index.html")));
        assert_eq!(
            files.candidate("/docs/"),
            Some(PathBuf::from("/srv/www/docs/index.html"))
        );
        assert_eq!(
            files.candidate("/a%20b.txt"),
            Some(PathBuf::from("/srv/www/a b.txt"))
        );
        assert_eq!(files.candidate("/_partial.html"), None);
        assert_eq!(files.candidate("/dir/_nav.html"), None);
        assert_eq!(files.candidate("/a%2Fb"), None);
        assert_eq!(files.candidate("/%2e%2e"), None);
        // Underscore directories are only private as the final segment.
        assert!(files.candidate("/_drafts/").is_some());
    }
}
