//! Request-target validation.
//!
//! # Responsibilities
//! - Reject empty and non-absolute targets
//! - Reject `..` path segments before anything touches the filesystem
//! - Parse the target into a URL for controllers and file lookup
//!
//! # Design Decisions
//! - The `..` check runs on the raw target, because URL parsing would
//!   silently resolve dot segments away
//! - Percent-encoded dots and backslash separators count as well

use thiserror::Error;
use url::Url;

/// Why a target was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("Illegal request-target")]
    Illegal,

    #[error("request-target contains a \"..\" segment")]
    Traversal,
}

/// A validated origin-form request target.
#[derive(Debug, Clone)]
pub struct RequestTarget {
    raw: String,
    url: Url,
}

impl RequestTarget {
    pub fn parse(target: &str) -> Result<Self, TargetError> {
        if !target.starts_with('/') {
            return Err(TargetError::Illegal);
        }

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        if has_parent_segment(path) {
            return Err(TargetError::Traversal);
        }

        let mut url = Url::parse("http://localhost/").map_err(|_| TargetError::Illegal)?;
        url.set_path(path);
        url.set_query(query);

        Ok(Self {
            raw: target.to_string(),
            url,
        })
    }

    /// The target exactly as received.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Percent-encoded path; the key for controller lookup.
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

fn has_parent_segment(path: &str) -> bool {
    path.split(['/', '\\'])
        .any(|segment| segment.to_ascii_lowercase().replace("%2e", ".") == "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_origin_form() {
        let target = RequestTarget::parse("/search?q=a+b").unwrap();
        assert_eq!(target.path(), "/search");
        assert_eq!(target.url().query(), Some("q=a+b"));
        assert_eq!(target.as_str(), "/search?q=a+b");
    }

    #[test]
    fn test_rejects_empty_and_relative() {
        assert_eq!(RequestTarget::parse("").unwrap_err(), TargetError::Illegal);
        assert_eq!(RequestTarget::parse("index.html").unwrap_err(), TargetError::Illegal);
        assert_eq!(
            RequestTarget::parse("http://example.com/").unwrap_err(),
            TargetError::Illegal
        );
    }

    #[test]
    fn test_rejects_parent_segments() {
        for target in [
            "/../etc/passwd",
            "/a/../../b",
            "/a/..",
            "/%2e%2e/secret",
            "/.%2E/secret",
            "/a\\..\\b",
        ] {
            assert_eq!(
                RequestTarget::parse(target).unwrap_err(),
                TargetError::Traversal,
                "{target}"
            );
        }
    }

    #[test]
    fn test_dots_inside_names_are_fine() {
        assert!(RequestTarget::parse("/archive..2024.txt").is_ok());
        assert!(RequestTarget::parse("/.well-known/x").is_ok());
        // Only the path is checked.
        assert!(RequestTarget::parse("/search?q=..").is_ok());
    }
}
