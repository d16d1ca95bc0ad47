//! Request callbacks attached to tags.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use url::Url;

use crate::html::Page;

/// Error type returned by callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Handler invoked for a request routed to a form (or the default slot).
///
/// It receives the worker's own copy of the page to mutate, the request URL
/// and a header sink, and returns the response status. Callbacks are shared
/// by reference count between the master page and every fork, so any state
/// they capture is shared too.
pub type Callback =
    Arc<dyn Fn(&mut Page, &Url, &mut HeaderMap) -> Result<StatusCode, BoxError> + Send + Sync>;

/// Wrap a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&mut Page, &Url, &mut HeaderMap) -> Result<StatusCode, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}
