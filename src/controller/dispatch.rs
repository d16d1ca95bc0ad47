//! Page controller and the request dispatch protocol.
//!
//! # Responsibilities
//! - Own the master page and the callbacks attached to it
//! - Resolve a request path to a form callback (or the default callback)
//! - Run the callback against the worker's copy of the page
//! - Render, compress and wrap the result in a response
//!
//! # Design Decisions
//! - Configuration methods take `&mut self`; once a controller is registered
//!   with a router it is shared immutably and the master never changes
//! - Per-request mutation only ever touches a worker's fork
//! - `dispatch` is the failure boundary: errors and panics become a 500

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use thiserror::Error;
use url::Url;

use crate::controller::callback::{BoxError, Callback};
use crate::controller::worker::WorkerContext;
use crate::html::{CanonicalError, Page, RenderError, StructureError, Tag};
use crate::http::response;
use crate::observability::metrics;

static CONTROLLER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an installed master page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerId(u64);

impl ControllerId {
    fn next() -> Self {
        Self(CONTROLLER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controller-{}", self.0)
    }
}

/// Failures inside a single dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("callback was not set for the form answering {0:?}")]
    MissingCallback(String),

    #[error("callback failed: {0}")]
    Callback(#[source] BoxError),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to compress page: {0}")]
    Compress(#[from] std::io::Error),

    #[error("dispatch panicked: {0}")]
    Panicked(String),
}

/// Status and, unless suppressed, the rendered markup.
struct Rendered {
    status: StatusCode,
    markup: Option<String>,
}

/// Serves one page whose forms are bound to callbacks.
#[derive(Debug)]
pub struct Controller {
    id: ControllerId,
    master: Page,
    unhandled_status: StatusCode,
}

impl Controller {
    /// Install `tree` as the master page.
    pub fn new(tree: Tag) -> Result<Self, StructureError> {
        Ok(Self {
            id: ControllerId::next(),
            master: Page::install(tree)?,
            unhandled_status: StatusCode::OK,
        })
    }

    /// Replace the master page.
    ///
    /// The default callback and canonical origin carry over. The controller
    /// gets a new identity, so copies forked from the old tree are never
    /// reused.
    pub fn install_tree(&mut self, tree: Tag) -> Result<(), StructureError> {
        let mut master = Page::install(tree)?;
        if let Some(default) = self.master.index().default_callback() {
            master.index_mut().set_default_callback(default.clone());
        }
        master.set_canonical_origin(self.master.canonical_origin().cloned());

        self.master = master;
        self.id = ControllerId::next();
        Ok(())
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn master(&self) -> &Page {
        &self.master
    }

    /// Status returned when a path matches no form and no default callback
    /// is set. Defaults to 200.
    pub fn with_unhandled_status(mut self, status: StatusCode) -> Self {
        self.unhandled_status = status;
        self
    }

    pub fn unhandled_status(&self) -> StatusCode {
        self.unhandled_status
    }

    /// Callback for paths that match no form action.
    pub fn set_default_callback(&mut self, callback: Callback) {
        self.master.index_mut().set_default_callback(callback);
    }

    /// Attach `callback` to the tag with the given id.
    pub fn set_form_callback(&mut self, id: &str, callback: Callback) -> Result<(), StructureError> {
        self.master.set_callback_by_id(id, callback)
    }

    pub(crate) fn set_canonical_origin(&mut self, origin: Option<Url>) {
        self.master.set_canonical_origin(origin);
    }

    /// Set the title on this worker's copy.
    pub fn set_title(&self, ctx: &mut WorkerContext, title: impl Into<String>) -> Result<(), StructureError> {
        ctx.page_for(self).set_title(title)
    }

    /// Set the meta description on this worker's copy.
    pub fn set_description(
        &self,
        ctx: &mut WorkerContext,
        description: impl Into<String>,
    ) -> Result<(), StructureError> {
        ctx.page_for(self).set_description(description)
    }

    /// Set the canonical link on this worker's copy.
    pub fn set_link_rel_canonical(&self, ctx: &mut WorkerContext, target: &str) -> Result<(), CanonicalError> {
        ctx.page_for(self).set_link_rel_canonical(target)
    }

    /// Forget this worker's copy; the next access forks the master again.
    pub fn reset_local(&self, ctx: &mut WorkerContext) -> bool {
        ctx.discard(self.id)
    }

    /// Handle one request against the worker's copy of the page.
    ///
    /// Never fails: any error, including a panicking callback, yields a
    /// generic 500. The worker's copy is dropped after a panic, or when
    /// callbacks left it with a tree that can no longer be indexed.
    pub fn dispatch(&self, ctx: &mut WorkerContext, url: &Url) -> Response {
        let mut headers = HeaderMap::new();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(ctx, url, &mut headers)));
        let result = match outcome {
            Ok(Err(DispatchError::Structure(e))) => {
                ctx.discard(self.id);
                Err(DispatchError::Structure(e))
            }
            Ok(result) => result,
            Err(payload) => {
                ctx.discard(self.id);
                Err(DispatchError::Panicked(panic_message(payload.as_ref())))
            }
        };

        let response = result.and_then(|rendered| match rendered.markup {
            None => Ok(response::headers_only(rendered.status, headers)),
            Some(markup) => Ok(response::page(rendered.status, headers, markup.as_bytes())?),
        });

        match response {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    worker = %ctx.id(),
                    controller = %self.id,
                    path = %url.path(),
                    error = %e,
                    "Dispatch failed"
                );
                metrics::record_dispatch("error");
                response::internal_error()
            }
        }
    }

    fn run(&self, ctx: &mut WorkerContext, url: &Url, headers: &mut HeaderMap) -> Result<Rendered, DispatchError> {
        let page = ctx.page_for(self);
        echo_query(page, url);
        page.refresh()?;

        let path = url.path();
        let status = match page.form_path(path) {
            Some(form) => {
                let callback = page
                    .tag(&form)
                    .and_then(Tag::callback)
                    .cloned()
                    .ok_or_else(|| DispatchError::MissingCallback(path.to_string()))?;
                metrics::record_dispatch("form");
                callback(page, url, headers).map_err(DispatchError::Callback)?
            }
            None => match page.index().default_callback().cloned() {
                Some(callback) => {
                    metrics::record_dispatch("default");
                    callback(page, url, headers).map_err(DispatchError::Callback)?
                }
                None => {
                    tracing::warn!(
                        controller = %self.id,
                        path = %path,
                        status = %self.unhandled_status,
                        "No form or default callback for path, serving page as is"
                    );
                    metrics::record_dispatch("unhandled");
                    self.unhandled_status
                }
            },
        };

        if status.is_redirection() {
            return Ok(Rendered { status, markup: None });
        }

        Ok(Rendered {
            status,
            markup: Some(page.render()?),
        })
    }
}

/// Copy each query parameter into the `value` attribute of the tag indexed
/// under the parameter's name.
fn echo_query(page: &mut Page, url: &Url) {
    for (name, value) in url.query_pairs() {
        page.set_value_by_name(&name, value.into_owned());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
