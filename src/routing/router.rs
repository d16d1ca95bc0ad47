//! Request classification and dispatch.
//!
//! # Responsibilities
//! - Store controllers by exact path
//! - Classify each request as page (controller) or file
//! - Reject bad methods and targets before any lookup
//!
//! # Design Decisions
//! - Built once through `RouterBuilder`, immutable afterwards (shared via
//!   Arc, no locks); registering after the server starts is not expressible
//! - Exact string match on the percent-encoded path, no patterns
//! - Only GET reaches controllers; HEAD always goes to the file side

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{Method, Request};
use axum::response::Response;
use url::Url;

use crate::controller::{Controller, WorkerContext};
use crate::http::response;
use crate::observability::metrics;
use crate::routing::files::StaticFiles;
use crate::routing::target::{RequestTarget, TargetError};

/// Collects routes before serving starts.
pub struct RouterBuilder {
    public_root: PathBuf,
    canonical_origin: Option<Url>,
    routes: Vec<(Vec<String>, Controller)>,
}

impl RouterBuilder {
    pub fn new(public_root: impl Into<PathBuf>) -> Self {
        Self {
            public_root: public_root.into(),
            canonical_origin: None,
            routes: Vec::new(),
        }
    }

    /// Origin that relative canonical links resolve against.
    pub fn canonical_origin(mut self, origin: Url) -> Self {
        self.canonical_origin = Some(origin);
        self
    }

    /// Serve `controller` at `path`.
    pub fn register(self, path: impl Into<String>, controller: Controller) -> Self {
        self.register_all([path.into()], controller)
    }

    /// Serve one `controller` at several paths, typically the page itself
    /// and the actions of its forms.
    pub fn register_all<I, S>(mut self, paths: I, controller: Controller) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths = paths.into_iter().map(Into::into).collect();
        self.routes.push((paths, controller));
        self
    }

    /// Freeze the route table.
    pub fn build(self) -> Router {
        let mut controllers = HashMap::new();
        for (paths, mut controller) in self.routes {
            controller.set_canonical_origin(self.canonical_origin.clone());
            let controller = Arc::new(controller);
            for path in paths {
                tracing::debug!(path = %path, controller = %controller.id(), "Route registered");
                if controllers.insert(path.clone(), Arc::clone(&controller)).is_some() {
                    tracing::warn!(path = %path, "Route registered twice, keeping the last one");
                }
            }
        }

        tracing::info!(
            routes = controllers.len(),
            public_root = %self.public_root.display(),
            "Router built"
        );

        Router {
            files: StaticFiles::new(self.public_root),
            controllers,
        }
    }
}

/// Immutable route table plus the static file root.
#[derive(Debug)]
pub struct Router {
    files: StaticFiles,
    controllers: HashMap<String, Arc<Controller>>,
}

impl Router {
    pub fn builder(public_root: impl Into<PathBuf>) -> RouterBuilder {
        RouterBuilder::new(public_root)
    }

    pub fn controller(&self, path: &str) -> Option<&Controller> {
        self.controllers.get(path).map(Arc::as_ref)
    }

    pub fn files(&self) -> &StaticFiles {
        &self.files
    }

    /// Answer `request` using the worker's context.
    pub fn handle<B>(&self, ctx: &mut WorkerContext, request: &Request<B>) -> Response {
        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_default();
        self.respond(ctx, request.method(), target)
    }

    /// Answer a request given its method and raw target.
    pub fn respond(&self, ctx: &mut WorkerContext, method: &Method, target: &str) -> Response {
        let (kind, response) = self.route(ctx, method, target);
        tracing::debug!(
            worker = %ctx.id(),
            method = %method,
            target = %target,
            kind,
            status = %response.status(),
            "Request handled"
        );
        metrics::record_request(kind, response.status().as_u16());
        response
    }

    fn route(&self, ctx: &mut WorkerContext, method: &Method, raw: &str) -> (&'static str, Response) {
        if method != Method::GET && method != Method::HEAD {
            return ("rejected", response::bad_request("Unknown HTTP-method"));
        }

        let target = match RequestTarget::parse(raw) {
            Ok(target) => target,
            Err(TargetError::Illegal) => {
                return ("rejected", response::bad_request("Illegal request-target"));
            }
            Err(TargetError::Traversal) => return ("rejected", response::not_found(raw)),
        };

        if method == Method::GET {
            if let Some(controller) = self.controllers.get(target.path()) {
                return ("page", controller.dispatch(ctx, target.url()));
            }
        }

        ("file", self.files.serve(method, &target))
    }
}
