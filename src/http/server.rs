//! HTTP server setup and worker threads.
//!
//! # Responsibilities
//! - Create the Axum app for one worker, with middleware (tracing, timeout,
//!   request ID)
//! - Run N worker threads, each with its own single-threaded runtime
//! - Accept on clones of one shared listening socket
//! - Hand every request to the site router with the worker's context
//! - Stop all workers on the shutdown broadcast
//!
//! # Design Decisions
//! - A connection is served start to finish by the worker that accepted it,
//!   so a worker's page copies never cross threads
//! - The context mutex is only taken inside synchronous code and never held
//!   across an await

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router as AxumRouter,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::controller::WorkerContext;
use crate::http::request::{self, request_id_header, MakeRequestUuid};
use crate::lifecycle::Shutdown;
use crate::routing::Router;

/// State injected into the handler of one worker.
#[derive(Clone)]
struct WorkerState {
    router: Arc<Router>,
    context: Arc<Mutex<WorkerContext>>,
}

/// Multi-worker HTTP server for a site.
pub struct HttpServer {
    router: Arc<Router>,
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(config: ServerConfig, router: Router) -> Self {
        Self {
            router: Arc::new(router),
            config,
        }
    }

    /// Build the Axum app served by one worker.
    #[allow(deprecated)]
    pub fn build_app(
        router: Arc<Router>,
        context: Arc<Mutex<WorkerContext>>,
        request_timeout: Duration,
    ) -> AxumRouter {
        let state = WorkerState { router, context };
        AxumRouter::new()
            .fallback(site_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
    }

    /// Start the worker threads on `listener`.
    ///
    /// Every worker subscribes to `shutdown` before this returns, so a
    /// trigger issued afterwards reaches all of them.
    pub fn spawn(self, listener: std::net::TcpListener, shutdown: &Shutdown) -> io::Result<ServerHandle> {
        let local_addr = listener.local_addr()?;
        let workers = self.config.listener.workers.max(1);
        let timeout = Duration::from_secs(self.config.timeouts.request_secs);

        tracing::info!(
            address = %local_addr,
            workers,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let listener = listener.try_clone()?;
            let router = Arc::clone(&self.router);
            let signal = shutdown.subscribe();

            let handle = std::thread::Builder::new()
                .name(format!("vein-worker-{index}"))
                .spawn(move || run_worker(listener, router, timeout, signal))?;
            handles.push(handle);
        }

        Ok(ServerHandle {
            local_addr,
            workers: handles,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}

/// Running workers.
pub struct ServerHandle {
    local_addr: SocketAddr,
    workers: Vec<JoinHandle<io::Result<()>>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker to stop. Returns the first worker error.
    pub fn join(self) -> io::Result<()> {
        let mut result = Ok(());
        for handle in self.workers {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("worker thread panicked")));
            if let Err(e) = outcome {
                tracing::error!(error = %e, "Worker stopped with an error");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        tracing::info!("HTTP server stopped");
        result
    }
}

fn run_worker(
    listener: std::net::TcpListener,
    router: Arc<Router>,
    timeout: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;

        let context = WorkerContext::new();
        tracing::info!(worker = %context.id(), "Worker accepting connections");

        let app = HttpServer::build_app(router, Arc::new(Mutex::new(context)), timeout);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
    })
}

async fn site_handler(State(state): State<WorkerState>, request: Request<Body>) -> Response {
    tracing::debug!(
        request_id = %request::request_id(&request),
        method = %request.method(),
        target = %request.uri(),
        "Serving request"
    );
    respond(&state, &request)
}

fn respond(state: &WorkerState, request: &Request<Body>) -> Response {
    let mut context = match state.context.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Worker context lock poisoned, dropping local pages");
            let mut guard = poisoned.into_inner();
            guard.clear();
            guard
        }
    };
    state.router.handle(&mut context, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{callback, Controller};
    use crate::html::{Tag, TagType};
    use axum::http::{header, StatusCode};
    use tower::ServiceExt;

    fn app(root: &std::path::Path) -> AxumRouter {
        let tree = Tag::new(TagType::Html)
            .child(Tag::new(TagType::Head).child(Tag::new(TagType::Title).text("t")))
            .child(Tag::new(TagType::Body));
        let mut controller = Controller::new(tree).unwrap();
        controller.set_default_callback(callback(|_, _, _| Ok(StatusCode::OK)));

        let router = Router::builder(root).register("/", controller).build();
        HttpServer::build_app(
            Arc::new(router),
            Arc::new(Mutex::new(WorkerContext::new())),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_page_response_has_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "deflate");
        assert!(response.headers().contains_key(request::X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_client_request_id_is_echoed() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(
                Request::get("/missing.txt")
                    .header(request::X_REQUEST_ID, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[request::X_REQUEST_ID], "req-42");
    }

    #[tokio::test]
    async fn test_post_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::post("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_workers_stop_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.listener.workers = 3;
        config.site.public_root = dir.path().to_path_buf();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let router = Router::builder(dir.path()).build();
        let shutdown = Shutdown::new();

        let handle = HttpServer::new(config, router).spawn(listener, &shutdown).unwrap();
        assert_eq!(handle.worker_count(), 3);
        assert_ne!(handle.local_addr().port(), 0);

        shutdown.trigger();
        handle.join().unwrap();
    }
}
