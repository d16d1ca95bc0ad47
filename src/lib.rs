//! Server-side HTML pages and static files over a multi-worker HTTP server.

pub mod config;
pub mod controller;
pub mod html;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod site;

pub use config::schema::ServerConfig;
pub use controller::{callback, Controller, WorkerContext};
pub use html::{Page, Tag, TagType};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::Router;
