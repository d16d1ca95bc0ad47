//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (accepted by one worker)
//!     → server.rs (Axum app, middleware, worker context)
//!     → request.rs (request ID)
//!     → routing layer (page or file)
//!     → response.rs (deflate, canned errors)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{HttpServer, ServerHandle};
