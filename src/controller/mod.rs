//! Controller subsystem.
//!
//! # Data Flow
//! ```text
//! Configuration (before serving):
//!     Tag tree → Controller::new (install master page)
//!     → set_form_callback / set_default_callback (attach to master)
//!     → registered with the router, frozen behind Arc
//!
//! Per request (on the worker that owns the connection):
//!     dispatch(ctx, url)
//!     → worker.rs (fork master into ctx on first use)
//!     → echo query values into named tags
//!     → form-action lookup → callback(page, url, headers) → status
//!     → 3xx: headers only | else render → deflate → response
//! ```
//!
//! # Design Decisions
//! - Worker copies are addressed through an explicit `WorkerContext`
//! - Callbacks are reference counted and shared by every copy; they get the
//!   page to mutate as an argument instead of capturing it
//! - A path with no form and no default callback is logged, counted and
//!   answered with the controller's unhandled status (200 unless changed)

pub mod callback;
pub mod dispatch;
pub mod worker;

pub use callback::{callback, BoxError, Callback};
pub use dispatch::{Controller, ControllerId, DispatchError};
pub use worker::{WorkerContext, WorkerId};
