//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, request-target)
//!     → router.rs (method check, controller lookup)
//!     → target.rs (reject illegal and ".." targets)
//!     → controller dispatch   (GET on a registered path)
//!     → files.rs              (everything else)
//!
//! Route Registration (at startup):
//!     RouterBuilder.register(path, Controller)
//!     → set canonical origin on each controller
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - Exact path match only
//! - A refused path and a missing file are both 404

pub mod files;
pub mod router;
pub mod target;

pub use files::{classify, MimeClass, StaticFiles};
pub use router::{Router, RouterBuilder};
pub use target::{RequestTarget, TargetError};
