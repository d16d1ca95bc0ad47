//! Server-side markup model.
//!
//! # Data Flow
//! ```text
//! Tag tree (authored in code)
//!     → page.rs (install: take ownership, index once)
//!     → document.rs (id / name / form-action maps, singleton slots)
//!     → Page (master copy, forked per worker)
//!
//! Per request:
//!     callbacks mutate the worker's Page
//!     → tag.rs (serialize depth first)
//!     → "<!DOCTYPE html>\n" + markup
//! ```
//!
//! # Design Decisions
//! - The tree is an owning recursive sum type; the index stores positions,
//!   never references
//! - Structural problems fail at install time, not per request
//! - Only quotes are escaped in attribute values

pub mod document;
pub mod page;
pub mod tag;

pub use document::{Document, StructureError, TagPath};
pub use page::{CanonicalError, Page, DOCTYPE};
pub use tag::{AttrValue, Attrs, RenderError, Tag, TagContent, TagType};
