//! Per-worker page copies.
//!
//! # Responsibilities
//! - Hold one forked page per controller for a single worker
//! - Fork lazily on first use, and again after a discard
//!
//! # Design Decisions
//! - The context is passed explicitly into dispatch instead of living in
//!   thread-local storage; one context belongs to one worker
//! - Nothing in a context is ever shared with another worker

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::controller::{Controller, ControllerId};
use crate::html::Page;
use crate::observability::metrics;

static WORKER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifier of a worker, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        Self(WORKER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Working copies of controller pages owned by one worker.
#[derive(Debug)]
pub struct WorkerContext {
    id: WorkerId,
    pages: HashMap<ControllerId, Page>,
}

impl WorkerContext {
    pub fn new() -> Self {
        Self {
            id: WorkerId::next(),
            pages: HashMap::new(),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// The local copy for `controller`, if one has been forked.
    pub fn page(&self, controller: ControllerId) -> Option<&Page> {
        self.pages.get(&controller)
    }

    /// The local copy for `controller`, forking the master page if needed.
    pub fn page_for(&mut self, controller: &Controller) -> &mut Page {
        let worker = self.id;
        self.pages.entry(controller.id()).or_insert_with(|| {
            tracing::debug!(worker = %worker, controller = %controller.id(), "Forking master page");
            metrics::record_page_fork();
            controller.master().fork()
        })
    }

    /// Drop the local copy for `controller`. Returns true if one existed.
    pub fn discard(&mut self, controller: ControllerId) -> bool {
        self.pages.remove(&controller).is_some()
    }

    /// Drop every local copy.
    pub fn clear(&mut self) {
        self.pages.clear();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl Default for WorkerContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::{Tag, TagType};

    fn controller() -> Controller {
        let tree = Tag::new(TagType::Html)
            .child(Tag::new(TagType::Head).child(Tag::new(TagType::Title).text("t")));
        Controller::new(tree).unwrap()
    }

    #[test]
    fn test_worker_ids_unique() {
        assert_ne!(WorkerContext::new().id(), WorkerContext::new().id());
    }

    #[test]
    fn test_fork_is_lazy_and_reused() {
        let controller = controller();
        let mut ctx = WorkerContext::new();
        assert!(ctx.page(controller.id()).is_none());

        ctx.page_for(&controller).set_title("local").unwrap();
        assert_eq!(ctx.len(), 1);

        // Same copy on the next access.
        let html = ctx.page_for(&controller).render().unwrap();
        assert!(html.contains("<title>local</title>"));
    }

    #[test]
    fn test_discard_forces_fresh_fork() {
        let controller = controller();
        let mut ctx = WorkerContext::new();
        ctx.page_for(&controller).set_title("local").unwrap();

        assert!(ctx.discard(controller.id()));
        assert!(!ctx.discard(controller.id()));
        assert!(ctx.is_empty());

        let html = ctx.page_for(&controller).render().unwrap();
        assert!(html.contains("<title>t</title>"));
    }
}
