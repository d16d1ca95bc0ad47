//! Lookup index over a single tag tree.
//!
//! # Responsibilities
//! - Index tags by `id`, `name` and form `action` in one traversal
//! - Track the singleton slots (head, title, description, canonical, body)
//! - Enforce the singleton invariants and synthesize missing SEO tags
//!
//! # Design Decisions
//! - Entries are `TagPath`s (child positions from the root), not pointers,
//!   so an index is valid for any structurally identical copy of its tree;
//!   `Page` rebuilds it after handing out mutable tags
//! - First occurrence wins for ids, names and form actions
//! - A malformed tree is a configuration error, reported once at install

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::controller::Callback;
use crate::html::tag::{Tag, TagContent, TagType};

/// Errors describing a tree that cannot back a page.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("document has more than one {0} tag")]
    DuplicateSingleton(&'static str),

    #[error("document has no <head> tag")]
    MissingHead,

    #[error("tag with id \"{0}\" not found")]
    UnknownId(String),

    #[error("cannot set {0} because this document has no {0} tag")]
    MissingSingleton(&'static str),
}

/// Position of a tag inside its tree.
///
/// Each entry is an index into the parent's content list; the empty path is
/// the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagPath(Vec<usize>);

impl TagPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, position: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(position);
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Depth-first search for the first tag matching `pred`, in the same
    /// order the index is built.
    pub fn find(root: &Tag, pred: impl Fn(&Tag) -> bool) -> Option<Self> {
        fn walk(tag: &Tag, path: TagPath, pred: &dyn Fn(&Tag) -> bool) -> Option<TagPath> {
            if pred(tag) {
                return Some(path);
            }
            for (i, content) in tag.contents().iter().enumerate() {
                if let TagContent::Tag(child) = content {
                    if let Some(found) = walk(child, path.child(i), pred) {
                        return Some(found);
                    }
                }
            }
            None
        }
        walk(root, TagPath::root(), &pred)
    }

    /// Follow this path from `root`.
    pub fn resolve<'a>(&self, root: &'a Tag) -> Option<&'a Tag> {
        let mut node = root;
        for &i in &self.0 {
            match node.contents().get(i)? {
                TagContent::Tag(tag) => node = tag,
                TagContent::Text(_) => return None,
            }
        }
        Some(node)
    }

    /// Follow this path from `root`, mutably.
    pub fn resolve_mut<'a>(&self, root: &'a mut Tag) -> Option<&'a mut Tag> {
        let mut node = root;
        for &i in &self.0 {
            match node.contents_mut().get_mut(i)? {
                TagContent::Tag(tag) => node = tag,
                TagContent::Text(_) => return None,
            }
        }
        Some(node)
    }
}

/// Index of one tag tree.
#[derive(Clone, Default)]
pub struct Document {
    head: Option<TagPath>,
    title: Option<TagPath>,
    description: Option<TagPath>,
    canonical: Option<TagPath>,
    body: Option<TagPath>,

    ids: HashMap<String, TagPath>,
    names: HashMap<String, TagPath>,
    form_actions: HashMap<String, TagPath>,

    default_callback: Option<Callback>,
}

impl Document {
    /// Index `root`, appending an empty description and canonical tag to the
    /// head when the tree has none.
    pub fn build(root: &mut Tag) -> Result<Self, StructureError> {
        let mut doc = Document::default();
        doc.visit(root, TagPath::root())?;

        let head_path = doc.head.clone().ok_or(StructureError::MissingHead)?;
        let head = head_path
            .resolve_mut(root)
            .ok_or(StructureError::MissingHead)?;

        if doc.description.is_none() {
            head.push_child(Tag::new(TagType::Meta).attr("name", "description"));
            doc.description = Some(head_path.child(head.contents().len() - 1));
            tracing::debug!("Synthesized empty meta description");
        }
        if doc.canonical.is_none() {
            head.push_child(Tag::new(TagType::Link).attr("rel", "canonical"));
            doc.canonical = Some(head_path.child(head.contents().len() - 1));
            tracing::debug!("Synthesized empty canonical link");
        }

        tracing::debug!(
            ids = doc.ids.len(),
            names = doc.names.len(),
            forms = doc.form_actions.len(),
            "Document indexed"
        );
        Ok(doc)
    }

    fn visit(&mut self, tag: &Tag, path: TagPath) -> Result<(), StructureError> {
        match tag.kind() {
            TagType::Head => claim_unique(&mut self.head, &path, "<head>")?,
            TagType::Title => claim_first(&mut self.title, &path),
            TagType::Body => claim_first(&mut self.body, &path),
            TagType::Form => {
                let action = form_action_key(tag.attr_str("action"));
                self.form_actions.entry(action).or_insert_with(|| path.clone());
            }
            _ => {}
        }
        if tag.is_description_meta() {
            claim_unique(&mut self.description, &path, "<meta name=\"description\">")?;
        }
        if tag.is_canonical_link() {
            claim_unique(&mut self.canonical, &path, "<link rel=\"canonical\">")?;
        }

        if let Some(id) = tag.attr_str("id") {
            self.ids.entry(id.to_string()).or_insert_with(|| path.clone());
        }
        if let Some(name) = tag.attr_str("name") {
            self.names.entry(name.to_string()).or_insert_with(|| path.clone());
        }

        for (i, content) in tag.contents().iter().enumerate() {
            if let TagContent::Tag(child) = content {
                self.visit(child, path.child(i))?;
            }
        }
        Ok(())
    }

    pub fn head(&self) -> Option<&TagPath> {
        self.head.as_ref()
    }

    pub fn title(&self) -> Option<&TagPath> {
        self.title.as_ref()
    }

    pub fn description(&self) -> Option<&TagPath> {
        self.description.as_ref()
    }

    pub fn canonical(&self) -> Option<&TagPath> {
        self.canonical.as_ref()
    }

    pub fn body(&self) -> Option<&TagPath> {
        self.body.as_ref()
    }

    pub fn by_id(&self, id: &str) -> Option<&TagPath> {
        self.ids.get(id)
    }

    pub fn by_name(&self, name: &str) -> Option<&TagPath> {
        self.names.get(name)
    }

    pub fn by_form_action(&self, action: &str) -> Option<&TagPath> {
        self.form_actions.get(action)
    }

    pub fn default_callback(&self) -> Option<&Callback> {
        self.default_callback.as_ref()
    }

    pub fn set_default_callback(&mut self, callback: Callback) {
        self.default_callback = Some(callback);
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("head", &self.head)
            .field("title", &self.title)
            .field("description", &self.description)
            .field("canonical", &self.canonical)
            .field("body", &self.body)
            .field("ids", &self.ids)
            .field("names", &self.names)
            .field("form_actions", &self.form_actions)
            .field("default_callback", &self.default_callback.is_some())
            .finish()
    }
}

fn claim_unique(
    slot: &mut Option<TagPath>,
    path: &TagPath,
    what: &'static str,
) -> Result<(), StructureError> {
    if slot.is_some() {
        return Err(StructureError::DuplicateSingleton(what));
    }
    *slot = Some(path.clone());
    Ok(())
}

fn claim_first(slot: &mut Option<TagPath>, path: &TagPath) {
    if slot.is_none() {
        *slot = Some(path.clone());
    }
}

/// Dispatch key for a form: its `action` path without query or fragment,
/// `/` when absent or empty.
pub(crate) fn form_action_key(action: Option<&str>) -> String {
    let action = action.unwrap_or_default();
    let action = action.split(['?', '#']).next().unwrap_or_default();
    if action.is_empty() {
        "/".to_string()
    } else {
        action.to_string()
    }
}
