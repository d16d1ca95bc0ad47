//! A tag tree paired with its index.

use thiserror::Error;
use url::Url;

use crate::controller::Callback;
use crate::html::document::{form_action_key, Document, StructureError, TagPath};
use crate::html::tag::{RenderError, Tag, TagType};

/// Literal prefix of every rendered page.
pub const DOCTYPE: &str = "<!DOCTYPE html>\n";

/// Errors from [`Page::set_link_rel_canonical`].
#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("canonical target {0:?} is relative and no canonical origin is configured")]
    NoOrigin(String),

    #[error("invalid canonical target {target:?}: {source}")]
    Parse {
        target: String,
        source: url::ParseError,
    },
}

/// An indexed tag tree.
///
/// Controllers keep one installed page as their master copy and hand each
/// worker a [`fork`](Page::fork) of it to mutate while serving requests.
///
/// Handing out `&mut Tag` marks the index stale, since the caller may move
/// or insert content. Lookups on a stale page search the tree directly and
/// every index-backed setter rebuilds the index first.
#[derive(Debug, Clone)]
pub struct Page {
    root: Tag,
    index: Document,
    stale: bool,
    canonical_origin: Option<Url>,
}

impl Page {
    /// Take ownership of `root` and index it.
    pub fn install(mut root: Tag) -> Result<Self, StructureError> {
        let index = Document::build(&mut root)?;
        Ok(Self {
            root,
            index,
            stale: false,
            canonical_origin: None,
        })
    }

    /// Rebuild the index if tags were handed out mutably since the last
    /// build. The default callback carries over.
    pub fn refresh(&mut self) -> Result<(), StructureError> {
        if !self.stale {
            return Ok(());
        }
        let mut index = Document::build(&mut self.root)?;
        if let Some(default) = self.index.default_callback() {
            index.set_default_callback(default.clone());
        }
        self.index = index;
        self.stale = false;
        tracing::trace!("Page index rebuilt");
        Ok(())
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Deep copy of the tree, its index and its default callback.
    ///
    /// Callbacks are shared with the original, not duplicated.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn root(&self) -> &Tag {
        &self.root
    }

    /// The index as of the last build; see [`refresh`](Page::refresh).
    pub fn index(&self) -> &Document {
        &self.index
    }

    pub(crate) fn index_mut(&mut self) -> &mut Document {
        &mut self.index
    }

    pub fn canonical_origin(&self) -> Option<&Url> {
        self.canonical_origin.as_ref()
    }

    pub(crate) fn set_canonical_origin(&mut self, origin: Option<Url>) {
        self.canonical_origin = origin;
    }

    pub fn tag(&self, path: &TagPath) -> Option<&Tag> {
        path.resolve(&self.root)
    }

    pub fn tag_mut(&mut self, path: &TagPath) -> Option<&mut Tag> {
        self.stale = true;
        path.resolve_mut(&mut self.root)
    }

    pub fn tag_by_id(&self, id: &str) -> Option<&Tag> {
        self.id_path(id).and_then(|p| p.resolve(&self.root))
    }

    pub fn tag_by_id_mut(&mut self, id: &str) -> Option<&mut Tag> {
        let path = self.id_path(id)?;
        self.tag_mut(&path)
    }

    pub fn tag_by_name(&self, name: &str) -> Option<&Tag> {
        self.name_path(name).and_then(|p| p.resolve(&self.root))
    }

    pub fn tag_by_name_mut(&mut self, name: &str) -> Option<&mut Tag> {
        let path = self.name_path(name)?;
        self.tag_mut(&path)
    }

    /// Position of the form answering requests for `action`.
    pub fn form_path(&self, action: &str) -> Option<TagPath> {
        if self.stale {
            TagPath::find(&self.root, |tag| {
                tag.kind() == TagType::Form && form_action_key(tag.attr_str("action")) == action
            })
        } else {
            self.index.by_form_action(action).cloned()
        }
    }

    /// The form answering requests for `action`.
    pub fn form_for_action(&self, action: &str) -> Option<&Tag> {
        self.form_path(action).and_then(|p| p.resolve(&self.root))
    }

    /// Set the `value` attribute of the tag named `name`. Returns false if
    /// no such tag exists. Leaves the index valid.
    pub fn set_value_by_name(&mut self, name: &str, value: impl Into<String>) -> bool {
        let Some(path) = self.name_path(name) else {
            return false;
        };
        match path.resolve_mut(&mut self.root) {
            Some(tag) => {
                tag.set_attr("value", value.into());
                true
            }
            None => false,
        }
    }

    /// Attach `callback` to the tag with the given id. Leaves the index valid.
    pub fn set_callback_by_id(&mut self, id: &str, callback: Callback) -> Result<(), StructureError> {
        let path = self
            .id_path(id)
            .ok_or_else(|| StructureError::UnknownId(id.to_string()))?;
        let tag = path
            .resolve_mut(&mut self.root)
            .ok_or_else(|| StructureError::UnknownId(id.to_string()))?;
        tag.set_callback(callback);
        Ok(())
    }

    fn id_path(&self, id: &str) -> Option<TagPath> {
        if self.stale {
            TagPath::find(&self.root, |tag| tag.attr_str("id") == Some(id))
        } else {
            self.index.by_id(id).cloned()
        }
    }

    fn name_path(&self, name: &str) -> Option<TagPath> {
        if self.stale {
            TagPath::find(&self.root, |tag| tag.attr_str("name") == Some(name))
        } else {
            self.index.by_name(name).cloned()
        }
    }

    /// Full page markup: doctype followed by the root element.
    pub fn render(&self) -> Result<String, RenderError> {
        let body = self.root.serialize()?;
        Ok(format!("{DOCTYPE}{body}"))
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), StructureError> {
        self.refresh()?;
        let path = self
            .index
            .title()
            .ok_or(StructureError::MissingSingleton("title"))?;
        let tag = path
            .resolve_mut(&mut self.root)
            .ok_or(StructureError::MissingSingleton("title"))?;
        tag.set_text(title);
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<(), StructureError> {
        self.refresh()?;
        let path = self
            .index
            .description()
            .ok_or(StructureError::MissingSingleton("description"))?;
        let tag = path
            .resolve_mut(&mut self.root)
            .ok_or(StructureError::MissingSingleton("description"))?;
        tag.set_attr("content", description.into());
        Ok(())
    }

    /// Point the canonical link at `target`.
    ///
    /// Relative targets resolve against the canonical origin. Only the path
    /// and query of the result are kept; the fragment is dropped.
    pub fn set_link_rel_canonical(&mut self, target: &str) -> Result<(), CanonicalError> {
        let href = self.canonical_href(target)?;
        self.refresh()?;
        let path = self
            .index
            .canonical()
            .ok_or(StructureError::MissingSingleton("canonical link"))?;
        let tag = path
            .resolve_mut(&mut self.root)
            .ok_or(StructureError::MissingSingleton("canonical link"))?;
        tag.set_attr("href", href.to_string());
        Ok(())
    }

    fn canonical_href(&self, target: &str) -> Result<Url, CanonicalError> {
        let parse_err = |source| CanonicalError::Parse {
            target: target.to_string(),
            source,
        };

        let Some(origin) = &self.canonical_origin else {
            return match Url::parse(target) {
                Ok(mut url) => {
                    url.set_fragment(None);
                    Ok(url)
                }
                Err(url::ParseError::RelativeUrlWithoutBase) => {
                    Err(CanonicalError::NoOrigin(target.to_string()))
                }
                Err(e) => Err(parse_err(e)),
            };
        };

        let resolved = origin.join(target).map_err(parse_err)?;
        let mut href = origin.clone();
        href.set_path(resolved.path());
        href.set_query(resolved.query());
        href.set_fragment(None);
        Ok(href)
    }
}
