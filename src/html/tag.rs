//! Markup nodes and their serialization.
//!
//! # Responsibilities
//! - Define the closed set of element kinds and their void flag
//! - Represent attributes and content as sum types
//! - Render a tree back to markup, depth first
//!
//! # Design Decisions
//! - Attributes live in a `BTreeMap` so output is byte-deterministic
//! - Only `"` is escaped inside attribute values; text is emitted verbatim
//! - Optional SEO tags (canonical link, meta description) render to nothing
//!   until their governing attribute is populated

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write as _;

use thiserror::Error;

use crate::controller::Callback;

/// Element kinds known to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    Html,
    Head,
    Title,
    Meta,
    Link,
    Style,
    Script,
    Body,
    Main,
    Header,
    Footer,
    Nav,
    Section,
    Article,
    Div,
    Span,
    P,
    A,
    H1,
    H2,
    H3,
    Ul,
    Ol,
    Li,
    Form,
    Label,
    Input,
    Button,
    Textarea,
    Select,
    Option,
    Img,
    Br,
    Hr,
    Pre,
    Code,
    Strong,
    Em,
}

impl TagType {
    /// The element name as written in markup.
    pub fn name(self) -> &'static str {
        match self {
            TagType::Html => "html",
            TagType::Head => "head",
            TagType::Title => "title",
            TagType::Meta => "meta",
            TagType::Link => "link",
            TagType::Style => "style",
            TagType::Script => "script",
            TagType::Body => "body",
            TagType::Main => "main",
            TagType::Header => "header",
            TagType::Footer => "footer",
            TagType::Nav => "nav",
            TagType::Section => "section",
            TagType::Article => "article",
            TagType::Div => "div",
            TagType::Span => "span",
            TagType::P => "p",
            TagType::A => "a",
            TagType::H1 => "h1",
            TagType::H2 => "h2",
            TagType::H3 => "h3",
            TagType::Ul => "ul",
            TagType::Ol => "ol",
            TagType::Li => "li",
            TagType::Form => "form",
            TagType::Label => "label",
            TagType::Input => "input",
            TagType::Button => "button",
            TagType::Textarea => "textarea",
            TagType::Select => "select",
            TagType::Option => "option",
            TagType::Img => "img",
            TagType::Br => "br",
            TagType::Hr => "hr",
            TagType::Pre => "pre",
            TagType::Code => "code",
            TagType::Strong => "strong",
            TagType::Em => "em",
        }
    }

    /// Void elements never own content and never emit a closing tag.
    pub fn is_void(self) -> bool {
        matches!(
            self,
            TagType::Meta
                | TagType::Link
                | TagType::Input
                | TagType::Img
                | TagType::Br
                | TagType::Hr
        )
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Bare attribute (`<input required>`).
    Empty,
    Int(i64),
    Str(String),
    /// Class list, rendered space-joined in sorted order.
    Classes(BTreeSet<String>),
}

impl AttrValue {
    /// String view of the value, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// True when the value carries no renderable text.
    fn is_blank(&self) -> bool {
        match self {
            AttrValue::Empty => true,
            AttrValue::Int(_) => false,
            AttrValue::Str(s) => s.is_empty(),
            AttrValue::Classes(c) => c.is_empty(),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

pub type Attrs = BTreeMap<String, AttrValue>;

/// One entry in a tag's ordered content.
#[derive(Debug, Clone)]
pub enum TagContent {
    Text(String),
    Tag(Tag),
}

/// Errors raised while rendering a tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("void element <{0}> cannot contain content")]
    VoidContent(TagType),
}

/// A markup element.
#[derive(Clone)]
pub struct Tag {
    kind: TagType,
    attrs: Attrs,
    contents: Vec<TagContent>,
    callback: Option<Callback>,
}

impl Tag {
    pub fn new(kind: TagType) -> Self {
        Self {
            kind,
            attrs: Attrs::new(),
            contents: Vec::new(),
            callback: None,
        }
    }

    pub fn kind(&self) -> TagType {
        self.kind
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.attrs
    }

    pub fn contents(&self) -> &[TagContent] {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut Vec<TagContent> {
        &mut self.contents
    }

    pub fn callback(&self) -> Option<&Callback> {
        self.callback.as_ref()
    }

    pub fn set_callback(&mut self, callback: Callback) {
        self.callback = Some(callback);
    }

    /// String value of an attribute, if present and a string.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(AttrValue::as_str)
    }

    /// Insert or replace an attribute.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Replace all content with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.contents.clear();
        self.contents.push(TagContent::Text(text.into()));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.contents.push(TagContent::Text(text.into()));
    }

    pub fn push_child(&mut self, child: Tag) {
        self.contents.push(TagContent::Tag(child));
    }

    // Chainable authoring helpers.

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Mark the attribute as present without a value.
    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), AttrValue::Empty);
        self
    }

    /// Add a token to the `class` attribute.
    pub fn class(mut self, token: impl Into<String>) -> Self {
        let entry = self
            .attrs
            .entry("class".to_string())
            .or_insert_with(|| AttrValue::Classes(BTreeSet::new()));
        match entry {
            AttrValue::Classes(set) => {
                set.insert(token.into());
            }
            other => {
                let mut set = BTreeSet::new();
                if let AttrValue::Str(s) = other {
                    set.extend(s.split_whitespace().map(str::to_string));
                }
                set.insert(token.into());
                *other = AttrValue::Classes(set);
            }
        }
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    pub fn child(mut self, child: Tag) -> Self {
        self.push_child(child);
        self
    }

    pub fn on_request(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// True for `<link rel="canonical">`.
    pub fn is_canonical_link(&self) -> bool {
        self.kind == TagType::Link && self.attr_str("rel") == Some("canonical")
    }

    /// True for `<meta name="description">`.
    pub fn is_description_meta(&self) -> bool {
        self.kind == TagType::Meta && self.attr_str("name") == Some("description")
    }

    /// Render this element and everything below it.
    pub fn serialize(&self) -> Result<String, RenderError> {
        let mut out = String::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    fn write_to(&self, out: &mut String) -> Result<(), RenderError> {
        if self.is_suppressed() {
            return Ok(());
        }

        out.push('<');
        out.push_str(self.kind.name());
        for (name, value) in &self.attrs {
            out.push(' ');
            write_attr(out, name, value);
        }
        out.push('>');

        if self.kind.is_void() {
            if !self.contents.is_empty() {
                return Err(RenderError::VoidContent(self.kind));
            }
            return Ok(());
        }

        for content in &self.contents {
            match content {
                TagContent::Text(text) => out.push_str(text),
                TagContent::Tag(tag) => tag.write_to(out)?,
            }
        }

        out.push_str("</");
        out.push_str(self.kind.name());
        out.push('>');
        Ok(())
    }

    fn is_suppressed(&self) -> bool {
        let governing = if self.is_canonical_link() {
            "href"
        } else if self.is_description_meta() {
            "content"
        } else {
            return false;
        };
        self.attrs.get(governing).map_or(true, AttrValue::is_blank)
    }
}

fn write_attr(out: &mut String, name: &str, value: &AttrValue) {
    out.push_str(name);
    match value {
        AttrValue::Empty => {}
        AttrValue::Int(v) => {
            let _ = write!(out, "={}", v);
        }
        AttrValue::Str(s) => {
            out.push_str("=\"");
            out.push_str(&s.replace('"', "&quot;"));
            out.push('"');
        }
        AttrValue::Classes(set) => {
            out.push_str("=\"");
            let joined = set.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
            out.push_str(&joined.replace('"', "&quot;"));
            out.push('"');
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("kind", &self.kind)
            .field("attrs", &self.attrs)
            .field("contents", &self.contents)
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}
