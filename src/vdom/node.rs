use compact_str::CompactString;
use smallvec::SmallVec;
use std::sync::Arc;

/// A node of the rendered tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Renders nothing (`null`, `undefined`, booleans).
    Empty,
    /// Text content, escaped on output.
    Text(String),
    /// Pre-rendered HTML, written verbatim.
    Raw(String),
    Element(Element),
    Fragment(Vec<Node>),
    /// A subtree shared with another owner (e.g. the page body handed to the layout).
    Shared(Arc<Node>),
}

/// An HTML element with its attributes in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: CompactString,
    pub attrs: SmallVec<[(CompactString, AttrValue); 4]>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Boolean attribute rendered without a value (`<input disabled>`).
    Flag,
    Text(String),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn raw(s: impl Into<String>) -> Self {
        Self::Raw(s.into())
    }
}

impl Element {
    pub fn new(tag: impl Into<CompactString>) -> Self {
        Self {
            tag: tag.into(),
            attrs: SmallVec::new(),
            children: Vec::new(),
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Self::Element(el)
    }
}
