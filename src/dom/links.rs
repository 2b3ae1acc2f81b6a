//! Link source: the anchors on a page, as seen by the prefetch strategies.
//!
//! Strategies never touch real elements. They get a list of [`LinkRef`]s
//! and are told about events by [`LinkId`].

use std::fmt;

use crate::dom::{DomNode, DomTree};

/// Stable identifier of one anchor on the page (its document-order index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub usize);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One anchor: its id and raw `href` attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub id: LinkId,
    pub href: String,
}

impl LinkRef {
    pub fn new(id: usize, href: impl Into<String>) -> Self {
        Self {
            id: LinkId(id),
            href: href.into(),
        }
    }
}

/// Anything that can enumerate the links currently on the page.
pub trait LinkSource {
    fn links(&self) -> Vec<LinkRef>;
}

impl LinkSource for Vec<LinkRef> {
    fn links(&self) -> Vec<LinkRef> {
        self.clone()
    }
}

impl LinkSource for [LinkRef] {
    fn links(&self) -> Vec<LinkRef> {
        self.to_vec()
    }
}

/// Links of a parsed page: every `<a href>` in document order. Duplicate
/// hrefs are kept, each anchor is its own link.
#[derive(Debug, Clone, Default)]
pub struct PageLinks {
    links: Vec<LinkRef>,
}

impl PageLinks {
    pub fn from_tree(tree: &DomTree) -> Self {
        let mut links = Vec::new();
        collect_anchors(&tree.root, &mut links);
        Self { links }
    }

    pub fn from_html(html: &str) -> Self {
        Self::from_tree(&crate::dom::parser::parse_html(html))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl LinkSource for PageLinks {
    fn links(&self) -> Vec<LinkRef> {
        self.links.clone()
    }
}

fn collect_anchors(node: &DomNode, out: &mut Vec<LinkRef>) {
    if node.tag == "a" {
        if let Some(href) = node.attr("href") {
            out.push(LinkRef::new(out.len(), href));
        }
    }
    for child in &node.children {
        collect_anchors(child, out);
    }
}
