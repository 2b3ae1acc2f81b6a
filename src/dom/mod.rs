pub mod links;
pub mod parser;

use std::collections::HashMap;

/// Internal DOM node representation.
#[derive(Debug, Clone)]
pub struct DomNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub children: Vec<DomNode>,
}

impl DomNode {
    pub fn document(children: Vec<DomNode>) -> Self {
        Self {
            tag: "#document".into(),
            attributes: HashMap::new(),
            text: String::new(),
            children,
        }
    }

    pub fn element(
        tag: impl Into<String>,
        attrs: HashMap<String, String>,
        children: Vec<DomNode>,
    ) -> Self {
        Self {
            tag: tag.into(),
            attributes: attrs,
            text: String::new(),
            children,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            tag: String::new(),
            attributes: HashMap::new(),
            text: content.into(),
            children: Vec::new(),
        }
    }

    /// Collect all text content recursively
    pub fn collect_text(&self) -> String {
        let mut buf = String::new();
        self.collect_text_inner(&mut buf);
        buf
    }

    fn collect_text_inner(&self, buf: &mut String) {
        if !self.text.is_empty() {
            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(self.text.trim());
        }
        for child in &self.children {
            child.collect_text_inner(buf);
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|name| name == class))
            .unwrap_or(false)
    }

    /// Every descendant element with the given tag, in document order.
    /// Does not descend into matches.
    pub fn find_all(&self, tag: &str) -> Vec<&DomNode> {
        let mut out = Vec::new();
        for child in &self.children {
            child.find_all_inner(tag, &mut out);
        }
        out
    }

    fn find_all_inner<'a>(&'a self, tag: &str, out: &mut Vec<&'a DomNode>) {
        if self.tag == tag {
            out.push(self);
            return;
        }
        for child in &self.children {
            child.find_all_inner(tag, out);
        }
    }

    /// First descendant element with the given tag (depth-first).
    pub fn find_first(&self, tag: &str) -> Option<&DomNode> {
        self.children.iter().find_map(|child| {
            if child.tag == tag {
                Some(child)
            } else {
                child.find_first(tag)
            }
        })
    }

    /// First descendant element carrying the given class.
    pub fn find_by_class(&self, class: &str) -> Option<&DomNode> {
        self.children.iter().find_map(|child| {
            if child.has_class(class) {
                Some(child)
            } else {
                child.find_by_class(class)
            }
        })
    }
}

/// Parsed DOM tree with metadata
#[derive(Debug, Clone)]
pub struct DomTree {
    pub root: DomNode,
    /// Trimmed `<title>` text, empty when absent
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, attrs: &[(&str, &str)], children: Vec<DomNode>) -> DomNode {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DomNode::element(tag, attrs, children)
    }

    #[test]
    fn find_all_is_document_order_and_shallow() {
        let tree = el(
            "main",
            &[],
            vec![
                el("article", &[("id", "1")], vec![el("article", &[("id", "nested")], vec![])]),
                el("div", &[], vec![el("article", &[("id", "2")], vec![])]),
            ],
        );
        let ids: Vec<_> = tree
            .find_all("article")
            .iter()
            .filter_map(|n| n.attr("id"))
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn class_lookup() {
        let tree = el(
            "article",
            &[],
            vec![el("span", &[("class", "meta post-date")], vec![DomNode::text("x")])],
        );
        assert!(tree.find_by_class("post-date").is_some());
        assert!(tree.find_by_class("post").is_none());
    }

    #[test]
    fn collect_text_joins_and_trims() {
        let tree = el(
            "h2",
            &[],
            vec![el("a", &[], vec![DomNode::text("  My Cat  ")]), DomNode::text("\nToday ")],
        );
        assert_eq!(tree.collect_text(), "My Cat Today");
    }
}
