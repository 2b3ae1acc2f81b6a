use crate::dom::{DomNode, DomTree};
use scraper::{ElementRef, Html, Node};
use std::collections::HashMap;

/// Tags whose children carry nothing a listing page needs
const SKIP_CHILDREN: &[&str] = &["script", "style", "noscript", "svg", "template"];

/// Parse raw HTML into a DomTree.
pub fn parse_html(html: &str) -> DomTree {
    let document = Html::parse_document(html);

    let title = scraper::Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();

    let root = DomNode::document(vec![convert_element(document.root_element())]);

    DomTree {
        root,
        title: title.trim().to_string(),
    }
}

fn convert_element(el: ElementRef<'_>) -> DomNode {
    let tag = el.value().name.local.as_ref().to_string();
    let attributes: HashMap<String, String> = el
        .value()
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if SKIP_CHILDREN.contains(&tag.as_str()) {
        return DomNode::element(tag, attributes, Vec::new());
    }

    let children = el
        .children()
        .filter_map(|child_ref| match child_ref.value() {
            Node::Element(_) => ElementRef::wrap(child_ref).map(convert_element),
            Node::Text(t) if !t.text.trim().is_empty() => Some(DomNode::text(t.text.to_string())),
            _ => None,
        })
        .collect();

    DomNode::element(tag, attributes, children)
}
