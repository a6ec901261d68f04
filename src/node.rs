//! Immutable markup tree produced by the parser.
//!
//! Nodes are shared through `Arc` so a component's tree can be re-rendered from any number of
//! call sites without cloning. The compiler never mutates a node; per-instance attributes are
//! carried in side-tables keyed by [`NodeId`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    pub fn next() -> Self {
        NodeId(NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeData {
    Document,
    Doctype {
        name: String,
    },
    Text {
        value: String,
    },
    Comment {
        value: String,
    },
    Element {
        name: String,
        attributes: Vec<Attribute>,
        /// Document fragment holding `<template>` content.
        content: Option<Arc<Node>>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub data: NodeData,
    pub children: Vec<Arc<Node>>,
}

impl Node {
    pub fn new(data: NodeData, children: Vec<Arc<Node>>) -> Arc<Node> {
        Arc::new(Node {
            id: NodeId::next(),
            data,
            children,
        })
    }

    pub fn document(children: Vec<Arc<Node>>) -> Arc<Node> {
        Node::new(NodeData::Document, children)
    }

    pub fn element(name: &str, attributes: Vec<Attribute>, children: Vec<Arc<Node>>) -> Arc<Node> {
        Node::new(
            NodeData::Element {
                name: name.to_string(),
                attributes,
                content: None,
            },
            children,
        )
    }

    pub fn text(value: &str) -> Arc<Node> {
        Node::new(
            NodeData::Text {
                value: value.to_string(),
            },
            Vec::new(),
        )
    }

    pub fn tag_name(&self) -> Option<&str> {
        match &self.data {
            NodeData::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        match &self.data {
            NodeData::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes()
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes().iter().any(|attr| attr.name == name)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element { .. })
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name() == Some(tag)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.data, NodeData::Comment { .. })
    }

    pub fn is_whitespace_text(&self) -> bool {
        matches!(&self.data, NodeData::Text { value } if value.trim().is_empty())
    }

    pub fn template_content(&self) -> Option<&Arc<Node>> {
        match &self.data {
            NodeData::Element { content, .. } => content.as_ref(),
            _ => None,
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Depth-first search over children and template content.
    pub fn any_descendant(&self, predicate: &dyn Fn(&Node) -> bool) -> bool {
        self.children
            .iter()
            .chain(self.template_content())
            .any(|child| predicate(child) || child.any_descendant(predicate))
    }
}

fn collect_text(node: &Node, out: &mut String) {
    if let NodeData::Text { value } = &node.data {
        out.push_str(value);
    }
    for child in &node.children {
        collect_text(child, out);
    }
}

/// Elements that never get an end tag.
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements whose text children are raw text and must not be entity-escaped.
pub fn is_raw_text_element(tag: &str) -> bool {
    matches!(
        tag,
        "style" | "script" | "xmp" | "iframe" | "noembed" | "noframes" | "plaintext" | "noscript"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_unique() {
        let a = Node::text("a");
        let b = Node::text("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_text_content_is_recursive() {
        let tree = Node::element(
            "p",
            vec![],
            vec![Node::text("Hello "), Node::element("b", vec![], vec![Node::text("world")])],
        );
        assert_eq!(tree.text_content(), "Hello world");
    }

    #[test]
    fn test_attribute_lookup() {
        let node = Node::element("div", vec![Attribute::new("webc:keep", "")], vec![]);
        assert!(node.has_attribute("webc:keep"));
        assert_eq!(node.attribute("webc:keep"), Some(""));
        assert_eq!(node.attribute("class"), None);
    }

    #[test]
    fn test_tree_serializes_through_shared_children() {
        let tree = Node::element("p", vec![Attribute::new("class", "a")], vec![Node::text("hi")]);
        let json = serde_json::to_value(&*tree).unwrap();
        assert_eq!(json["data"]["type"], "element");
        assert_eq!(json["data"]["attributes"][0]["name"], "class");
        assert_eq!(json["children"][0]["data"]["type"], "text");
        assert_eq!(json["children"][0]["data"]["value"], "hi");
    }
}
