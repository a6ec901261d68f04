//! Parse Module
//!
//! HTML5-compliant template parsing on top of html5ever. The rcdom produced by html5ever is
//! converted into the crate's immutable [`Node`] tree so it can be shared across threads.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData as DomData, RcDom};
use regex::Regex;
use std::sync::Arc;

use crate::error::{CompilerError, Result};
use crate::node::{Attribute, Node, NodeData};

lazy_static! {
    /// `<my-card />` style custom elements; html5ever would treat them as unclosed.
    static ref SELF_CLOSING_CUSTOM_RE: Regex =
        Regex::new(r"<([a-zA-Z][a-zA-Z0-9]*-[a-zA-Z0-9_.-]*)(\s[^<>]*?)?\s*/>").unwrap();
    static ref HTML_TAG_RE: Regex = Regex::new(r"(?i)<html[\s>]").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRE-PASSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Convert self-closing custom element tags to properly closed tags.
fn convert_self_closing_components(html: &str) -> String {
    SELF_CLOSING_CUSTOM_RE
        .replace_all(html, |caps: &regex::Captures| {
            let name = &caps[1];
            let attrs = caps.get(2).map(|m| m.as_str().trim_end()).unwrap_or("");
            format!("<{}{}></{}>", name, attrs, name)
        })
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

fn convert_children(handle: &Handle) -> Vec<Arc<Node>> {
    handle
        .children
        .borrow()
        .iter()
        .filter_map(convert_dom_node)
        .collect()
}

fn convert_dom_node(handle: &Handle) -> Option<Arc<Node>> {
    match &handle.data {
        DomData::Document => Some(Node::document(convert_children(handle))),
        DomData::Doctype { name, .. } => Some(Node::new(
            NodeData::Doctype {
                name: name.to_string(),
            },
            Vec::new(),
        )),
        DomData::Text { contents } => Some(Node::new(
            NodeData::Text {
                value: contents.borrow().to_string(),
            },
            Vec::new(),
        )),
        DomData::Comment { contents } => Some(Node::new(
            NodeData::Comment {
                value: contents.to_string(),
            },
            Vec::new(),
        )),
        DomData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let attributes = attrs
                .borrow()
                .iter()
                .map(|attr| {
                    let local = attr.name.local.to_string();
                    let name = match &attr.name.prefix {
                        Some(prefix) => format!("{}:{}", prefix, local),
                        None => local,
                    };
                    Attribute::new(name, attr.value.to_string())
                })
                .collect();

            let content = template_contents
                .borrow()
                .as_ref()
                .map(|fragment| Node::document(convert_children(fragment)));

            Some(Node::new(
                NodeData::Element {
                    name: name.local.to_string(),
                    attributes,
                    content,
                },
                convert_children(handle),
            ))
        }
        DomData::ProcessingInstruction { .. } => None,
    }
}

/// Flatten the implicit `html`/`head`/`body` wrappers html5ever inserts around fragments.
fn collect_body_content(handle: &Handle, nodes: &mut Vec<Arc<Node>>, has_html_in_src: bool) {
    match &handle.data {
        DomData::Document => {
            for child in handle.children.borrow().iter() {
                collect_body_content(child, nodes, has_html_in_src);
            }
        }
        DomData::Element { name, .. } => {
            let tag = name.local.to_string();
            let is_wrapper = tag == "html" || tag == "head" || tag == "body";
            if is_wrapper && !has_html_in_src {
                for child in handle.children.borrow().iter() {
                    collect_body_content(child, nodes, has_html_in_src);
                }
            } else {
                nodes.extend(convert_dom_node(handle));
            }
        }
        DomData::Doctype { .. } => {
            if has_html_in_src {
                nodes.extend(convert_dom_node(handle));
            }
        }
        DomData::Text { .. } | DomData::Comment { .. } => {
            nodes.extend(convert_dom_node(handle));
        }
        DomData::ProcessingInstruction { .. } => {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN PARSING FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a component or page source into a document node.
pub fn parse_template(html: &str, file_path: &str) -> Result<Arc<Node>> {
    let prepared = convert_self_closing_components(html);

    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut prepared.as_bytes())
        .map_err(|e| CompilerError::Parse {
            file: file_path.to_string(),
            message: format!("Failed to parse HTML: {}", e),
        })?;

    let has_html_in_src = HTML_TAG_RE.is_match(html);
    let mut nodes = Vec::new();
    collect_body_content(&dom.document, &mut nodes, has_html_in_src);

    tracing::trace!("Parsed {} top-level nodes from {}", nodes.len(), file_path);
    Ok(Node::document(nodes))
}

/// Parse markup produced at render time (`@html`) for re-compilation.
pub fn parse_fragment(html: &str, file_path: &str) -> Result<Arc<Node>> {
    parse_template(html, file_path)
}

/// True when `tag` looks like a custom element name.
pub fn is_custom_element_name(tag: &str) -> bool {
    tag.contains('-')
        && tag
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
}
