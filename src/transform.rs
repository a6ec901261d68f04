//! Content transforms selected with `webc:type`.
//!
//! Two transforms are built in: `css:scoped` rewrites selectors under the component's scope
//! class and `render` runs the element's script and substitutes its default export as markup.
//! Everything else is looked up among the transforms registered on the compiler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::css::{scope_hash, CssPrefixer};
use crate::error::{CompilerError, Result};
use crate::node::Node;
use crate::registry::SCOPED_MARKER;

pub const TYPE_DIRECTIVE: &str = "webc:type";
pub const SCOPED_CSS_TRANSFORM: &str = "css:scoped";
pub const RENDER_TRANSFORM: &str = "render";

/// A named content transform: receives the rendered content, returns its replacement.
pub type Transform = Arc<dyn Fn(&str) -> std::result::Result<String, String> + Send + Sync>;
pub type TransformMap = HashMap<String, Transform>;

/// Transform names applying to `node`, in application order. A scoped `<style>` implies
/// `css:scoped` even without an explicit `webc:type`.
pub fn transform_types(node: &Node) -> Vec<String> {
    let mut types: Vec<String> = node
        .attribute(TYPE_DIRECTIVE)
        .map(|value| {
            value
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    if node.is_tag("style")
        && node.has_attribute(SCOPED_MARKER)
        && !types.iter().any(|t| t == SCOPED_CSS_TRANSFORM)
    {
        types.insert(0, SCOPED_CSS_TRANSFORM.to_string());
    }
    types
}

pub fn is_render_type(types: &[String]) -> bool {
    types.iter().any(|t| t == RENDER_TRANSFORM)
}

/// Run every content transform in `types` over `content`. `render` is handled by the
/// serializer and skipped here.
pub fn apply_transforms(
    types: &[String],
    content: String,
    scope_id: Option<&str>,
    transforms: &TransformMap,
    file: &str,
) -> Result<String> {
    let mut content = content;
    for name in types {
        match name.as_str() {
            RENDER_TRANSFORM => {}
            SCOPED_CSS_TRANSFORM => {
                let id = match scope_id {
                    Some(id) => id.to_string(),
                    None => scope_hash(&content),
                };
                content = CssPrefixer::new(&id).process(&content).map_err(|message| {
                    CompilerError::Transform {
                        name: SCOPED_CSS_TRANSFORM.to_string(),
                        message,
                        file: file.to_string(),
                    }
                })?;
            }
            custom => {
                let transform =
                    transforms
                        .get(custom)
                        .ok_or_else(|| CompilerError::UnknownTransform {
                            name: custom.to_string(),
                            file: file.to_string(),
                        })?;
                content = transform(&content).map_err(|message| CompilerError::Transform {
                    name: custom.to_string(),
                    message,
                    file: file.to_string(),
                })?;
            }
        }
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attribute;

    #[test]
    fn test_implicit_scoped_type() {
        let style = Node::element("style", vec![Attribute::new("webc:scoped", "")], vec![]);
        assert_eq!(transform_types(&style), vec!["css:scoped"]);

        let listed = Node::element(
            "template",
            vec![Attribute::new("webc:type", "md, upper")],
            vec![],
        );
        assert_eq!(transform_types(&listed), vec!["md", "upper"]);
    }

    #[test]
    fn test_apply_chain() {
        let mut transforms: TransformMap = HashMap::new();
        transforms.insert(
            "upper".to_string(),
            Arc::new(|content: &str| -> std::result::Result<String, String> {
                Ok(content.to_uppercase())
            }),
        );
        let types = vec!["upper".to_string()];
        let out = apply_transforms(&types, "hi".to_string(), None, &transforms, "a.webc").unwrap();
        assert_eq!(out, "HI");

        let types = vec!["css:scoped".to_string()];
        let out =
            apply_transforms(&types, "p { color: red }".to_string(), Some("s1"), &transforms, "a.webc")
                .unwrap();
        assert_eq!(out, ".s1 p{color:red}");
    }

    #[test]
    fn test_unknown_and_failing_transforms() {
        let mut transforms: TransformMap = HashMap::new();
        transforms.insert(
            "broken".to_string(),
            Arc::new(|_: &str| -> std::result::Result<String, String> {
                Err("nope".to_string())
            }),
        );
        let unknown = apply_transforms(
            &["missing".to_string()],
            String::new(),
            None,
            &transforms,
            "a.webc",
        );
        assert!(matches!(unknown, Err(CompilerError::UnknownTransform { .. })));

        let failing = apply_transforms(
            &["broken".to_string()],
            String::new(),
            None,
            &transforms,
            "a.webc",
        );
        assert!(matches!(failing, Err(CompilerError::Transform { .. })));
    }

    #[test]
    fn test_unparsable_scoped_style() {
        let err = apply_transforms(
            &["css:scoped".to_string()],
            "p[ { color: red }".to_string(),
            Some("s1"),
            &HashMap::new(),
            "a.webc",
        )
        .unwrap_err();
        assert!(matches!(err, CompilerError::Transform { ref name, .. } if name == "css:scoped"));
    }
}
