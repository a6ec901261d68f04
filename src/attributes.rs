//! Attribute Model
//!
//! Attribute names carry two independent markers:
//!
//! | written as   | privacy | evaluation |
//! |--------------|---------|------------|
//! | `name`       | public  | literal    |
//! | `webc:name`  | private | literal    |
//! | `@name`      | private | literal    |
//! | `:name`      | public  | dynamic    |
//! | `:@name`     | private | dynamic    |
//!
//! Private attributes never reach the output but stay visible to the data cascade.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cascade::DataCascade;
use crate::error::{CompilerError, Result};
use crate::expression::{camel_case, to_display_string, EvaluationError, ExpressionEvaluator};
use crate::node::Attribute;
use crate::scope::free_variables;

pub const DIRECTIVE_PREFIX: &str = "webc:";
pub const PROPERTY_PREFIX: &str = "@";
pub const DYNAMIC_PREFIX: &str = ":";

pub const HTML_DIRECTIVE: &str = "@html";
pub const TEXT_DIRECTIVE: &str = "@text";
pub const RAW_DIRECTIVE: &str = "@raw";
pub const SPREAD_DIRECTIVE: &str = "@attributes";

lazy_static! {
    static ref CLASS_WORD_RE: Regex = Regex::new(r"\bclass\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Privacy {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Evaluation {
    Literal,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedAttribute {
    pub name: String,
    pub raw_name: String,
    pub value: Value,
    pub raw_value: String,
    pub evaluation: Evaluation,
    pub privacy: Privacy,
}

impl EvaluatedAttribute {
    /// A public literal attribute, as synthesized by the compiler.
    pub fn literal(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            raw_name: name.to_string(),
            value: Value::String(value.to_string()),
            raw_value: value.to_string(),
            evaluation: Evaluation::Literal,
            privacy: Privacy::Public,
        }
    }

    pub fn is_public(&self) -> bool {
        self.privacy == Privacy::Public
    }
}

/// Strip prefixes from a raw attribute name and report its markers.
pub fn classify(raw_name: &str) -> (String, Privacy, Evaluation) {
    if let Some(rest) = raw_name.strip_prefix(":@") {
        (rest.to_string(), Privacy::Private, Evaluation::Dynamic)
    } else if let Some(rest) = raw_name.strip_prefix(DYNAMIC_PREFIX) {
        (rest.to_string(), Privacy::Public, Evaluation::Dynamic)
    } else if let Some(rest) = raw_name.strip_prefix(PROPERTY_PREFIX) {
        (rest.to_string(), Privacy::Private, Evaluation::Literal)
    } else if raw_name.starts_with(DIRECTIVE_PREFIX) {
        (raw_name.to_string(), Privacy::Private, Evaluation::Literal)
    } else {
        (raw_name.to_string(), Privacy::Public, Evaluation::Literal)
    }
}

pub fn is_directive(raw_name: &str) -> bool {
    raw_name.starts_with(DIRECTIVE_PREFIX)
}

pub fn is_content_directive(raw_name: &str) -> bool {
    matches!(
        raw_name,
        HTML_DIRECTIVE | TEXT_DIRECTIVE | RAW_DIRECTIVE | SPREAD_DIRECTIVE
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Wrap an evaluator failure with the offending source text.
pub fn evaluation_error(
    context: &str,
    source: &str,
    file: &str,
    err: EvaluationError,
) -> CompilerError {
    let message = if err.is_syntax() && CLASS_WORD_RE.is_match(source) {
        format!(
            "Error parsing `{}` in `{}`: `class` is a reserved word. Use `webc.attributes.class` to read the class attribute instead.",
            source, file
        )
    } else {
        format!("Evaluating {} `{}` in `{}` failed: {}", context, source, file, err)
    };
    CompilerError::Evaluation {
        message,
        source_text: source.to_string(),
        file: file.to_string(),
        cause: err.to_string(),
    }
}

/// Evaluate one expression against the cascade, collecting its free variables first.
pub fn evaluate_expression(
    expression: &str,
    context: &str,
    data: &DataCascade,
    evaluator: &dyn ExpressionEvaluator,
    file: &str,
) -> Result<Value> {
    if expression.trim().is_empty() {
        return Ok(Value::Null);
    }
    let variables =
        free_variables(expression).map_err(|e| evaluation_error(context, expression, file, e))?;
    evaluator
        .evaluate(expression, &variables, data)
        .map_err(|e| evaluation_error(context, expression, file, e))
}

pub fn evaluate_attribute(
    raw_name: &str,
    raw_value: &str,
    data: &DataCascade,
    evaluator: &dyn ExpressionEvaluator,
    file: &str,
) -> Result<EvaluatedAttribute> {
    let (name, privacy, evaluation) = classify(raw_name);
    let value = match evaluation {
        Evaluation::Literal => Value::String(raw_value.to_string()),
        Evaluation::Dynamic => {
            let context = format!("attribute `{}`", raw_name);
            evaluate_expression(raw_value, &context, data, evaluator, file)?
        }
    };
    Ok(EvaluatedAttribute {
        name,
        raw_name: raw_name.to_string(),
        value,
        raw_value: raw_value.to_string(),
        evaluation,
        privacy,
    })
}

/// Evaluate every non-directive attribute of a node, in source order.
pub fn evaluate_attributes(
    attributes: &[Attribute],
    data: &DataCascade,
    evaluator: &dyn ExpressionEvaluator,
    file: &str,
) -> Result<Vec<EvaluatedAttribute>> {
    attributes
        .iter()
        .filter(|attr| !is_directive(&attr.name) && !is_content_directive(&attr.name))
        .map(|attr| evaluate_attribute(&attr.name, &attr.value, data, evaluator, file))
        .collect()
}

/// Attributes spread from an object value (`@attributes`). Keys become public literals.
pub fn spread_attributes(value: &Value) -> Vec<EvaluatedAttribute> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(name, value)| EvaluatedAttribute {
                name: name.clone(),
                raw_name: name.clone(),
                value: value.clone(),
                raw_value: to_display_string(value),
                evaluation: Evaluation::Dynamic,
                privacy: Privacy::Public,
            })
            .collect(),
        _ => Vec::new(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MERGING
// ═══════════════════════════════════════════════════════════════════════════════

fn merge_class(existing: &Value, incoming: &Value) -> Value {
    let mut tokens: Vec<String> = Vec::new();
    for value in [existing, incoming] {
        for token in to_display_string(value).split_whitespace() {
            if !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
    }
    Value::String(tokens.join(" "))
}

fn merge_style(existing: &Value, incoming: &Value) -> Value {
    let declarations: Vec<String> = [existing, incoming]
        .into_iter()
        .flat_map(|value| {
            to_display_string(value)
                .split(';')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
        })
        .collect();
    Value::String(declarations.join("; "))
}

/// Combine attributes from several sources. `class` and `style` accumulate, everything else is
/// last-writer-wins at the position of its first appearance. Public and private `class`/`style`
/// values accumulate separately so a private source never hides or leaks into the rendered one.
pub fn merge_attributes(
    attributes: impl IntoIterator<Item = EvaluatedAttribute>,
) -> Vec<EvaluatedAttribute> {
    let mut merged: IndexMap<String, EvaluatedAttribute> = IndexMap::new();
    for attr in attributes {
        let key = match (attr.name.as_str(), attr.privacy) {
            ("class" | "style", Privacy::Private) => format!("{}{}", PROPERTY_PREFIX, attr.name),
            _ => attr.name.clone(),
        };
        match merged.get_mut(&key) {
            Some(existing) if attr.name == "class" => {
                existing.value = merge_class(&existing.value, &attr.value);
            }
            Some(existing) if attr.name == "style" => {
                existing.value = merge_style(&existing.value, &attr.value);
            }
            Some(existing) => *existing = attr,
            None => {
                merged.insert(key, attr);
            }
        }
    }
    merged.into_values().collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

pub fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// ` name="value"` for each public attribute. `null`/`false` drop the attribute and an empty
/// string renders as a bare boolean attribute.
pub fn serialize_attributes(attributes: &[EvaluatedAttribute]) -> String {
    let mut out = String::new();
    for attr in attributes.iter().filter(|a| a.is_public()) {
        match &attr.value {
            Value::Null | Value::Bool(false) => {}
            Value::String(s) if s.is_empty() => {
                out.push(' ');
                out.push_str(&attr.name);
            }
            value => {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(&to_display_string(value)));
                out.push('"');
            }
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// CASCADE PROJECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Attribute values as cascade entries, camel-cased, directives excluded.
pub fn to_cascade(attributes: &[EvaluatedAttribute]) -> Map<String, Value> {
    attributes
        .iter()
        .filter(|a| !is_directive(&a.raw_name))
        .map(|a| (camel_case(&a.name), a.value.clone()))
        .collect()
}

/// Attribute values under their unprefixed names, for `webc.attributes`.
pub fn to_raw_map(attributes: &[EvaluatedAttribute]) -> Map<String, Value> {
    attributes
        .iter()
        .filter(|a| !is_directive(&a.raw_name))
        .map(|a| (a.name.clone(), a.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::static_eval::StaticEvaluator;
    use serde_json::json;
    use std::sync::Arc;

    fn data(globals: Value) -> DataCascade {
        let map = match globals {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        DataCascade::new(Arc::new(map), Arc::default())
    }

    #[test]
    fn test_classify_forms() {
        assert_eq!(
            classify("title"),
            ("title".to_string(), Privacy::Public, Evaluation::Literal)
        );
        assert_eq!(
            classify("webc:keep"),
            ("webc:keep".to_string(), Privacy::Private, Evaluation::Literal)
        );
        assert_eq!(
            classify("@label"),
            ("label".to_string(), Privacy::Private, Evaluation::Literal)
        );
        assert_eq!(
            classify(":href"),
            ("href".to_string(), Privacy::Public, Evaluation::Dynamic)
        );
        assert_eq!(
            classify(":@items"),
            ("items".to_string(), Privacy::Private, Evaluation::Dynamic)
        );
    }

    #[test]
    fn test_merge_class_dedupes_in_order() {
        let merged = merge_attributes(vec![
            EvaluatedAttribute::literal("class", "a b"),
            EvaluatedAttribute::literal("class", "b c"),
        ]);
        assert_eq!(serialize_attributes(&merged), r#" class="a b c""#);
    }

    #[test]
    fn test_private_class_does_not_hide_public_class() {
        let mut private = EvaluatedAttribute::literal("class", "b");
        private.privacy = Privacy::Private;
        let merged = merge_attributes(vec![
            EvaluatedAttribute::literal("class", "a"),
            private.clone(),
            EvaluatedAttribute::literal("class", "c"),
        ]);
        assert_eq!(serialize_attributes(&merged), r#" class="a c""#);

        let merged = merge_attributes(vec![private, EvaluatedAttribute::literal("class", "a")]);
        assert_eq!(serialize_attributes(&merged), r#" class="a""#);
    }

    #[test]
    fn test_merge_style_and_last_writer_wins() {
        let merged = merge_attributes(vec![
            EvaluatedAttribute::literal("style", "color: red;"),
            EvaluatedAttribute::literal("id", "one"),
            EvaluatedAttribute::literal("style", " margin: 0 "),
            EvaluatedAttribute::literal("id", "two"),
        ]);
        assert_eq!(
            serialize_attributes(&merged),
            r#" style="color: red; margin: 0" id="two""#
        );
    }

    #[test]
    fn test_serialize_rules() {
        let mut private = EvaluatedAttribute::literal("secret", "x");
        private.privacy = Privacy::Private;
        let mut missing = EvaluatedAttribute::literal("gone", "");
        missing.value = Value::Null;
        let attrs = vec![
            EvaluatedAttribute::literal("disabled", ""),
            private,
            missing,
            EvaluatedAttribute::literal("title", "a \"b\" & c"),
        ];
        assert_eq!(
            serialize_attributes(&attrs),
            r#" disabled title="a &quot;b&quot; &amp; c""#
        );
    }

    #[test]
    fn test_dynamic_attribute() {
        let cascade = data(json!({ "name": "World" }));
        let attr = evaluate_attribute(
            ":title",
            "'Hello ' + name",
            &cascade,
            &StaticEvaluator::new(),
            "page.webc",
        )
        .unwrap();
        assert_eq!(attr.name, "title");
        assert_eq!(attr.value, json!("Hello World"));
        assert_eq!(attr.evaluation, Evaluation::Dynamic);
    }

    #[test]
    fn test_reserved_class_hint() {
        let cascade = data(json!({}));
        let err = evaluate_attribute(
            ":class",
            "class + ' extra'",
            &cascade,
            &StaticEvaluator::new(),
            "c.webc",
        )
        .unwrap_err();
        assert!(err.to_string().contains("webc.attributes.class"));
    }

    #[test]
    fn test_cascade_projection_camel_cases() {
        let attrs = vec![
            EvaluatedAttribute::literal("my-label", "x"),
            EvaluatedAttribute::literal("webc:if", "true"),
        ];
        let map = to_cascade(&attrs);
        assert_eq!(map.get("myLabel"), Some(&json!("x")));
        assert!(!map.contains_key("webc:if"));
    }
}
