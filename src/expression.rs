//! Expression capability.
//!
//! The compiler never executes expressions itself. It hands the expression text, the free
//! variables referenced by it and the current [`DataCascade`] to an [`ExpressionEvaluator`].
//! [`crate::static_eval::StaticEvaluator`] is the bundled implementation.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cascade::DataCascade;

/// A named helper callable from expressions.
pub type Helper = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;
pub type HelperMap = HashMap<String, Helper>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("{0}")]
    Runtime(String),
    #[error("Unsupported syntax: {0}")]
    Unsupported(String),
}

impl EvaluationError {
    pub fn is_syntax(&self) -> bool {
        matches!(self, EvaluationError::Syntax(_))
    }
}

pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate a single expression.
    fn evaluate(
        &self,
        expression: &str,
        free_variables: &[String],
        data: &DataCascade,
    ) -> Result<Value, EvaluationError>;

    /// Run a setup script and return every top-level binding it produces.
    fn evaluate_bindings(
        &self,
        script: &str,
        data: &DataCascade,
    ) -> Result<Map<String, Value>, EvaluationError>;

    /// Run a scripted render block and return its default export.
    fn evaluate_default_export(
        &self,
        script: &str,
        data: &DataCascade,
    ) -> Result<Value, EvaluationError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE SEMANTICS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form used when a value is written into markup. `null` renders as nothing.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(to_display_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

pub fn format_number(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

/// Build a JSON number, preferring an integer representation when exact.
pub fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "undefined",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `my-prop` → `myProp`. Attribute names arrive lower-cased from the parser.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
