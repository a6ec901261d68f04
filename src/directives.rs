//! Control-flow directives: conditional sibling chains and loop expansion.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::attributes::evaluate_expression;
use crate::cascade::DataCascade;
use crate::error::{CompilerError, Result};
use crate::expression::{is_truthy, number_value, type_name, ExpressionEvaluator};
use crate::node::Node;

pub const IF_DIRECTIVE: &str = "webc:if";
pub const ELSEIF_DIRECTIVE: &str = "webc:elseif";
pub const ELSE_DIRECTIVE: &str = "webc:else";
pub const FOR_DIRECTIVE: &str = "webc:for";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conditional<'n> {
    If(&'n str),
    ElseIf(&'n str),
    Else,
}

pub fn conditional_of(node: &Node) -> Option<Conditional<'_>> {
    if let Some(expr) = node.attribute(IF_DIRECTIVE) {
        Some(Conditional::If(expr))
    } else if let Some(expr) = node.attribute(ELSEIF_DIRECTIVE) {
        Some(Conditional::ElseIf(expr))
    } else if node.has_attribute(ELSE_DIRECTIVE) {
        Some(Conditional::Else)
    } else {
        None
    }
}

/// Evaluate a condition expression to a boolean.
pub fn test_condition(
    expression: &str,
    data: &DataCascade,
    evaluator: &dyn ExpressionEvaluator,
    file: &str,
) -> Result<bool> {
    let value = evaluate_expression(expression, "condition", data, evaluator, file)?;
    Ok(is_truthy(&value))
}

/// Resolve conditional chains among `children` and return the nodes that should render, in
/// order. Comments and whitespace-only text never break a chain. A node that also loops keeps
/// its condition for per-iteration evaluation and does not open a chain.
pub fn schedule_children<'n>(
    children: &'n [Arc<Node>],
    data: &DataCascade,
    evaluator: &dyn ExpressionEvaluator,
    file: &str,
) -> Result<Vec<&'n Arc<Node>>> {
    let mut scheduled = Vec::with_capacity(children.len());
    // Some(satisfied) while a chain is open
    let mut chain: Option<bool> = None;

    for child in children {
        if child.is_comment() || child.is_whitespace_text() {
            scheduled.push(child);
            continue;
        }

        match conditional_of(child) {
            None => {
                chain = None;
                scheduled.push(child);
            }
            Some(Conditional::If(_)) if child.has_attribute(FOR_DIRECTIVE) => {
                chain = None;
                scheduled.push(child);
            }
            Some(Conditional::If(expr)) => {
                let passed = test_condition(expr, data, evaluator, file)?;
                chain = Some(passed);
                if passed {
                    scheduled.push(child);
                }
            }
            Some(Conditional::ElseIf(expr)) => match chain {
                None => return Err(orphaned(ELSEIF_DIRECTIVE, file)),
                Some(true) => {}
                Some(false) => {
                    let passed = test_condition(expr, data, evaluator, file)?;
                    chain = Some(passed);
                    if passed {
                        scheduled.push(child);
                    }
                }
            },
            Some(Conditional::Else) => {
                match chain {
                    None => return Err(orphaned(ELSE_DIRECTIVE, file)),
                    Some(true) => {}
                    Some(false) => scheduled.push(child),
                }
                chain = None;
            }
        }
    }

    Ok(scheduled)
}

fn orphaned(directive: &str, file: &str) -> CompilerError {
    CompilerError::OrphanedDirective {
        directive: directive.to_string(),
        file: file.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOOPS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// `value, index of source`
    Of,
    /// `key, value, index in source`
    In,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSpec {
    pub kind: LoopKind,
    pub bindings: Vec<String>,
    pub source: String,
}

/// Split a `webc:for` value at the first ` of ` or ` in ` separator.
pub fn parse_loop(value: &str) -> Option<LoopSpec> {
    let of = value.find(" of ").map(|i| (i, LoopKind::Of));
    let within = value.find(" in ").map(|i| (i, LoopKind::In));
    let (index, kind) = match (of, within) {
        (Some(a), Some(b)) => {
            if a.0 < b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };

    let left = value[..index].trim();
    let source = value[index + 4..].trim();
    let unwrapped = left
        .strip_prefix('(')
        .and_then(|l| l.strip_suffix(')'))
        .or_else(|| left.strip_prefix('{').and_then(|l| l.strip_suffix('}')))
        .unwrap_or(left);
    let bindings: Vec<String> = unwrapped
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(String::from)
        .collect();

    if bindings.is_empty() || source.is_empty() {
        return None;
    }
    Some(LoopSpec {
        kind,
        bindings,
        source: source.to_string(),
    })
}

fn bind(bindings: &[String], values: Vec<Value>) -> Map<String, Value> {
    bindings.iter().cloned().zip(values).collect()
}

/// Evaluate the loop source once and produce the bindings for every iteration.
pub fn expand_loop(
    spec: &LoopSpec,
    data: &DataCascade,
    evaluator: &dyn ExpressionEvaluator,
    file: &str,
) -> Result<Vec<Map<String, Value>>> {
    let source = evaluate_expression(&spec.source, "loop source", data, evaluator, file)?;
    let not_iterable = |found: &Value| CompilerError::NotIterable {
        expression: spec.source.clone(),
        found: type_name(found).to_string(),
        file: file.to_string(),
    };

    let iterations = match (&source, spec.kind) {
        (Value::Null, _) => Vec::new(),
        (Value::Array(items), LoopKind::Of) => items
            .iter()
            .enumerate()
            .map(|(i, item)| bind(&spec.bindings, vec![item.clone(), number_value(i as f64)]))
            .collect(),
        (Value::Array(items), LoopKind::In) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let index = number_value(i as f64);
                bind(&spec.bindings, vec![index.clone(), item.clone(), index])
            })
            .collect(),
        (Value::Object(map), LoopKind::In) => map
            .iter()
            .enumerate()
            .map(|(i, (key, value))| {
                bind(
                    &spec.bindings,
                    vec![Value::String(key.clone()), value.clone(), number_value(i as f64)],
                )
            })
            .collect(),
        (Value::String(text), LoopKind::Of) => text
            .chars()
            .enumerate()
            .map(|(i, c)| {
                bind(
                    &spec.bindings,
                    vec![Value::String(c.to_string()), number_value(i as f64)],
                )
            })
            .collect(),
        (other, _) => return Err(not_iterable(other)),
    };

    tracing::trace!("Loop `{}` expands to {} iteration(s)", spec.source, iterations.len());
    Ok(iterations)
}
