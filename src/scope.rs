//! Free-variable analysis for template expressions.
//!
//! Before an expression is handed to an evaluator the compiler works out which identifiers
//! it reads from the surrounding data, so only those values need to be fetched from the cascade.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::Expression;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::collections::HashSet;

use crate::expression::EvaluationError;

lazy_static! {
    /// Identifiers provided by the evaluator rather than by the data cascade.
    pub static ref EVALUATOR_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("Math");
        s.insert("JSON");
        s.insert("String");
        s.insert("Number");
        s.insert("Boolean");
        s.insert("Array");
        s.insert("Object");
        s.insert("undefined");
        s.insert("NaN");
        s.insert("Infinity");
        s
    };
}

/// Identifiers referenced by `expression` that are neither bound inside it nor globals,
/// in first-use order.
pub fn free_variables(expression: &str) -> Result<Vec<String>, EvaluationError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let expr = Parser::new(&allocator, expression, source_type)
        .parse_expression()
        .map_err(|errors| {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            EvaluationError::Syntax(message)
        })?;
    Ok(collect_free_variables(&expr))
}

pub fn collect_free_variables(expr: &Expression) -> Vec<String> {
    let mut collector = ScopeAwareCollector {
        references: vec![],
        bindings: HashSet::new(),
    };
    collector.visit_expression(expr);

    let mut seen = HashSet::new();
    collector
        .references
        .into_iter()
        .filter(|name| {
            !collector.bindings.contains(name)
                && !EVALUATOR_GLOBALS.contains(name.as_str())
                && seen.insert(name.clone())
        })
        .collect()
}

struct ScopeAwareCollector {
    references: Vec<String>,
    bindings: HashSet<String>,
}

impl<'a> Visit<'a> for ScopeAwareCollector {
    fn visit_identifier_reference(&mut self, ident: &oxc_ast::ast::IdentifierReference) {
        self.references.push(ident.name.to_string());
    }

    fn visit_binding_identifier(&mut self, ident: &oxc_ast::ast::BindingIdentifier) {
        self.bindings.insert(ident.name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_references() {
        assert_eq!(free_variables("title").unwrap(), vec!["title"]);
        assert_eq!(
            free_variables("a + b.c + a").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_member_properties_are_not_free() {
        assert_eq!(free_variables("user.name.first").unwrap(), vec!["user"]);
    }

    #[test]
    fn test_arrow_parameters_are_bound() {
        let vars = free_variables("items.map(item => item.label + suffix)").unwrap();
        assert_eq!(vars, vec!["items".to_string(), "suffix".to_string()]);
    }

    #[test]
    fn test_globals_are_excluded() {
        assert_eq!(free_variables("Math.max(a, 1)").unwrap(), vec!["a"]);
        assert!(free_variables("JSON.stringify({})").unwrap().is_empty());
    }

    #[test]
    fn test_syntax_error() {
        let err = free_variables("a +").unwrap_err();
        assert!(err.is_syntax());
    }
}
