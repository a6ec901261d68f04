//! Static Expression Evaluator
//!
//! Interprets a side-effect free subset of JavaScript directly over the oxc AST, reading
//! identifiers from the data cascade. Constructs outside the subset fail with
//! [`EvaluationError::Unsupported`] instead of being approximated.
//!
//! Supported: literals, template literals, array and object literals (with spread), member
//! access (including optional chains), calls to helpers and a small set of builtins, unary,
//! binary, logical and conditional operators, and arrow functions used as callbacks. Scripts
//! may declare `const`/`let`/`var` bindings, `export` them, and `export default` a value or a
//! function whose body uses declarations, `if` and `return`.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, ArrayExpressionElement, ArrowFunctionExpression, BindingPattern, CallExpression,
    ChainElement, ComputedMemberExpression, Declaration, ExportDefaultDeclarationKind,
    Expression, FormalParameters, Function, ObjectPropertyKind, Program, Statement,
    StaticMemberExpression, TemplateLiteral, VariableDeclaration,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::cascade::DataCascade;
use crate::expression::{
    format_number, is_truthy, number_value, to_display_string, type_name, EvaluationError,
    ExpressionEvaluator, Helper,
};

/// Upper bound, in bytes, for strings built by `repeat`.
const MAX_STRING_LENGTH: usize = 1 << 24;

#[derive(Debug, Default, Clone, Copy)]
pub struct StaticEvaluator;

impl StaticEvaluator {
    pub fn new() -> Self {
        StaticEvaluator
    }
}

fn source_type() -> SourceType {
    SourceType::default().with_module(true)
}

fn join_messages<E: ToString>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ExpressionEvaluator for StaticEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        free_variables: &[String],
        data: &DataCascade,
    ) -> Result<Value, EvaluationError> {
        let allocator = Allocator::default();
        let expr = Parser::new(&allocator, expression, source_type())
            .parse_expression()
            .map_err(|errors| EvaluationError::Syntax(join_messages(&errors)))?;

        let mut prefetched = Map::new();
        for name in free_variables {
            if let Some(value) = data.get(name) {
                prefetched.insert(name.clone(), value);
            }
        }

        let mut interpreter = Interpreter::new(expression, data, prefetched);
        finish(interpreter.eval(&expr))
    }

    fn evaluate_bindings(
        &self,
        script: &str,
        data: &DataCascade,
    ) -> Result<Map<String, Value>, EvaluationError> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, script, source_type()).parse();
        if !ret.errors.is_empty() {
            return Err(EvaluationError::Syntax(join_messages(&ret.errors)));
        }

        let mut interpreter = Interpreter::new(script, data, Map::new());
        finish(interpreter.run_module(&ret.program, false))?;
        Ok(interpreter.into_bindings())
    }

    fn evaluate_default_export(
        &self,
        script: &str,
        data: &DataCascade,
    ) -> Result<Value, EvaluationError> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, script, source_type()).parse();
        if !ret.errors.is_empty() {
            return Err(EvaluationError::Syntax(join_messages(&ret.errors)));
        }

        let mut interpreter = Interpreter::new(script, data, Map::new());
        finish(interpreter.run_module(&ret.program, true))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INTERPRETER
// ═══════════════════════════════════════════════════════════════════════════════

/// Control flow out of an expression: a real error, or an optional chain hitting `null`.
enum Interrupt {
    Error(EvaluationError),
    ShortCircuit,
}

impl From<EvaluationError> for Interrupt {
    fn from(err: EvaluationError) -> Self {
        Interrupt::Error(err)
    }
}

type Eval<T = Value> = Result<T, Interrupt>;

fn runtime(message: impl Into<String>) -> Interrupt {
    Interrupt::Error(EvaluationError::Runtime(message.into()))
}

fn unsupported(what: impl Into<String>) -> Interrupt {
    Interrupt::Error(EvaluationError::Unsupported(what.into()))
}

fn finish<T: Default>(result: Eval<T>) -> Result<T, EvaluationError> {
    match result {
        Ok(value) => Ok(value),
        Err(Interrupt::ShortCircuit) => Ok(T::default()),
        Err(Interrupt::Error(err)) => Err(err),
    }
}

#[derive(Clone, Copy)]
enum Callable<'s, 'a> {
    Arrow(&'s ArrowFunctionExpression<'a>),
    Function(&'s Function<'a>),
}

impl<'s, 'a> Callable<'s, 'a> {
    fn params(&self) -> &'s FormalParameters<'a> {
        match *self {
            Callable::Arrow(arrow) => &arrow.params,
            Callable::Function(function) => &function.params,
        }
    }
}

enum Callback<'s, 'a> {
    Ast(Callable<'s, 'a>),
    Helper(Helper),
}

fn callable_of<'s, 'a>(expr: &'s Expression<'a>) -> Option<Callable<'s, 'a>> {
    match expr {
        Expression::ArrowFunctionExpression(arrow) => Some(Callable::Arrow(arrow)),
        Expression::FunctionExpression(function) => Some(Callable::Function(function)),
        Expression::ParenthesizedExpression(paren) => callable_of(&paren.expression),
        _ => None,
    }
}

struct Interpreter<'d> {
    source: &'d str,
    data: &'d DataCascade,
    frames: Vec<Map<String, Value>>,
}

impl<'d> Interpreter<'d> {
    fn new(source: &'d str, data: &'d DataCascade, root: Map<String, Value>) -> Self {
        Self {
            source,
            data,
            frames: vec![root],
        }
    }

    fn into_bindings(self) -> Map<String, Value> {
        self.frames.into_iter().next().unwrap_or_default()
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .cloned()
            .or_else(|| self.data.get(name))
    }

    fn unsupported_at(&self, span: Span) -> Interrupt {
        let text = self
            .source
            .get(span.start as usize..span.end as usize)
            .unwrap_or("expression");
        unsupported(format!("`{}`", text))
    }

    // ─── Modules ──────────────────────────────────────────────────────────────

    fn run_module<'a>(&mut self, program: &Program<'a>, evaluate_default: bool) -> Eval {
        let mut last = Value::Null;
        let mut default = None;

        for statement in &program.body {
            match statement {
                Statement::ExportNamedDeclaration(export) => match &export.declaration {
                    Some(Declaration::VariableDeclaration(decl)) => self.declare(decl)?,
                    Some(_) => return Err(self.unsupported_at(statement.span())),
                    None => {}
                },
                Statement::ExportDefaultDeclaration(export) => {
                    if evaluate_default {
                        default = Some(self.eval_default(&export.declaration)?);
                    }
                }
                Statement::ExpressionStatement(stmt) => {
                    last = self.eval(&stmt.expression)?;
                }
                other => {
                    self.exec_statement(other)?;
                }
            }
        }

        Ok(default.unwrap_or(last))
    }

    fn eval_default<'a>(&mut self, kind: &ExportDefaultDeclarationKind<'a>) -> Eval {
        match kind {
            ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                self.invoke(Callable::Function(function), Vec::new())
            }
            other => match other.as_expression() {
                Some(expr) => match callable_of(expr) {
                    Some(callable) => self.invoke(callable, Vec::new()),
                    None => self.eval(expr),
                },
                None => Err(unsupported("default export declaration")),
            },
        }
    }

    // ─── Statements ───────────────────────────────────────────────────────────

    fn declare<'a>(&mut self, decl: &VariableDeclaration<'a>) -> Eval<()> {
        for declarator in &decl.declarations {
            let value = match &declarator.init {
                Some(init) => self.eval(init)?,
                None => Value::Null,
            };
            let frame = self
                .frames
                .last_mut()
                .ok_or_else(|| runtime("no active scope"))?;
            bind_pattern(&declarator.id, value, frame)?;
        }
        Ok(())
    }

    fn exec_statements<'a>(&mut self, statements: &[Statement<'a>]) -> Eval<Option<Value>> {
        for statement in statements {
            if let Some(value) = self.exec_statement(statement)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Returns `Some` when a `return` statement completes the enclosing function.
    fn exec_statement<'a>(&mut self, statement: &Statement<'a>) -> Eval<Option<Value>> {
        match statement {
            Statement::VariableDeclaration(decl) => {
                self.declare(decl)?;
                Ok(None)
            }
            Statement::ExpressionStatement(stmt) => {
                self.eval(&stmt.expression)?;
                Ok(None)
            }
            Statement::ReturnStatement(ret) => {
                let value = match &ret.argument {
                    Some(arg) => self.eval(arg)?,
                    None => Value::Null,
                };
                Ok(Some(value))
            }
            Statement::IfStatement(stmt) => {
                if is_truthy(&self.eval(&stmt.test)?) {
                    self.exec_statement(&stmt.consequent)
                } else if let Some(alternate) = &stmt.alternate {
                    self.exec_statement(alternate)
                } else {
                    Ok(None)
                }
            }
            Statement::BlockStatement(block) => {
                self.frames.push(Map::new());
                let result = self.exec_statements(&block.body);
                self.frames.pop();
                result
            }
            Statement::EmptyStatement(_) => Ok(None),
            other => Err(self.unsupported_at(other.span())),
        }
    }

    // ─── Expressions ──────────────────────────────────────────────────────────

    fn eval<'a>(&mut self, expr: &Expression<'a>) -> Eval {
        match expr {
            Expression::NullLiteral(_) => Ok(Value::Null),
            Expression::BooleanLiteral(b) => Ok(Value::Bool(b.value)),
            Expression::NumericLiteral(n) => Ok(number_value(n.value)),
            Expression::StringLiteral(s) => Ok(Value::String(s.value.to_string())),
            Expression::TemplateLiteral(t) => self.eval_template(t),
            Expression::Identifier(id) => Ok(self.lookup(id.name.as_str()).unwrap_or(Value::Null)),
            Expression::ThisExpression(_) => Ok(self.data.to_object()),
            Expression::ArrayExpression(array) => {
                let mut items = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    match element {
                        ArrayExpressionElement::SpreadElement(spread) => {
                            let value = self.eval(&spread.argument)?;
                            items.extend(spread_values(&value)?);
                        }
                        ArrayExpressionElement::Elision(_) => items.push(Value::Null),
                        other => {
                            if let Some(e) = other.as_expression() {
                                items.push(self.eval(e)?);
                            }
                        }
                    }
                }
                Ok(Value::Array(items))
            }
            Expression::ObjectExpression(object) => {
                let mut map = Map::new();
                for property in &object.properties {
                    match property {
                        ObjectPropertyKind::ObjectProperty(prop) => {
                            let key = if prop.computed {
                                match prop.key.as_expression() {
                                    Some(e) => property_key(&self.eval(e)?),
                                    None => return Err(self.unsupported_at(prop.span)),
                                }
                            } else {
                                match prop.key.static_name() {
                                    Some(name) => name.to_string(),
                                    None => return Err(self.unsupported_at(prop.span)),
                                }
                            };
                            let value = self.eval(&prop.value)?;
                            map.insert(key, value);
                        }
                        ObjectPropertyKind::SpreadProperty(spread) => {
                            match self.eval(&spread.argument)? {
                                Value::Object(other) => map.extend(other),
                                Value::Array(items) => {
                                    for (index, item) in items.into_iter().enumerate() {
                                        map.insert(index.to_string(), item);
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                }
                Ok(Value::Object(map))
            }
            Expression::StaticMemberExpression(m) => self.eval_static_member(m),
            Expression::ComputedMemberExpression(m) => self.eval_computed_member(m),
            Expression::ChainExpression(chain) => {
                let result = match &chain.expression {
                    ChainElement::CallExpression(call) => self.eval_call(call),
                    ChainElement::StaticMemberExpression(m) => self.eval_static_member(m),
                    ChainElement::ComputedMemberExpression(m) => self.eval_computed_member(m),
                    _ => Err(self.unsupported_at(chain.span)),
                };
                match result {
                    Err(Interrupt::ShortCircuit) => Ok(Value::Null),
                    other => other,
                }
            }
            Expression::CallExpression(call) => self.eval_call(call),
            Expression::UnaryExpression(u) => {
                let value = self.eval(&u.argument)?;
                unary(u.operator, &value)
            }
            Expression::BinaryExpression(b) => {
                let left = self.eval(&b.left)?;
                let right = self.eval(&b.right)?;
                binary(b.operator, &left, &right)
            }
            Expression::LogicalExpression(l) => {
                let left = self.eval(&l.left)?;
                match l.operator {
                    LogicalOperator::Or if is_truthy(&left) => Ok(left),
                    LogicalOperator::And if !is_truthy(&left) => Ok(left),
                    LogicalOperator::Coalesce if !left.is_null() => Ok(left),
                    _ => self.eval(&l.right),
                }
            }
            Expression::ConditionalExpression(c) => {
                if is_truthy(&self.eval(&c.test)?) {
                    self.eval(&c.consequent)
                } else {
                    self.eval(&c.alternate)
                }
            }
            Expression::ParenthesizedExpression(p) => self.eval(&p.expression),
            Expression::AwaitExpression(a) => self.eval(&a.argument),
            Expression::SequenceExpression(seq) => {
                let mut last = Value::Null;
                for e in &seq.expressions {
                    last = self.eval(e)?;
                }
                Ok(last)
            }
            other => Err(self.unsupported_at(other.span())),
        }
    }

    fn eval_template<'a>(&mut self, template: &TemplateLiteral<'a>) -> Eval {
        let mut out = String::new();
        for (index, quasi) in template.quasis.iter().enumerate() {
            let text = quasi.value.cooked.as_ref().unwrap_or(&quasi.value.raw);
            out.push_str(text.as_str());
            if let Some(expr) = template.expressions.get(index) {
                let value = self.eval(expr)?;
                out.push_str(&to_display_string(&value));
            }
        }
        Ok(Value::String(out))
    }

    fn eval_static_member<'a>(&mut self, member: &StaticMemberExpression<'a>) -> Eval {
        let name = member.property.name.as_str();
        if let Expression::Identifier(id) = &member.object {
            if id.name.as_str() == "Math" && name == "PI" && self.lookup("Math").is_none() {
                return Ok(number_value(std::f64::consts::PI));
            }
        }
        let object = self.eval(&member.object)?;
        access(&object, name, member.optional)
    }

    fn eval_computed_member<'a>(&mut self, member: &ComputedMemberExpression<'a>) -> Eval {
        let object = self.eval(&member.object)?;
        let key = self.eval(&member.expression)?;
        access(&object, &property_key(&key), member.optional)
    }

    // ─── Calls ────────────────────────────────────────────────────────────────

    fn eval_arguments<'a>(&mut self, arguments: &[Argument<'a>]) -> Eval<Vec<Value>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                Argument::SpreadElement(spread) => {
                    let value = self.eval(&spread.argument)?;
                    values.extend(spread_values(&value)?);
                }
                other => {
                    if let Some(e) = other.as_expression() {
                        values.push(self.eval(e)?);
                    }
                }
            }
        }
        Ok(values)
    }

    fn eval_call<'a>(&mut self, call: &CallExpression<'a>) -> Eval {
        match &call.callee {
            Expression::Identifier(id) => {
                let args = self.eval_arguments(&call.arguments)?;
                self.call_function(id.name.as_str(), args, call.optional)
            }
            Expression::StaticMemberExpression(m) => self.eval_method_call(
                &m.object,
                m.property.name.as_str(),
                m.optional,
                &call.arguments,
            ),
            Expression::ComputedMemberExpression(m) => {
                let key = property_key(&self.eval(&m.expression)?);
                self.eval_method_call(&m.object, &key, m.optional, &call.arguments)
            }
            callee => match callable_of(callee) {
                Some(callable) => {
                    let args = self.eval_arguments(&call.arguments)?;
                    self.invoke(callable, args)
                }
                None => Err(self.unsupported_at(callee.span())),
            },
        }
    }

    fn call_function(&mut self, name: &str, args: Vec<Value>, optional: bool) -> Eval {
        match self.lookup(name) {
            None | Some(Value::Null) => {}
            Some(_) => return Err(runtime(format!("{} is not a function", name))),
        }
        let data = self.data;
        if let Some(helper) = data.helper(name) {
            return helper(&args).map_err(|message| runtime(format!("{}: {}", name, message)));
        }
        if let Some(value) = global_function(name, &args) {
            return Ok(value);
        }
        if optional {
            return Err(Interrupt::ShortCircuit);
        }
        Err(runtime(format!("{} is not defined", name)))
    }

    fn eval_method_call<'a>(
        &mut self,
        object_expr: &Expression<'a>,
        method: &str,
        optional: bool,
        arguments: &[Argument<'a>],
    ) -> Eval {
        if let Expression::Identifier(id) = object_expr {
            let namespace = id.name.as_str();
            if is_builtin_namespace(namespace) && self.lookup(namespace).is_none() {
                let args = self.eval_arguments(arguments)?;
                return builtin_static(namespace, method, &args);
            }
        }

        let object = self.eval(object_expr)?;
        if object.is_null() {
            if optional {
                return Err(Interrupt::ShortCircuit);
            }
            return Err(runtime(format!(
                "Cannot read properties of undefined (reading '{}')",
                method
            )));
        }

        if let Value::Array(items) = &object {
            if is_callback_method(method) {
                let callback = match arguments.first().and_then(|a| a.as_expression()) {
                    Some(e) => self.callback_of(e)?,
                    None => return Err(runtime(format!("{} requires a callback", method))),
                };
                return self.array_callback_method(items, method, &callback);
            }
        }

        let args = self.eval_arguments(arguments)?;
        match &object {
            Value::Array(items) => array_method(items, method, &args),
            Value::String(s) => string_method(s, method, &args),
            Value::Number(n) => number_method(n.as_f64().unwrap_or(f64::NAN), method, &args),
            Value::Object(map) if method == "hasOwnProperty" => {
                let key = args.first().map(property_key).unwrap_or_default();
                Ok(Value::Bool(map.contains_key(&key)))
            }
            other => Err(runtime(format!(
                "{}.{} is not a function",
                type_name(other),
                method
            ))),
        }
    }

    fn callback_of<'s, 'a>(&self, expr: &'s Expression<'a>) -> Eval<Callback<'s, 'a>> {
        if let Some(callable) = callable_of(expr) {
            return Ok(Callback::Ast(callable));
        }
        if let Expression::Identifier(id) = expr {
            if let Some(helper) = self.data.helper(id.name.as_str()) {
                return Ok(Callback::Helper(helper.clone()));
            }
        }
        Err(self.unsupported_at(expr.span()))
    }

    fn call_callback(&mut self, callback: &Callback<'_, '_>, args: Vec<Value>) -> Eval {
        match callback {
            Callback::Ast(callable) => self.invoke(*callable, args),
            Callback::Helper(helper) => helper(&args).map_err(runtime),
        }
    }

    fn array_callback_method(
        &mut self,
        items: &[Value],
        method: &str,
        callback: &Callback<'_, '_>,
    ) -> Eval {
        let mut collected = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let result = self.call_callback(callback, vec![item.clone(), Value::from(index)])?;
            let truthy = is_truthy(&result);
            match method {
                "map" => collected.push(result),
                "filter" if truthy => collected.push(item.clone()),
                "find" if truthy => return Ok(item.clone()),
                "findIndex" if truthy => return Ok(Value::from(index)),
                "some" if truthy => return Ok(Value::Bool(true)),
                "every" if !truthy => return Ok(Value::Bool(false)),
                _ => {}
            }
        }
        Ok(match method {
            "map" | "filter" => Value::Array(collected),
            "findIndex" => Value::from(-1),
            "some" => Value::Bool(false),
            "every" => Value::Bool(true),
            _ => Value::Null,
        })
    }

    fn invoke<'a>(&mut self, callable: Callable<'_, 'a>, args: Vec<Value>) -> Eval {
        let mut frame = Map::new();
        for (index, param) in callable.params().items.iter().enumerate() {
            let value = args.get(index).cloned().unwrap_or(Value::Null);
            bind_pattern(&param.pattern, value, &mut frame)?;
        }

        self.frames.push(frame);
        let result = match callable {
            Callable::Arrow(arrow) if arrow.expression => match arrow.body.statements.first() {
                Some(Statement::ExpressionStatement(stmt)) => self.eval(&stmt.expression),
                _ => Ok(Value::Null),
            },
            Callable::Arrow(arrow) => self
                .exec_statements(&arrow.body.statements)
                .map(Option::unwrap_or_default),
            Callable::Function(function) => match &function.body {
                Some(body) => self
                    .exec_statements(&body.statements)
                    .map(Option::unwrap_or_default),
                None => Ok(Value::Null),
            },
        };
        self.frames.pop();
        result
    }
}

fn bind_pattern(
    pattern: &BindingPattern,
    value: Value,
    frame: &mut Map<String, Value>,
) -> Result<(), EvaluationError> {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            frame.insert(id.name.to_string(), value);
        }
        BindingPattern::ObjectPattern(obj) => {
            let mut remaining = match value {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            for prop in &obj.properties {
                let key = prop.key.static_name().map(|k| k.to_string()).ok_or_else(|| {
                    EvaluationError::Unsupported("computed destructuring key".to_string())
                })?;
                let field = remaining.remove(&key).unwrap_or(Value::Null);
                bind_pattern(&prop.value, field, frame)?;
            }
            if let Some(rest) = &obj.rest {
                bind_pattern(&rest.argument, Value::Object(remaining), frame)?;
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            let items = match value {
                Value::Array(items) => items,
                Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                _ => Vec::new(),
            };
            for (index, element) in arr.elements.iter().enumerate() {
                if let Some(element) = element {
                    let item = items.get(index).cloned().unwrap_or(Value::Null);
                    bind_pattern(element, item, frame)?;
                }
            }
            if let Some(rest) = &arr.rest {
                let tail = items.iter().skip(arr.elements.len()).cloned().collect();
                bind_pattern(&rest.argument, Value::Array(tail), frame)?;
            }
        }
        #[allow(unreachable_patterns)]
        _ => {
            return Err(EvaluationError::Unsupported(
                "default values in bindings".to_string(),
            ))
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(items) if items.is_empty() => 0.0,
        _ => f64::NAN,
    }
}

fn property_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => to_display_string(other),
    }
}

fn property(object: &Value, key: &str) -> Value {
    match object {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        Value::Array(items) => {
            if key == "length" {
                return Value::from(items.len());
            }
            key.parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null)
        }
        Value::String(s) => {
            if key == "length" {
                return Value::from(s.chars().count());
            }
            key.parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn access(object: &Value, key: &str, optional: bool) -> Eval {
    if object.is_null() {
        if optional {
            return Err(Interrupt::ShortCircuit);
        }
        return Err(runtime(format!(
            "Cannot read properties of undefined (reading '{}')",
            key
        )));
    }
    Ok(property(object, key))
}

fn spread_values(value: &Value) -> Eval<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        other => Err(runtime(format!("{} is not iterable", type_name(other)))),
    }
}

fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => to_number(left) == to_number(right),
        _ => strict_equals(left, right),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => to_number(left).partial_cmp(&to_number(right)),
    }
}

fn unary(operator: UnaryOperator, value: &Value) -> Eval {
    match operator {
        UnaryOperator::LogicalNot => Ok(Value::Bool(!is_truthy(value))),
        UnaryOperator::UnaryNegation => Ok(number_value(-to_number(value))),
        UnaryOperator::UnaryPlus => Ok(number_value(to_number(value))),
        UnaryOperator::Typeof => {
            let name = match value {
                Value::Array(_) => "object",
                other => type_name(other),
            };
            Ok(Value::String(name.to_string()))
        }
        UnaryOperator::Void => Ok(Value::Null),
        other => Err(unsupported(format!("operator `{}`", other.as_str()))),
    }
}

fn binary(operator: BinaryOperator, left: &Value, right: &Value) -> Eval {
    let textual = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    let value = match operator {
        BinaryOperator::Addition => {
            if textual(left) || textual(right) {
                Value::String(format!(
                    "{}{}",
                    to_display_string(left),
                    to_display_string(right)
                ))
            } else {
                number_value(to_number(left) + to_number(right))
            }
        }
        BinaryOperator::Subtraction => number_value(to_number(left) - to_number(right)),
        BinaryOperator::Multiplication => number_value(to_number(left) * to_number(right)),
        BinaryOperator::Division => number_value(to_number(left) / to_number(right)),
        BinaryOperator::Remainder => number_value(to_number(left) % to_number(right)),
        BinaryOperator::Exponential => number_value(to_number(left).powf(to_number(right))),
        BinaryOperator::Equality => Value::Bool(loose_equals(left, right)),
        BinaryOperator::Inequality => Value::Bool(!loose_equals(left, right)),
        BinaryOperator::StrictEquality => Value::Bool(strict_equals(left, right)),
        BinaryOperator::StrictInequality => Value::Bool(!strict_equals(left, right)),
        BinaryOperator::LessThan => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOperator::LessEqualThan => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOperator::GreaterThan => {
            Value::Bool(compare(left, right) == Some(Ordering::Greater))
        }
        BinaryOperator::GreaterEqualThan => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOperator::In => match right {
            Value::Object(map) => Value::Bool(map.contains_key(&property_key(left))),
            Value::Array(items) => Value::Bool(
                property_key(left)
                    .parse::<usize>()
                    .map(|i| i < items.len())
                    .unwrap_or(false),
            ),
            other => {
                return Err(runtime(format!(
                    "Cannot use 'in' operator to search in {}",
                    type_name(other)
                )))
            }
        },
        other => return Err(unsupported(format!("operator `{}`", other.as_str()))),
    };
    Ok(value)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILTINS
// ═══════════════════════════════════════════════════════════════════════════════

fn is_builtin_namespace(name: &str) -> bool {
    matches!(name, "Object" | "JSON" | "Math" | "Array" | "Number")
}

fn is_callback_method(name: &str) -> bool {
    matches!(name, "map" | "filter" | "find" | "findIndex" | "some" | "every")
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

fn relative_index(index: f64, len: usize) -> usize {
    let len = len as f64;
    let clamped = if index < 0.0 {
        (len + index).max(0.0)
    } else {
        index.min(len)
    };
    clamped as usize
}

fn slice_bounds(args: &[Value], len: usize) -> (usize, usize) {
    let start = args
        .first()
        .filter(|v| !v.is_null())
        .map(|v| relative_index(to_number(v), len))
        .unwrap_or(0);
    let end = args
        .get(1)
        .filter(|v| !v.is_null())
        .map(|v| relative_index(to_number(v), len))
        .unwrap_or(len);
    (start, end.max(start))
}

fn global_function(name: &str, args: &[Value]) -> Option<Value> {
    let first = arg(args, 0);
    let value = match name {
        "String" => Value::String(to_display_string(&first)),
        "Number" => number_value(to_number(&first)),
        "Boolean" => Value::Bool(is_truthy(&first)),
        "parseFloat" => number_value(to_number(&first)),
        "parseInt" => number_value(to_number(&first).trunc()),
        _ => return None,
    };
    Some(value)
}

fn builtin_static(namespace: &str, method: &str, args: &[Value]) -> Eval {
    let first = arg(args, 0);
    let value = match (namespace, method) {
        ("Object", "keys") => match &first {
            Value::Object(map) => map.keys().map(|k| Value::String(k.clone())).collect(),
            Value::Array(items) => (0..items.len()).map(|i| Value::String(i.to_string())).collect(),
            _ => Value::Array(Vec::new()),
        },
        ("Object", "values") => match first {
            Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
            Value::Array(items) => Value::Array(items),
            _ => Value::Array(Vec::new()),
        },
        ("Object", "entries") => match first {
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| Value::Array(vec![Value::String(k), v]))
                .collect(),
            _ => Value::Array(Vec::new()),
        },
        ("Object", "assign") => {
            let mut merged = Map::new();
            for source in args {
                if let Value::Object(map) = source {
                    merged.extend(map.clone());
                }
            }
            Value::Object(merged)
        }
        ("JSON", "stringify") => {
            let text = if args.get(2).map(|v| !v.is_null()).unwrap_or(false) {
                serde_json::to_string_pretty(&first)
            } else {
                serde_json::to_string(&first)
            };
            Value::String(text.map_err(|e| runtime(e.to_string()))?)
        }
        ("JSON", "parse") => serde_json::from_str(&to_display_string(&first))
            .map_err(|e| runtime(format!("JSON.parse: {}", e)))?,
        ("Array", "isArray") => Value::Bool(first.is_array()),
        ("Array", "from") => Value::Array(spread_values(&first)?),
        ("Number", "isInteger") => Value::Bool(
            first
                .as_f64()
                .map(|f| f.is_finite() && f.fract() == 0.0)
                .unwrap_or(false),
        ),
        ("Math", m) => math(m, args)?,
        _ => {
            return Err(runtime(format!(
                "{}.{} is not a function",
                namespace, method
            )))
        }
    };
    Ok(value)
}

fn math(method: &str, args: &[Value]) -> Eval {
    let x = args.first().map(to_number).unwrap_or(f64::NAN);
    let result = match method {
        "floor" => x.floor(),
        "ceil" => x.ceil(),
        "round" => (x + 0.5).floor(),
        "trunc" => x.trunc(),
        "abs" => x.abs(),
        "sqrt" => x.sqrt(),
        "sign" => {
            if x == 0.0 || x.is_nan() {
                x
            } else {
                x.signum()
            }
        }
        "pow" => x.powf(args.get(1).map(to_number).unwrap_or(f64::NAN)),
        "max" => args.iter().map(to_number).fold(f64::NEG_INFINITY, f64::max),
        "min" => args.iter().map(to_number).fold(f64::INFINITY, f64::min),
        _ => return Err(runtime(format!("Math.{} is not a function", method))),
    };
    Ok(number_value(result))
}

fn array_method(items: &[Value], method: &str, args: &[Value]) -> Eval {
    let first = arg(args, 0);
    let value = match method {
        "join" => {
            let separator = if first.is_null() {
                ",".to_string()
            } else {
                to_display_string(&first)
            };
            Value::String(
                items
                    .iter()
                    .map(to_display_string)
                    .collect::<Vec<_>>()
                    .join(&separator),
            )
        }
        "includes" => Value::Bool(items.iter().any(|item| strict_equals(item, &first))),
        "indexOf" => items
            .iter()
            .position(|item| strict_equals(item, &first))
            .map(Value::from)
            .unwrap_or_else(|| Value::from(-1)),
        "slice" => {
            let (start, end) = slice_bounds(args, items.len());
            Value::Array(items[start..end].to_vec())
        }
        "concat" => {
            let mut joined = items.to_vec();
            for extra in args {
                match extra {
                    Value::Array(more) => joined.extend(more.iter().cloned()),
                    other => joined.push(other.clone()),
                }
            }
            Value::Array(joined)
        }
        "reverse" => Value::Array(items.iter().rev().cloned().collect()),
        "at" => {
            let index = to_number(&first);
            let resolved = if index < 0.0 {
                items.len() as f64 + index
            } else {
                index
            };
            if resolved < 0.0 {
                Value::Null
            } else {
                items.get(resolved as usize).cloned().unwrap_or(Value::Null)
            }
        }
        _ => return Err(runtime(format!("array.{} is not a function", method))),
    };
    Ok(value)
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Eval {
    let first = arg(args, 0);
    let needle = to_display_string(&first);
    let value = match method {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "trimStart" => Value::String(s.trim_start().to_string()),
        "trimEnd" => Value::String(s.trim_end().to_string()),
        "toString" => Value::String(s.to_string()),
        "includes" => Value::Bool(s.contains(needle.as_str())),
        "startsWith" => Value::Bool(s.starts_with(needle.as_str())),
        "endsWith" => Value::Bool(s.ends_with(needle.as_str())),
        "indexOf" => match s.find(needle.as_str()) {
            Some(byte_index) => Value::from(s[..byte_index].chars().count()),
            None => Value::from(-1),
        },
        "split" => {
            if first.is_null() {
                Value::Array(vec![Value::String(s.to_string())])
            } else if needle.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(needle.as_str())
                    .map(|part| Value::String(part.to_string()))
                    .collect()
            }
        }
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(args, chars.len());
            Value::String(chars[start..end].iter().collect())
        }
        "replace" => Value::String(s.replacen(needle.as_str(), &to_display_string(&arg(args, 1)), 1)),
        "replaceAll" => Value::String(s.replace(needle.as_str(), &to_display_string(&arg(args, 1)))),
        "repeat" => {
            let count = to_number(&first);
            let count = if count.is_nan() { 0.0 } else { count.trunc() };
            if count < 0.0 || count.is_infinite() {
                return Err(runtime(format!("invalid repeat count {}", format_number(count))));
            }
            if count * s.len() as f64 > MAX_STRING_LENGTH as f64 {
                return Err(runtime("repeat result exceeds the maximum string length".to_string()));
            }
            Value::String(s.repeat(count as usize))
        }
        "charAt" => Value::String(
            s.chars()
                .nth(to_number(&first).max(0.0) as usize)
                .map(|c| c.to_string())
                .unwrap_or_default(),
        ),
        _ => return Err(runtime(format!("string.{} is not a function", method))),
    };
    Ok(value)
}

fn number_method(n: f64, method: &str, args: &[Value]) -> Eval {
    match method {
        "toFixed" => {
            let digits = args.first().map(to_number).unwrap_or(0.0).clamp(0.0, 100.0) as usize;
            Ok(Value::String(format!("{:.*}", digits, n)))
        }
        "toString" => Ok(Value::String(format_number(n))),
        _ => Err(runtime(format!("number.{} is not a function", method))),
    }
}
