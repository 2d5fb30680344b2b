//! Template parser and node renderer.
//!
//! Converts lexer [`Token`]s into a tree of [`Node`]s. Parsing carries a
//! [`ParserState`] whose `counters` map owns one shared counter slot per
//! `{% increment name %}` name; every node parsed for the same name clones
//! the same slot, so repeated renders of those nodes count together while a
//! fresh parse starts every name back at zero.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use glossia_core::error::GlossiaError;

use crate::context::{escape_html, Context, ContextValue};
use crate::engine::TemplateHost;
use crate::filters::FilterEnv;
use crate::lexer::Token;
use crate::library::LibraryRegistry;

/// A parsed filter call: name plus optional argument expressions.
#[derive(Debug, Clone)]
pub struct FilterCall {
    /// The filter name, e.g. `lower` or `mult`.
    pub name: String,
    /// Arguments, e.g. the `50` in `mult:50`.
    pub args: Vec<Expression>,
}

/// A parsed expression: a variable reference or a literal.
#[derive(Debug, Clone)]
pub enum Expression {
    /// A possibly dotted variable reference, e.g. `message.msgstr`.
    Variable(String),
    /// A quoted string literal.
    StringLiteral(String),
    /// A numeric literal.
    NumericLiteral(f64),
}

impl Expression {
    /// Resolves this expression against a context.
    pub fn resolve(&self, context: &Context) -> ContextValue {
        match self {
            Self::Variable(name) => context.get(name).cloned().unwrap_or(ContextValue::None),
            Self::StringLiteral(s) => ContextValue::String(s.clone()),
            Self::NumericLiteral(n) => {
                if n.fract() == 0.0 {
                    ContextValue::Integer(*n as i64)
                } else {
                    ContextValue::Float(*n)
                }
            }
        }
    }
}

/// Parses the content of a `{{ }}` tag into a base expression and its
/// filter chain, e.g. `msg|format_message|lines_count`.
pub fn parse_variable_expression(
    expr: &str,
) -> Result<(Expression, Vec<FilterCall>), GlossiaError> {
    let parts = split_outside_quotes(expr, '|');
    let mut iter = parts.iter();
    let base = iter
        .next()
        .ok_or_else(|| GlossiaError::TemplateSyntaxError("Empty variable tag".to_string()))?;
    let base_expr = parse_expression(base)?;

    let mut filters = Vec::new();
    for part in iter {
        filters.push(parse_filter_call(part.trim())?);
    }

    Ok((base_expr, filters))
}

/// Splits `s` on `sep`, ignoring separators inside quoted strings.
fn split_outside_quotes(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;

    for (i, ch) in s.char_indices() {
        match ch {
            '\'' | '"' => match quote {
                None => quote = Some(ch),
                Some(q) if q == ch => quote = None,
                Some(_) => {}
            },
            c if c == sep && quote.is_none() => {
                parts.push(&s[start..i]);
                start = i + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Parses a single expression string (literal or variable reference).
pub fn parse_expression(s: &str) -> Result<Expression, GlossiaError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(GlossiaError::TemplateSyntaxError(
            "Empty expression".to_string(),
        ));
    }

    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        return Ok(Expression::StringLiteral(s[1..s.len() - 1].to_string()));
    }

    if let Ok(n) = s.parse::<f64>() {
        return Ok(Expression::NumericLiteral(n));
    }

    Ok(Expression::Variable(s.to_string()))
}

/// Parses `mult:50` or `default:"n/a"` into a [`FilterCall`].
fn parse_filter_call(s: &str) -> Result<FilterCall, GlossiaError> {
    let parts = split_outside_quotes(s, ':');
    let name = parts[0].trim().to_string();
    if name.is_empty() {
        return Err(GlossiaError::TemplateSyntaxError(
            "Empty filter name".to_string(),
        ));
    }
    let mut args = Vec::new();
    for part in &parts[1..] {
        args.push(parse_expression(part)?);
    }
    Ok(FilterCall { name, args })
}

/// A node in the parsed template tree.
pub enum Node {
    /// Literal text.
    Text(String),
    /// A variable with its filter chain.
    Variable {
        /// The base expression.
        expression: Expression,
        /// Filters applied left to right.
        filters: Vec<FilterCall>,
    },
    /// `{% extends "parent.html" %}`.
    Extends {
        /// Parent template name.
        parent: String,
    },
    /// `{% block name %}...{% endblock %}`.
    BlockDef {
        /// Block name.
        name: String,
        /// Default content.
        content: Vec<Node>,
    },
    /// `{% if %}` with elif/else branches in order.
    If {
        /// Condition and body per branch; an `else` branch uses
        /// [`IfCondition::Else`].
        branches: Vec<(IfCondition, Vec<Node>)>,
    },
    /// `{% for var in iterable %}`.
    For {
        /// Loop variable names.
        loop_vars: Vec<String>,
        /// The iterable expression.
        iterable: Expression,
        /// Loop body.
        body: Vec<Node>,
        /// `{% empty %}` body.
        empty_body: Vec<Node>,
    },
    /// `{% with key=value %}`.
    With {
        /// Scoped assignments.
        assignments: Vec<(String, Expression)>,
        /// Body nodes.
        body: Vec<Node>,
    },
    /// `{% include "name.html" [with k=v ...] [only] %}`.
    Include {
        /// Template name expression.
        template_name: Expression,
        /// Extra context assignments.
        extra_context: Vec<(String, Expression)>,
        /// When set, the included template sees only the extra context.
        only: bool,
    },
    /// `{% try_include "name.html" [with k=v ...] [only] %}`. Renders the
    /// named template, or nothing at all when it does not exist.
    TryInclude {
        /// Template name expression.
        template_name: Expression,
        /// Extra context assignments.
        extra_context: Vec<(String, Expression)>,
        /// When set, the included template sees only the extra context.
        only: bool,
    },
    /// `{% increment name %}`. Each render emits the next value of the
    /// named counter, starting at 1. Nodes sharing a name share the slot.
    Counter {
        /// Counter name, kept for diagnostics.
        name: String,
        /// The shared counter slot.
        count: Arc<AtomicI64>,
    },
    /// `{% comment %}...{% endcomment %}`.
    Comment,
    /// `{% autoescape on|off %}...{% endautoescape %}`.
    Autoescape {
        /// Whether escaping is on inside the body.
        enabled: bool,
        /// Body nodes.
        body: Vec<Node>,
    },
    /// A simple tag provided by a loaded library.
    SimpleTag {
        /// Tag name.
        name: String,
        /// Argument expressions.
        args: Vec<Expression>,
    },
}

/// An expression with an attached filter chain, as used in `{% if %}`
/// operands like `total|gt:50` or `"extra.html"|template_exists`.
#[derive(Debug, Clone)]
pub struct FilterExpression {
    /// The base expression.
    pub expression: Expression,
    /// Filters applied left to right.
    pub filters: Vec<FilterCall>,
}

impl FilterExpression {
    /// Resolves the base expression and runs it through the filter chain.
    ///
    /// # Errors
    ///
    /// Propagates filter lookup and application failures.
    pub fn resolve(
        &self,
        context: &Context,
        host: &dyn TemplateHost,
    ) -> Result<ContextValue, GlossiaError> {
        let mut value = self.expression.resolve(context);
        let env = FilterEnv::with_host(host);
        for filter in &self.filters {
            let args: Vec<ContextValue> =
                filter.args.iter().map(|a| a.resolve(context)).collect();
            value = host.filters().apply(&filter.name, &value, &args, &env)?;
        }
        Ok(value)
    }
}

/// A condition in an `{% if %}` branch.
#[derive(Debug, Clone)]
pub enum IfCondition {
    /// Truthiness of a filtered expression.
    Expr(FilterExpression),
    /// Negation.
    Not(Box<IfCondition>),
    /// Logical AND.
    And(Box<IfCondition>, Box<IfCondition>),
    /// Logical OR.
    Or(Box<IfCondition>, Box<IfCondition>),
    /// Binary comparison with `==`, `!=`, `<`, `>`, `<=`, or `>=`.
    Compare(FilterExpression, String, FilterExpression),
    /// The `else` branch, always true.
    Else,
}

impl IfCondition {
    /// Evaluates this condition against a context.
    ///
    /// # Errors
    ///
    /// Propagates filter application failures from the operands.
    pub fn evaluate(
        &self,
        context: &Context,
        host: &dyn TemplateHost,
    ) -> Result<bool, GlossiaError> {
        Ok(match self {
            Self::Expr(expr) => expr.resolve(context, host)?.is_truthy(),
            Self::Not(inner) => !inner.evaluate(context, host)?,
            Self::And(l, r) => l.evaluate(context, host)? && r.evaluate(context, host)?,
            Self::Or(l, r) => l.evaluate(context, host)? || r.evaluate(context, host)?,
            Self::Compare(l, op, r) => compare_values(
                &l.resolve(context, host)?,
                op,
                &r.resolve(context, host)?,
            ),
            Self::Else => true,
        })
    }
}

fn compare_values(left: &ContextValue, op: &str, right: &ContextValue) -> bool {
    match op {
        "==" => left == right,
        "!=" => left != right,
        _ => {
            if let (Some(l), Some(r)) = (left.as_float(), right.as_float()) {
                numeric_compare(l, op, r)
            } else {
                let l = left.to_display_string();
                let r = right.to_display_string();
                match op {
                    "<" => l < r,
                    ">" => l > r,
                    "<=" => l <= r,
                    ">=" => l >= r,
                    _ => false,
                }
            }
        }
    }
}

fn numeric_compare(l: f64, op: &str, r: f64) -> bool {
    match op {
        "<" => l < r,
        ">" => l > r,
        "<=" => l <= r,
        ">=" => l >= r,
        _ => false,
    }
}

/// A parsed template ready for rendering.
pub struct Template {
    /// The template name, usually its loader path.
    pub name: String,
    /// The parsed node tree.
    pub nodes: Vec<Node>,
    /// The parent template name when `{% extends %}` is present.
    pub parent: Option<String>,
}

/// Parses a token stream into a [`Template`].
///
/// Library lookups for `{% load %}` and unknown tags resolve against
/// `libraries`, so an unregistered tag fails here rather than at render
/// time.
///
/// # Errors
///
/// Returns `TemplateSyntaxError` for malformed or unknown tags.
pub fn parse(
    name: &str,
    tokens: &[Token],
    libraries: &LibraryRegistry,
) -> Result<Template, GlossiaError> {
    let mut state = ParserState::new(tokens, libraries);
    let nodes = state.parse_nodes(&[])?;

    Ok(Template {
        name: name.to_string(),
        parent: state.parent,
        nodes,
    })
}

/// Parse-time state.
///
/// `counters` is the per-parse registry of counter slots: the single place
/// `{% increment %}` nodes obtain their shared [`AtomicI64`] from.
struct ParserState<'a> {
    tokens: &'a [Token],
    pos: usize,
    parent: Option<String>,
    libraries: &'a LibraryRegistry,
    counters: HashMap<String, Arc<AtomicI64>>,
}

impl<'a> ParserState<'a> {
    fn new(tokens: &'a [Token], libraries: &'a LibraryRegistry) -> Self {
        Self {
            tokens,
            pos: 0,
            parent: None,
            libraries,
            counters: HashMap::new(),
        }
    }

    fn parse_nodes(&mut self, end_tags: &[&str]) -> Result<Vec<Node>, GlossiaError> {
        let mut nodes = Vec::new();

        while self.pos < self.tokens.len() {
            match &self.tokens[self.pos] {
                Token::Text(text) => {
                    nodes.push(Node::Text(text.clone()));
                    self.pos += 1;
                }
                Token::Comment(_) => {
                    self.pos += 1;
                }
                Token::Variable(expr) => {
                    let (expression, filters) = parse_variable_expression(expr)?;
                    nodes.push(Node::Variable {
                        expression,
                        filters,
                    });
                    self.pos += 1;
                }
                Token::Block(tag_name, args) => {
                    if end_tags.contains(&tag_name.as_str()) {
                        break;
                    }
                    if let Some(node) = self.parse_block_tag(&tag_name.clone(), &args.clone())? {
                        nodes.push(node);
                    }
                }
            }
        }

        Ok(nodes)
    }

    fn parse_block_tag(
        &mut self,
        tag_name: &str,
        args: &[String],
    ) -> Result<Option<Node>, GlossiaError> {
        match tag_name {
            "extends" => {
                let parent = strip_quotes(args.first().ok_or_else(|| {
                    GlossiaError::TemplateSyntaxError(
                        "{% extends %} requires a template name".to_string(),
                    )
                })?);
                self.parent = Some(parent.clone());
                self.pos += 1;
                Ok(Some(Node::Extends { parent }))
            }
            "block" => {
                let name = args
                    .first()
                    .ok_or_else(|| {
                        GlossiaError::TemplateSyntaxError(
                            "{% block %} requires a name".to_string(),
                        )
                    })?
                    .clone();
                self.pos += 1;
                let content = self.parse_nodes(&["endblock"])?;
                self.pos += 1;
                Ok(Some(Node::BlockDef { name, content }))
            }
            "if" => self.parse_if(args),
            "for" => self.parse_for(args),
            "with" => self.parse_with(args),
            "include" => self.parse_include(args, false),
            "try_include" => self.parse_include(args, true),
            "increment" => {
                let name = args.first().ok_or_else(|| {
                    GlossiaError::TemplateSyntaxError(
                        "{% increment %} requires exactly one argument".to_string(),
                    )
                })?;
                let count = self.counter_slot(name);
                self.pos += 1;
                Ok(Some(Node::Counter {
                    name: name.clone(),
                    count,
                }))
            }
            "comment" => {
                self.pos += 1;
                let _ = self.parse_nodes(&["endcomment"])?;
                self.pos += 1;
                Ok(Some(Node::Comment))
            }
            "autoescape" => {
                let enabled = args.first().map_or(true, |a| a != "off");
                self.pos += 1;
                let body = self.parse_nodes(&["endautoescape"])?;
                self.pos += 1;
                Ok(Some(Node::Autoescape { enabled, body }))
            }
            "load" => {
                for lib_name in args {
                    if !self.libraries.has(lib_name) {
                        return Err(GlossiaError::TemplateSyntaxError(format!(
                            "'{lib_name}' is not a registered tag library"
                        )));
                    }
                }
                self.pos += 1;
                Ok(None)
            }
            _ => {
                if self.libraries.find_simple_tag(tag_name).is_some() {
                    let tag_args: Result<Vec<Expression>, _> =
                        args.iter().map(|a| parse_expression(a)).collect();
                    self.pos += 1;
                    Ok(Some(Node::SimpleTag {
                        name: tag_name.to_string(),
                        args: tag_args?,
                    }))
                } else {
                    Err(GlossiaError::TemplateSyntaxError(format!(
                        "Unknown tag: '{tag_name}'"
                    )))
                }
            }
        }
    }

    /// Returns the counter slot for `name`, creating it at zero on first
    /// sight. Slots live only as long as this parse.
    fn counter_slot(&mut self, name: &str) -> Arc<AtomicI64> {
        Arc::clone(
            self.counters
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AtomicI64::new(0))),
        )
    }

    fn parse_if(&mut self, args: &[String]) -> Result<Option<Node>, GlossiaError> {
        let condition = parse_if_condition(args)?;
        self.pos += 1;

        let mut branches = Vec::new();
        let body = self.parse_nodes(&["elif", "else", "endif"])?;
        branches.push((condition, body));

        while self.pos < self.tokens.len() {
            let Token::Block(tag, tag_args) = &self.tokens[self.pos] else {
                break;
            };
            match tag.as_str() {
                "elif" => {
                    let condition = parse_if_condition(&tag_args.clone())?;
                    self.pos += 1;
                    let body = self.parse_nodes(&["elif", "else", "endif"])?;
                    branches.push((condition, body));
                }
                "else" => {
                    self.pos += 1;
                    let body = self.parse_nodes(&["endif"])?;
                    branches.push((IfCondition::Else, body));
                    self.pos += 1;
                    break;
                }
                "endif" => {
                    self.pos += 1;
                    break;
                }
                _ => break,
            }
        }

        Ok(Some(Node::If { branches }))
    }

    fn parse_for(&mut self, args: &[String]) -> Result<Option<Node>, GlossiaError> {
        let in_pos = args.iter().position(|a| a == "in").ok_or_else(|| {
            GlossiaError::TemplateSyntaxError("{% for %} requires 'in'".to_string())
        })?;

        let loop_vars: Vec<String> = args[..in_pos]
            .iter()
            .map(|v| v.trim_end_matches(',').to_string())
            .collect();
        if loop_vars.is_empty() {
            return Err(GlossiaError::TemplateSyntaxError(
                "{% for %} requires a loop variable".to_string(),
            ));
        }

        let iterable_str = args[in_pos + 1..].join(" ");
        let iterable = parse_expression(&iterable_str)?;

        self.pos += 1;
        let body = self.parse_nodes(&["empty", "endfor"])?;

        let mut empty_body = Vec::new();
        if let Some(Token::Block(tag, _)) = self.tokens.get(self.pos) {
            if tag == "empty" {
                self.pos += 1;
                empty_body = self.parse_nodes(&["endfor"])?;
            }
            self.pos += 1;
        }

        Ok(Some(Node::For {
            loop_vars,
            iterable,
            body,
            empty_body,
        }))
    }

    fn parse_with(&mut self, args: &[String]) -> Result<Option<Node>, GlossiaError> {
        let assignments = parse_assignments(args)?;
        self.pos += 1;
        let body = self.parse_nodes(&["endwith"])?;
        self.pos += 1;
        Ok(Some(Node::With { assignments, body }))
    }

    fn parse_include(
        &mut self,
        args: &[String],
        optional: bool,
    ) -> Result<Option<Node>, GlossiaError> {
        let tag = if optional { "try_include" } else { "include" };
        let template_name = args.first().map(|a| parse_expression(a)).ok_or_else(|| {
            GlossiaError::TemplateSyntaxError(format!("{{% {tag} %}} requires a template name"))
        })??;

        let mut rest = &args[1..];
        let only = rest.last().is_some_and(|a| a == "only");
        if only {
            rest = &rest[..rest.len() - 1];
        }
        let extra_context = if rest.first().is_some_and(|a| a == "with") {
            parse_assignments(&rest[1..])?
        } else {
            Vec::new()
        };

        self.pos += 1;
        Ok(Some(if optional {
            Node::TryInclude {
                template_name,
                extra_context,
                only,
            }
        } else {
            Node::Include {
                template_name,
                extra_context,
                only,
            }
        }))
    }
}

/// Parses `key=value` pairs from tag arguments.
fn parse_assignments(args: &[String]) -> Result<Vec<(String, Expression)>, GlossiaError> {
    let mut assignments = Vec::new();
    for arg in args {
        let Some(eq) = arg.find('=') else {
            return Err(GlossiaError::TemplateSyntaxError(format!(
                "Expected key=value, got '{arg}'"
            )));
        };
        let key = arg[..eq].to_string();
        let value = parse_expression(&arg[eq + 1..])?;
        assignments.push((key, value));
    }
    Ok(assignments)
}

/// Parses an if-condition with `or` < `and` < `not` precedence.
fn parse_if_condition(args: &[String]) -> Result<IfCondition, GlossiaError> {
    if args.is_empty() {
        return Err(GlossiaError::TemplateSyntaxError(
            "{% if %} requires a condition".to_string(),
        ));
    }
    parse_or(args, &mut 0)
}

fn parse_or(args: &[String], pos: &mut usize) -> Result<IfCondition, GlossiaError> {
    let left = parse_and(args, pos)?;
    if args.get(*pos).is_some_and(|a| a == "or") {
        *pos += 1;
        let right = parse_or(args, pos)?;
        Ok(IfCondition::Or(Box::new(left), Box::new(right)))
    } else {
        Ok(left)
    }
}

fn parse_and(args: &[String], pos: &mut usize) -> Result<IfCondition, GlossiaError> {
    let left = parse_not(args, pos)?;
    if args.get(*pos).is_some_and(|a| a == "and") {
        *pos += 1;
        let right = parse_and(args, pos)?;
        Ok(IfCondition::And(Box::new(left), Box::new(right)))
    } else {
        Ok(left)
    }
}

fn parse_not(args: &[String], pos: &mut usize) -> Result<IfCondition, GlossiaError> {
    if args.get(*pos).is_some_and(|a| a == "not") {
        *pos += 1;
        let inner = parse_not(args, pos)?;
        Ok(IfCondition::Not(Box::new(inner)))
    } else {
        parse_comparison(args, pos)
    }
}

fn parse_comparison(args: &[String], pos: &mut usize) -> Result<IfCondition, GlossiaError> {
    let left = parse_operand(args, pos)?;

    let Some(op) = args.get(*pos) else {
        return Ok(IfCondition::Expr(left));
    };
    match op.as_str() {
        "==" | "!=" | "<" | ">" | "<=" | ">=" => {
            let op = op.clone();
            *pos += 1;
            let right = parse_operand(args, pos)?;
            Ok(IfCondition::Compare(left, op, right))
        }
        _ => Ok(IfCondition::Expr(left)),
    }
}

/// Parses one condition operand, which may carry a filter chain.
fn parse_operand(args: &[String], pos: &mut usize) -> Result<FilterExpression, GlossiaError> {
    let operand = args.get(*pos).ok_or_else(|| {
        GlossiaError::TemplateSyntaxError("Unexpected end of if-condition".to_string())
    })?;
    let (expression, filters) = parse_variable_expression(operand)?;
    *pos += 1;
    Ok(FilterExpression {
        expression,
        filters,
    })
}

/// Strips matching surrounding quotes from a string.
pub fn strip_quotes(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Renders a node tree to a string.
pub fn render_nodes(
    nodes: &[Node],
    context: &mut Context,
    host: &dyn TemplateHost,
) -> Result<String, GlossiaError> {
    let mut output = String::new();
    for node in nodes {
        output.push_str(&render_node(node, context, host)?);
    }
    Ok(output)
}

fn render_node(
    node: &Node,
    context: &mut Context,
    host: &dyn TemplateHost,
) -> Result<String, GlossiaError> {
    match node {
        Node::Text(text) => Ok(text.clone()),
        Node::Variable {
            expression,
            filters,
        } => {
            let mut value = expression.resolve(context);

            let env = FilterEnv::with_host(host);
            for filter in filters {
                let filter_args: Vec<ContextValue> =
                    filter.args.iter().map(|a| a.resolve(context)).collect();
                value = host.filters().apply(&filter.name, &value, &filter_args, &env)?;
            }

            if context.auto_escape() && !value.is_safe() {
                Ok(escape_html(&value.to_display_string()))
            } else {
                Ok(value.to_display_string())
            }
        }
        // Inheritance is resolved by the engine before node rendering.
        Node::Extends { .. } => Ok(String::new()),
        Node::BlockDef { content, .. } => render_nodes(content, context, host),
        Node::If { branches } => {
            for (condition, body) in branches {
                if condition.evaluate(context, host)? {
                    return render_nodes(body, context, host);
                }
            }
            Ok(String::new())
        }
        Node::For {
            loop_vars,
            iterable,
            body,
            empty_body,
        } => render_for(loop_vars, iterable, body, empty_body, context, host),
        Node::With { assignments, body } => {
            context.push();
            for (key, expr) in assignments {
                let value = expr.resolve(context);
                context.set(key, value);
            }
            let result = render_nodes(body, context, host);
            context.pop();
            result
        }
        Node::Include {
            template_name,
            extra_context,
            only,
        } => render_include(template_name, extra_context, *only, false, context, host),
        Node::TryInclude {
            template_name,
            extra_context,
            only,
        } => render_include(template_name, extra_context, *only, true, context, host),
        Node::Counter { count, .. } => {
            let value = count.fetch_add(1, Ordering::Relaxed) + 1;
            Ok(value.to_string())
        }
        Node::Comment => Ok(String::new()),
        Node::Autoescape { enabled, body } => {
            let prev = context.auto_escape();
            context.set_auto_escape(*enabled);
            let result = render_nodes(body, context, host);
            context.set_auto_escape(prev);
            result
        }
        Node::SimpleTag { name, args } => {
            let tag = host.libraries().find_simple_tag(name).ok_or_else(|| {
                GlossiaError::TemplateSyntaxError(format!("Unknown tag: '{name}'"))
            })?;
            let values: Vec<ContextValue> = args.iter().map(|a| a.resolve(context)).collect();
            let result = tag(&values)?;
            if context.auto_escape() && !result.is_safe() {
                Ok(escape_html(&result.to_display_string()))
            } else {
                Ok(result.to_display_string())
            }
        }
    }
}

/// Renders an included template. When `optional` is set, a missing
/// template produces empty output instead of an error.
fn render_include(
    template_name: &Expression,
    extra_context: &[(String, Expression)],
    only: bool,
    optional: bool,
    context: &mut Context,
    host: &dyn TemplateHost,
) -> Result<String, GlossiaError> {
    let name = template_name.resolve(context).to_display_string();

    let result = if only {
        let mut inner = Context::new();
        inner.set_auto_escape(context.auto_escape());
        for (key, expr) in extra_context {
            let value = expr.resolve(context);
            inner.set(key, value);
        }
        host.render_template(&name, &mut inner)
    } else {
        context.push();
        for (key, expr) in extra_context {
            let value = expr.resolve(context);
            context.set(key, value);
        }
        let result = host.render_template(&name, context);
        context.pop();
        result
    };

    match result {
        Err(err) if optional && err.is_template_missing() => {
            tracing::debug!(template = %name, "skipping missing include");
            Ok(String::new())
        }
        other => other,
    }
}

fn render_for(
    loop_vars: &[String],
    iterable: &Expression,
    body: &[Node],
    empty_body: &[Node],
    context: &mut Context,
    host: &dyn TemplateHost,
) -> Result<String, GlossiaError> {
    let items = iterable.resolve(context);
    let list = match &items {
        ContextValue::List(list) => list.clone(),
        ContextValue::Dict(map) => {
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            keys.into_iter().map(ContextValue::String).collect()
        }
        _ => Vec::new(),
    };

    if list.is_empty() {
        return render_nodes(empty_body, context, host);
    }

    let total = list.len();
    let parent_loop = context.get("forloop").cloned();
    let mut output = String::new();

    for (idx, item) in list.iter().enumerate() {
        context.push();

        if loop_vars.len() == 1 {
            context.set(&loop_vars[0], item.clone());
        } else if let ContextValue::List(inner) = item {
            for (j, var) in loop_vars.iter().enumerate() {
                context.set(var, inner.get(j).cloned().unwrap_or(ContextValue::None));
            }
        } else {
            context.set(&loop_vars[0], item.clone());
        }

        let mut forloop = HashMap::new();
        forloop.insert("counter".to_string(), ContextValue::Integer((idx + 1) as i64));
        forloop.insert("counter0".to_string(), ContextValue::Integer(idx as i64));
        forloop.insert(
            "revcounter".to_string(),
            ContextValue::Integer((total - idx) as i64),
        );
        forloop.insert(
            "revcounter0".to_string(),
            ContextValue::Integer((total - idx - 1) as i64),
        );
        forloop.insert("first".to_string(), ContextValue::Bool(idx == 0));
        forloop.insert("last".to_string(), ContextValue::Bool(idx == total - 1));
        if let Some(ref parent) = parent_loop {
            forloop.insert("parentloop".to_string(), parent.clone());
        }
        context.set("forloop", ContextValue::Dict(forloop));

        output.push_str(&render_nodes(body, context, host)?);
        context.pop();
    }

    Ok(output)
}
