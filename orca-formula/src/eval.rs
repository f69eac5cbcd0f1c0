//! Formula evaluator
//!
//! Evaluates a quantity formula in four passes: variable substitution,
//! lexical validation, decimal-comma normalization, then arithmetic over
//! the parsed tree. The result is rounded to the configured quantity
//! precision.

use crate::ast::{BinOp, Expr, UnaryOp};
use crate::parser;
use orca_core::{Number, OrcaError, Settings};
use std::collections::HashMap;
use tracing::trace;

/// Formula evaluator
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    settings: Settings,
}

impl Evaluator {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Evaluate `expression` against `variables`, keyed by name in any case
    pub fn evaluate(
        &self,
        expression: &str,
        variables: &HashMap<String, Number>,
    ) -> Result<Number, OrcaError> {
        let substituted = substitute(expression, variables)?;
        validate_lexical(&substituted)?;
        let normalized = substituted.replace(',', ".");

        let expr = parser::parse_expr(&normalized, self.settings.max_nesting)?;
        let value = eval_expr(&expr)?.round(self.settings.quantity_places);

        trace!(expression, substituted = %normalized, result = %value, "formula evaluated");
        Ok(value)
    }
}

/// Evaluate with default settings
pub fn evaluate(expression: &str, variables: &HashMap<String, Number>) -> Result<Number, OrcaError> {
    Evaluator::default().evaluate(expression, variables)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split text into maximal identifier-character runs and the text between them.
/// Yields `(is_run, slice)` pairs covering the whole input.
fn runs(text: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_run = false;

    for (i, c) in text.char_indices() {
        let ident = is_ident_char(c);
        if ident != in_run {
            if i > start {
                out.push((in_run, &text[start..i]));
            }
            start = i;
            in_run = ident;
        }
    }
    if start < text.len() {
        out.push((in_run, &text[start..]));
    }
    out
}

/// A run names a variable when it starts with a letter or underscore;
/// runs starting with a digit are number literals (or garbage).
fn is_identifier(run: &str) -> bool {
    run.chars().next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
}

/// Replace every whole identifier that names a bound variable with the
/// variable's value. Identifier runs are matched whole, so `A1` never
/// captures the prefix of `A10`. Names that differ only in case are
/// rejected with `DuplicateName`.
pub fn substitute(expression: &str, variables: &HashMap<String, Number>) -> Result<String, OrcaError> {
    let mut bound: HashMap<String, &Number> = HashMap::with_capacity(variables.len());
    for (name, value) in variables {
        let key = name.to_uppercase();
        if bound.insert(key.clone(), value).is_some() {
            return Err(OrcaError::DuplicateName { name: key });
        }
    }

    let mut out = String::with_capacity(expression.len());
    for (is_run, text) in runs(expression) {
        if is_run && is_identifier(text) {
            if let Some(value) = bound.get(&text.to_uppercase()) {
                out.push_str(&render_literal(value));
                continue;
            }
        }
        out.push_str(text);
    }
    Ok(out)
}

/// Negative values are parenthesized so `A-B` with `B = -3` reads `A-(-3)`
fn render_literal(value: &Number) -> String {
    if value.is_negative() {
        format!("({})", value.to_plain_string())
    } else {
        value.to_plain_string()
    }
}

/// Identifiers referenced by `expression`, uppercased, in first-seen order
pub fn references(expression: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for (is_run, text) in runs(expression) {
        if is_run && is_identifier(text) {
            let name = text.to_uppercase();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
    }
    seen
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '.' | ',') || c.is_whitespace()
}

/// After substitution only digits, operators, parentheses, separators and
/// whitespace may remain. Anything else is reported with the whole run it
/// belongs to, which is usually the unresolved variable name.
fn validate_lexical(text: &str) -> Result<(), OrcaError> {
    for (is_run, run) in runs(text) {
        if let Some(bad) = run.chars().find(|c| !is_allowed(*c)) {
            let token = if is_run { run.to_uppercase() } else { bad.to_string() };
            return Err(OrcaError::unresolved(token));
        }
    }
    Ok(())
}

fn eval_expr(expr: &Expr) -> Result<Number, OrcaError> {
    match expr {
        Expr::Number(n) => Ok(n.clone()),
        Expr::UnaryOp(UnaryOp::Neg, inner) => Ok(eval_expr(inner)?.neg()),
        Expr::BinaryOp(left, op, right) => {
            let l = eval_expr(left)?;
            let r = eval_expr(right)?;
            match op {
                BinOp::Add => Ok(l.add(&r)),
                BinOp::Sub => Ok(l.sub(&r)),
                BinOp::Mul => Ok(l.mul(&r)),
                BinOp::Div => Ok(l.checked_div(&r)?),
            }
        }
    }
}
