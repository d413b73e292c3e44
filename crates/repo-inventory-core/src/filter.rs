//! Shorthand filter expansion and filter preparation.
//!
//! Users write filters like `{stars} > 10 & {name}.str.starts_with("d")`.
//! [`expand_shorthand`] rewrites each `{column}` token into a full column
//! reference, and [`prepare`] parses and type checks the result against the
//! schema of the table being filtered.

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::ExpressionError;
use crate::expr::{parse, Expr};
use crate::models::{DataType, Field, Record};

fn shorthand_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("static regex"))
}

/// Replace every `{ident}` token with `col("ident")`.
///
/// Text outside tokens is preserved verbatim. There is no nesting and no
/// escaping; input without tokens is returned unchanged.
pub fn expand_shorthand(filter: &str) -> String {
    shorthand_pattern()
        .replace_all(filter, r#"col("$1")"#)
        .into_owned()
}

/// A user-supplied filter, before preparation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FilterInput {
    /// An expression built in code; used as-is.
    Expression(Expr),
    /// Filter text, possibly containing `{column}` shorthand.
    Raw(String),
    #[default]
    Absent,
}

impl From<Expr> for FilterInput {
    fn from(expr: Expr) -> Self {
        FilterInput::Expression(expr)
    }
}

impl From<&str> for FilterInput {
    fn from(raw: &str) -> Self {
        FilterInput::Raw(raw.to_string())
    }
}

impl From<String> for FilterInput {
    fn from(raw: String) -> Self {
        FilterInput::Raw(raw)
    }
}

impl From<Option<String>> for FilterInput {
    fn from(raw: Option<String>) -> Self {
        raw.map(FilterInput::Raw).unwrap_or(FilterInput::Absent)
    }
}

/// Normalize a filter into a single checked expression, or `None`.
///
/// Raw text is expanded, parsed and checked against `schema`; it must type
/// to a boolean predicate. Expressions pass through untouched.
pub fn prepare(input: FilterInput, schema: &[Field]) -> Result<Option<Expr>, ExpressionError> {
    match input {
        FilterInput::Absent => Ok(None),
        FilterInput::Expression(expr) => Ok(Some(expr)),
        FilterInput::Raw(raw) => {
            let expanded = expand_shorthand(&raw);
            let expr = parse(&expanded).map_err(|cause| ExpressionError::new(&raw, cause))?;
            match expr.check(schema) {
                Ok(Some(DataType::Bool)) | Ok(None) => Ok(Some(expr)),
                Ok(Some(other)) => Err(ExpressionError::new(
                    &raw,
                    format!("filter must evaluate to bool, got {}", other),
                )),
                Err(cause) => Err(ExpressionError::new(&raw, cause)),
            }
        }
    }
}

/// Keep the rows for which `filter` holds. `None` keeps every row.
pub fn apply<R: Record>(rows: Vec<R>, filter: Option<&Expr>) -> Vec<R> {
    match filter {
        None => rows,
        Some(expr) => rows.into_iter().filter(|row| expr.matches(row)).collect(),
    }
}
