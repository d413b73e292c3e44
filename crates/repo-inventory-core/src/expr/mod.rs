//! Constrained filter expressions.
//!
//! An [`Expr`] is a small, typed predicate language over the columns of a
//! [`Record`]: column references, literals, comparisons, string predicates,
//! membership tests and boolean combinators. Expressions are produced either
//! by [`parse`] from text or directly through the builder helpers ([`col`],
//! [`lit`] and the methods on [`Expr`]).
//!
//! # Lifecycle
//!
//! 1. [`parse`] turns a string into an untyped AST.
//! 2. [`Expr::check`] type checks the AST against a table schema. Unknown
//!    columns and type mismatches are rejected here.
//! 3. [`Expr::matches`] evaluates the predicate per row. Evaluation never
//!    fails; anything that does not evaluate to `true` (including nulls)
//!    excludes the row.

mod parser;

pub use parser::parse;

use regex::Regex;

use crate::models::{field, DataType, Record, Value};

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn is_ordering(self) -> bool {
        !matches!(self, CmpOp::Eq | CmpOp::Ne)
    }
}

/// A compiled regular expression compared by its source text.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Pattern)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// String namespace functions (`.str.<fn>(...)`).
#[derive(Debug, Clone, PartialEq)]
pub enum StrFunc {
    StartsWith(String),
    EndsWith(String),
    Contains(Pattern),
    ToLowercase,
    ToUppercase,
    LenChars,
}

/// Filter expression AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Value),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Str {
        func: StrFunc,
        target: Box<Expr>,
    },
    IsIn {
        target: Box<Expr>,
        values: Vec<Value>,
    },
    IsBetween {
        target: Box<Expr>,
        low: Value,
        high: Value,
    },
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
}

/// Reference a column by name.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

/// Wrap a literal value.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl Expr {
    fn compare(self, op: CmpOp, other: Expr) -> Expr {
        Expr::Compare {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn eq(self, other: Expr) -> Expr {
        self.compare(CmpOp::Eq, other)
    }

    pub fn neq(self, other: Expr) -> Expr {
        self.compare(CmpOp::Ne, other)
    }

    pub fn lt(self, other: Expr) -> Expr {
        self.compare(CmpOp::Lt, other)
    }

    pub fn lt_eq(self, other: Expr) -> Expr {
        self.compare(CmpOp::Le, other)
    }

    pub fn gt(self, other: Expr) -> Expr {
        self.compare(CmpOp::Gt, other)
    }

    pub fn gt_eq(self, other: Expr) -> Expr {
        self.compare(CmpOp::Ge, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn str_starts_with(self, prefix: impl Into<String>) -> Expr {
        self.str_func(StrFunc::StartsWith(prefix.into()))
    }

    pub fn str_ends_with(self, suffix: impl Into<String>) -> Expr {
        self.str_func(StrFunc::EndsWith(suffix.into()))
    }

    /// Regex search. Fails only if `pattern` is not a valid regex.
    pub fn str_contains(self, pattern: &str) -> Result<Expr, regex::Error> {
        Ok(self.str_func(StrFunc::Contains(Pattern::new(pattern)?)))
    }

    pub fn is_in(self, values: Vec<Value>) -> Expr {
        Expr::IsIn {
            target: Box::new(self),
            values,
        }
    }

    fn str_func(self, func: StrFunc) -> Expr {
        Expr::Str {
            func,
            target: Box::new(self),
        }
    }

    /// Type check against a schema, returning the expression's result type.
    ///
    /// `Ok(None)` means the expression is a bare `null` literal.
    pub fn check(&self, schema: &[crate::models::Field]) -> Result<Option<DataType>, String> {
        match self {
            Expr::Column(name) => match field(schema, name) {
                Some(f) => Ok(Some(f.dtype)),
                None => {
                    let available: Vec<&str> = schema.iter().map(|f| f.name).collect();
                    Err(format!(
                        "unknown column '{}' (available: {})",
                        name,
                        available.join(", ")
                    ))
                }
            },
            Expr::Literal(v) => Ok(v.dtype()),
            Expr::Not(inner) => {
                expect_bool(inner.check(schema)?, "operand of not")?;
                Ok(Some(DataType::Bool))
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                expect_bool(l.check(schema)?, "operand of a boolean combinator")?;
                expect_bool(r.check(schema)?, "operand of a boolean combinator")?;
                Ok(Some(DataType::Bool))
            }
            Expr::Compare { op, left, right } => {
                let lt = left.check(schema)?;
                let rt = right.check(schema)?;
                if let (Some(a), Some(b)) = (lt, rt) {
                    if a != b {
                        return Err(format!(
                            "cannot compare {} with {} using '{}'",
                            a,
                            b,
                            op.symbol()
                        ));
                    }
                    if op.is_ordering() && a == DataType::Bool {
                        return Err(format!("'{}' is not defined for bool", op.symbol()));
                    }
                }
                Ok(Some(DataType::Bool))
            }
            Expr::Str { func, target } => {
                match target.check(schema)? {
                    Some(DataType::Str) | None => {}
                    Some(other) => {
                        return Err(format!("str namespace requires a str operand, got {}", other))
                    }
                }
                Ok(Some(match func {
                    StrFunc::ToLowercase | StrFunc::ToUppercase => DataType::Str,
                    StrFunc::LenChars => DataType::Int,
                    _ => DataType::Bool,
                }))
            }
            Expr::IsIn { target, values } => {
                if let Some(t) = target.check(schema)? {
                    for v in values {
                        if let Some(vt) = v.dtype() {
                            if vt != t {
                                return Err(format!("is_in value {} is {}, expected {}", v, vt, t));
                            }
                        }
                    }
                }
                Ok(Some(DataType::Bool))
            }
            Expr::IsBetween { target, low, high } => {
                if let Some(t) = target.check(schema)? {
                    if t == DataType::Bool {
                        return Err("is_between is not defined for bool".to_string());
                    }
                    for v in [low, high] {
                        if let Some(vt) = v.dtype() {
                            if vt != t {
                                return Err(format!(
                                    "is_between bound {} is {}, expected {}",
                                    v, vt, t
                                ));
                            }
                        }
                    }
                }
                Ok(Some(DataType::Bool))
            }
            Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
                inner.check(schema)?;
                Ok(Some(DataType::Bool))
            }
        }
    }

    /// Evaluate against one row.
    pub fn evaluate<R: Record>(&self, row: &R) -> Value {
        match self {
            Expr::Column(name) => row.value(name).unwrap_or(Value::Null),
            Expr::Literal(v) => v.clone(),
            Expr::Not(inner) => match inner.evaluate(row) {
                Value::Bool(b) => Value::Bool(!b),
                _ => Value::Null,
            },
            Expr::And(l, r) => match (l.evaluate(row), r.evaluate(row)) {
                (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
                (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
                _ => Value::Null,
            },
            Expr::Or(l, r) => match (l.evaluate(row), r.evaluate(row)) {
                (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
                (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
                _ => Value::Null,
            },
            Expr::Compare { op, left, right } => {
                let (a, b) = (left.evaluate(row), right.evaluate(row));
                if a.dtype().is_none() || a.dtype() != b.dtype() {
                    return Value::Null;
                }
                let ord = a.cmp(&b);
                Value::Bool(match op {
                    CmpOp::Eq => ord.is_eq(),
                    CmpOp::Ne => ord.is_ne(),
                    CmpOp::Lt => ord.is_lt(),
                    CmpOp::Le => ord.is_le(),
                    CmpOp::Gt => ord.is_gt(),
                    CmpOp::Ge => ord.is_ge(),
                })
            }
            Expr::Str { func, target } => {
                let s = match target.evaluate(row) {
                    Value::Str(s) => s,
                    _ => return Value::Null,
                };
                match func {
                    StrFunc::StartsWith(p) => Value::Bool(s.starts_with(p.as_str())),
                    StrFunc::EndsWith(p) => Value::Bool(s.ends_with(p.as_str())),
                    StrFunc::Contains(re) => Value::Bool(re.0.is_match(&s)),
                    StrFunc::ToLowercase => Value::Str(s.to_lowercase()),
                    StrFunc::ToUppercase => Value::Str(s.to_uppercase()),
                    StrFunc::LenChars => Value::Int(s.chars().count() as i64),
                }
            }
            Expr::IsIn { target, values } => match target.evaluate(row) {
                Value::Null => Value::Null,
                v => Value::Bool(values.contains(&v)),
            },
            Expr::IsBetween { target, low, high } => {
                let v = target.evaluate(row);
                if v.dtype().is_none() || v.dtype() != low.dtype() || v.dtype() != high.dtype() {
                    return Value::Null;
                }
                Value::Bool(*low <= v && v <= *high)
            }
            Expr::IsNull(inner) => Value::Bool(inner.evaluate(row) == Value::Null),
            Expr::IsNotNull(inner) => Value::Bool(inner.evaluate(row) != Value::Null),
        }
    }

    /// True only when the expression evaluates to boolean `true` for `row`.
    pub fn matches<R: Record>(&self, row: &R) -> bool {
        self.evaluate(row) == Value::Bool(true)
    }
}

fn expect_bool(t: Option<DataType>, what: &str) -> Result<(), String> {
    match t {
        Some(DataType::Bool) | None => Ok(()),
        Some(other) => Err(format!("{} must be bool, got {}", what, other)),
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "col({})", Quoted(name)),
            Expr::Literal(v) => fmt_literal(f, v),
            Expr::Not(inner) => write!(f, "~({})", inner),
            Expr::And(l, r) => write!(f, "({} & {})", l, r),
            Expr::Or(l, r) => write!(f, "({} | {})", l, r),
            Expr::Compare { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Str { func, target } => match func {
                StrFunc::StartsWith(p) => write!(f, "{}.str.starts_with({})", target, Quoted(p)),
                StrFunc::EndsWith(p) => write!(f, "{}.str.ends_with({})", target, Quoted(p)),
                StrFunc::Contains(p) => write!(f, "{}.str.contains({})", target, Quoted(p.as_str())),
                StrFunc::ToLowercase => write!(f, "{}.str.to_lowercase()", target),
                StrFunc::ToUppercase => write!(f, "{}.str.to_uppercase()", target),
                StrFunc::LenChars => write!(f, "{}.str.len_chars()", target),
            },
            Expr::IsIn { target, values } => {
                write!(f, "{}.is_in([", target)?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt_literal(f, v)?;
                }
                f.write_str("])")
            }
            Expr::IsBetween { target, low, high } => {
                write!(f, "{}.is_between(", target)?;
                fmt_literal(f, low)?;
                f.write_str(", ")?;
                fmt_literal(f, high)?;
                f.write_str(")")
            }
            Expr::IsNull(inner) => write!(f, "{}.is_null()", inner),
            Expr::IsNotNull(inner) => write!(f, "{}.is_not_null()", inner),
        }
    }
}

/// Double-quoted string using only the escapes the tokenizer reads back.
struct Quoted<'a>(&'a str);

impl std::fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("\"")?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\t' => f.write_str("\\t")?,
                '\r' => f.write_str("\\r")?,
                '\0' => f.write_str("\\0")?,
                other => write!(f, "{}", other)?,
            }
        }
        f.write_str("\"")
    }
}

fn fmt_literal(f: &mut std::fmt::Formatter<'_>, v: &Value) -> std::fmt::Result {
    match v {
        Value::Str(s) => write!(f, "{}", Quoted(s)),
        other => write!(f, "{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepositoryRecord;

    fn repo(name: &str, stars: i64, archived: bool) -> RepositoryRecord {
        RepositoryRecord {
            name: name.to_string(),
            default_branch: "main".to_string(),
            description: String::new(),
            archived,
            is_fork: false,
            issues: 0,
            stars,
            forks: 0,
            size: 1,
        }
    }

    #[test]
    fn test_builder_comparison() {
        let e = col("stars").gt(lit(10));
        assert!(e.matches(&repo("a", 11, false)));
        assert!(!e.matches(&repo("a", 10, false)));
    }

    #[test]
    fn test_string_predicates() {
        let starts = col("name").str_starts_with("d3");
        assert!(starts.matches(&repo("d3-force", 0, false)));
        assert!(!starts.matches(&repo("react", 0, false)));

        let contains = col("name").str_contains("^re.ct$").unwrap();
        assert!(contains.matches(&repo("react", 0, false)));
        assert!(!contains.matches(&repo("reactor", 0, false)));
    }

    #[test]
    fn test_boolean_combinators() {
        let e = col("archived").not().and(col("stars").gt_eq(lit(5)));
        assert!(e.matches(&repo("a", 5, false)));
        assert!(!e.matches(&repo("a", 5, true)));
        assert!(!e.matches(&repo("a", 4, false)));

        let e = col("archived").or(col("name").eq(lit("x")));
        assert!(e.matches(&repo("x", 0, false)));
        assert!(e.matches(&repo("y", 0, true)));
    }

    #[test]
    fn test_null_never_matches() {
        let e = col("missing").eq(lit("a"));
        assert_eq!(e.evaluate(&repo("a", 0, false)), Value::Null);
        assert!(!e.matches(&repo("a", 0, false)));
    }

    #[test]
    fn test_check_unknown_column() {
        let err = col("html_url")
            .eq(lit("x"))
            .check(RepositoryRecord::schema())
            .unwrap_err();
        assert!(err.contains("unknown column 'html_url'"));
        assert!(err.contains("stars"));
    }

    #[test]
    fn test_check_type_mismatch() {
        let err = col("stars")
            .gt(lit("ten"))
            .check(RepositoryRecord::schema())
            .unwrap_err();
        assert!(err.contains("cannot compare i64 with str"));

        let err = col("archived")
            .lt(lit(true))
            .check(RepositoryRecord::schema())
            .unwrap_err();
        assert!(err.contains("not defined for bool"));
    }

    #[test]
    fn test_check_len_chars_is_int() {
        let e = Expr::Str {
            func: StrFunc::LenChars,
            target: Box::new(col("name")),
        };
        assert_eq!(e.check(RepositoryRecord::schema()), Ok(Some(DataType::Int)));
        assert_eq!(e.evaluate(&repo("héllo", 0, false)), Value::Int(5));
    }

    #[test]
    fn test_is_in_and_between() {
        let e = col("name").is_in(vec!["a".into(), "b".into()]);
        assert!(e.matches(&repo("b", 0, false)));
        assert!(!e.matches(&repo("c", 0, false)));

        let e = Expr::IsBetween {
            target: Box::new(col("stars")),
            low: Value::Int(2),
            high: Value::Int(4),
        };
        assert!(e.matches(&repo("a", 2, false)));
        assert!(e.matches(&repo("a", 4, false)));
        assert!(!e.matches(&repo("a", 5, false)));
    }

    #[test]
    fn test_display_reparses_to_same_expr() {
        let e = col("name")
            .str_starts_with("a")
            .and(col("stars").gt(lit(3)).or(col("is_fork").not()));
        let reparsed = parse(&e.to_string()).unwrap();
        assert_eq!(reparsed, e);
    }

    #[test]
    fn test_display_escapes_reparse() {
        let e = col("description")
            .eq(lit("a\u{1}b \"q\" \\ tab\tnl\nnul\0"))
            .or(col("name").str_contains(r"^\d+\.x$").unwrap())
            .or(col("name").is_in(vec!["it's".into(), "é\r".into()]));
        let text = e.to_string();
        assert!(!text.contains("\\u{"));
        assert_eq!(parse(&text).unwrap(), e);
    }
}
