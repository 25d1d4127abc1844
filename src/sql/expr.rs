//! SQL expression processing on parsed ASTs.
//!
//! Every operation here parses the expression with sqlparser, rewrites the
//! tree, and renders it back. Nothing is done by text substitution, so
//! column names inside string literals or quoted identifiers are never
//! touched.
//!
//! # LookML references
//!
//! Expressions may already contain LookML substitutions such as
//! `${TABLE}.status` or `${other_field}`. These are not SQL, so they are
//! swapped for placeholder identifiers before parsing and restored after
//! rendering.
//!
//! # Date parts
//!
//! Unit arguments of date functions (`DATEADD(day, 1, d)`) parse as bare
//! identifiers. They are shielded from qualification so that only real
//! column references are rewritten.

use std::ops::ControlFlow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use sqlparser::ast::{
    visit_expressions, BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr,
    FunctionArguments, Ident, Interval, ObjectName, VisitMut, VisitorMut,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use thiserror::Error;

use crate::model::types::Granularity;
use crate::sql::dialect::{Dialect, SqlDialect};

/// LookML substitution for the current view's table alias.
pub const TABLE_REF: &str = "${TABLE}";

/// Pattern for LookML substitutions (`${TABLE}`, `${field}`, `${view.field}`)
static TEMPLATE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+(?:\.\w+)?)\}").unwrap());

/// Prefix of the identifiers standing in for LookML substitutions
const PLACEHOLDER_PREFIX: &str = "__sp_ref_";

/// Qualifier marking a shielded date-part argument
const DATE_PART_MARKER: &str = "__sp_date_part";

/// Errors raised while processing an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlExprError {
    #[error("SQL syntax error: {0}")]
    Syntax(String),

    #[error("cannot rewrite `{expr}`: {message}")]
    Rewrite { expr: String, message: String },
}

pub type SqlExprResult<T> = Result<T, SqlExprError>;

// ============================================================================
// Public API
// ============================================================================

/// Check that `sql` is a single well-formed expression.
pub fn validate(sql: &str, dialect: Option<Dialect>) -> SqlExprResult<()> {
    let templated = Templated::extract(sql);
    parse_expr(&templated.sql, dialect).map(|_| ())
}

/// Prefix every unqualified column reference with `alias`.
///
/// Already-qualified references, function names, literals and date-part
/// arguments are left untouched. `${TABLE}` substitutions already present
/// in the expression are rewritten to `alias` as well.
///
/// ```
/// use semantic_patterns::sql::expr::qualify;
///
/// assert_eq!(qualify("status = 'active'", "T").unwrap(), "T.status = 'active'");
/// assert_eq!(qualify("a.status = 'active'", "T").unwrap(), "a.status = 'active'");
/// ```
pub fn qualify(sql: &str, alias: &str) -> SqlExprResult<String> {
    qualify_with(sql, alias, None)
}

/// [`qualify`] using a specific dialect's parser.
pub fn qualify_with(sql: &str, alias: &str, dialect: Option<Dialect>) -> SqlExprResult<String> {
    let templated = Templated::extract(sql);
    let mut expr = parse_expr(&templated.sql, dialect)?;
    let mut qualifier = Qualifier { alias };
    let _ = expr.visit(&mut qualifier);
    Ok(templated.restore(expr.to_string(), Some(alias)))
}

/// Replace unqualified identifiers for which `lookup` returns a value.
///
/// Used to turn metric references in derived expressions into field
/// references (`revenue` → `${revenue}`).
pub fn substitute_references<F>(sql: &str, dialect: Option<Dialect>, lookup: F) -> SqlExprResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    let templated = Templated::extract(sql);
    let mut expr = parse_expr(&templated.sql, dialect)?;
    let mut substituter = Substituter { lookup };
    let _ = expr.visit(&mut substituter);
    Ok(templated.restore(expr.to_string(), None))
}

/// Unqualified identifiers in first-appearance order, without duplicates.
pub fn referenced_columns(sql: &str, dialect: Option<Dialect>) -> SqlExprResult<Vec<String>> {
    let templated = Templated::extract(sql);
    let expr = parse_expr(&templated.sql, dialect)?;
    let mut columns: Vec<String> = Vec::new();
    let _ = visit_expressions(&expr, |e| {
        if let Expr::Identifier(ident) = e {
            if is_column(ident) && !columns.contains(&ident.value) {
                columns.push(ident.value.clone());
            }
        }
        ControlFlow::<()>::Continue(())
    });
    Ok(columns)
}

/// Rewrite an expression written for `from` so that it runs on `to`.
///
/// Covers date arithmetic (`DATEADD`, `DATE_ADD`/`DATE_SUB` with
/// intervals, `+`/`-` interval literals) and function renames such as
/// `IFNULL` → `NVL`. Expressions are returned unchanged when both dialects
/// are the same.
pub fn transpile(sql: &str, from: Dialect, to: Dialect) -> SqlExprResult<String> {
    let templated = Templated::extract(sql);
    let mut expr = parse_expr(&templated.sql, Some(from))?;
    if from == to {
        return Ok(sql.to_string());
    }
    let mut transpiler = Transpiler { target: to };
    if let ControlFlow::Break(err) = expr.visit(&mut transpiler) {
        return Err(err);
    }
    Ok(templated.restore(expr.to_string(), None))
}

/// Transpile from the source dialect (when it differs) and qualify against
/// `alias`: the full treatment a field expression gets before rendering.
pub fn prepare(
    sql: &str,
    source: Option<Dialect>,
    target: Dialect,
    alias: &str,
) -> SqlExprResult<String> {
    let sql = match source {
        Some(from) if from != target => transpile(sql, from, target)?,
        _ => sql.to_string(),
    };
    qualify_with(&sql, alias, Some(target))
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_expr(sql: &str, dialect: Option<Dialect>) -> SqlExprResult<Expr> {
    match dialect {
        Some(d) => parse_with(sql, d.parser_dialect().as_ref()),
        None => parse_with(sql, &GenericDialect {}),
    }
}

fn parse_with(sql: &str, dialect: &dyn sqlparser::dialect::Dialect) -> SqlExprResult<Expr> {
    let mut parser = Parser::new(dialect)
        .try_with_sql(sql)
        .map_err(|e| SqlExprError::Syntax(e.to_string()))?;
    let expr = parser
        .parse_expr()
        .map_err(|e| SqlExprError::Syntax(e.to_string()))?;
    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(SqlExprError::Syntax(format!(
            "unexpected `{}` after expression",
            next.token
        )));
    }
    Ok(expr)
}

/// An expression with its LookML substitutions swapped for placeholders.
struct Templated {
    sql: String,
    /// Original substitution text, indexed by placeholder number.
    refs: Vec<String>,
}

impl Templated {
    fn extract(sql: &str) -> Self {
        let mut refs = Vec::new();
        let sql = TEMPLATE_REF
            .replace_all(sql, |caps: &Captures| {
                refs.push(caps[0].to_string());
                format!("{}{}", PLACEHOLDER_PREFIX, refs.len() - 1)
            })
            .into_owned();
        Self { sql, refs }
    }

    /// Put the substitutions back. `${TABLE}` becomes `table_alias` when
    /// one is given.
    fn restore(&self, rendered: String, table_alias: Option<&str>) -> String {
        let mut out = rendered;
        // Highest index first so `_1` never clobbers the prefix of `_10`.
        for (i, original) in self.refs.iter().enumerate().rev() {
            let replacement = match table_alias {
                Some(alias) if original == TABLE_REF => alias,
                _ => original.as_str(),
            };
            out = out.replace(&format!("{}{}", PLACEHOLDER_PREFIX, i), replacement);
        }
        out
    }
}

// ============================================================================
// Visitors
// ============================================================================

fn is_column(ident: &Ident) -> bool {
    !ident.value.starts_with(PLACEHOLDER_PREFIX) && ident.value != DATE_PART_MARKER
}

fn is_date_function(name: &ObjectName) -> bool {
    matches!(
        name.to_string().to_uppercase().as_str(),
        "DATEADD"
            | "DATE_ADD"
            | "DATEDIFF"
            | "DATE_DIFF"
            | "DATE_TRUNC"
            | "DATETRUNC"
            | "DATEPART"
            | "DATE_PART"
            | "DATE_SUB"
            | "TIMESTAMPADD"
            | "TIMESTAMPDIFF"
            | "TIMESTAMP_TRUNC"
            | "LAST_DAY"
    )
}

fn is_date_part(value: &str) -> bool {
    value.parse::<Granularity>().is_ok()
        || matches!(
            value.to_lowercase().as_str(),
            "minute" | "second" | "millisecond" | "dayofweek" | "dayofyear"
        )
}

/// Wrap bare date-part arguments of date functions in a marker qualifier.
fn shield_date_parts(func: &mut Function) {
    if !is_date_function(&func.name) {
        return;
    }
    let FunctionArguments::List(list) = &mut func.args else {
        return;
    };
    for arg in list.args.iter_mut() {
        if let FunctionArg::Unnamed(FunctionArgExpr::Expr(arg_expr)) = arg {
            let shielded = match &*arg_expr {
                Expr::Identifier(ident) if ident.quote_style.is_none() && is_date_part(&ident.value) => {
                    Some(Expr::CompoundIdentifier(vec![
                        Ident::new(DATE_PART_MARKER),
                        ident.clone(),
                    ]))
                }
                _ => None,
            };
            if let Some(shielded) = shielded {
                *arg_expr = shielded;
            }
        }
    }
}

fn unshield_date_part(expr: &mut Expr) {
    let restored = match &*expr {
        Expr::CompoundIdentifier(parts)
            if parts.len() == 2 && parts[0].value == DATE_PART_MARKER =>
        {
            Some(Expr::Identifier(parts[1].clone()))
        }
        _ => None,
    };
    if let Some(restored) = restored {
        *expr = restored;
    }
}

struct Qualifier<'a> {
    alias: &'a str,
}

impl VisitorMut for Qualifier<'_> {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<Self::Break> {
        if let Expr::Function(func) = expr {
            shield_date_parts(func);
            return ControlFlow::Continue(());
        }
        let qualified = match &*expr {
            Expr::Identifier(ident) if is_column(ident) => Some(Expr::CompoundIdentifier(vec![
                Ident::new(self.alias),
                ident.clone(),
            ])),
            _ => None,
        };
        if let Some(qualified) = qualified {
            *expr = qualified;
        }
        ControlFlow::Continue(())
    }

    fn post_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<Self::Break> {
        unshield_date_part(expr);
        ControlFlow::Continue(())
    }
}

struct Substituter<F> {
    lookup: F,
}

impl<F> VisitorMut for Substituter<F>
where
    F: Fn(&str) -> Option<String>,
{
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<Self::Break> {
        let replacement = match &*expr {
            Expr::Identifier(ident) if is_column(ident) => {
                (self.lookup)(&ident.value).map(|r| Expr::Identifier(Ident::new(r)))
            }
            _ => None,
        };
        if let Some(replacement) = replacement {
            *expr = replacement;
        }
        ControlFlow::Continue(())
    }
}

struct Transpiler {
    target: Dialect,
}

impl VisitorMut for Transpiler {
    type Break = SqlExprError;

    fn post_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<Self::Break> {
        if let Some(date_add) = DateAdd::recognize(expr) {
            let rendered =
                self.target
                    .emit_date_add(&date_add.operand, date_add.part.as_str(), date_add.amount);
            match parse_with(&rendered, self.target.parser_dialect().as_ref()) {
                Ok(rewritten) => *expr = rewritten,
                Err(err) => {
                    return ControlFlow::Break(SqlExprError::Rewrite {
                        expr: rendered,
                        message: err.to_string(),
                    })
                }
            }
            return ControlFlow::Continue(());
        }
        if let Expr::Function(func) = expr {
            if let Some(name) = self.target.remap_function(&func.name.to_string()) {
                func.name = ObjectName(vec![Ident::new(name)]);
            }
        }
        ControlFlow::Continue(())
    }
}

// ============================================================================
// Date arithmetic recognition
// ============================================================================

/// A dialect-neutral `operand + amount * part`.
#[derive(Debug, Clone, PartialEq)]
struct DateAdd {
    operand: String,
    part: Granularity,
    amount: i64,
}

impl DateAdd {
    fn recognize(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Nested(inner) => Self::recognize(inner),
            Expr::Function(func) => Self::from_function(func),
            Expr::BinaryOp { left, op, right } => {
                let sign = match op {
                    BinaryOperator::Plus => 1,
                    BinaryOperator::Minus => -1,
                    _ => return None,
                };
                let Expr::Interval(interval) = right.as_ref() else {
                    return None;
                };
                let (amount, part) = interval_parts(interval)?;
                Some(Self {
                    operand: left.to_string(),
                    part,
                    amount: sign * amount,
                })
            }
            _ => None,
        }
    }

    fn from_function(func: &Function) -> Option<Self> {
        let FunctionArguments::List(list) = &func.args else {
            return None;
        };
        let args: Vec<&Expr> = list
            .args
            .iter()
            .filter_map(|arg| match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => Some(e),
                _ => None,
            })
            .collect();
        if args.len() != list.args.len() {
            return None;
        }

        let name = func.name.to_string().to_uppercase();
        match (name.as_str(), args.as_slice()) {
            ("DATEADD" | "TIMESTAMPADD", [part, amount, operand]) => Some(Self {
                operand: operand.to_string(),
                part: unquoted(part).parse().ok()?,
                amount: unquoted(amount).parse().ok()?,
            }),
            ("DATE_ADD" | "TIMESTAMP_ADD" | "DATETIME_ADD", [operand, Expr::Interval(interval)]) => {
                let (amount, part) = interval_parts(interval)?;
                Some(Self {
                    operand: operand.to_string(),
                    part,
                    amount,
                })
            }
            ("DATE_SUB" | "TIMESTAMP_SUB" | "DATETIME_SUB", [operand, Expr::Interval(interval)]) => {
                let (amount, part) = interval_parts(interval)?;
                Some(Self {
                    operand: operand.to_string(),
                    part,
                    amount: -amount,
                })
            }
            _ => None,
        }
    }
}

/// Rendered text of a literal-ish expression without surrounding quotes
/// or inner spaces (`'year'` → `year`, `- 1` → `-1`).
fn unquoted(expr: &Expr) -> String {
    expr.to_string().trim_matches('\'').replace(' ', "")
}

/// `INTERVAL '1 year'`, `INTERVAL '1' YEAR` and `INTERVAL 1 YEAR`.
fn interval_parts(interval: &Interval) -> Option<(i64, Granularity)> {
    let value = interval.value.to_string();
    let value = value.trim_matches('\'').trim();
    match &interval.leading_field {
        Some(field) => Some((value.parse().ok()?, field.to_string().parse().ok()?)),
        None => {
            let mut parts = value.split_whitespace();
            let amount = parts.next()?.parse().ok()?;
            let part = parts.next()?.parse().ok()?;
            if parts.next().is_some() {
                return None;
            }
            Some((amount, part))
        }
    }
}
