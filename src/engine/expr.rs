//! Expression AST and evaluation.
//!
//! A JSON expression node is parsed once into a closed [`Expr`] tree, then
//! evaluated by exhaustive match in either scalar context (one row) or
//! aggregate context (a row set). Unknown operators parse to [`Expr::Unknown`]
//! and evaluate to null, so forward-incompatible specs degrade gracefully
//! instead of aborting the analysis.

use std::collections::HashSet;

use serde_json::Value;

use crate::coerce::{compare_values, loose_eq, smart_date, smart_number, to_text};
use crate::error::{TabqlError, TabqlResult};
use crate::table::{field_value, get_field, is_null_like, Row};

use super::filter;
use super::utils::{number_from_f64, safe_regex};

/// Maximum expression nesting depth accepted from a spec document.
const MAX_EXPR_DEPTH: usize = 64;

/// Output format for `$toDate` results.
const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Evaluation context: a single row, or a row set for aggregate operators.
#[derive(Clone, Copy)]
pub enum Ctx<'a> {
    Row(&'a Row),
    Rows(&'a [Row]),
}

impl<'a> Ctx<'a> {
    /// Row used for per-row field resolution. In aggregate context bare
    /// field references resolve against the first row of the set.
    fn row(&self) -> Option<&'a Row> {
        match self {
            Ctx::Row(row) => Some(row),
            Ctx::Rows(rows) => rows.first(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOp {
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Eqi,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "$eq" => Some(CmpOp::Eq),
            "$eqi" => Some(CmpOp::Eqi),
            "$ne" => Some(CmpOp::Ne),
            "$gt" => Some(CmpOp::Gt),
            "$gte" => Some(CmpOp::Gte),
            "$lt" => Some(CmpOp::Lt),
            "$lte" => Some(CmpOp::Lte),
            _ => None,
        }
    }

    pub fn matches(&self, left: &Value, right: &Value) -> bool {
        match self {
            CmpOp::Eq => loose_eq(left, right),
            CmpOp::Eqi => to_text(left).eq_ignore_ascii_case(&to_text(right)),
            CmpOp::Ne => !loose_eq(left, right),
            CmpOp::Gt => compare_values(left, right) == std::cmp::Ordering::Greater,
            CmpOp::Gte => compare_values(left, right) != std::cmp::Ordering::Less,
            CmpOp::Lt => compare_values(left, right) == std::cmp::Ordering::Less,
            CmpOp::Lte => compare_values(left, right) != std::cmp::Ordering::Greater,
        }
    }
}

/// `$sum`/`$avg`/`$min`/`$max` argument: a bare column name reads stored
/// values directly (missing fields are null), a nested expression is
/// evaluated per row first.
#[derive(Debug, Clone)]
pub enum FoldArg {
    Column(String),
    Expr(Box<Expr>),
}

/// `$countIf` predicate: a single comparator with two sub-expressions
/// evaluated per row, or a full filter-dialect predicate tree.
#[derive(Debug, Clone)]
pub enum CountIfPred {
    Comparator { op: CmpOp, left: Box<Expr>, right: Box<Expr> },
    Predicate(Value),
}

/// Closed expression AST.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    /// A bare string: column reference if the row has the field, else a
    /// literal string. Resolution is per row.
    FieldOrLiteral(String),
    ToLower(Box<Expr>),
    ToNumber(Box<Expr>),
    ToDate(Box<Expr>),
    Substr { input: Box<Expr>, start: Box<Expr>, len: Option<Box<Expr>> },
    Concat(Vec<Expr>),
    Regex { input: Box<Expr>, pattern: Box<Expr>, case_insensitive: bool },
    Arith { op: ArithOp, args: Vec<Expr> },
    Abs(Box<Expr>),
    DateDiffDays(Box<Expr>, Box<Expr>),
    Count,
    CountDistinct(FoldArg),
    CountIf(CountIfPred),
    Fold { op: FoldOp, arg: FoldArg },
    /// Unrecognized operator; evaluates to null.
    Unknown,
}

impl Expr {
    /// Parse a JSON expression node into an AST. Fails only on nesting
    /// deeper than the depth bound.
    pub fn parse(node: &Value) -> TabqlResult<Self> {
        Self::parse_at(node, 0)
    }

    fn parse_at(node: &Value, depth: usize) -> TabqlResult<Self> {
        if depth > MAX_EXPR_DEPTH {
            return Err(TabqlError::SpecError(format!(
                "expression nesting exceeds {} levels",
                MAX_EXPR_DEPTH
            )));
        }
        match node {
            Value::String(s) => Ok(Expr::FieldOrLiteral(s.clone())),
            Value::Object(obj) => {
                let op_entry = obj
                    .iter()
                    .find(|(k, _)| k.starts_with('$') && k.as_str() != "$options");
                let (key, arg) = match op_entry {
                    Some((k, v)) => (k.as_str(), v),
                    // An object without operator keys is a plain literal.
                    None => return Ok(Expr::Literal(node.clone())),
                };
                let options_ci = obj
                    .get("$options")
                    .and_then(|v| v.as_str())
                    .map(|s| s.contains('i'))
                    .unwrap_or(false);
                Self::parse_operator(key, arg, options_ci, depth)
            }
            other => Ok(Expr::Literal(other.clone())),
        }
    }

    fn parse_operator(
        key: &str,
        arg: &Value,
        options_ci: bool,
        depth: usize,
    ) -> TabqlResult<Self> {
        let sub = |v: &Value| Expr::parse_at(v, depth + 1).map(Box::new);
        let list = |v: &Value| -> TabqlResult<Vec<Expr>> {
            match v {
                Value::Array(items) => items
                    .iter()
                    .map(|item| Expr::parse_at(item, depth + 1))
                    .collect(),
                single => Ok(vec![Expr::parse_at(single, depth + 1)?]),
            }
        };
        let fold_arg = |v: &Value| -> TabqlResult<FoldArg> {
            match v {
                Value::String(column) => Ok(FoldArg::Column(column.clone())),
                expr => Ok(FoldArg::Expr(sub(expr)?)),
            }
        };

        match key {
            "$toLower" => Ok(Expr::ToLower(sub(arg)?)),
            "$toNumber" => Ok(Expr::ToNumber(sub(arg)?)),
            "$toDate" => Ok(Expr::ToDate(sub(arg)?)),
            "$substr" => {
                let args = list(arg)?;
                let mut it = args.into_iter();
                match (it.next(), it.next()) {
                    (Some(input), Some(start)) => Ok(Expr::Substr {
                        input: Box::new(input),
                        start: Box::new(start),
                        len: it.next().map(Box::new),
                    }),
                    _ => Ok(Expr::Unknown),
                }
            }
            "$concat" => Ok(Expr::Concat(list(arg)?)),
            "$regex" | "$regexi" => {
                let args = list(arg)?;
                let mut it = args.into_iter();
                match (it.next(), it.next()) {
                    (Some(input), Some(pattern)) => Ok(Expr::Regex {
                        input: Box::new(input),
                        pattern: Box::new(pattern),
                        case_insensitive: key == "$regexi" || options_ci,
                    }),
                    _ => Ok(Expr::Unknown),
                }
            }
            "$add" => Ok(Expr::Arith { op: ArithOp::Add, args: list(arg)? }),
            "$sub" | "$subtract" => Ok(Expr::Arith { op: ArithOp::Sub, args: list(arg)? }),
            "$mul" => Ok(Expr::Arith { op: ArithOp::Mul, args: list(arg)? }),
            "$divide" => Ok(Expr::Arith { op: ArithOp::Div, args: list(arg)? }),
            "$abs" => Ok(Expr::Abs(sub(arg)?)),
            "$dateDiffDays" => {
                let args = list(arg)?;
                let mut it = args.into_iter();
                match (it.next(), it.next()) {
                    (Some(a), Some(b)) => Ok(Expr::DateDiffDays(Box::new(a), Box::new(b))),
                    _ => Ok(Expr::Unknown),
                }
            }
            "$count" => Ok(Expr::Count),
            "$countDistinct" => Ok(Expr::CountDistinct(fold_arg(arg)?)),
            "$countIf" => Self::parse_count_if(arg, depth),
            "$sum" => Ok(Expr::Fold { op: FoldOp::Sum, arg: fold_arg(arg)? }),
            "$avg" => Ok(Expr::Fold { op: FoldOp::Avg, arg: fold_arg(arg)? }),
            "$min" => Ok(Expr::Fold { op: FoldOp::Min, arg: fold_arg(arg)? }),
            "$max" => Ok(Expr::Fold { op: FoldOp::Max, arg: fold_arg(arg)? }),
            _ => Ok(Expr::Unknown),
        }
    }

    /// `$countIf` accepts a two-element comparator form like
    /// `{"$lt": [exprA, exprB]}`, falling back to the full filter dialect
    /// for anything else.
    fn parse_count_if(arg: &Value, depth: usize) -> TabqlResult<Self> {
        if let Value::Object(obj) = arg {
            if obj.len() == 1 {
                if let Some((key, val)) = obj.iter().next() {
                    if let (Some(op), Value::Array(items)) = (CmpOp::from_key(key), val) {
                        if items.len() == 2 {
                            return Ok(Expr::CountIf(CountIfPred::Comparator {
                                op,
                                left: Box::new(Expr::parse_at(&items[0], depth + 1)?),
                                right: Box::new(Expr::parse_at(&items[1], depth + 1)?),
                            }));
                        }
                    }
                }
            }
        }
        Ok(Expr::CountIf(CountIfPred::Predicate(arg.clone())))
    }

    /// Evaluate against a context. Scalar operators in aggregate context see
    /// the first row of the set; aggregate operators in scalar context
    /// evaluate to null.
    pub fn eval(&self, ctx: Ctx<'_>) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::FieldOrLiteral(name) => match ctx.row().and_then(|row| get_field(row, name)) {
                Some(v) => v.clone(),
                None => Value::String(name.clone()),
            },
            Expr::ToLower(inner) => Value::String(to_text(&inner.eval(ctx)).to_lowercase()),
            Expr::ToNumber(inner) => match smart_number(&inner.eval(ctx)) {
                Some(n) => Value::Number(number_from_f64(n)),
                None => Value::Null,
            },
            Expr::ToDate(inner) => match smart_date(&inner.eval(ctx)) {
                Some(dt) => Value::String(dt.format(DATE_OUTPUT_FORMAT).to_string()),
                None => Value::Null,
            },
            Expr::Substr { input, start, len } => {
                let text = to_text(&input.eval(ctx));
                let chars: Vec<char> = text.chars().collect();
                let start = smart_number(&start.eval(ctx)).unwrap_or(0.0).max(0.0) as usize;
                if start >= chars.len() {
                    return Value::String(String::new());
                }
                let end = match len {
                    Some(len_expr) => {
                        let len = smart_number(&len_expr.eval(ctx)).unwrap_or(0.0).max(0.0) as usize;
                        (start + len).min(chars.len())
                    }
                    None => chars.len(),
                };
                Value::String(chars[start..end].iter().collect())
            }
            Expr::Concat(parts) => {
                let text: String = parts.iter().map(|p| to_text(&p.eval(ctx))).collect();
                Value::String(text)
            }
            Expr::Regex { input, pattern, case_insensitive } => {
                let text = to_text(&input.eval(ctx));
                let pattern = to_text(&pattern.eval(ctx));
                match safe_regex(&pattern, *case_insensitive) {
                    Ok(re) => Value::Bool(re.is_match(&text)),
                    Err(_) => Value::Bool(false),
                }
            }
            Expr::Arith { op, args } => self.eval_arith(*op, args, ctx),
            Expr::Abs(inner) => match smart_number(&inner.eval(ctx)) {
                Some(n) => Value::Number(number_from_f64(n.abs())),
                None => Value::Null,
            },
            Expr::DateDiffDays(a, b) => {
                match (smart_date(&a.eval(ctx)), smart_date(&b.eval(ctx))) {
                    (Some(x), Some(y)) => {
                        Value::Number(serde_json::Number::from((x - y).num_days()))
                    }
                    _ => Value::Null,
                }
            }
            Expr::Count => match ctx {
                Ctx::Rows(rows) => Value::Number(serde_json::Number::from(rows.len())),
                Ctx::Row(_) => Value::Null,
            },
            Expr::CountDistinct(arg) => match ctx {
                Ctx::Rows(rows) => eval_count_distinct(arg, rows),
                Ctx::Row(_) => Value::Null,
            },
            Expr::CountIf(pred) => match ctx {
                Ctx::Rows(rows) => eval_count_if(pred, rows),
                Ctx::Row(_) => Value::Null,
            },
            Expr::Fold { op, arg } => match ctx {
                Ctx::Rows(rows) => eval_fold(*op, arg, rows),
                Ctx::Row(_) => Value::Null,
            },
            Expr::Unknown => Value::Null,
        }
    }

    fn eval_arith(&self, op: ArithOp, args: &[Expr], ctx: Ctx<'_>) -> Value {
        let mut acc: Option<f64> = None;
        for arg in args {
            let n = match smart_number(&arg.eval(ctx)) {
                Some(n) => n,
                None => return Value::Null,
            };
            acc = Some(match acc {
                None => n,
                Some(a) => match op {
                    ArithOp::Add => a + n,
                    ArithOp::Sub => a - n,
                    ArithOp::Mul => a * n,
                    ArithOp::Div => {
                        if n == 0.0 {
                            return Value::Null;
                        }
                        a / n
                    }
                },
            });
        }
        match acc {
            Some(n) => Value::Number(number_from_f64(n)),
            None => Value::Null,
        }
    }
}

fn fold_value(arg: &FoldArg, row: &Row) -> Value {
    match arg {
        FoldArg::Column(name) => field_value(row, name),
        FoldArg::Expr(expr) => expr.eval(Ctx::Row(row)),
    }
}

fn eval_count_distinct(arg: &FoldArg, rows: &[Row]) -> Value {
    let mut seen: HashSet<String> = HashSet::new();
    for row in rows {
        let value = fold_value(arg, row);
        if !is_null_like(&value) {
            seen.insert(to_text(&value).to_lowercase());
        }
    }
    Value::Number(serde_json::Number::from(seen.len()))
}

fn eval_count_if(pred: &CountIfPred, rows: &[Row]) -> Value {
    let count = match pred {
        CountIfPred::Comparator { op, left, right } => rows
            .iter()
            .filter(|row| op.matches(&left.eval(Ctx::Row(row)), &right.eval(Ctx::Row(row))))
            .count(),
        CountIfPred::Predicate(predicate) => rows
            .iter()
            .filter(|row| filter::matches(row, predicate))
            .count(),
    };
    Value::Number(serde_json::Number::from(count))
}

fn eval_fold(op: FoldOp, arg: &FoldArg, rows: &[Row]) -> Value {
    match op {
        FoldOp::Sum => {
            // Non-numeric values contribute 0 rather than failing the query.
            let sum: f64 = rows
                .iter()
                .map(|row| smart_number(&fold_value(arg, row)).unwrap_or(0.0))
                .sum();
            Value::Number(number_from_f64(sum))
        }
        FoldOp::Avg => {
            if rows.is_empty() {
                return Value::Number(serde_json::Number::from(0));
            }
            let sum: f64 = rows
                .iter()
                .map(|row| smart_number(&fold_value(arg, row)).unwrap_or(0.0))
                .sum();
            Value::Number(number_from_f64(sum / rows.len() as f64))
        }
        FoldOp::Min | FoldOp::Max => {
            // Track the original value, not just the comparison key, so
            // expression-form min/max keep the value's type in the output.
            let mut best: Option<Value> = None;
            for row in rows {
                let candidate = fold_value(arg, row);
                if is_null_like(&candidate) {
                    continue;
                }
                best = match best {
                    None => Some(candidate),
                    Some(current) => {
                        let ord = compare_values(&candidate, &current);
                        let replace = match op {
                            FoldOp::Min => ord == std::cmp::Ordering::Less,
                            _ => ord == std::cmp::Ordering::Greater,
                        };
                        Some(if replace { candidate } else { current })
                    }
                };
            }
            best.unwrap_or(Value::Null)
        }
    }
}
