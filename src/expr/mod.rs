//! User-supplied match/filter predicates.
//!
//! The engine only depends on the `predicate(env) -> bool` capability, so a
//! richer expression language can be plugged in without touching the
//! classifier. The built-in compiler understands conjunctions of
//! `target.field op value` clauses, which covers the common matcher shapes
//! (`current.status == 200 && current.body_len > 100`).

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::baseline::Baseline;

static EMPTY_BASELINE: Lazy<Baseline> = Lazy::new(Baseline::empty);

/// Environment handed to predicates: the learned references, the response
/// under classification, and one `bl<status>` entry per fuzzy status
/// (absent statuses bind to the empty baseline).
#[derive(Clone)]
pub struct ExprEnv {
    pub index: Arc<Baseline>,
    pub base: Arc<Baseline>,
    pub current: Arc<Baseline>,
    pub status_baselines: HashMap<u16, Arc<Baseline>>,
}

impl ExprEnv {
    pub fn lookup(&self, target: &str) -> &Baseline {
        match target {
            "index" => &self.index,
            "base" => &self.base,
            "current" => &self.current,
            other => other
                .strip_prefix("bl")
                .and_then(|s| s.parse::<u16>().ok())
                .and_then(|status| self.status_baselines.get(&status))
                .map(|bl| bl.as_ref())
                .unwrap_or(&EMPTY_BASELINE),
        }
    }
}

pub type Predicate = Arc<dyn Fn(&ExprEnv) -> bool + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Status,
    BodyLen,
    Title,
    BodyHash,
    RedirectTarget,
    Server,
    ContentType,
    ErrString,
}

impl Field {
    fn parse(name: &str) -> Result<Self, String> {
        match name {
            "status" => Ok(Field::Status),
            "body_len" => Ok(Field::BodyLen),
            "title" => Ok(Field::Title),
            "body_hash" => Ok(Field::BodyHash),
            "redirect_target" => Ok(Field::RedirectTarget),
            "server" => Ok(Field::Server),
            "content_type" => Ok(Field::ContentType),
            "err_string" => Ok(Field::ErrString),
            other => Err(format!("unknown field '{other}'")),
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Field::Status | Field::BodyLen)
    }
}

#[derive(Clone, Debug)]
struct Clause {
    target: String,
    field: Field,
    op: Op,
    value: String,
}

impl Clause {
    fn eval(&self, env: &ExprEnv) -> bool {
        let bl = env.lookup(&self.target);
        if self.field.is_numeric() {
            let lhs = match self.field {
                Field::Status => u64::from(bl.status),
                Field::BodyLen => bl.body_len as u64,
                _ => unreachable!(),
            };
            let rhs: u64 = match self.value.parse() {
                Ok(v) => v,
                Err(_) => return false,
            };
            match self.op {
                Op::Eq => lhs == rhs,
                Op::Ne => lhs != rhs,
                Op::Lt => lhs < rhs,
                Op::Le => lhs <= rhs,
                Op::Gt => lhs > rhs,
                Op::Ge => lhs >= rhs,
                Op::Contains => false,
            }
        } else {
            let lhs = match self.field {
                Field::Title => bl.title.as_str(),
                Field::BodyHash => bl.body_hash.as_str(),
                Field::RedirectTarget => bl.redirect_target.as_str(),
                Field::Server => bl.server.as_str(),
                Field::ContentType => bl.content_type.as_str(),
                Field::ErrString => bl.err_string.as_str(),
                _ => unreachable!(),
            };
            match self.op {
                Op::Eq => lhs == self.value,
                Op::Ne => lhs != self.value,
                Op::Contains => lhs.contains(self.value.as_str()),
                _ => false,
            }
        }
    }
}

/// Compiles a conjunction expression into a predicate. Field and operator
/// mistakes surface here, before the scan starts.
pub fn compile(expr: &str) -> Result<Predicate, String> {
    let raw = expr.trim();
    if raw.is_empty() {
        return Err("expression is empty".to_string());
    }

    let mut clauses: Vec<Clause> = Vec::new();
    for part in raw.split("&&") {
        clauses.push(parse_clause(part.trim())?);
    }

    Ok(Arc::new(move |env: &ExprEnv| {
        clauses.iter().all(|c| c.eval(env))
    }))
}

fn parse_clause(input: &str) -> Result<Clause, String> {
    // longest operators first so "<=" does not parse as "<"
    const OPS: [(&str, Op); 7] = [
        ("==", Op::Eq),
        ("!=", Op::Ne),
        ("<=", Op::Le),
        (">=", Op::Ge),
        ("<", Op::Lt),
        (">", Op::Gt),
        (" contains ", Op::Contains),
    ];

    let (lhs, op, rhs) = OPS
        .iter()
        .find_map(|(sym, op)| {
            input
                .split_once(sym)
                .map(|(l, r)| (l.trim(), *op, r.trim()))
        })
        .ok_or_else(|| format!("no operator in clause '{input}'"))?;

    let (target, field_name) = lhs
        .split_once('.')
        .ok_or_else(|| format!("expected target.field in '{lhs}'"))?;
    let target = target.trim();
    let valid_target = matches!(target, "index" | "base" | "current")
        || target
            .strip_prefix("bl")
            .map(|s| s.parse::<u16>().is_ok())
            .unwrap_or(false);
    if !valid_target {
        return Err(format!("unknown baseline '{target}'"));
    }

    let field = Field::parse(field_name.trim())?;
    if field.is_numeric() && op == Op::Contains {
        return Err(format!("'contains' is not valid for numeric field '{field_name}'"));
    }
    if !field.is_numeric() && matches!(op, Op::Lt | Op::Le | Op::Gt | Op::Ge) {
        return Err(format!("ordering is not valid for string field '{field_name}'"));
    }

    let value = rhs.trim_matches(|c| c == '"' || c == '\'').to_string();
    if field.is_numeric() && value.parse::<u64>().is_err() {
        return Err(format!("'{value}' is not a number"));
    }

    Ok(Clause {
        target: target.to_string(),
        field,
        op,
        value,
    })
}
