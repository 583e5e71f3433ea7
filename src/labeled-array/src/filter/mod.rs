// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Boolean predicates over tick variables.
//!
//! ```text
//! group          ( ... )
//! list           [ ... ]
//! membership     a in [1, 2]    a not in [1, 2]
//! existence      exists(a)
//! constants      True False 12 3.5 'text'
//! arithmetic     + - * / %      unary -
//! comparison     == != < <= > >=    1 < a < 3
//! pattern        a =~ 'x.*'     a !~ 'x.*'
//! boolean        && || !
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::eval_err;
use crate::value::{Instance, Value};

mod lexer;
mod parser;

#[cfg(test)]
mod tests;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Clone, Debug)]
pub struct Pattern {
    pub source: String,
    pub regex: Regex,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Const(Value),
    Var(String),
    Exists(String),
    List(Vec<Expr>),
    Neg(Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    Match(Box<Expr>, Pattern, bool),
    In(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// Result of evaluating a sub-expression.
#[derive(Clone, Debug, PartialEq)]
enum Operand {
    Scalar(Value),
    List(Vec<Value>),
}

impl Operand {
    fn scalar(self, expr: &Expr) -> Result<Value> {
        match self {
            Operand::Scalar(v) => Ok(v),
            Operand::List(_) => eval_err!(TypeMismatch, format!("list used as a value in {expr}")),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Operand::Scalar(v) => v.truthy(),
            Operand::List(items) => !items.is_empty(),
        }
    }
}

impl Expr {
    fn eval(&self, instance: &Instance) -> Result<Operand> {
        let value = match self {
            Expr::Const(v) => Operand::Scalar(v.clone()),
            Expr::Var(name) => match instance.get(name) {
                Some(v) => Operand::Scalar(v.clone()),
                None => {
                    return Err(Error::new(
                        ErrorKind::Filter,
                        ErrorCode::MissingVariable,
                        Some(name.clone()),
                    ));
                }
            },
            Expr::Exists(name) => Operand::Scalar(Value::Bool(instance.contains_key(name))),
            Expr::List(items) => Operand::List(
                items
                    .iter()
                    .map(|e| e.eval(instance)?.scalar(e))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Expr::Neg(e) => Operand::Scalar(e.eval(instance)?.scalar(e)?.neg()?),
            Expr::Arith(op, l, r) => {
                let a = l.eval(instance)?.scalar(l)?;
                let b = r.eval(instance)?.scalar(r)?;
                Operand::Scalar(match op {
                    ArithOp::Add => a.add(&b)?,
                    ArithOp::Sub => a.sub(&b)?,
                    ArithOp::Mul => a.mul(&b)?,
                    ArithOp::Div => a.div(&b)?,
                    ArithOp::Mod => a.rem(&b)?,
                })
            }
            Expr::Cmp(op, l, r) => {
                let a = l.eval(instance)?;
                let b = r.eval(instance)?;
                let result = match op {
                    CmpOp::Eq => a == b,
                    CmpOp::Neq => a != b,
                    _ => {
                        let a = a.scalar(l)?;
                        let b = b.scalar(r)?;
                        let ord = match a.partial_cmp(&b) {
                            Some(ord) => ord,
                            None => {
                                return eval_err!(
                                    TypeMismatch,
                                    format!("cannot order {} and {} in {self}", a.repr(), b.repr())
                                );
                            }
                        };
                        match op {
                            CmpOp::Lt => ord.is_lt(),
                            CmpOp::Lte => ord.is_le(),
                            CmpOp::Gt => ord.is_gt(),
                            _ => ord.is_ge(),
                        }
                    }
                };
                Operand::Scalar(Value::Bool(result))
            }
            Expr::Match(e, pattern, negated) => {
                let text = e.eval(instance)?.scalar(e)?.to_string();
                Operand::Scalar(Value::Bool(pattern.regex.is_match(&text) != *negated))
            }
            Expr::In(l, r) => {
                let needle = l.eval(instance)?.scalar(l)?;
                let found = match r.eval(instance)? {
                    Operand::List(items) => items.contains(&needle),
                    Operand::Scalar(Value::Str(hay)) => match needle.as_str() {
                        Some(n) => hay.contains(n),
                        None => {
                            return eval_err!(
                                TypeMismatch,
                                format!("'in <string>' requires a string operand in {self}")
                            );
                        }
                    },
                    Operand::Scalar(other) => {
                        return eval_err!(
                            TypeMismatch,
                            format!("{} is not a container in {self}", other.repr())
                        );
                    }
                };
                Operand::Scalar(Value::Bool(found))
            }
            Expr::Not(e) => Operand::Scalar(Value::Bool(!e.eval(instance)?.truthy())),
            Expr::And(l, r) => {
                let result = l.eval(instance)?.truthy() && r.eval(instance)?.truthy();
                Operand::Scalar(Value::Bool(result))
            }
            Expr::Or(l, r) => {
                let result = l.eval(instance)?.truthy() || r.eval(instance)?.truthy();
                Operand::Scalar(Value::Bool(result))
            }
        };
        Ok(value)
    }

    fn collect_variables<'a>(&'a self, vars: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(name) | Expr::Exists(name) => {
                vars.insert(name.as_str());
            }
            Expr::List(items) => items.iter().for_each(|e| e.collect_variables(vars)),
            Expr::Neg(e) | Expr::Not(e) | Expr::Match(e, _, _) => e.collect_variables(vars),
            Expr::Arith(_, l, r)
            | Expr::Cmp(_, l, r)
            | Expr::In(l, r)
            | Expr::And(l, r)
            | Expr::Or(l, r) => {
                l.collect_variables(vars);
                r.collect_variables(vars);
            }
        }
    }

    /// Collects `var == const` conjuncts; `None` when the expression has
    /// any other shape or contradicts itself.
    fn collect_equalities(&self, out: &mut Instance) -> Option<()> {
        match self {
            Expr::And(l, r) => {
                l.collect_equalities(out)?;
                r.collect_equalities(out)
            }
            Expr::Cmp(CmpOp::Eq, l, r) => {
                let (name, value) = match (l.as_ref(), r.as_ref()) {
                    (Expr::Var(name), Expr::Const(value)) => (name, value),
                    (Expr::Const(value), Expr::Var(name)) => (name, value),
                    _ => return None,
                };
                match out.get(name) {
                    Some(prev) if prev != value => None,
                    _ => {
                        out.insert(name.clone(), value.clone());
                        Some(())
                    }
                }
            }
            _ => None,
        }
    }

    fn is_arith(&self) -> bool {
        matches!(self, Expr::Arith(..) | Expr::Neg(_))
    }

    /// Rendering as a comparison operand.
    fn grouped(&self) -> String {
        match self {
            Expr::Cmp(..)
            | Expr::Match(..)
            | Expr::In(..)
            | Expr::Not(_)
            | Expr::And(..)
            | Expr::Or(..) => format!("({self})"),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{}", v.repr()),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Exists(name) => write!(f, "exists({name})"),
            Expr::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Expr::Neg(e) if e.is_arith() => write!(f, "-({e})"),
            Expr::Neg(e) => write!(f, "-{e}"),
            Expr::Arith(op, l, r) => {
                let op = match op {
                    ArithOp::Add => "+",
                    ArithOp::Sub => "-",
                    ArithOp::Mul => "*",
                    ArithOp::Div => "/",
                    ArithOp::Mod => "%",
                };
                let side = |e: &Expr| {
                    if matches!(e, Expr::Arith(..)) {
                        format!("({e})")
                    } else {
                        e.to_string()
                    }
                };
                write!(f, "{} {op} {}", side(l), side(r))
            }
            Expr::Cmp(op, l, r) => {
                let op = match op {
                    CmpOp::Eq => "==",
                    CmpOp::Neq => "!=",
                    CmpOp::Lt => "<",
                    CmpOp::Lte => "<=",
                    CmpOp::Gt => ">",
                    CmpOp::Gte => ">=",
                };
                write!(f, "{} {op} {}", l.grouped(), r.grouped())
            }
            Expr::Match(e, pattern, negated) => {
                let op = if *negated { "!~" } else { "=~" };
                write!(f, "{e} {op} '{}'", pattern.source)
            }
            Expr::In(l, r) => write!(f, "{} in {}", l.grouped(), r.grouped()),
            Expr::Not(e) => match e.as_ref() {
                Expr::And(..) | Expr::Or(..) => write!(f, "! ({e})"),
                _ => write!(f, "! {e}"),
            },
            Expr::And(l, r) => {
                let side = |e: &Expr| match e {
                    Expr::And(..)
                    | Expr::Not(_)
                    | Expr::Cmp(..)
                    | Expr::Match(..)
                    | Expr::In(..) => e.to_string(),
                    _ => format!("( {e} )"),
                };
                write!(f, "{} && {}", side(l), side(r))
            }
            Expr::Or(l, r) => {
                let side = |e: &Expr| match e {
                    Expr::Cmp(..) | Expr::Match(..) | Expr::In(..) => e.to_string(),
                    _ => format!("( {e} )"),
                };
                // the left operand of a left-associative chain needs no group
                let left = match l.as_ref() {
                    Expr::Or(..) => l.to_string(),
                    _ => side(l),
                };
                write!(f, "{left} || {}", side(r))
            }
        }
    }
}

/// A compiled filter expression.
#[derive(Clone, Debug)]
pub struct Filter {
    expr: Expr,
}

impl Filter {
    pub fn parse(text: &str) -> Result<Filter> {
        match parser::parse(text) {
            Ok(expr) => Ok(Filter { expr }),
            Err(err) => Err(Error::from_filter(err, text)),
        }
    }

    /// The always-true filter.
    pub fn all() -> Filter {
        Filter {
            expr: Expr::Const(Value::Bool(true)),
        }
    }

    /// Equality test on every variable of the instance.
    pub fn from_instance(instance: &Instance) -> Filter {
        let mut expr: Option<Expr> = None;
        for (name, value) in instance.iter() {
            let cmp = Expr::Cmp(
                CmpOp::Eq,
                Box::new(Expr::Var(name.to_string())),
                Box::new(Expr::Const(value.clone())),
            );
            expr = Some(match expr {
                None => cmp,
                Some(prev) => Expr::And(Box::new(prev), Box::new(cmp)),
            });
        }
        match expr {
            Some(expr) => Filter { expr },
            None => Filter::all(),
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.expr, Expr::Const(_))
    }

    /// Conjunction of both filters.
    pub fn and(&self, other: &Filter) -> Filter {
        match (&self.expr, &other.expr) {
            (Expr::Const(v), _) if v.truthy() => other.clone(),
            (_, Expr::Const(v)) if v.truthy() => self.clone(),
            (Expr::Const(_), _) => self.clone(),
            _ => Filter {
                expr: Expr::And(Box::new(self.expr.clone()), Box::new(other.expr.clone())),
            },
        }
    }

    pub fn variables(&self) -> Vec<String> {
        let mut vars = BTreeSet::new();
        self.expr.collect_variables(&mut vars);
        vars.into_iter().map(|v| v.to_string()).collect()
    }

    /// First referenced variable not present in `allowed`.
    pub fn first_unallowed<S: AsRef<str>>(&self, allowed: &[S]) -> Option<String> {
        self.variables()
            .into_iter()
            .find(|v| !allowed.iter().any(|a| a.as_ref() == v))
    }

    pub fn validate<S: AsRef<str>>(&self, allowed: &[S]) -> Result<()> {
        match self.first_unallowed(allowed) {
            None => Ok(()),
            Some(var) => Err(Error::new(
                ErrorKind::Filter,
                ErrorCode::UnallowedVariable,
                Some(format!("unallowed variable {var:?} in filter: {self}")),
            )),
        }
    }

    /// Evaluates the filter; a variable absent from the instance is an
    /// error.
    pub fn matches(&self, instance: &Instance) -> Result<bool> {
        match self.expr.eval(instance) {
            Ok(v) => Ok(v.truthy()),
            Err(err) if err.code == ErrorCode::MissingVariable => Err(Error::new(
                ErrorKind::Filter,
                ErrorCode::MissingVariable,
                Some(format!(
                    "variable {:?} of filter {self} missing in {instance}",
                    err.details.unwrap_or_default()
                )),
            )),
            Err(err) => Err(err),
        }
    }

    /// Like `matches`, but instances lacking a referenced variable simply
    /// do not match.
    pub fn matches_lenient(&self, instance: &Instance) -> Result<bool> {
        match self.expr.eval(instance) {
            Ok(v) => Ok(v.truthy()),
            Err(err) if err.code == ErrorCode::MissingVariable => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// The equality-only form of this filter, if it has one.
    pub fn as_instance(&self) -> Option<Instance> {
        let mut out = Instance::new();
        self.expr.collect_equalities(&mut out)?;
        Some(out)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Filter) -> bool {
        self.to_string() == other.to_string()
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Filter> {
        Filter::parse(s)
    }
}

impl From<&Instance> for Filter {
    fn from(instance: &Instance) -> Filter {
        Filter::from_instance(instance)
    }
}
