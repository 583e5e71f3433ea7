// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use lazy_static::lazy_static;
use ordered_float::OrderedFloat;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::eval_err;

/// A single variable value stored in a tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

lazy_static! {
    static ref INT_RE: Regex = Regex::new(r"^[-+]?\d+$").unwrap();
    static ref FLOAT_RE: Regex =
        Regex::new(r"^[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?$").unwrap();
}

impl Value {
    /// Converts a tick fragment into a number when it looks like one,
    /// leaving it as text otherwise.
    pub fn parse(text: &str) -> Value {
        if INT_RE.is_match(text) {
            if let Ok(n) = text.parse::<i64>() {
                return Value::Int(n);
            }
        }
        if FLOAT_RE.is_match(text) {
            if let Ok(n) = text.parse::<f64>() {
                return Value::Float(n);
            }
        }
        Value::Str(text.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Str(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(n) => Some(*n),
            Value::Float(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::Str(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// Quoted rendering used inside filters and instance listings.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{s}'"),
            other => other.to_string(),
        }
    }

    /// Total order used for sorting: numbers (booleans included) first,
    /// then text.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => OrderedFloat(a).cmp(&OrderedFloat(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.as_str().cmp(&other.as_str()),
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => self.arith(other, "+", i64::checked_add, |a, b| a + b),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        self.arith(other, "-", i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        self.arith(other, "*", i64::checked_mul, |a, b| a * b)
    }

    fn division_by_zero(&self, op: &str, other: &Value) -> Result<Value> {
        let (l, r) = (self.repr(), other.repr());
        eval_err!(DivisionByZero, format!("{l} {op} {r}"))
    }

    pub fn div(&self, other: &Value) -> Result<Value> {
        match (self.as_f64(), other.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => self.division_by_zero("/", other),
            (Some(a), Some(b)) => Ok(Value::Float(a / b)),
            _ => eval_err!(
                TypeMismatch,
                format!("cannot divide {} by {}", self.repr(), other.repr())
            ),
        }
    }

    /// Modulo with the sign of the divisor.
    pub fn rem(&self, other: &Value) -> Result<Value> {
        match (self.int_like(), other.int_like()) {
            (Some(_), Some(0)) => self.division_by_zero("%", other),
            (Some(a), Some(b)) => {
                let mut r = a % b;
                if r != 0 && (r < 0) != (b < 0) {
                    r += b;
                }
                Ok(Value::Int(r))
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(_), Some(b)) if b == 0.0 => self.division_by_zero("%", other),
                (Some(a), Some(b)) => {
                    let mut r = a % b;
                    if r != 0.0 && (r < 0.0) != (b < 0.0) {
                        r += b;
                    }
                    Ok(Value::Float(r))
                }
                _ => eval_err!(
                    TypeMismatch,
                    format!("cannot take {} modulo {}", self.repr(), other.repr())
                ),
            },
        }
    }

    pub fn neg(&self) -> Result<Value> {
        match self {
            Value::Bool(b) => Ok(Value::Int(-(*b as i64))),
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(n) => Ok(Value::Float(-n)),
            Value::Str(_) => eval_err!(TypeMismatch, format!("cannot negate {}", self.repr())),
        }
    }

    fn int_like(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    fn arith(
        &self,
        other: &Value,
        op: &str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value> {
        if let (Some(a), Some(b)) = (self.int_like(), other.int_like()) {
            if let Some(n) = int_op(a, b) {
                return Ok(Value::Int(n));
            }
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            _ => eval_err!(
                TypeMismatch,
                format!("unsupported operands {} {op} {}", self.repr(), other.repr())
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Str(_), _) | (_, Value::Str(_)) => false,
            (Value::Int(a), Value::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => None,
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 => {
                write!(f, "{n:.1}")
            }
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
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

/// The variable assignment behind one tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instance(BTreeMap<String, Value>);

impl Instance {
    pub fn new() -> Self {
        Instance(BTreeMap::new())
    }

    pub fn insert(&mut self, var: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(var.into(), value.into())
    }

    pub fn get(&self, var: &str) -> Option<&Value> {
        self.0.get(var)
    }

    pub fn remove(&mut self, var: &str) -> Option<Value> {
        self.0.remove(var)
    }

    pub fn contains_key(&self, var: &str) -> bool {
        self.0.contains_key(var)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keeps only the given variables (those present).
    pub fn project<S: AsRef<str>>(&self, vars: &[S]) -> Instance {
        Instance(
            vars.iter()
                .filter_map(|v| {
                    let v = v.as_ref();
                    self.0.get(v).map(|value| (v.to_string(), value.clone()))
                })
                .collect(),
        )
    }

    /// Union of both instances; `other` wins on shared variables.
    pub fn merge(&self, other: &Instance) -> Instance {
        let mut merged = self.clone();
        for (k, v) in other.0.iter() {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Names of the variables whose values differ between the two
    /// instances (including variables present in only one of them).
    pub fn differing(&self, other: &Instance) -> Vec<String> {
        let mut vars: Vec<String> = self
            .0
            .iter()
            .filter(|(k, v)| other.0.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect();
        for k in other.0.keys() {
            if !self.0.contains_key(k) {
                vars.push(k.clone());
            }
        }
        vars.sort();
        vars
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{k}': {}", v.repr())?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Instance {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Instance {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let pairs = iter.into_iter().map(|(k, v)| (k.into(), v.into()));
        Instance(pairs.collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Value::Int(12), Value::parse("12"));
        assert_eq!(Value::Int(-3), Value::parse("-3"));
        assert!(matches!(Value::parse("1.5"), Value::Float(n) if n == 1.5));
        assert!(matches!(Value::parse("2e3"), Value::Float(n) if n == 2000.0));
        assert!(matches!(Value::parse("a0"), Value::Str(ref s) if s == "a0"));
        assert!(matches!(Value::parse("nan"), Value::Str(_)));
        assert!(matches!(Value::parse(""), Value::Str(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!("1", Value::Int(1).to_string());
        assert_eq!("1.0", Value::Float(1.0).to_string());
        assert_eq!("0.25", Value::Float(0.25).to_string());
        assert_eq!("True", Value::Bool(true).to_string());
        assert_eq!("x", Value::from("x").to_string());
        assert_eq!("'x'", Value::from("x").repr());
    }

    #[test]
    fn test_mixed_comparisons() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::from("2"));
        assert!(Value::Int(1) < Value::Float(1.5));
        assert_eq!(None, Value::Int(1).partial_cmp(&Value::from("a")));
        assert_eq!(Ordering::Less, Value::Int(10).total_cmp(&Value::from("a")));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(Value::Int(5), Value::Int(2).add(&Value::Int(3)).unwrap());
        assert_eq!(
            Value::Float(2.5),
            Value::Int(5).div(&Value::Int(2)).unwrap()
        );
        assert_eq!(Value::Int(2), Value::Int(-1).rem(&Value::Int(3)).unwrap());
        assert_eq!(Value::Int(-2), Value::Int(1).rem(&Value::Int(-3)).unwrap());
        assert!(Value::Int(1).div(&Value::Int(0)).is_err());
        assert!(Value::from("a").sub(&Value::Int(1)).is_err());
        assert_eq!(
            Value::from("ab"),
            Value::from("a").add(&Value::from("b")).unwrap()
        );
    }

    #[test]
    fn test_instance_display_and_ops() {
        let a = Instance::from([("a", Value::Int(1)), ("b", Value::from("x"))]);
        assert_eq!("{'a': 1, 'b': 'x'}", a.to_string());
        let b = Instance::from([("a", 1), ("b", 2)]);
        assert_eq!(vec!["b".to_string()], a.differing(&b));
        assert_eq!(Instance::from([("a", 1)]), a.project(&["a", "zz"]));
        let merged = a.merge(&Instance::from([("c", 3)]));
        assert_eq!(3, merged.len());
    }

    #[test]
    fn test_instance_json() {
        let a = Instance::from([("a", Value::Int(1)), ("b", Value::from("x"))]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(r#"{"a":1,"b":"x"}"#, json);
        let back: Instance = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }
}
