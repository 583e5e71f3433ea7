// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;
use std::fmt;

use crate::value::Value;

/// A structured element: named fields in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Sets a field, appending it when new.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    /// A record with the same fields, each set to the default of its type.
    pub fn missing_like(&self) -> Record {
        Record {
            fields: self
                .fields
                .iter()
                .map(|(n, v)| (n.clone(), Value::missing(Some(v))))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Record {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, (_, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v.repr())?;
        }
        write!(f, ")")
    }
}

impl Value {
    /// Default used for gaps: -1 for numbers, empty text, false.
    pub fn missing(prototype: Option<&Value>) -> Value {
        match prototype {
            Some(Value::Bool(_)) => Value::Bool(false),
            Some(Value::Float(_)) => Value::Float(-1.0),
            Some(Value::Str(_)) => Value::Str(String::new()),
            Some(Value::Int(_)) | None => Value::Int(-1),
        }
    }

    /// Converts `self` to the variant of `prototype` when possible.
    pub(crate) fn coerce_like(&self, prototype: &Value) -> Option<Value> {
        match prototype {
            Value::Bool(_) => match self {
                Value::Bool(b) => Some(Value::Bool(*b)),
                _ => None,
            },
            Value::Int(_) => self.as_i64().map(Value::Int),
            Value::Float(_) => self.as_f64().map(Value::Float),
            Value::Str(_) => Some(Value::Str(match self {
                Value::Str(s) => s.clone(),
                other => other.to_string(),
            })),
        }
    }
}

/// Types that can be stored in a labeled array.
pub trait Element: Clone + fmt::Debug {
    /// Value used to fill gaps when no filling value is given.
    fn missing(prototype: Option<&Self>) -> Self;

    fn from_value(value: &Value) -> Option<Self>;

    /// Filling element built from a single value; records apply it to
    /// every field.
    fn filled(_prototype: Option<&Self>, value: &Value) -> Option<Self> {
        Self::from_value(value)
    }

    /// Filling element built from per-field values; only records have
    /// fields.
    fn filled_fields(_prototype: Option<&Self>, _values: &BTreeMap<String, Value>) -> Option<Self> {
        None
    }

    fn to_record(&self) -> Option<Record> {
        None
    }

    fn from_record(_record: Record) -> Option<Self> {
        None
    }
}

macro_rules! int_element {
    ($($t:ty),*) => {$(
        impl Element for $t {
            fn missing(_prototype: Option<&Self>) -> Self {
                -1
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Float(_) | Value::Str(_) => None,
                    other => other.as_i64().and_then(|n| <$t>::try_from(n).ok()),
                }
            }
        }
    )*};
}

int_element!(i8, i16, i32, i64);

impl Element for f32 {
    fn missing(_prototype: Option<&Self>) -> Self {
        -1.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl Element for f64 {
    fn missing(_prototype: Option<&Self>) -> Self {
        -1.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl Element for bool {
    fn missing(_prototype: Option<&Self>) -> Self {
        false
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl Element for String {
    fn missing(_prototype: Option<&Self>) -> Self {
        String::new()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl Element for Value {
    fn missing(prototype: Option<&Self>) -> Self {
        Value::missing(prototype)
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl Element for Record {
    fn missing(prototype: Option<&Self>) -> Self {
        prototype.map(Record::missing_like).unwrap_or_default()
    }

    fn from_value(_value: &Value) -> Option<Self> {
        None
    }

    fn filled(prototype: Option<&Self>, value: &Value) -> Option<Self> {
        let prototype = prototype?;
        let mut record = Record::new();
        for (name, field) in prototype.iter() {
            record.set(name, value.coerce_like(field)?);
        }
        Some(record)
    }

    fn filled_fields(prototype: Option<&Self>, values: &BTreeMap<String, Value>) -> Option<Self> {
        let prototype = prototype?;
        let mut record = prototype.missing_like();
        for (name, value) in values {
            let field = prototype.get(name)?;
            record.set(name.as_str(), value.coerce_like(field)?);
        }
        Some(record)
    }

    fn to_record(&self) -> Option<Record> {
        Some(self.clone())
    }

    fn from_record(record: Record) -> Option<Self> {
        Some(record)
    }
}

/// Truth value used by `all` and `any`.
pub trait Truth {
    fn truth(&self) -> bool;
}

impl Truth for bool {
    fn truth(&self) -> bool {
        *self
    }
}

macro_rules! numeric_truth {
    ($($t:ty),*) => {$(
        impl Truth for $t {
            fn truth(&self) -> bool {
                *self != (0 as $t)
            }
        }
    )*};
}

numeric_truth!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

impl Truth for Value {
    fn truth(&self) -> bool {
        self.truthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(-1, i32::missing(None));
        assert_eq!(-1.0, f64::missing(None));
        assert_eq!("", String::missing(None));
        assert!(!bool::missing(None));
        assert_eq!(
            Value::Str(String::new()),
            Value::missing(Some(&Value::from("x")))
        );
    }

    #[test]
    fn test_from_value() {
        assert_eq!(Some(3), i64::from_value(&Value::Int(3)));
        assert_eq!(None, i8::from_value(&Value::Int(300)));
        assert_eq!(None, i32::from_value(&Value::Float(1.5)));
        assert_eq!(Some(1.5), f64::from_value(&Value::Float(1.5)));
        assert_eq!(Some("2".to_string()), String::from_value(&Value::Int(2)));
    }

    #[test]
    fn test_record_fill() {
        let proto = Record::from([("x", Value::Int(4)), ("name", Value::from("n"))]);
        let missing = Record::missing(Some(&proto));
        assert_eq!(Some(&Value::Int(-1)), missing.get("x"));
        assert_eq!(Some(&Value::from("")), missing.get("name"));

        let filled = Record::filled(Some(&proto), &Value::Int(0)).unwrap();
        assert_eq!(Some(&Value::Int(0)), filled.get("x"));
        assert_eq!(Some(&Value::from("0")), filled.get("name"));

        let mut per_field = BTreeMap::new();
        per_field.insert("x".to_string(), Value::Int(7));
        let filled = Record::filled_fields(Some(&proto), &per_field).unwrap();
        assert_eq!(Some(&Value::Int(7)), filled.get("x"));
        assert_eq!(Some(&Value::from("")), filled.get("name"));
        per_field.insert("zz".to_string(), Value::Int(7));
        assert!(Record::filled_fields(Some(&proto), &per_field).is_none());
    }

    #[test]
    fn test_record_fields() {
        let mut r = Record::from([("a", 1), ("b", 2)]);
        r.set("a", 5);
        r.set("c", "x");
        assert_eq!(vec!["a", "b", "c"], r.names().collect::<Vec<_>>());
        assert_eq!(Some(Value::Int(2)), r.remove("b"));
        assert_eq!("(5, 'x')", r.to_string());
    }
}
