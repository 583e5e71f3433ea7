// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Tick templates such as `"@bench@-@size@"`.
//!
//! A template interleaves literal text with variable references enclosed
//! in a delimiter. Extraction runs the template as an anchored regular
//! expression over a tick string; translation substitutes the variable
//! values back into the template.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::common::Result;
use crate::value::{Instance, Value};
use crate::{lookup_err, namespace_err};

/// Name of the implicit variable used by dimensions without an explicit
/// expression.
pub const DEFAULT_VAR: &str = "var";

/// Template syntax options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExprSyntax {
    pub delimiter: char,
}

impl Default for ExprSyntax {
    fn default() -> Self {
        ExprSyntax { delimiter: '@' }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Literal(String),
    Var(String),
}

#[derive(Clone, Debug)]
pub struct DimExpression {
    template: String,
    syntax: ExprSyntax,
    parts: Vec<Part>,
    variables: Vec<String>,
    regex: Regex,
    /// Capture group index -> variable name, for every variable reference
    /// (a variable referenced twice has two groups).
    groups: Vec<String>,
}

lazy_static! {
    static ref VAR_NAME_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref IMPLICIT: DimExpression = DimExpression::new("@var@").unwrap();
}

impl DimExpression {
    pub fn new(template: &str) -> Result<Self> {
        Self::with_syntax(template, ExprSyntax::default())
    }

    pub fn with_syntax(template: &str, syntax: ExprSyntax) -> Result<Self> {
        let pieces: Vec<&str> = template.split(syntax.delimiter).collect();
        if pieces.len() % 2 == 0 {
            return namespace_err!(
                BadExpression,
                format!("unbalanced variable delimiter in expression {template:?}")
            );
        }

        let mut parts = Vec::with_capacity(pieces.len());
        let mut variables: Vec<String> = Vec::new();
        let mut groups = Vec::new();
        let mut pattern = String::from("^");
        for (i, piece) in pieces.iter().enumerate() {
            if i % 2 == 0 {
                if !piece.is_empty() {
                    pattern.push_str(&regex::escape(piece));
                    parts.push(Part::Literal(piece.to_string()));
                }
                continue;
            }
            if !VAR_NAME_RE.is_match(piece) {
                return namespace_err!(
                    BadExpression,
                    format!("invalid variable name {piece:?} in expression {template:?}")
                );
            }
            pattern.push_str("(.*)");
            groups.push(piece.to_string());
            if !variables.iter().any(|v| v == piece) {
                variables.push(piece.to_string());
            }
            parts.push(Part::Var(piece.to_string()));
        }
        pattern.push('$');

        if variables.is_empty() {
            return namespace_err!(
                BadExpression,
                format!("expression {template:?} must contain at least one variable")
            );
        }

        let regex = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(err) => return namespace_err!(BadExpression, err.to_string()),
        };

        Ok(DimExpression {
            template: template.to_string(),
            syntax,
            parts,
            variables,
            regex,
            groups,
        })
    }

    /// The implicit `@var@` expression.
    pub fn implicit() -> Self {
        IMPLICIT.clone()
    }

    /// Builds `@a@-@b@` style templates out of a list of variable names.
    pub fn from_variables<S: AsRef<str>>(vars: &[S], syntax: ExprSyntax) -> Result<Self> {
        let d = syntax.delimiter;
        let template = vars
            .iter()
            .map(|v| format!("{d}{}{d}", v.as_ref()))
            .collect::<Vec<_>>()
            .join("-");
        Self::with_syntax(&template, syntax)
    }

    /// Joins several expressions with `-`, as used when flattening axes.
    pub fn join(exprs: &[&DimExpression]) -> Result<Self> {
        let syntax = exprs.first().map(|e| e.syntax).unwrap_or_default();
        let template = exprs
            .iter()
            .map(|e| e.template.as_str())
            .collect::<Vec<_>>()
            .join("-");
        Self::with_syntax(&template, syntax)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn syntax(&self) -> ExprSyntax {
        self.syntax
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn has_variable(&self, var: &str) -> bool {
        self.variables.iter().any(|v| v == var)
    }

    /// Parses a tick string into the values of each variable.
    pub fn extract(&self, tick: &str) -> Result<Instance> {
        let caps = match self.regex.captures(tick) {
            Some(caps) => caps,
            None => {
                return lookup_err!(
                    ExtractionFailed,
                    format!(
                        "tick {tick:?} does not match expression {:?}",
                        self.template
                    )
                );
            }
        };
        let mut instance = Instance::new();
        for (i, var) in self.groups.iter().enumerate() {
            let text = caps.get(i + 1).map(|m| m.as_str()).unwrap_or("");
            let value = Value::parse(text);
            if let Some(prev) = instance.get(var) {
                if *prev != value {
                    return lookup_err!(
                        ExtractionFailed,
                        format!(
                            "tick {tick:?} assigns different values to variable {var:?} in {:?}",
                            self.template
                        )
                    );
                }
                continue;
            }
            instance.insert(var.clone(), value);
        }
        Ok(instance)
    }

    /// Renders a tick string; every variable must be present.
    pub fn translate(&self, instance: &Instance) -> Result<String> {
        let mut out = String::new();
        for part in self.parts.iter() {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Var(var) => match instance.get(var) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        return lookup_err!(
                            MissingVariable,
                            format!(
                                "variable {var:?} of expression {:?} missing in {instance}",
                                self.template
                            )
                        );
                    }
                },
            }
        }
        Ok(out)
    }
}

impl PartialEq for DimExpression {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template && self.syntax == other.syntax
    }
}

impl fmt::Display for DimExpression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    #[test]
    fn test_variables() {
        let e = DimExpression::new("@bench@-@size@").unwrap();
        assert_eq!(vec!["bench", "size"], e.variables());
        let e = DimExpression::new("x@a@y@a@").unwrap();
        assert_eq!(vec!["a"], e.variables());
    }

    #[test]
    fn test_bad_expressions() {
        for bad in ["", "no vars", "@a", "@a b@", "@@"] {
            let err = DimExpression::new(bad).unwrap_err();
            assert_eq!(ErrorCode::BadExpression, err.code, "{bad:?}");
        }
    }

    #[test]
    fn test_extract_translate() {
        let e = DimExpression::new("@a@-@b@").unwrap();
        let inst = e.extract("1-x").unwrap();
        assert_eq!(Some(&Value::Int(1)), inst.get("a"));
        assert_eq!(Some(&Value::from("x")), inst.get("b"));
        assert_eq!("1-x", e.translate(&inst).unwrap());

        assert_eq!(
            ErrorCode::ExtractionFailed,
            e.extract("nodash").unwrap_err().code
        );
        assert_eq!(
            ErrorCode::MissingVariable,
            e.translate(&Instance::from([("a", 1)])).unwrap_err().code
        );
    }

    #[test]
    fn test_repeated_variable() {
        let e = DimExpression::new("@a@/@a@").unwrap();
        assert!(e.extract("3/3").is_ok());
        assert!(e.extract("3/4").is_err());
    }

    #[test]
    fn test_custom_delimiter() {
        let syntax = ExprSyntax { delimiter: '%' };
        let e = DimExpression::with_syntax("%a%@%b%", syntax).unwrap();
        assert_eq!(vec!["a", "b"], e.variables());
        let inst = e.extract("x@y").unwrap();
        assert_eq!(Some(&Value::from("y")), inst.get("b"));
    }

    #[test]
    fn test_from_variables_and_join() {
        let e = DimExpression::from_variables(&["a", "b"], ExprSyntax::default()).unwrap();
        assert_eq!("@a@-@b@", e.as_str());
        assert_eq!(e, DimExpression::new("@a@-@b@").unwrap());
        let c = DimExpression::new("c@c@").unwrap();
        let joined = DimExpression::join(&[&e, &c]).unwrap();
        assert_eq!("@a@-@b@-c@c@", joined.as_str());
        assert_eq!(vec!["a", "b", "c"], joined.variables());
    }
}
