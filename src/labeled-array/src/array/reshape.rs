// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Reshaping of 1-dimensional arrays: the variables of the source
//! dimension are redistributed among new dimensions, one per descriptor.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use super::LabeledArray;
use crate::common::{Error, ReshapeConflict, Result};
use crate::dim::{Dim, TickSpec};
use crate::element::{Element, Record};
use crate::expression::DimExpression;
use crate::filter::Filter;
use crate::value::{Instance, Value};
use crate::{reshape_err, shape_err};

#[derive(Clone, Debug, PartialEq)]
enum Template {
    Text(String),
    Vars(Vec<String>),
}

/// One dimension of a reshape result: an expression over source
/// variables and an optional filter restricting the source elements
/// that contribute to it.
#[derive(Clone, Debug)]
pub struct Descriptor {
    template: Template,
    filter: Option<Filter>,
}

impl Descriptor {
    /// An expression template such as `"a: @a@"`.
    pub fn expression(template: &str) -> Self {
        Descriptor {
            template: Template::Text(template.to_string()),
            filter: None,
        }
    }

    /// An `@a@-@b@` template over the given variables.
    pub fn vars<S: AsRef<str>>(vars: &[S]) -> Self {
        Descriptor {
            template: Template::Vars(vars.iter().map(|v| v.as_ref().to_string()).collect()),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn filter(self, filter: &str) -> Result<Self> {
        Ok(self.with_filter(Filter::parse(filter)?))
    }
}

impl From<&str> for Descriptor {
    fn from(template: &str) -> Self {
        Descriptor::expression(template)
    }
}

impl From<Vec<&str>> for Descriptor {
    fn from(vars: Vec<&str>) -> Self {
        Descriptor::vars(&vars)
    }
}

impl<const N: usize> From<[&str; N]> for Descriptor {
    fn from(vars: [&str; N]) -> Self {
        Descriptor::vars(&vars)
    }
}

impl<D: Into<Descriptor>> From<(D, Filter)> for Descriptor {
    fn from((descriptor, filter): (D, Filter)) -> Self {
        descriptor.into().with_filter(filter)
    }
}

/// Source variables left out of the reshape.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Ignore {
    /// Unused variables form an extra trailing dimension.
    #[default]
    Auto,
    /// These variables are dropped; the rest of the unused variables form
    /// the trailing dimension.
    Vars(Vec<String>),
    /// Every unused variable is dropped.
    Rest,
}

/// Value written into result positions no source element maps to.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Fill<T> {
    /// -1 for numbers, empty text, false.
    #[default]
    Missing,
    /// One value; records apply it to every field.
    Value(Value),
    /// Per-field values for record arrays; other fields get the default.
    PerField(BTreeMap<String, Value>),
    Element(T),
}

#[derive(Clone, Debug)]
pub struct ReshapeOptions<T> {
    ignore: Ignore,
    fill: Fill<T>,
    fields_to_vars: Vec<String>,
    vars_to_fields: Vec<String>,
}

impl<T> Default for ReshapeOptions<T> {
    fn default() -> Self {
        ReshapeOptions {
            ignore: Ignore::Auto,
            fill: Fill::Missing,
            fields_to_vars: Vec::new(),
            vars_to_fields: Vec::new(),
        }
    }
}

impl<T> ReshapeOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(mut self, ignore: Ignore) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn ignore_vars<S: AsRef<str>>(self, vars: &[S]) -> Self {
        self.ignore(Ignore::Vars(vars.iter().map(|v| v.as_ref().to_string()).collect()))
    }

    pub fn ignore_rest(self) -> Self {
        self.ignore(Ignore::Rest)
    }

    pub fn filling(mut self, fill: Fill<T>) -> Self {
        self.fill = fill;
        self
    }

    pub fn filling_value(self, value: impl Into<Value>) -> Self {
        self.filling(Fill::Value(value.into()))
    }

    /// Moves the record fields whose names match one of the regular
    /// expressions (anchored at the start) into dimension variables.
    pub fn fields_to_vars<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.fields_to_vars = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    /// Moves the matching dimension variables into record fields.
    pub fn vars_to_fields<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.vars_to_fields = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }
}

/// Names among `candidates` that match any of the patterns; every pattern
/// must match at least one name.
fn match_patterns(patterns: &[String], candidates: &[String], what: &str) -> Result<Vec<String>> {
    let mut found: Vec<String> = Vec::new();
    for pattern in patterns {
        let re = match Regex::new(&format!("^(?:{pattern})")) {
            Ok(re) => re,
            Err(err) => {
                return reshape_err!(InvalidRegex, format!("invalid pattern {pattern:?}: {err}"));
            }
        };
        let hits: Vec<&String> = candidates.iter().filter(|c| re.is_match(c)).collect();
        if hits.is_empty() {
            return reshape_err!(
                PatternNoMatch,
                format!("pattern {pattern:?} does not match any {what}")
            );
        }
        for hit in hits {
            if !found.contains(hit) {
                found.push(hit.clone());
            }
        }
    }
    let mut matched = candidates.to_vec();
    matched.retain(|c| found.contains(c));
    Ok(matched)
}

/// The array data and source dimension after moving fields and variables
/// around.
struct Source<T> {
    values: Vec<T>,
    expression: DimExpression,
    instances: Vec<Option<Instance>>,
}

struct Axis {
    expression: DimExpression,
    filter: Filter,
}

impl<T: Element> LabeledArray<T> {
    /// Rearranges a 1-dimensional array into one dimension per descriptor.
    ///
    /// Each descriptor names the source variables its dimension is built
    /// from. The ticks of a result dimension are the distinct values of
    /// its variables in order of first appearance among the source
    /// elements that pass its filter (the conjunction of its own filter
    /// and those of the preceding descriptors). Result positions that no
    /// source element maps to hold the filling value.
    pub fn reshape(
        &self,
        descriptors: &[Descriptor],
        options: &ReshapeOptions<T>,
    ) -> Result<LabeledArray<T>> {
        if self.ndim() != 1 {
            return shape_err!(
                NotOneDimensional,
                format!(
                    "reshape needs a 1-dimensional array, got {} dimensions",
                    self.ndim()
                )
            );
        }
        let dim = &self.dims.as_slice()[0];
        if !dim.has_expression() {
            return reshape_err!(
                NoExpression,
                "reshape needs a dimension with an expression".to_string()
            );
        }

        let source = self.reshape_source(dim, options)?;
        let variables = source.expression.variables().to_vec();
        let syntax = source.expression.syntax();
        debug!(expression = source.expression.as_str(), "reshape source");

        let ignored: Vec<String> = match &options.ignore {
            Ignore::Auto | Ignore::Rest => Vec::new(),
            Ignore::Vars(vars) => {
                if let Some(var) = vars.iter().find(|v| !variables.contains(v)) {
                    return reshape_err!(
                        UnknownVariable,
                        format!("invalid variable {var:?} in ignore")
                    );
                }
                vars.clone()
            }
        };

        let mut axes: Vec<Axis> = Vec::with_capacity(descriptors.len() + 1);
        let mut used: Vec<String> = Vec::new();
        let mut prev_filter = Filter::all();
        for descriptor in descriptors {
            let expression = match &descriptor.template {
                Template::Text(text) => DimExpression::with_syntax(text, syntax)?,
                Template::Vars(vars) => DimExpression::from_variables(vars, syntax)?,
            };
            for var in expression.variables() {
                if !variables.contains(var) {
                    return reshape_err!(
                        UnknownVariable,
                        format!("unknown variable {var:?} in {:?}", expression.as_str())
                    );
                }
                if used.contains(var) {
                    return reshape_err!(
                        AlreadyUsedVariable,
                        format!("already used variable {var:?} in {:?}", expression.as_str())
                    );
                }
                used.push(var.clone());
            }
            if let Some(filter) = &descriptor.filter {
                filter.validate(&variables)?;
                prev_filter = prev_filter.and(filter);
            }
            axes.push(Axis {
                expression,
                filter: prev_filter.clone(),
            });
        }

        if options.ignore != Ignore::Rest {
            let unused: Vec<&String> = variables
                .iter()
                .filter(|v| !used.contains(v) && !ignored.contains(v))
                .collect();
            if !unused.is_empty() {
                debug!(?unused, "unused variables form the trailing dimension");
                axes.push(Axis {
                    expression: DimExpression::from_variables(&unused, syntax)?,
                    filter: prev_filter.clone(),
                });
            }
        }

        let mut dims = Vec::with_capacity(axes.len());
        let mut maps: Vec<Vec<Option<usize>>> = Vec::with_capacity(axes.len());
        for axis in axes.iter() {
            let (dim, map) = expand(axis, &source.instances)?;
            dims.push(dim);
            maps.push(map);
        }
        let shape: Vec<usize> = dims.iter().map(|d| d.len()).collect();

        if shape == self.shape() {
            debug!("reshape keeps the shape; only the metadata changes");
            return LabeledArray::from_shape_vec(&shape, source.values, dims);
        }

        let fill = fill_element(&options.fill, source.values.first())?;
        let total: usize = shape.iter().product();
        let mut values = vec![fill; total];
        let mut origin: Vec<Option<usize>> = vec![None; total];
        'elements: for (pos, value) in source.values.iter().enumerate() {
            let mut flat = 0;
            for (map, len) in maps.iter().zip(shape.iter()) {
                let Some(p) = map[pos] else {
                    continue 'elements;
                };
                flat = flat * len + p;
            }
            if let Some(prev) = origin[flat] {
                return Err(conflict(&source, prev, pos));
            }
            origin[flat] = Some(pos);
            values[flat] = value.clone();
        }
        LabeledArray::from_shape_vec(&shape, values, dims)
    }

    fn reshape_source(&self, dim: &Dim, options: &ReshapeOptions<T>) -> Result<Source<T>> {
        let values: Vec<T> = self.data.iter().cloned().collect();
        let expression = dim.dim_expression().clone();
        let instances = dim.instances().to_vec();
        if options.fields_to_vars.is_empty() && options.vars_to_fields.is_empty() {
            return Ok(Source {
                values,
                expression,
                instances,
            });
        }

        let mut records = values
            .iter()
            .map(|v| v.to_record())
            .collect::<Option<Vec<Record>>>()
            .unwrap_or_default();
        if records.len() != values.len() {
            return reshape_err!(
                NoFields,
                "cannot move fields and variables on arrays with no fields".to_string()
            );
        }
        let fields: Vec<String> = records
            .first()
            .map(|r| r.names().map(str::to_string).collect())
            .unwrap_or_default();
        let variables = expression.variables().to_vec();

        let f2v = match_patterns(&options.fields_to_vars, &fields, "field")?;
        if let Some(field) = f2v.iter().find(|f| variables.contains(f)) {
            return reshape_err!(
                NamespaceCollision,
                format!("field {field:?} is already a dimension variable")
            );
        }
        if !f2v.is_empty() && f2v.len() == fields.len() {
            return reshape_err!(
                AllFieldsToVars,
                "cannot move all fields into variables".to_string()
            );
        }

        if !options.vars_to_fields.is_empty() && fields.is_empty() {
            return reshape_err!(
                NoFields,
                "cannot use 'vars_to_fields' on arrays with no fields".to_string()
            );
        }
        let v2f = match_patterns(&options.vars_to_fields, &variables, "variable")?;
        if let Some(var) = v2f.iter().find(|v| fields.contains(v)) {
            return reshape_err!(
                NamespaceCollision,
                format!("variable {var:?} is already a field")
            );
        }
        if !v2f.is_empty() && v2f.len() == variables.len() {
            return reshape_err!(
                AllVarsToFields,
                "cannot move all variables into fields".to_string()
            );
        }

        let syntax = expression.syntax();
        let mut template = if v2f.is_empty() {
            expression.as_str().to_string()
        } else {
            let kept: Vec<&String> = variables.iter().filter(|v| !v2f.contains(v)).collect();
            let expression = DimExpression::from_variables(&kept, syntax)?;
            expression.as_str().to_string()
        };
        if !f2v.is_empty() {
            template.push('-');
            template.push_str(DimExpression::from_variables(&f2v, syntax)?.as_str());
        }
        let expression = DimExpression::with_syntax(&template, syntax)?;

        let prototype: Option<Instance> = instances.iter().flatten().next().cloned();
        let mut moved = Vec::with_capacity(instances.len());
        for (instance, record) in instances.iter().zip(records.iter_mut()) {
            for var in v2f.iter() {
                let value = match instance.as_ref().and_then(|i| i.get(var)) {
                    Some(value) => value.clone(),
                    None => Value::missing(prototype.as_ref().and_then(|p| p.get(var))),
                };
                record.set(var.as_str(), value);
            }
            let instance = instance.as_ref().map(|instance| {
                let mut instance = instance.clone();
                for field in f2v.iter() {
                    if let Some(value) = record.get(field) {
                        instance.insert(field.as_str(), value.clone());
                    }
                }
                instance.project(expression.variables())
            });
            for field in f2v.iter() {
                record.remove(field);
            }
            moved.push(instance);
        }
        debug!(?f2v, ?v2f, "moved fields and variables");

        let values = records
            .into_iter()
            .map(T::from_record)
            .collect::<Option<Vec<T>>>();
        let Some(values) = values else {
            return reshape_err!(
                NoFields,
                "element type cannot be rebuilt from records".to_string()
            );
        };
        Ok(Source {
            values,
            expression,
            instances: moved,
        })
    }
}

/// Builds one result dimension and maps every source position to its
/// position along it.
fn expand(axis: &Axis, instances: &[Option<Instance>]) -> Result<(Dim, Vec<Option<usize>>)> {
    let vars = axis.expression.variables();
    let mut groups: Vec<Instance> = Vec::new();
    let mut map = Vec::with_capacity(instances.len());
    for instance in instances {
        let Some(instance) = instance else {
            map.push(None);
            continue;
        };
        if !axis.filter.matches(instance)? {
            map.push(None);
            continue;
        }
        let key = instance.project(vars);
        let pos = match groups.iter().position(|g| *g == key) {
            Some(pos) => pos,
            None => {
                groups.push(key);
                groups.len() - 1
            }
        };
        map.push(Some(pos));
    }
    debug!(
        expression = axis.expression.as_str(),
        len = groups.len(),
        "built reshape dimension"
    );
    let ticks: Vec<TickSpec> = groups.into_iter().map(TickSpec::Record).collect();
    let dim = Dim::with_expression(axis.expression.clone(), ticks)?;
    Ok((dim, map))
}

fn fill_element<T: Element>(fill: &Fill<T>, prototype: Option<&T>) -> Result<T> {
    match fill {
        Fill::Missing => Ok(T::missing(prototype)),
        Fill::Element(value) => Ok(value.clone()),
        Fill::Value(value) => match T::filled(prototype, value) {
            Some(v) => Ok(v),
            None => reshape_err!(
                BadFillingValue,
                format!(
                    "filling value {} does not fit the element type",
                    value.repr()
                )
            ),
        },
        Fill::PerField(values) => {
            let fields: Vec<String> = prototype
                .and_then(|p| p.to_record())
                .map(|r| r.names().map(str::to_string).collect())
                .unwrap_or_default();
            if fields.is_empty() {
                return reshape_err!(
                    BadFillingValue,
                    "per-field filling values need an array with fields".to_string()
                );
            }
            if let Some(name) = values.keys().find(|k| !fields.contains(k)) {
                return reshape_err!(
                    BadFillingValue,
                    format!("filling value for unknown field {name:?}")
                );
            }
            match T::filled_fields(prototype, values) {
                Some(v) => Ok(v),
                None => reshape_err!(
                    BadFillingValue,
                    "filling values do not fit the field types".to_string()
                ),
            }
        }
    }
}

fn conflict<T>(source: &Source<T>, first: usize, second: usize) -> Error {
    let first = source.instances[first].clone().unwrap_or_default();
    let second = source.instances[second].clone().unwrap_or_default();
    let unused = first.differing(&second);
    Error::reshape_conflict(ReshapeConflict {
        expression: source.expression.as_str().to_string(),
        first,
        second,
        unused,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ErrorCode, ErrorKind};

    fn source() -> LabeledArray<i64> {
        LabeledArray::from_vec(
            vec![1, 2, 3, 4, 5],
            ("@a@-@b@", vec!["1-1", "1-2", "1-3", "2-1", "2-2"]),
        )
        .unwrap()
    }

    #[test]
    fn test_reshape_two_dimensions() {
        let r = source()
            .reshape(&[Descriptor::vars(&["a"])], &ReshapeOptions::new())
            .unwrap();
        assert_eq!(&[2, 3], r.shape());
        let values: Vec<i64> = r.values().iter().copied().collect();
        assert_eq!(vec![1, 2, 3, 4, 5, -1], values);
        assert_eq!(Some("@a@"), r.dims().as_slice()[0].expression());
        assert_eq!(
            vec![Some("1".to_string()), Some("2".to_string())],
            r.dims().as_slice()[0].ticks()
        );
        assert_eq!(Some("@b@"), r.dims().as_slice()[1].expression());
        assert_eq!(3, r.dims().as_slice()[1].len());
    }

    #[test]
    fn test_reshape_filling_value() {
        let r = source()
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().filling_value(0),
            )
            .unwrap();
        let values: Vec<i64> = r.values().iter().copied().collect();
        assert_eq!(vec![1, 2, 3, 4, 5, 0], values);
    }

    #[test]
    fn test_reshape_bad_filling_value() {
        let err = source()
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().filling_value("x"),
            )
            .unwrap_err();
        assert_eq!(ErrorCode::BadFillingValue, err.code);
    }

    #[test]
    fn test_reshape_conflict() {
        let err = source()
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().ignore_rest(),
            )
            .unwrap_err();
        assert_eq!(ErrorKind::Reshape, err.kind);
        assert_eq!(ErrorCode::AmbiguousReshape, err.code);
        let conflict = err.conflict.unwrap();
        assert_eq!(vec!["b".to_string()], conflict.unused);
        assert_eq!("@a@-@b@", conflict.expression);
    }

    #[test]
    fn test_reshape_with_filter() {
        let descriptor = Descriptor::vars(&["a"]).filter("b == 2").unwrap();
        let r = source()
            .reshape(&[descriptor], &ReshapeOptions::new().ignore_rest())
            .unwrap();
        let values: Vec<i64> = r.values().iter().copied().collect();
        assert_eq!(vec![2, 5], values);
        assert_eq!(&[2], r.shape());
    }

    fn triples() -> LabeledArray<i64> {
        LabeledArray::from_vec(
            vec![1, 2, 3, 4],
            ("@a@-@b@-@c@", vec!["1-1-5", "1-2-6", "2-1-7", "2-2-8"]),
        )
        .unwrap()
    }

    #[test]
    fn test_reshape_ignore_vars() {
        let r = triples()
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().ignore_vars(&["c"]),
            )
            .unwrap();
        assert_eq!(&[2, 2], r.shape());
        let dims = r.dims().as_slice();
        assert_eq!(Some("@a@"), dims[0].expression());
        assert_eq!(Some("@b@"), dims[1].expression());
        assert_eq!(
            vec![Some("1".to_string()), Some("2".to_string())],
            dims[1].ticks()
        );
        let values: Vec<i64> = r.values().iter().copied().collect();
        assert_eq!(vec![1, 2, 3, 4], values);
    }

    #[test]
    fn test_reshape_auto_collects_unused() {
        let r = triples()
            .reshape(&[Descriptor::vars(&["a"])], &ReshapeOptions::new())
            .unwrap();
        assert_eq!(&[2, 4], r.shape());
        let dims = r.dims().as_slice();
        assert_eq!(Some("@b@-@c@"), dims[1].expression());
        assert_eq!(Some("2-8".to_string()), dims[1].tick(3));
        let values: Vec<i64> = r.values().iter().copied().collect();
        assert_eq!(vec![1, 2, -1, -1, -1, -1, 3, 4], values);
    }

    #[test]
    fn test_reshape_ignored_vars_can_collide() {
        let mut ticks = Vec::new();
        for a in 1..=2 {
            for b in 1..=2 {
                for c in 1..=2 {
                    ticks.push(format!("{a}-{b}-{c}"));
                }
            }
        }
        let a = LabeledArray::from_vec((1..=8).collect(), ("@a@-@b@-@c@", ticks)).unwrap();
        let err = a
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().ignore_vars(&["c"]),
            )
            .unwrap_err();
        assert_eq!(ErrorCode::AmbiguousReshape, err.code);
        assert_eq!(vec!["c".to_string()], err.conflict.unwrap().unused);

        let r = a
            .reshape(
                &[Descriptor::vars(&["a"]), Descriptor::vars(&["b", "c"])],
                &ReshapeOptions::new(),
            )
            .unwrap();
        assert_eq!(&[2, 4], r.shape());
    }

    #[test]
    fn test_reshape_template() {
        let r = source()
            .reshape(
                &[Descriptor::expression("a: @a@"), Descriptor::vars(&["b"])],
                &ReshapeOptions::new(),
            )
            .unwrap();
        assert_eq!(
            vec![Some("a: 1".to_string()), Some("a: 2".to_string())],
            r.dims().as_slice()[0].ticks()
        );
    }

    #[test]
    fn test_reshape_same_shape() {
        let r = source()
            .reshape(&[Descriptor::vars(&["b", "a"])], &ReshapeOptions::new())
            .unwrap();
        assert_eq!(&[5], r.shape());
        assert_eq!(Some("@b@-@a@"), r.dims().as_slice()[0].expression());
        assert_eq!(Some("3-1".to_string()), r.dims().as_slice()[0].tick(2));
        assert_eq!(3, r.values()[[2].as_slice()]);
    }

    #[test]
    fn test_reshape_errors() {
        let a = source();
        let err = a
            .reshape(
                &[Descriptor::vars(&["a"]), Descriptor::vars(&["a"])],
                &ReshapeOptions::new(),
            )
            .unwrap_err();
        assert_eq!(ErrorCode::AlreadyUsedVariable, err.code);

        let err = a
            .reshape(&[Descriptor::vars(&["c"])], &ReshapeOptions::new())
            .unwrap_err();
        assert_eq!(ErrorCode::UnknownVariable, err.code);

        let err = a
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().ignore_vars(&["z"]),
            )
            .unwrap_err();
        assert_eq!(ErrorCode::UnknownVariable, err.code);

        let err = a
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().vars_to_fields(&["b"]),
            )
            .unwrap_err();
        assert_eq!(ErrorCode::NoFields, err.code);
    }

    fn records() -> LabeledArray<Record> {
        let values = vec![
            Record::from([("x", Value::from(1)), ("y", Value::from(10))]),
            Record::from([("x", Value::from(2)), ("y", Value::from(20))]),
        ];
        LabeledArray::from_vec(values, ("@a@", vec!["1", "2"])).unwrap()
    }

    #[test]
    fn test_reshape_fields_to_vars() {
        let r = records()
            .reshape(
                &[Descriptor::vars(&["a", "x"])],
                &ReshapeOptions::new().fields_to_vars(&["x"]),
            )
            .unwrap();
        assert_eq!(&[2], r.shape());
        assert_eq!(Some("@a@-@x@"), r.dims().as_slice()[0].expression());
        assert_eq!(Some("2-2".to_string()), r.dims().as_slice()[0].tick(1));
        let first = &r.values()[[0].as_slice()];
        assert!(!first.contains("x"));
        assert_eq!(Some(&Value::from(10)), first.get("y"));

        let err = records()
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().fields_to_vars(&["x", "y"]),
            )
            .unwrap_err();
        assert_eq!(ErrorCode::AllFieldsToVars, err.code);

        let err = records()
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().fields_to_vars(&["z"]),
            )
            .unwrap_err();
        assert_eq!(ErrorCode::PatternNoMatch, err.code);
    }

    #[test]
    fn test_reshape_vars_to_fields() {
        let values = vec![
            Record::from([("x", Value::from(1))]),
            Record::from([("x", Value::from(2))]),
        ];
        let a = LabeledArray::from_vec(values, ("@a@-@b@", vec!["1-5", "2-6"])).unwrap();
        let r = a
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().vars_to_fields(&["b"]),
            )
            .unwrap();
        assert_eq!(Some("@a@"), r.dims().as_slice()[0].expression());
        let second = &r.values()[[1].as_slice()];
        assert_eq!(Some(&Value::from(6)), second.get("b"));

        let err = a
            .reshape(&[], &ReshapeOptions::new().vars_to_fields(&["a", "b"]))
            .unwrap_err();
        assert_eq!(ErrorCode::AllVarsToFields, err.code);
    }

    #[test]
    fn test_reshape_per_field_filling() {
        let values = vec![
            Record::from([("x", Value::from(1)), ("y", Value::from(1.5))]),
            Record::from([("x", Value::from(2)), ("y", Value::from(2.5))]),
            Record::from([("x", Value::from(3)), ("y", Value::from(3.5))]),
        ];
        let a = LabeledArray::from_vec(values, ("@a@-@b@", vec!["1-1", "1-2", "2-1"])).unwrap();
        let fill = Fill::PerField(BTreeMap::from([("x".to_string(), Value::from(0))]));
        let r = a
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().filling(fill),
            )
            .unwrap();
        let gap = &r.values()[[1, 1].as_slice()];
        assert_eq!(Some(&Value::from(0)), gap.get("x"));
        assert_eq!(Some(&Value::Float(-1.0)), gap.get("y"));

        let fill = Fill::PerField(BTreeMap::from([("nope".to_string(), Value::from(0))]));
        let err = a
            .reshape(
                &[Descriptor::vars(&["a"])],
                &ReshapeOptions::new().filling(fill),
            )
            .unwrap_err();
        assert_eq!(ErrorCode::BadFillingValue, err.code);
    }
}
