// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use crate::common::Result;
use crate::dim::{Dim, TickSpec};
use crate::expression::DimExpression;
use crate::{lookup_err, namespace_err, shape_err};

/// Reference to one dimension of a set: a position (negative counts from
/// the end) or a name (an expression or one of its variables).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DimKey {
    Pos(isize),
    Name(String),
}

impl From<usize> for DimKey {
    fn from(i: usize) -> Self {
        DimKey::Pos(i as isize)
    }
}

impl From<i32> for DimKey {
    fn from(i: i32) -> Self {
        DimKey::Pos(i as isize)
    }
}

impl From<isize> for DimKey {
    fn from(i: isize) -> Self {
        DimKey::Pos(i)
    }
}

impl From<&str> for DimKey {
    fn from(s: &str) -> Self {
        DimKey::Name(s.to_string())
    }
}

impl From<String> for DimKey {
    fn from(s: String) -> Self {
        DimKey::Name(s)
    }
}

impl From<&DimKey> for DimKey {
    fn from(k: &DimKey) -> Self {
        k.clone()
    }
}

impl fmt::Display for DimKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DimKey::Pos(i) => write!(f, "{i}"),
            DimKey::Name(s) => write!(f, "{s:?}"),
        }
    }
}

/// What to store in a dimension slot.
#[derive(Clone, Debug)]
pub enum DimSpec {
    Dim(Dim),
    Ticks {
        expression: Option<String>,
        ticks: Vec<TickSpec>,
    },
    /// An expression with blank ticks sized to the slot.
    Expr(String),
    Blank,
}

impl DimSpec {
    pub(crate) fn build(self, len: usize) -> Result<Dim> {
        match self {
            DimSpec::Dim(dim) => Ok(dim),
            DimSpec::Ticks { expression, ticks } => Dim::new(expression.as_deref(), ticks),
            DimSpec::Expr(expr) => Ok(Dim::blank_with(DimExpression::new(&expr)?, len)),
            DimSpec::Blank => Ok(Dim::blank(len)),
        }
    }
}

impl From<Dim> for DimSpec {
    fn from(dim: Dim) -> Self {
        DimSpec::Dim(dim)
    }
}

impl From<&str> for DimSpec {
    fn from(expr: &str) -> Self {
        DimSpec::Expr(expr.to_string())
    }
}

impl From<Option<&str>> for DimSpec {
    fn from(expr: Option<&str>) -> Self {
        match expr {
            Some(expr) => DimSpec::Expr(expr.to_string()),
            None => DimSpec::Blank,
        }
    }
}

impl<I: Into<TickSpec>> From<(&str, Vec<I>)> for DimSpec {
    fn from((expression, ticks): (&str, Vec<I>)) -> Self {
        DimSpec::Ticks {
            expression: Some(expression.to_string()),
            ticks: ticks.into_iter().map(Into::into).collect(),
        }
    }
}

impl<I: Into<TickSpec>> From<(Option<&str>, Vec<I>)> for DimSpec {
    fn from((expression, ticks): (Option<&str>, Vec<I>)) -> Self {
        DimSpec::Ticks {
            expression: expression.map(|e| e.to_string()),
            ticks: ticks.into_iter().map(Into::into).collect(),
        }
    }
}

/// The ordered dimensions of an array.
///
/// A set attached to an array records the array's shape and checks every
/// assignment against it; a detached set (see [`DataDims::copy`]) checks
/// assignments against the length of the slot being replaced and allows
/// removing dimensions.
#[derive(Clone, Debug)]
pub struct DataDims {
    dims: Vec<Dim>,
    shape: Option<Vec<usize>>,
}

impl DataDims {
    /// A detached set.
    pub fn new(dims: Vec<Dim>) -> Result<DataDims> {
        check_variables(&dims)?;
        Ok(DataDims { dims, shape: None })
    }

    pub(crate) fn blank(shape: &[usize]) -> DataDims {
        DataDims {
            dims: shape.iter().map(|n| Dim::blank(*n)).collect(),
            shape: Some(shape.to_vec()),
        }
    }

    /// Attaches `dims` to an array of the given shape, padding missing
    /// trailing dimensions with blank ones.
    pub(crate) fn attach(mut dims: Vec<Dim>, shape: &[usize]) -> Result<DataDims> {
        if dims.len() > shape.len() {
            return shape_err!(
                ShapeMismatch,
                format!(
                    "{} dimensions given for an array with {} axes",
                    dims.len(),
                    shape.len()
                )
            );
        }
        for n in shape.iter().skip(dims.len()) {
            dims.push(Dim::blank(*n));
        }
        let dims = DataDims {
            dims,
            shape: Some(shape.to_vec()),
        };
        dims.check_shape(shape)?;
        check_variables(&dims.dims)?;
        Ok(dims)
    }

    /// Attaches dimensions known to be consistent with the shape.
    pub(crate) fn attach_unchecked(dims: Vec<Dim>, shape: &[usize]) -> DataDims {
        debug_assert_eq!(dims.len(), shape.len());
        DataDims {
            dims,
            shape: Some(shape.to_vec()),
        }
    }

    pub(crate) fn check_shape(&self, shape: &[usize]) -> Result<()> {
        if self.dims.len() != shape.len() {
            return shape_err!(
                ShapeMismatch,
                format!(
                    "{} dimensions for an array with {} axes",
                    self.dims.len(),
                    shape.len()
                )
            );
        }
        for (i, (dim, n)) in self.dims.iter().zip(shape.iter()).enumerate() {
            if dim.len() != *n {
                return shape_err!(
                    ShapeMismatch,
                    format!(
                        "dimension {i} has {} ticks but the axis has length {n}",
                        dim.len()
                    )
                );
            }
        }
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.shape.is_some()
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dim> {
        self.dims.iter()
    }

    pub fn as_slice(&self) -> &[Dim] {
        &self.dims
    }

    pub(crate) fn into_vec(self) -> Vec<Dim> {
        self.dims
    }

    pub fn index_of(&self, key: impl Into<DimKey>) -> Result<usize> {
        match key.into() {
            DimKey::Pos(i) => {
                let n = self.dims.len() as isize;
                let wrapped = if i < 0 { i + n } else { i };
                if wrapped < 0 || wrapped >= n {
                    return lookup_err!(
                        DimensionNotFound,
                        format!("dimension {i} out of range for {n} dimensions")
                    );
                }
                Ok(wrapped as usize)
            }
            DimKey::Name(name) => self
                .dims
                .iter()
                .position(|d| {
                    d.expression() == Some(name.as_str())
                        || d.variables().iter().any(|v| *v == name)
                })
                .map_or_else(
                    || {
                        lookup_err!(
                            DimensionNotFound,
                            format!("no dimension with given expression or variable name: {name:?}")
                        )
                    },
                    Ok,
                ),
        }
    }

    pub fn get(&self, key: impl Into<DimKey>) -> Result<&Dim> {
        let i = self.index_of(key)?;
        Ok(&self.dims[i])
    }

    pub fn select<K: Into<DimKey> + Clone>(&self, keys: &[K]) -> Result<Vec<&Dim>> {
        keys.iter().map(|k| self.get(k.clone())).collect()
    }

    /// Dimensions from `start` up to (excluding) `stop`; `None` bounds
    /// extend to the ends.
    pub fn range(&self, start: Option<DimKey>, stop: Option<DimKey>) -> Result<&[Dim]> {
        let start = match start {
            Some(k) => self.index_of(k)?,
            None => 0,
        };
        let stop = match stop {
            Some(k) => self.index_of(k)?,
            None => self.dims.len(),
        };
        Ok(&self.dims[start..stop.max(start)])
    }

    /// Replaces one slot.
    pub fn set(&mut self, key: impl Into<DimKey>, spec: impl Into<DimSpec>) -> Result<()> {
        let i = self.index_of(key)?;
        let spec = spec.into();
        let expected = match &self.shape {
            Some(shape) => shape[i],
            None => self.dims[i].len(),
        };
        let dim = self.validate(i, spec, expected)?;
        let mut others: Vec<&Dim> = self.dims.iter().collect();
        others[i] = &dim;
        check_variable_refs(&others)?;
        self.dims[i] = dim;
        Ok(())
    }

    /// Replaces every slot at once.
    pub fn set_all<S: Into<DimSpec>>(&mut self, specs: Vec<S>) -> Result<()> {
        if specs.len() != self.dims.len() {
            return shape_err!(
                ShapeMismatch,
                format!(
                    "{} dimensions given for {} slots",
                    specs.len(),
                    self.dims.len()
                )
            );
        }
        let mut dims = Vec::with_capacity(specs.len());
        for (i, spec) in specs.into_iter().enumerate() {
            let expected = match &self.shape {
                Some(shape) => shape[i],
                None => self.dims[i].len(),
            };
            dims.push(self.validate(i, spec.into(), expected)?);
        }
        check_variables(&dims)?;
        self.dims = dims;
        Ok(())
    }

    fn validate(&self, i: usize, spec: DimSpec, expected: usize) -> Result<Dim> {
        let dim = spec.build(expected)?;
        if dim.len() != expected {
            return shape_err!(
                ShapeMismatch,
                format!(
                    "dimension with {} ticks assigned to axis {i} of length {expected}",
                    dim.len()
                )
            );
        }
        if self.dims[i].is_view() {
            return namespace_err!(
                CannotReplaceView,
                format!("cannot replace a view (dimension {i})")
            );
        }
        if dim.is_view() {
            return namespace_err!(
                LiveView,
                format!("assigning a view of another dimension to {i}; copy it first")
            );
        }
        Ok(dim)
    }

    /// Changes the expression of one slot, keeping variables unique across
    /// the set.
    pub fn set_expression(
        &mut self,
        key: impl Into<DimKey>,
        expression: Option<&str>,
    ) -> Result<()> {
        let i = self.index_of(key)?;
        let mut dim = self.dims[i].clone();
        dim.set_expression(expression)?;
        let mut others: Vec<&Dim> = self.dims.iter().collect();
        others[i] = &dim;
        check_variable_refs(&others)?;
        self.dims[i] = dim;
        Ok(())
    }

    pub fn set_tick(
        &mut self,
        key: impl Into<DimKey>,
        pos: usize,
        tick: impl Into<TickSpec>,
    ) -> Result<()> {
        let i = self.index_of(key)?;
        self.dims[i].set_tick(pos, tick)
    }

    /// Removes a slot; only detached sets can change their length.
    pub fn remove(&mut self, key: impl Into<DimKey>) -> Result<Dim> {
        let i = self.index_of(key)?;
        if self.is_attached() {
            return namespace_err!(
                AttachedRemove,
                "cannot remove a dimension attached to an array".to_string()
            );
        }
        Ok(self.dims.remove(i))
    }

    /// Appends a slot to a detached set.
    pub fn push(&mut self, dim: Dim) -> Result<()> {
        if self.is_attached() {
            return namespace_err!(
                AttachedRemove,
                "cannot add a dimension to a set attached to an array".to_string()
            );
        }
        let mut all: Vec<&Dim> = self.dims.iter().collect();
        all.push(&dim);
        check_variable_refs(&all)?;
        self.dims.push(dim);
        Ok(())
    }

    /// A detached deep copy.
    pub fn copy(&self) -> DataDims {
        DataDims {
            dims: self.dims.iter().map(|d| d.copy()).collect(),
            shape: None,
        }
    }

    pub(crate) fn sort_dim(
        &mut self,
        i: usize,
        keys: &[crate::dim::SortKey],
    ) -> Result<Vec<usize>> {
        self.dims[i].sort(keys)
    }
}

fn check_variables(dims: &[Dim]) -> Result<()> {
    let refs: Vec<&Dim> = dims.iter().collect();
    check_variable_refs(&refs)
}

fn check_variable_refs(dims: &[&Dim]) -> Result<()> {
    for (i, dim) in dims.iter().enumerate() {
        for var in dim.variables() {
            if let Some(j) = dims[..i].iter().position(|d| d.variables().contains(var)) {
                return namespace_err!(
                    DuplicateVariable,
                    format!("variable {var:?} of dimension {i} already used by dimension {j}")
                );
            }
        }
    }
    Ok(())
}

impl PartialEq for DataDims {
    fn eq(&self, other: &DataDims) -> bool {
        self.dims == other.dims
    }
}

impl<'a> IntoIterator for &'a DataDims {
    type Item = &'a Dim;
    type IntoIter = std::slice::Iter<'a, Dim>;

    fn into_iter(self) -> Self::IntoIter {
        self.dims.iter()
    }
}

impl fmt::Display for DataDims {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, "]")
    }
}
