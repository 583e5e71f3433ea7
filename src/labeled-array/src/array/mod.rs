// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! `LabeledArray` pairs a dense `ndarray::ArrayD` with one [`Dim`] per
//! axis. Every operation that changes the shape rebuilds the dimensions
//! for the new shape, or returns an [`Output::Plain`] array when the
//! metadata cannot be derived.

use std::fmt;

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, IxDyn};

use crate::common::Result;
use crate::dim::Dim;
use crate::dims::{DataDims, DimSpec};
use crate::shape_err;

mod fields;
mod funcs;
mod indexing;
mod io;
mod ops;
mod reduce;
mod reshape;

pub use fields::{Lookup, append_fields, drop_fields, merge_arrays};
pub use funcs::{append, concatenate};
pub use reduce::AxisArg;
pub use reshape::{Descriptor, Fill, Ignore, ReshapeOptions};

#[derive(Clone, Debug)]
pub struct LabeledArray<T> {
    data: ArrayD<T>,
    dims: DataDims,
}

/// Result of operations that may not be able to keep the metadata.
#[derive(Clone, Debug, PartialEq)]
pub enum Output<T> {
    Labeled(LabeledArray<T>),
    /// The values are correct but no metadata describes them.
    Plain(ArrayD<T>),
    /// A 0-dimensional result.
    Scalar(T),
}

impl<T: Clone> Output<T> {
    pub fn is_labeled(&self) -> bool {
        matches!(self, Output::Labeled(_))
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, Output::Plain(_))
    }

    pub fn labeled(&self) -> Option<&LabeledArray<T>> {
        match self {
            Output::Labeled(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_labeled(self) -> Option<LabeledArray<T>> {
        match self {
            Output::Labeled(a) => Some(a),
            _ => None,
        }
    }

    pub fn scalar(&self) -> Option<&T> {
        match self {
            Output::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_scalar(self) -> Option<T> {
        match self {
            Output::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Output::Labeled(a) => a.shape().to_vec(),
            Output::Plain(a) => a.shape().to_vec(),
            Output::Scalar(_) => Vec::new(),
        }
    }

    /// The values, whatever metadata they had; scalars become 0-d arrays.
    pub fn into_array(self) -> ArrayD<T> {
        match self {
            Output::Labeled(a) => a.data,
            Output::Plain(a) => a,
            Output::Scalar(v) => ArrayD::from_elem(IxDyn(&[]), v),
        }
    }

    /// Wraps a computed array, keeping `dims` when given.
    pub(crate) fn from_parts(data: ArrayD<T>, dims: Option<Vec<Dim>>) -> Result<Output<T>> {
        if data.ndim() == 0 {
            if let Some(v) = data.iter().next() {
                return Ok(Output::Scalar(v.clone()));
            }
        }
        match dims {
            Some(dims) => {
                let dims = DataDims::attach_unchecked(dims, data.shape());
                Ok(Output::Labeled(LabeledArray::from_parts(data, dims)?))
            }
            None => Ok(Output::Plain(data)),
        }
    }
}

impl<T: Clone> LabeledArray<T> {
    /// An array of `shape` filled with `T::default()`.
    pub fn new<D: Into<DimSpec>>(shape: &[usize], dims: impl IntoIterator<Item = D>) -> Result<Self>
    where
        T: Default,
    {
        Self::from_array(ArrayD::default(IxDyn(shape)), dims)
    }

    pub fn from_array<D: Into<DimSpec>>(
        data: ArrayD<T>,
        dims: impl IntoIterator<Item = D>,
    ) -> Result<Self> {
        let shape = data.shape().to_vec();
        let mut built = Vec::with_capacity(shape.len());
        for (i, spec) in dims.into_iter().enumerate() {
            let len = shape.get(i).copied().unwrap_or(0);
            built.push(spec.into().build(len)?);
        }
        let dims = DataDims::attach(built, &shape)?;
        Self::from_parts(data, dims)
    }

    pub fn from_shape_vec<D: Into<DimSpec>>(
        shape: &[usize],
        values: Vec<T>,
        dims: impl IntoIterator<Item = D>,
    ) -> Result<Self> {
        let len = values.len();
        let data = match ArrayD::from_shape_vec(IxDyn(shape), values) {
            Ok(data) => data,
            Err(err) => {
                return shape_err!(
                    ShapeMismatch,
                    format!("{len} values do not fit shape {shape:?}: {err}")
                );
            }
        };
        Self::from_array(data, dims)
    }

    /// A 1-dimensional array.
    pub fn from_vec(values: Vec<T>, dim: impl Into<DimSpec>) -> Result<Self> {
        let len = values.len();
        Self::from_shape_vec(&[len], values, [dim.into()])
    }

    pub(crate) fn from_parts(data: ArrayD<T>, dims: DataDims) -> Result<Self> {
        dims.check_shape(data.shape())?;
        Ok(LabeledArray { data, dims })
    }

    pub fn dims(&self) -> &DataDims {
        &self.dims
    }

    /// Dimensions stay attached: assignments are checked against the shape.
    pub fn dims_mut(&mut self) -> &mut DataDims {
        &mut self.dims
    }

    pub fn dim(&self, key: impl Into<crate::dims::DimKey>) -> Result<&Dim> {
        self.dims.get(key)
    }

    pub fn values(&self) -> &ArrayD<T> {
        &self.data
    }

    pub fn view(&self) -> ArrayViewD<'_, T> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMutD<'_, T> {
        self.data.view_mut()
    }

    pub fn into_values(self) -> ArrayD<T> {
        self.data
    }

    pub fn into_parts(self) -> (ArrayD<T>, DataDims) {
        (self.data, self.dims.copy())
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A deep copy whose dimensions are detached from any view.
    pub fn copy(&self) -> Self {
        let dims = self.dims.copy().into_vec();
        LabeledArray {
            data: self.data.to_owned(),
            dims: DataDims::attach_unchecked(dims, self.data.shape()),
        }
    }

    /// Applies `f` elementwise keeping the metadata.
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> LabeledArray<U> {
        let data = self.data.map(f);
        let dims = DataDims::attach_unchecked(self.dims.copy().into_vec(), data.shape());
        LabeledArray { data, dims }
    }

    /// Checks the shape invariant.
    pub fn check(&self) -> Result<()> {
        self.dims.check_shape(self.data.shape())
    }
}

impl<T: Clone> From<ArrayD<T>> for LabeledArray<T> {
    fn from(data: ArrayD<T>) -> Self {
        let dims = DataDims::blank(data.shape());
        LabeledArray { data, dims }
    }
}

/// Equality compares values only.
impl<T: PartialEq> PartialEq for LabeledArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T: PartialEq> PartialEq<ArrayD<T>> for LabeledArray<T> {
    fn eq(&self, other: &ArrayD<T>) -> bool {
        self.data == *other
    }
}

impl<T: fmt::Display> fmt::Display for LabeledArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.data)?;
        write!(f, "dims: {}", self.dims)
    }
}
