// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::cmp::Ordering;
use std::ops;

use ndarray::{Array1, ArrayD, Axis, IxDyn, Zip};
use tracing::debug;

use super::{LabeledArray, Output};
use crate::common::Result;
use crate::dim::{Dim, SortKey};
use crate::dims::{DataDims, DimKey};
use crate::shape_err;

/// Shape two shapes broadcast to, if compatible.
pub(crate) fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let n = a.len().max(b.len());
    let mut out = vec![0; n];
    for i in 0..n {
        let x = (i + a.len()).checked_sub(n).map_or(1, |j| a[j]);
        let y = (i + b.len()).checked_sub(n).map_or(1, |j| b[j]);
        out[i] = match (x, y) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
    }
    Some(out)
}

/// Picks the metadata for a result of `shape` out of the operands: the
/// operands with exactly that shape must agree on their dimensions.
/// Operands whose dimensions are all blank carry no metadata.
pub(crate) fn result_dims(
    shape: &[usize],
    operands: &[&DataDims],
    shapes: &[&[usize]],
) -> Option<Vec<Dim>> {
    let mut found: Option<&DataDims> = None;
    let mut blank = false;
    for (dims, s) in operands.iter().zip(shapes.iter()) {
        if *s != shape {
            continue;
        }
        if dims.iter().all(|d| d.is_blank() && !d.has_expression()) {
            blank = true;
            continue;
        }
        match found {
            None => found = Some(*dims),
            Some(prev) if prev == *dims => {}
            Some(_) => {
                debug!("operands carry different dimensions; dropping metadata");
                return None;
            }
        }
    }
    match found {
        Some(dims) => Some(dims.copy().into_vec()),
        None if blank => Some(shape.iter().map(|len| Dim::blank(*len)).collect()),
        None => {
            debug!(?shape, "no operand has the result shape; dropping metadata");
            None
        }
    }
}

impl<T: Clone> LabeledArray<T> {
    /// Combines two arrays elementwise with broadcasting.
    pub fn zip_with<U, V, F>(&self, other: &LabeledArray<U>, f: F) -> Result<Output<V>>
    where
        U: Clone,
        V: Clone,
        F: Fn(&T, &U) -> V,
    {
        let data = zip_arrays(&self.data, &other.data, f)?;
        let dims = result_dims(
            data.shape(),
            &[&self.dims, &other.dims],
            &[self.shape(), other.shape()],
        );
        Output::from_parts(data, dims)
    }

    /// Like [`LabeledArray::zip_with`] against an array without metadata.
    pub fn zip_with_array<U, V, F>(&self, other: &ArrayD<U>, f: F) -> Result<Output<V>>
    where
        V: Clone,
        F: Fn(&T, &U) -> V,
    {
        let data = zip_arrays(&self.data, other, f)?;
        let dims = result_dims(data.shape(), &[&self.dims], &[self.shape()]);
        Output::from_parts(data, dims)
    }

    /// Elementwise equality of the values.
    pub fn eq_values(&self, other: &LabeledArray<T>) -> Result<Output<bool>>
    where
        T: PartialEq,
    {
        self.zip_with(other, |a, b| a == b)
    }

    /// Reverses the axes.
    pub fn transpose(&self) -> LabeledArray<T> {
        let order: Vec<usize> = (0..self.ndim()).rev().collect();
        self.permuted(&order)
    }

    fn permuted(&self, order: &[usize]) -> LabeledArray<T> {
        let data = self
            .data
            .view()
            .permuted_axes(IxDyn(order))
            .as_standard_layout()
            .into_owned();
        let source = self.dims.as_slice();
        let dims = order.iter().map(|&i| source[i].copy()).collect();
        LabeledArray {
            dims: DataDims::attach_unchecked(dims, data.shape()),
            data,
        }
    }

    /// Permutes the axes; `order` lists source axes by position or name.
    pub fn permute_axes<K: Into<DimKey> + Clone>(&self, order: &[K]) -> Result<LabeledArray<T>> {
        let order: Vec<usize> = order
            .iter()
            .map(|k| self.dims.index_of(k.clone()))
            .collect::<Result<_>>()?;
        let mut seen = order.clone();
        seen.sort_unstable();
        if seen != (0..self.ndim()).collect::<Vec<_>>() {
            return shape_err!(
                ShapeMismatch,
                format!("{order:?} is not a permutation of {} axes", self.ndim())
            );
        }
        Ok(self.permuted(&order))
    }

    /// Flattens into one dimension in C order (last axis fastest) or
    /// Fortran order (first axis fastest).
    pub fn ravel(&self, fortran: bool) -> LabeledArray<T> {
        let values: Vec<T> = if fortran {
            self.data.t().iter().cloned().collect()
        } else {
            self.data.iter().cloned().collect()
        };
        let refs: Vec<&Dim> = self.dims.iter().collect();
        let dim = if refs.is_empty() {
            Dim::blank(values.len())
        } else {
            Dim::flatten(&refs, fortran)
        };
        let data = Array1::from_vec(values).into_dyn();
        LabeledArray {
            dims: DataDims::attach_unchecked(vec![dim], data.shape()),
            data,
        }
    }

    /// Same as [`LabeledArray::ravel`]; the result never shares storage.
    pub fn flatten(&self, fortran: bool) -> LabeledArray<T> {
        self.ravel(fortran).copy()
    }

    /// Sorts the values of a 1-dimensional array, moving the ticks along.
    pub fn sort(&self) -> Result<LabeledArray<T>>
    where
        T: PartialOrd,
    {
        if self.ndim() != 1 {
            return shape_err!(
                NotOneDimensional,
                format!(
                    "sort needs a 1-dimensional array, got {} dimensions",
                    self.ndim()
                )
            );
        }
        let values: Vec<&T> = self.data.iter().collect();
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(values[b]).unwrap_or(Ordering::Equal));
        let data = self.data.select(Axis(0), &order);
        let dim = self.dims.as_slice()[0].take(&order);
        Ok(LabeledArray {
            dims: DataDims::attach_unchecked(vec![dim], data.shape()),
            data,
        })
    }

    /// Sorts the ticks of one dimension in place, reordering the values
    /// along that axis.
    pub fn sort_dim(&mut self, key: impl Into<DimKey>, keys: &[SortKey]) -> Result<()> {
        let axis = self.dims.index_of(key)?;
        let order = self.dims.sort_dim(axis, keys)?;
        self.data = self.data.select(Axis(axis), &order);
        self.check()
    }
}

fn zip_arrays<T, U, V, F>(a: &ArrayD<T>, b: &ArrayD<U>, f: F) -> Result<ArrayD<V>>
where
    F: Fn(&T, &U) -> V,
{
    let Some(shape) = broadcast_shape(a.shape(), b.shape()) else {
        return shape_err!(
            BroadcastMismatch,
            format!(
                "operands could not be broadcast together with shapes {:?} {:?}",
                a.shape(),
                b.shape()
            )
        );
    };
    let (Some(x), Some(y)) = (a.broadcast(IxDyn(&shape)), b.broadcast(IxDyn(&shape))) else {
        return shape_err!(
            BroadcastMismatch,
            format!("cannot broadcast to shape {shape:?}")
        );
    };
    Ok(Zip::from(&x).and(&y).map_collect(|x, y| f(x, y)))
}

fn unwrap_op<T>(result: Result<Output<T>>) -> Output<T> {
    match result {
        Ok(out) => out,
        Err(err) => panic!("{err}"),
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident) => {
        /// # Panics
        ///
        /// When the shapes cannot be broadcast together.
        impl<T> ops::$trait<&LabeledArray<T>> for &LabeledArray<T>
        where
            T: Clone + ops::$trait<Output = T>,
        {
            type Output = Output<T>;

            fn $method(self, rhs: &LabeledArray<T>) -> Output<T> {
                unwrap_op(self.zip_with(rhs, |a, b| a.clone().$method(b.clone())))
            }
        }

        impl<T> ops::$trait<T> for &LabeledArray<T>
        where
            T: Clone + ops::$trait<Output = T>,
        {
            type Output = LabeledArray<T>;

            fn $method(self, rhs: T) -> LabeledArray<T> {
                self.map(|a| a.clone().$method(rhs.clone()))
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);
impl_binary_op!(Div, div);
impl_binary_op!(Rem, rem);

impl<T> ops::Neg for &LabeledArray<T>
where
    T: Clone + ops::Neg<Output = T>,
{
    type Output = LabeledArray<T>;

    fn neg(self) -> LabeledArray<T> {
        self.map(|a| -a.clone())
    }
}
