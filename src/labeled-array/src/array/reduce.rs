// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::ops::{Add, Mul};

use ndarray::{Array1, ArrayD, Axis, IxDyn};
use num_traits::{One, ToPrimitive, Zero};
use smallvec::SmallVec;

use super::indexing::Coords;
use super::{LabeledArray, Output};
use crate::common::Result;
use crate::dim::Dim;
use crate::dims::DimKey;
use crate::element::Truth;
use crate::shape_err;

/// Axes a reduction runs over.
#[derive(Clone, Debug, PartialEq)]
pub enum AxisArg {
    All,
    One(DimKey),
    Many(Vec<DimKey>),
}

impl From<usize> for AxisArg {
    fn from(i: usize) -> Self {
        AxisArg::One(i.into())
    }
}

impl From<i32> for AxisArg {
    fn from(i: i32) -> Self {
        AxisArg::One(i.into())
    }
}

impl From<&str> for AxisArg {
    fn from(s: &str) -> Self {
        AxisArg::One(s.into())
    }
}

impl From<DimKey> for AxisArg {
    fn from(k: DimKey) -> Self {
        AxisArg::One(k)
    }
}

impl<K: Into<DimKey>> From<Vec<K>> for AxisArg {
    fn from(keys: Vec<K>) -> Self {
        AxisArg::Many(keys.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<DimKey>> From<Option<K>> for AxisArg {
    fn from(key: Option<K>) -> Self {
        match key {
            Some(k) => AxisArg::One(k.into()),
            None => AxisArg::All,
        }
    }
}

impl<T: Clone> LabeledArray<T> {
    /// Positions of the reduced axes, ascending.
    fn reduced_axes(&self, axis: &AxisArg) -> Result<Vec<usize>> {
        let mut axes = match axis {
            AxisArg::All => (0..self.ndim()).collect(),
            AxisArg::One(k) => vec![self.dims.index_of(k)?],
            AxisArg::Many(ks) => ks
                .iter()
                .map(|k| self.dims.index_of(k))
                .collect::<Result<Vec<_>>>()?,
        };
        let n = axes.len();
        axes.sort_unstable();
        axes.dedup();
        if axes.len() != n {
            return shape_err!(Generic, format!("repeated axis in {axis:?}"));
        }
        Ok(axes)
    }

    /// Reduces the selected axes with `f`, which receives the elements of
    /// each lane in C order.
    pub fn reduce_with<U, F>(
        &self,
        axis: impl Into<AxisArg>,
        keepdims: bool,
        f: F,
    ) -> Result<Output<U>>
    where
        U: Clone,
        F: Fn(&[&T]) -> U,
    {
        self.reduce_lanes(&axis.into(), keepdims, false, f)
    }

    fn reduce_lanes<U, F>(
        &self,
        axis: &AxisArg,
        keepdims: bool,
        nonempty: bool,
        f: F,
    ) -> Result<Output<U>>
    where
        U: Clone,
        F: Fn(&[&T]) -> U,
    {
        let axes = self.reduced_axes(axis)?;
        let shape = self.shape();
        let ndim = self.ndim();
        let kept: Vec<usize> = (0..ndim).filter(|a| !axes.contains(a)).collect();
        let lane_shape: Vec<usize> = axes.iter().map(|a| shape[*a]).collect();
        let lane_len: usize = lane_shape.iter().product();
        if nonempty && lane_len == 0 {
            return shape_err!(
                EmptyReduction,
                "zero-size reduction has no identity".to_string()
            );
        }

        let (out_shape, mapping): (Vec<usize>, Vec<(usize, usize)>) = if keepdims {
            (
                (0..ndim)
                    .map(|a| if axes.contains(&a) { 1 } else { shape[a] })
                    .collect(),
                kept.iter().map(|a| (*a, *a)).collect(),
            )
        } else {
            (
                kept.iter().map(|a| shape[*a]).collect(),
                kept.iter().enumerate().map(|(k, a)| (k, *a)).collect(),
            )
        };

        let data = ArrayD::from_shape_fn(IxDyn(&out_shape), |out| {
            let mut src: Coords = SmallVec::from_elem(0, ndim);
            for (o, a) in mapping.iter() {
                src[*a] = out[*o];
            }
            let mut lane = Vec::with_capacity(lane_len);
            for r in ndarray::indices(IxDyn(&lane_shape)) {
                for (k, a) in axes.iter().enumerate() {
                    src[*a] = r[k];
                }
                lane.push(&self.data[IxDyn(&src)]);
            }
            f(&lane)
        });

        let dims: Vec<Dim> = if keepdims {
            (0..ndim)
                .map(|a| {
                    if axes.contains(&a) {
                        Dim::blank(1)
                    } else {
                        self.dims.as_slice()[a].copy()
                    }
                })
                .collect()
        } else {
            let source = self.dims.as_slice();
            kept.iter().map(|&a| source[a].copy()).collect()
        };
        Output::from_parts(data, Some(dims))
    }

    pub fn sum(&self, axis: impl Into<AxisArg>, keepdims: bool) -> Result<Output<T>>
    where
        T: Zero + Add<Output = T>,
    {
        self.reduce_with(axis, keepdims, |lane| {
            lane.iter().fold(T::zero(), |acc, x| acc + (*x).clone())
        })
    }

    pub fn prod(&self, axis: impl Into<AxisArg>, keepdims: bool) -> Result<Output<T>>
    where
        T: One + Mul<Output = T>,
    {
        self.reduce_with(axis, keepdims, |lane| {
            lane.iter().fold(T::one(), |acc, x| acc * (*x).clone())
        })
    }

    pub fn mean(&self, axis: impl Into<AxisArg>, keepdims: bool) -> Result<Output<f64>>
    where
        T: ToPrimitive,
    {
        self.reduce_with(axis, keepdims, |lane| mean(lane))
    }

    pub fn var(&self, axis: impl Into<AxisArg>, keepdims: bool) -> Result<Output<f64>>
    where
        T: ToPrimitive,
    {
        self.var_ddof(axis, 0, keepdims)
    }

    /// Variance with `ddof` delta degrees of freedom.
    pub fn var_ddof(
        &self,
        axis: impl Into<AxisArg>,
        ddof: usize,
        keepdims: bool,
    ) -> Result<Output<f64>>
    where
        T: ToPrimitive,
    {
        self.reduce_with(axis, keepdims, |lane| variance(lane, ddof))
    }

    pub fn std(&self, axis: impl Into<AxisArg>, keepdims: bool) -> Result<Output<f64>>
    where
        T: ToPrimitive,
    {
        self.std_ddof(axis, 0, keepdims)
    }

    pub fn std_ddof(
        &self,
        axis: impl Into<AxisArg>,
        ddof: usize,
        keepdims: bool,
    ) -> Result<Output<f64>>
    where
        T: ToPrimitive,
    {
        self.reduce_with(axis, keepdims, |lane| variance(lane, ddof).sqrt())
    }

    pub fn min(&self, axis: impl Into<AxisArg>, keepdims: bool) -> Result<Output<T>>
    where
        T: PartialOrd,
    {
        self.reduce_lanes(&axis.into(), keepdims, true, |lane| {
            lane[position_by(lane, |x, best| x < best)].clone()
        })
    }

    pub fn max(&self, axis: impl Into<AxisArg>, keepdims: bool) -> Result<Output<T>>
    where
        T: PartialOrd,
    {
        self.reduce_lanes(&axis.into(), keepdims, true, |lane| {
            lane[position_by(lane, |x, best| x > best)].clone()
        })
    }

    /// Position of the minimum within each lane (the flat position when
    /// reducing several axes).
    pub fn argmin(&self, axis: impl Into<AxisArg>) -> Result<Output<usize>>
    where
        T: PartialOrd,
    {
        self.reduce_lanes(&axis.into(), false, true, |lane| {
            position_by(lane, |x, best| x < best)
        })
    }

    pub fn argmax(&self, axis: impl Into<AxisArg>) -> Result<Output<usize>>
    where
        T: PartialOrd,
    {
        self.reduce_lanes(&axis.into(), false, true, |lane| {
            position_by(lane, |x, best| x > best)
        })
    }

    pub fn all(&self, axis: impl Into<AxisArg>, keepdims: bool) -> Result<Output<bool>>
    where
        T: Truth,
    {
        self.reduce_with(axis, keepdims, |lane| lane.iter().all(|x| x.truth()))
    }

    pub fn any(&self, axis: impl Into<AxisArg>, keepdims: bool) -> Result<Output<bool>>
    where
        T: Truth,
    {
        self.reduce_with(axis, keepdims, |lane| lane.iter().any(|x| x.truth()))
    }

    /// Running sums along one axis; `None` accumulates over the flattened
    /// array and drops the metadata.
    pub fn cumsum(&self, axis: Option<DimKey>) -> Result<Output<T>>
    where
        T: Add<Output = T>,
    {
        self.accumulate(axis, |acc, x| acc + x)
    }

    pub fn cumprod(&self, axis: Option<DimKey>) -> Result<Output<T>>
    where
        T: Mul<Output = T>,
    {
        self.accumulate(axis, |acc, x| acc * x)
    }

    fn accumulate<F>(&self, axis: Option<DimKey>, f: F) -> Result<Output<T>>
    where
        F: Fn(T, T) -> T,
    {
        let Some(key) = axis else {
            let mut acc: Option<T> = None;
            let values: Vec<T> = self
                .data
                .iter()
                .map(|x| {
                    let next = match acc.take() {
                        Some(prev) => f(prev, x.clone()),
                        None => x.clone(),
                    };
                    acc = Some(next.clone());
                    next
                })
                .collect();
            tracing::debug!("accumulating over all axes; dropping metadata");
            return Ok(Output::Plain(Array1::from_vec(values).into_dyn()));
        };

        let axis = self.dims.index_of(key)?;
        let mut data = self.data.clone();
        for mut lane in data.lanes_mut(Axis(axis)) {
            let mut acc: Option<T> = None;
            for x in lane.iter_mut() {
                let next = match acc.take() {
                    Some(prev) => f(prev, x.clone()),
                    None => x.clone(),
                };
                *x = next.clone();
                acc = Some(next);
            }
        }
        let dims = self.dims.iter().map(|d| d.copy()).collect();
        Output::from_parts(data, Some(dims))
    }
}

/// Position of the best element of a lane. The first unordered element
/// (a NaN) wins outright.
fn position_by<T: PartialOrd, F: Fn(&T, &T) -> bool>(lane: &[&T], better: F) -> usize {
    let unordered = |x: &T| x.partial_cmp(x).is_none();
    let mut best = 0;
    for (i, x) in lane.iter().enumerate() {
        if unordered(*x) {
            return i;
        }
        if i > 0 && better(*x, lane[best]) {
            best = i;
        }
    }
    best
}

fn mean<T: ToPrimitive>(lane: &[&T]) -> f64 {
    let sum: f64 = lane.iter().map(|x| x.to_f64().unwrap_or(f64::NAN)).sum();
    sum / lane.len() as f64
}

fn variance<T: ToPrimitive>(lane: &[&T], ddof: usize) -> f64 {
    let m = mean(lane);
    let sq: f64 = lane
        .iter()
        .map(|x| {
            let d = x.to_f64().unwrap_or(f64::NAN) - m;
            d * d
        })
        .sum();
    sq / (lane.len() as f64 - ddof as f64)
}
