// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use ndarray::{Array1, ArrayViewD, Axis};
use tracing::debug;

use super::{LabeledArray, Output};
use crate::common::Result;
use crate::dim::Dim;
use crate::dims::DimKey;
use crate::shape_err;

/// Joins arrays along an existing axis. The joined axis concatenates the
/// ticks of every operand; the other axes must carry equal dimensions.
/// When the ticks cannot be merged the values are returned without
/// metadata.
pub fn concatenate<T: Clone>(
    arrays: &[&LabeledArray<T>],
    axis: impl Into<DimKey>,
) -> Result<Output<T>> {
    let Some(first) = arrays.first() else {
        return shape_err!(
            Generic,
            "need at least one array to concatenate".to_string()
        );
    };
    let axis = first.dims.index_of(axis)?;
    if let Some(other) = arrays.iter().find(|a| a.ndim() != first.ndim()) {
        return shape_err!(
            ShapeMismatch,
            format!(
                "cannot concatenate arrays with {} and {} dimensions",
                first.ndim(),
                other.ndim()
            )
        );
    }

    let views: Vec<ArrayViewD<'_, T>> = arrays.iter().map(|a| a.data.view()).collect();
    let data = match ndarray::concatenate(Axis(axis), &views) {
        Ok(data) => data,
        Err(err) => {
            let shapes: Vec<&[usize]> = arrays.iter().map(|a| a.shape()).collect();
            return shape_err!(
                ShapeMismatch,
                format!("cannot concatenate shapes {shapes:?} along axis {axis}: {err}")
            );
        }
    };

    let mut dims = Vec::with_capacity(first.ndim());
    for (i, dim) in first.dims.iter().enumerate() {
        if i == axis {
            let parts: Vec<&Dim> = arrays.iter().map(|a| &a.dims.as_slice()[i]).collect();
            match Dim::concat(&parts) {
                Ok(joined) => dims.push(joined),
                Err(err) => {
                    debug!(%err, "concatenated ticks cannot be merged; dropping metadata");
                    return Output::from_parts(data, None);
                }
            }
        } else if arrays.iter().all(|a| a.dims.as_slice()[i] == *dim) {
            dims.push(dim.copy());
        } else {
            debug!(
                axis = i,
                "operands disagree on a dimension; dropping metadata"
            );
            return Output::from_parts(data, None);
        }
    }
    Output::from_parts(data, Some(dims))
}

/// Appends `values` to `array` along `axis`; without an axis both are
/// flattened and the result has no metadata.
pub fn append<T: Clone>(
    array: &LabeledArray<T>,
    values: &LabeledArray<T>,
    axis: Option<DimKey>,
) -> Result<Output<T>> {
    match axis {
        Some(axis) => concatenate(&[array, values], axis),
        None => {
            let joined: Vec<T> = array.data.iter().chain(&values.data).cloned().collect();
            debug!("appending without an axis; dropping metadata");
            Ok(Output::Plain(Array1::from_vec(joined).into_dyn()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    fn row(ticks: Vec<&str>, values: Vec<i32>) -> LabeledArray<i32> {
        LabeledArray::from_vec(values, ("@a@", ticks)).unwrap()
    }

    #[test]
    fn test_concatenate_keeps_ticks() {
        let a = row(vec!["a0", "a1"], vec![1, 2]);
        let b = row(vec!["a2"], vec![3]);
        let out = concatenate(&[&a, &b], 0).unwrap().into_labeled().unwrap();
        assert_eq!(
            vec![1, 2, 3],
            out.values().iter().copied().collect::<Vec<_>>()
        );
        assert_eq!(Some("a2".to_string()), out.dims().as_slice()[0].tick(2));
    }

    #[test]
    fn test_concatenate_repeated_ticks() {
        let a = row(vec!["a0", "a1"], vec![1, 2]);
        let out = concatenate(&[&a, &a], "a").unwrap();
        assert!(out.is_plain());
        assert_eq!(vec![4], out.shape());
    }

    #[test]
    fn test_concatenate_shape_mismatch() {
        let names = [Some("@a@"), Some("@b@")];
        let a = LabeledArray::from_shape_vec(&[2, 2], vec![1, 2, 3, 4], names).unwrap();
        let b = LabeledArray::from_shape_vec(&[1, 3], vec![5, 6, 7], names).unwrap();
        let err = concatenate(&[&a, &b], 0).unwrap_err();
        assert_eq!(ErrorCode::ShapeMismatch, err.code);
    }

    #[test]
    fn test_append() {
        let a = row(vec!["a0", "a1"], vec![1, 2]);
        let b = row(vec!["a2"], vec![3]);
        assert!(append(&a, &b, None).unwrap().is_plain());
        let out = append(&a, &b, Some(DimKey::from("a"))).unwrap();
        assert!(out.is_labeled());
    }
}
