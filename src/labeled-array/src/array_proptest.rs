// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Property-based tests for indexing, reductions and reshape.
//!
//! These tests verify that:
//! 1. every result keeps one dimension per axis with matching lengths
//! 2. tick names and positions select the same elements
//! 3. reshaping a raveled array restores the original

use proptest::prelude::*;

use crate::array::{Descriptor, LabeledArray, Output, ReshapeOptions};
use crate::dims::DimSpec;
use crate::index::Index;

const VARS: [&str; 3] = ["a", "b", "c"];

fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..5, 1..=3)
}

fn labeled(shape: &[usize]) -> LabeledArray<i64> {
    let dims: Vec<DimSpec> = shape
        .iter()
        .zip(VARS.iter())
        .map(|(len, var)| {
            let ticks: Vec<String> = (0..*len).map(|i| format!("{var}{i}")).collect();
            DimSpec::from((format!("@{var}@").as_str(), ticks))
        })
        .collect();
    let len: usize = shape.iter().product();
    LabeledArray::from_shape_vec(shape, (0..len as i64).collect(), dims).unwrap()
}

fn assert_consistent<T: Clone>(out: &Output<T>) {
    if let Output::Labeled(a) = out {
        a.check().unwrap();
        for (dim, len) in a.dims().iter().zip(a.shape()) {
            assert_eq!(dim.len(), *len);
        }
    }
}

/// One index entry per axis: a scalar, a range or a list. Every list in
/// an index has the same length so the lists broadcast together.
fn index_strategy(shape: Vec<usize>) -> impl Strategy<Value = Vec<Index>> {
    (1usize..4).prop_flat_map(move |list_len| {
        let per_axis: Vec<BoxedStrategy<Index>> = shape
            .iter()
            .map(|&len| {
                prop_oneof![
                    (0..len).prop_map(Index::from),
                    (0..len, 0..=len).prop_map(|(s, e)| Index::from(s..e)),
                    prop::collection::vec(0..len, list_len).prop_map(Index::from),
                    Just(Index::full()),
                ]
                .boxed()
            })
            .collect();
        per_axis
    })
}

proptest! {
    #[test]
    fn shape_invariant_holds_after_indexing(
        (shape, index) in shape_strategy().prop_flat_map(|s| (Just(s.clone()), index_strategy(s)))
    ) {
        let a = labeled(&shape);
        let out = a.get(&index).unwrap();
        assert_consistent(&out);
    }

    #[test]
    fn full_range_is_idempotent(shape in shape_strategy()) {
        let a = labeled(&shape);
        let index: Vec<Index> = shape.iter().map(|_| Index::full()).collect();
        let out = a.get(&index).unwrap().into_labeled().unwrap();
        prop_assert_eq!(&a, &out);
        prop_assert_eq!(a.dims(), out.dims());
    }

    #[test]
    fn tick_positions_roundtrip(shape in shape_strategy()) {
        let a = labeled(&shape);
        for dim in a.dims().iter() {
            for i in 0..dim.len() {
                let tick = dim.tick(i).unwrap();
                prop_assert_eq!(Some(i), dim.tick_position(&tick));
                let instance = dim.extract(&tick).unwrap();
                prop_assert_eq!(tick, dim.translate(&instance).unwrap());
            }
        }
    }

    #[test]
    fn tick_range_equals_integer_range(len in 1usize..6, start in 0usize..6, stop in 0usize..6) {
        let start = start.min(len - 1);
        let stop = stop.min(len - 1);
        let a = labeled(&[len]);
        let by_pos = a.get(&[Index::from(start..stop)]).unwrap();
        let (from, to) = (format!("a{start}"), format!("a{stop}"));
        let by_name = a.get(&[Index::from(from.as_str()..to.as_str())]).unwrap();
        prop_assert_eq!(by_pos.shape(), by_name.shape());
        prop_assert_eq!(by_pos, by_name);
    }

    #[test]
    fn reduction_by_name_matches_position(shape in shape_strategy(), axis in 0usize..3) {
        let axis = axis % shape.len();
        let a = labeled(&shape);
        let by_pos = a.sum(axis, false).unwrap();
        let by_name = a.sum(VARS[axis], false).unwrap();
        prop_assert_eq!(&by_pos, &by_name);
        if let (Output::Labeled(x), Output::Labeled(y)) = (&by_pos, &by_name) {
            prop_assert_eq!(x.dims(), y.dims());
        }
        assert_consistent(&by_pos);
    }

    #[test]
    fn reshape_restores_raveled(rows in 1usize..5, cols in 1usize..5) {
        let a = labeled(&[rows, cols]);
        let flat = a.ravel(false);
        let back = flat
            .reshape(&[Descriptor::vars(&["a"])], &ReshapeOptions::new())
            .unwrap();
        prop_assert_eq!(&a, &back);
        prop_assert_eq!(a.dims(), back.dims());
    }
}
