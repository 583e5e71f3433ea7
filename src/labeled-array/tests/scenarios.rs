// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! End-to-end scenarios through the public API.
//!
//! These tests verify that:
//! 1. selecting by tick name and by filter matches positional slicing
//! 2. reshaping a flat array builds one axis per variable group
//! 3. ambiguous reshapes report the unused variables, and a filter fixes them
//! 4. arrays survive a JSON roundtrip with their dimensions

use std::collections::BTreeSet;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

use labeled_array::{
    Descriptor, DimSpec, ErrorCode, ErrorKind, Index, LabeledArray, Position, Range,
    ReshapeOptions, datamodel, ix,
};

static TRACING: Once = Once::new();

fn set_tracing_env_filter(level: tracing::Level) {
    TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

fn cube() -> LabeledArray<i64> {
    let dims: Vec<DimSpec> = ["a", "b", "c"]
        .iter()
        .map(|v| {
            let ticks: Vec<String> = (0..3).map(|i| format!("{v}{i}")).collect();
            DimSpec::from((format!("@{v}@").as_str(), ticks))
        })
        .collect();
    LabeledArray::from_shape_vec(&[3, 3, 3], (0..27).collect(), dims).unwrap()
}

fn pairs_source() -> LabeledArray<i64> {
    LabeledArray::from_vec(
        vec![1, 2, 3, 4, 5],
        ("@a@-@b@", vec!["1-1", "1-2", "1-3", "2-1", "2-2"]),
    )
    .unwrap()
}

fn flat<T: Clone>(a: &LabeledArray<T>) -> Vec<T> {
    a.values().iter().cloned().collect()
}

fn strings(ticks: Vec<Option<String>>) -> Vec<String> {
    ticks.into_iter().map(Option::unwrap_or_default).collect()
}

#[test]
fn named_selection_matches_positional() {
    set_tracing_env_filter(tracing::Level::DEBUG);
    let d = cube();

    let by_name = d
        .get(&ix!["a0", .., "c=='c1'"..])
        .unwrap()
        .into_labeled()
        .unwrap();
    let by_pos = d.get(&ix![0, .., 1..]).unwrap().into_labeled().unwrap();

    assert_eq!(by_pos, by_name);
    assert_eq!(by_pos.dims(), by_name.dims());
    assert_eq!(vec![1, 2, 4, 5, 7, 8], flat(&by_name));

    let dims = by_name.dims().as_slice();
    assert_eq!(2, dims.len());
    assert_eq!(vec!["b0", "b1", "b2"], strings(dims[0].ticks()));
    assert_eq!(vec!["c1", "c2"], strings(dims[1].ticks()));
}

#[test]
fn idata_and_indexer_agree() {
    set_tracing_env_filter(tracing::Level::DEBUG);
    let d = cube();

    let via_idata = d
        .idata(&["a", "c"])
        .unwrap()
        .get(&ix!["a0", "c=='c1'"..])
        .unwrap();
    assert_eq!(d.get(&ix!["a0", .., "c=='c1'"..]).unwrap(), via_idata);

    let indexer = d
        .indexer()
        .dims(&["a"])
        .unwrap()
        .index(&ix!["a0"])
        .unwrap()
        .dims(&["c"])
        .unwrap()
        .index(&ix!["c=='c1'"..])
        .unwrap();
    assert_eq!(
        vec![
            Index::Scalar(0),
            Index::full(),
            Index::Range(Range::new(Some(Position::At(1)), None)),
        ],
        indexer.as_tuple().unwrap()
    );
    assert_eq!(via_idata, d.get(&indexer.as_tuple().unwrap()).unwrap());
}

#[test]
fn reshape_pairs_into_grid() {
    set_tracing_env_filter(tracing::Level::DEBUG);
    let r = pairs_source()
        .reshape(&[Descriptor::vars(&["a"])], &ReshapeOptions::new())
        .unwrap();
    assert_eq!(&[2, 3], r.shape());
    assert_eq!(vec![1, 2, 3, 4, 5, -1], flat(&r));

    let dims = r.dims().as_slice();
    assert_eq!(Some("@a@"), dims[0].expression());
    assert_eq!(vec!["1", "2"], strings(dims[0].ticks()));
    assert_eq!(Some("@b@"), dims[1].expression());
    assert_eq!(vec!["1", "2", "3"], strings(dims[1].ticks()));

    let filled = pairs_source()
        .reshape(
            &[Descriptor::vars(&["a"])],
            &ReshapeOptions::new().filling_value(0),
        )
        .unwrap();
    assert_eq!(vec![1, 2, 3, 4, 5, 0], flat(&filled));
    assert_eq!(r.dims(), filled.dims());
}

#[test]
fn reshape_ambiguity_and_filter() {
    let source = LabeledArray::from_vec(vec![10, 20], ("@a@-@b@", vec!["1-1", "1-2"])).unwrap();

    let err = source
        .reshape(
            &[Descriptor::vars(&["a"])],
            &ReshapeOptions::new().ignore_rest(),
        )
        .unwrap_err();
    assert_eq!(ErrorKind::Reshape, err.kind);
    assert_eq!(ErrorCode::AmbiguousReshape, err.code);
    let details = err.get_details().unwrap();
    assert!(details.starts_with("Ambiguous dimensions; unused variables: b\n"));
    let conflict = err.conflict.unwrap();
    assert_eq!(vec!["b".to_string()], conflict.unused);
    assert_eq!("@a@-@b@", conflict.expression);

    let descriptor = Descriptor::vars(&["a"]).filter("b == 2").unwrap();
    let r = source
        .reshape(&[descriptor], &ReshapeOptions::new().ignore_rest())
        .unwrap();
    assert_eq!(&[1], r.shape());
    assert_eq!(vec![20], flat(&r));
    assert_eq!(vec!["1"], strings(r.dims().as_slice()[0].ticks()));
}

#[test]
fn reshape_roundtrip_keeps_pairs() {
    let source = LabeledArray::from_vec(
        vec![4, 1, 3, 2],
        ("@p@-@q@", vec!["y-2", "x-1", "y-1", "x-2"]),
    )
    .unwrap();

    let grid = source
        .reshape(&[Descriptor::vars(&["p"])], &ReshapeOptions::new())
        .unwrap();
    assert_eq!(&[2, 2], grid.shape());

    let back = grid
        .ravel(false)
        .reshape(&[Descriptor::vars(&["p", "q"])], &ReshapeOptions::new())
        .unwrap();
    assert_eq!(Some("@p@-@q@"), back.dims().as_slice()[0].expression());

    let collect = |a: &LabeledArray<i64>| -> BTreeSet<(String, i64)> {
        strings(a.dims().as_slice()[0].ticks())
            .into_iter()
            .zip(flat(a))
            .collect()
    };
    assert_eq!(collect(&source), collect(&back));
}

#[test]
fn reduction_by_name_drops_axis() {
    let d = cube();
    let by_name = d.sum("b", false).unwrap().into_labeled().unwrap();
    let by_pos = d.sum(1, false).unwrap().into_labeled().unwrap();
    assert_eq!(by_pos, by_name);
    assert_eq!(by_pos.dims(), by_name.dims());
    assert_eq!(&[3, 3], by_name.shape());
    assert!(by_name.dim("b").is_err());
    assert_eq!(9, by_name.get_one(&ix!["a0", "c0"]).unwrap());
}

#[test]
fn json_roundtrip_keeps_dimensions() {
    let d = cube().get(&ix!["a1"]).unwrap().into_labeled().unwrap();
    let json = serde_json::to_string(&datamodel::Array::from(&d)).unwrap();
    let model: datamodel::Array<i64> = serde_json::from_str(&json).unwrap();
    let back = LabeledArray::try_from(model).unwrap();
    assert_eq!(d, back);
    assert_eq!(d.dims(), back.dims());
}
