// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Plain serializable descriptions of dimensions and arrays.
//!
//! ```
//! use labeled_array::{Dim, datamodel};
//!
//! let dim = Dim::new(Some("@a@"), ["a0", "a1"])?;
//! let json = serde_json::to_string(&datamodel::Dimension::from(&dim))?;
//! let back: datamodel::Dimension = serde_json::from_str(&json)?;
//! assert_eq!(dim, Dim::try_from(back)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::array::LabeledArray;
use crate::common::{Error, Result};
use crate::dim::Dim;
use crate::dims::DimSpec;

fn is_empty_vec<T>(val: &[T]) -> bool {
    val.is_empty()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expression: Option<String>,
    /// `None` marks a blank tick.
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub ticks: Vec<Option<String>>,
}

impl From<&Dim> for Dimension {
    fn from(dim: &Dim) -> Self {
        Dimension {
            expression: dim.expression().map(str::to_string),
            ticks: dim.ticks(),
        }
    }
}

impl TryFrom<Dimension> for Dim {
    type Error = Error;

    fn try_from(dim: Dimension) -> Result<Self> {
        Dim::new(dim.expression.as_deref(), dim.ticks)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array<T> {
    pub shape: Vec<usize>,
    /// Values in C order.
    pub values: Vec<T>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub dims: Vec<Dimension>,
}

impl<T: Clone> From<&LabeledArray<T>> for Array<T> {
    fn from(array: &LabeledArray<T>) -> Self {
        Array {
            shape: array.shape().to_vec(),
            values: array.values().iter().cloned().collect(),
            dims: array.dims().iter().map(Dimension::from).collect(),
        }
    }
}

impl<T: Clone> TryFrom<Array<T>> for LabeledArray<T> {
    type Error = Error;

    fn try_from(array: Array<T>) -> Result<Self> {
        let dims = array
            .dims
            .into_iter()
            .map(|d| Dim::try_from(d).map(DimSpec::Dim))
            .collect::<Result<Vec<_>>>()?;
        LabeledArray::from_shape_vec(&array.shape, array.values, dims)
    }
}

#[test]
fn test_dimension_roundtrip() {
    let dim = Dim::new(Some("@a@-@b@"), vec![Some("1-x"), None, Some("2-y")]).unwrap();
    let model = Dimension::from(&dim);
    assert_eq!(Some("@a@-@b@".to_string()), model.expression);
    assert_eq!(None, model.ticks[1]);

    let json = serde_json::to_string(&model).unwrap();
    assert_eq!(
        r#"{"expression":"@a@-@b@","ticks":["1-x",null,"2-y"]}"#,
        json
    );
    let back: Dimension = serde_json::from_str(&json).unwrap();
    assert_eq!(dim, Dim::try_from(back).unwrap());
}

#[test]
fn test_implicit_dimension_json() {
    let model: Dimension = serde_json::from_str(r#"{"ticks":["x","y"]}"#).unwrap();
    let dim = Dim::try_from(model).unwrap();
    assert!(!dim.has_expression());
    assert_eq!(Some(1), dim.tick_position("y"));
}

#[test]
fn test_array_roundtrip() {
    let a = LabeledArray::from_shape_vec(
        &[2, 2],
        vec![1.5, 2.5, 3.5, 4.5],
        [("@a@", vec!["a0", "a1"]), ("@b@", vec!["b0", "b1"])],
    )
    .unwrap();
    let json = serde_json::to_string(&Array::from(&a)).unwrap();
    let back: Array<f64> = serde_json::from_str(&json).unwrap();
    let b = LabeledArray::try_from(back).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.dims(), b.dims());

    let bad = Array {
        shape: vec![3],
        values: vec![1, 2, 3],
        dims: vec![Dimension {
            expression: Some("@a@".to_string()),
            ticks: vec![Some("a0".to_string())],
        }],
    };
    assert!(LabeledArray::try_from(bad).is_err());
}
