// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Labeled N-dimensional arrays.
//!
//! A [`LabeledArray`] is a dense `ndarray` buffer with one [`Dim`] per
//! axis. Each dimension names its positions with ticks generated by an
//! expression template such as `@benchmark@-@threads@`, so elements can be
//! selected by tick, by variable values and by filters:
//!
//! ```
//! use labeled_array::{LabeledArray, ix};
//!
//! let a = LabeledArray::from_shape_vec(
//!     &[2, 3],
//!     vec![1, 2, 3, 4, 5, 6],
//!     [("@a@", vec!["a0", "a1"]), ("@b@", vec!["b0", "b1", "b2"])],
//! )?;
//! let row = a.get(&ix!["a1", "b == 'b1'"..])?;
//! assert_eq!(vec![2], row.shape());
//! # Ok::<(), labeled_array::Error>(())
//! ```

#![deny(unsafe_code)]

mod array;
#[cfg(test)]
mod array_proptest;
pub mod common;
pub mod datamodel;
mod dim;
mod dims;
mod element;
mod expression;
mod filter;
mod index;
mod indexer;
mod value;

pub use self::array::{
    AxisArg, Descriptor, Fill, Ignore, LabeledArray, Lookup, Output, ReshapeOptions, append,
    append_fields, concatenate, drop_fields, merge_arrays,
};
pub use self::common::{Error, ErrorCode, ErrorKind, ReshapeConflict, Result};
pub use self::dim::{Dim, SortKey, SortRank, TickSpec};
pub use self::dims::{DataDims, DimKey, DimSpec};
pub use self::element::{Element, Record, Truth};
pub use self::expression::{DEFAULT_VAR, DimExpression, ExprSyntax};
pub use self::filter::{ArithOp, CmpOp, Expr, Filter, Pattern};
pub use self::index::{Index, Position, Range, Resolved, Step};
pub use self::indexer::{DimsSelector, IData, IDataMut, Indexer};
pub use self::value::{Instance, Value};
