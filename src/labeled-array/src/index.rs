// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::ops;

use ndarray::ArrayD;
use tracing::trace;

use crate::common::Result;
use crate::filter::Filter;
use crate::index_err;
use crate::value::Instance;

/// A reference to exactly one tick of a dimension.
#[derive(Clone, Debug, PartialEq)]
pub enum Position {
    At(isize),
    /// A tick string, or failing that a filter with a single match.
    Tick(String),
    Instance(Instance),
    Filter(Filter),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    By(isize),
    /// Keeps the ticks inside the range that match the filter.
    Filter(Filter),
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Range {
    pub start: Option<Position>,
    pub stop: Option<Position>,
    pub step: Option<Step>,
}

impl Range {
    pub fn full() -> Self {
        Range::default()
    }

    pub fn new(start: Option<Position>, stop: Option<Position>) -> Self {
        Range {
            start,
            stop,
            step: None,
        }
    }

    pub fn step(mut self, step: isize) -> Self {
        self.step = Some(Step::By(step));
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.step = Some(Step::Filter(filter));
        self
    }

    pub fn filter(self, filter: &str) -> Result<Self> {
        Ok(self.with_filter(Filter::parse(filter)?))
    }

    pub fn is_full(&self) -> bool {
        self.start.is_none()
            && self.stop.is_none()
            && matches!(self.step, None | Some(Step::By(1)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Index {
    Scalar(isize),
    TickName(String),
    Instance(Instance),
    FilterExpr(Filter),
    Range(Range),
    List(Vec<Position>),
    /// Boolean mask over one axis.
    Mask(Vec<bool>),
    /// Boolean mask with the shape of the whole array.
    FullMask(ArrayD<bool>),
    NewAxis,
    Ellipsis,
}

impl Index {
    pub fn full() -> Self {
        Index::Range(Range::full())
    }

    /// Selects every tick of the axis matching the filter.
    pub fn filter(filter: &str) -> Result<Self> {
        Ok(Index::Range(Range::full().filter(filter)?))
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Index::Range(r) if r.is_full())
    }

    /// The single-tick form of this index, if it has one.
    pub fn as_position(&self) -> Option<Position> {
        match self {
            Index::Scalar(i) => Some(Position::At(*i)),
            Index::TickName(s) => Some(Position::Tick(s.clone())),
            Index::Instance(i) => Some(Position::Instance(i.clone())),
            Index::FilterExpr(f) => Some(Position::Filter(f.clone())),
            _ => None,
        }
    }

    /// Number of array axes this entry consumes.
    pub(crate) fn consumed_axes(&self) -> usize {
        match self {
            Index::NewAxis | Index::Ellipsis => 0,
            Index::FullMask(mask) => mask.ndim(),
            _ => 1,
        }
    }
}

/// Builds a `Vec<Index>` out of anything convertible to an index.
///
/// ```
/// use labeled_array::{Index, ix};
/// let idx = ix!["a0", .., "c == 'c1'"..];
/// assert_eq!(3, idx.len());
/// assert_eq!(Index::TickName("a0".to_string()), idx[0]);
/// ```
#[macro_export]
macro_rules! ix {
    ($($e:expr),* $(,)?) => {
        vec![$($crate::Index::from($e)),*]
    };
}

macro_rules! from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Index {
                fn from(i: $t) -> Self {
                    Index::Scalar(i as isize)
                }
            }

            impl From<$t> for Position {
                fn from(i: $t) -> Self {
                    Position::At(i as isize)
                }
            }

            impl From<ops::Range<$t>> for Index {
                fn from(r: ops::Range<$t>) -> Self {
                    Index::Range(Range::new(Some(r.start.into()), Some(r.end.into())))
                }
            }

            impl From<ops::RangeFrom<$t>> for Index {
                fn from(r: ops::RangeFrom<$t>) -> Self {
                    Index::Range(Range::new(Some(r.start.into()), None))
                }
            }

            impl From<ops::RangeTo<$t>> for Index {
                fn from(r: ops::RangeTo<$t>) -> Self {
                    Index::Range(Range::new(None, Some(r.end.into())))
                }
            }

            impl From<Vec<$t>> for Index {
                fn from(v: Vec<$t>) -> Self {
                    Index::List(v.into_iter().map(Position::from).collect())
                }
            }
        )*
    };
}

from_scalar!(i32, i64, isize, usize);

impl From<&str> for Position {
    fn from(s: &str) -> Self {
        Position::Tick(s.to_string())
    }
}

impl From<String> for Position {
    fn from(s: String) -> Self {
        Position::Tick(s)
    }
}

impl From<Instance> for Position {
    fn from(i: Instance) -> Self {
        Position::Instance(i)
    }
}

impl From<Filter> for Position {
    fn from(f: Filter) -> Self {
        Position::Filter(f)
    }
}

impl From<&str> for Index {
    fn from(s: &str) -> Self {
        Index::TickName(s.to_string())
    }
}

impl From<String> for Index {
    fn from(s: String) -> Self {
        Index::TickName(s)
    }
}

impl From<Instance> for Index {
    fn from(i: Instance) -> Self {
        Index::Instance(i)
    }
}

impl From<Filter> for Index {
    fn from(f: Filter) -> Self {
        Index::FilterExpr(f)
    }
}

impl From<Position> for Index {
    fn from(p: Position) -> Self {
        match p {
            Position::At(i) => Index::Scalar(i),
            Position::Tick(s) => Index::TickName(s),
            Position::Instance(i) => Index::Instance(i),
            Position::Filter(f) => Index::FilterExpr(f),
        }
    }
}

impl From<Range> for Index {
    fn from(r: Range) -> Self {
        Index::Range(r)
    }
}

impl From<ops::RangeFull> for Index {
    fn from(_: ops::RangeFull) -> Self {
        Index::full()
    }
}

impl From<ops::Range<&str>> for Index {
    fn from(r: ops::Range<&str>) -> Self {
        Index::Range(Range::new(Some(r.start.into()), Some(r.end.into())))
    }
}

impl From<ops::RangeFrom<&str>> for Index {
    fn from(r: ops::RangeFrom<&str>) -> Self {
        Index::Range(Range::new(Some(r.start.into()), None))
    }
}

impl From<ops::RangeTo<&str>> for Index {
    fn from(r: ops::RangeTo<&str>) -> Self {
        Index::Range(Range::new(None, Some(r.end.into())))
    }
}

impl From<Vec<&str>> for Index {
    fn from(v: Vec<&str>) -> Self {
        Index::List(v.into_iter().map(Position::from).collect())
    }
}

impl From<Vec<Position>> for Index {
    fn from(v: Vec<Position>) -> Self {
        Index::List(v)
    }
}

impl From<Vec<bool>> for Index {
    fn from(v: Vec<bool>) -> Self {
        Index::Mask(v)
    }
}

impl From<ArrayD<bool>> for Index {
    fn from(mask: ArrayD<bool>) -> Self {
        Index::FullMask(mask)
    }
}

/// What an index selects along one dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    /// A single position; the axis disappears.
    Collapse(usize),
    /// A plain range; the dimension is viewed.
    Range(Vec<usize>),
    /// A filtered range; the axis stays but the dimension is copied.
    Filtered(Vec<usize>),
    /// List or mask selections.
    Advanced(Vec<usize>),
}

impl Resolved {
    pub fn positions(&self) -> Vec<usize> {
        match self {
            Resolved::Collapse(p) => vec![*p],
            Resolved::Range(ps) | Resolved::Filtered(ps) | Resolved::Advanced(ps) => ps.clone(),
        }
    }

    pub fn is_collapse(&self) -> bool {
        matches!(self, Resolved::Collapse(_))
    }
}

/// Expands the ellipsis, pads trailing full ranges and checks the number
/// of consumed axes.
pub(crate) fn normalize(indexes: &[Index], ndim: usize) -> Result<Vec<Index>> {
    let ellipses = indexes
        .iter()
        .filter(|i| matches!(i, Index::Ellipsis))
        .count();
    if ellipses > 1 {
        return index_err!(
            MultipleEllipsis,
            "an index can only have a single ellipsis".to_string()
        );
    }

    let consumed: usize = indexes.iter().map(|i| i.consumed_axes()).sum();
    if consumed > ndim {
        return index_err!(
            TooManyIndices,
            format!("too many indices: {consumed} for an array with {ndim} dimensions")
        );
    }

    let missing = ndim - consumed;
    let mut normalized = Vec::with_capacity(indexes.len() + missing);
    for index in indexes {
        if matches!(index, Index::Ellipsis) {
            normalized.extend((0..missing).map(|_| Index::full()));
        } else {
            normalized.push(index.clone());
        }
    }
    if ellipses == 0 {
        normalized.extend((0..missing).map(|_| Index::full()));
    }

    trace!(
        given = indexes.len(),
        normalized = normalized.len(),
        "normalized index"
    );
    Ok(normalized)
}

/// Drops trailing full ranges.
pub(crate) fn trim(mut indexes: Vec<Index>) -> Vec<Index> {
    while indexes.last().is_some_and(|i| i.is_full()) {
        indexes.pop();
    }
    indexes
}

/// Positions selected by `start:stop:step` over `len` elements, following
/// slice semantics (negative bounds count from the end, out-of-range
/// bounds clamp).
pub(crate) fn slice_positions(
    start: Option<isize>,
    stop: Option<isize>,
    step: isize,
    len: usize,
) -> Vec<usize> {
    debug_assert!(step != 0);
    let len = len as isize;
    let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
    let clamp = |bound: Option<isize>, default: isize| match bound {
        None => default,
        Some(b) if b < 0 => (b + len).max(lower),
        Some(b) => b.min(upper),
    };
    let start = clamp(start, if step > 0 { lower } else { upper });
    let stop = clamp(stop, if step > 0 { upper } else { lower });

    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        while i > stop {
            out.push(i as usize);
            i += step;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    #[test]
    fn test_slice_positions() {
        assert_eq!(vec![0, 1, 2, 3], slice_positions(None, None, 1, 4));
        assert_eq!(vec![1, 2], slice_positions(Some(1), Some(3), 1, 4));
        assert_eq!(vec![3, 2, 1, 0], slice_positions(None, None, -1, 4));
        assert_eq!(vec![3, 1], slice_positions(None, None, -2, 4));
        assert_eq!(vec![2, 3], slice_positions(Some(-2), None, 1, 4));
        assert_eq!(Vec::<usize>::new(), slice_positions(Some(3), Some(1), 1, 4));
        assert_eq!(vec![0, 1, 2, 3], slice_positions(Some(-10), Some(10), 1, 4));
        assert_eq!(vec![3, 2], slice_positions(Some(10), Some(1), -1, 4));
        assert_eq!(Vec::<usize>::new(), slice_positions(None, None, 1, 0));
    }

    #[test]
    fn test_normalize() {
        let n = normalize(&ix![0], 3).unwrap();
        assert_eq!(3, n.len());
        assert!(n[1].is_full() && n[2].is_full());

        let n = normalize(&[Index::Ellipsis, Index::from(1)], 3).unwrap();
        assert_eq!(vec![Index::full(), Index::full(), Index::from(1)], n);

        let n = normalize(&[Index::NewAxis, Index::from(0)], 2).unwrap();
        assert_eq!(3, n.len());
        assert_eq!(Index::NewAxis, n[0]);

        let err = normalize(&ix![0, 0, 0], 2).unwrap_err();
        assert_eq!(ErrorCode::TooManyIndices, err.code);
        let err = normalize(&[Index::Ellipsis, Index::Ellipsis], 2).unwrap_err();
        assert_eq!(ErrorCode::MultipleEllipsis, err.code);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Index::Scalar(-1), Index::from(-1));
        assert_eq!(Index::TickName("a0".to_string()), Index::from("a0"));
        assert!(Index::from(..).is_full());
        assert_eq!(
            Index::Range(Range::new(Some(Position::At(1)), None)),
            Index::from(1..)
        );
        assert_eq!(
            Index::Range(Range::new(
                Some(Position::Tick("a".to_string())),
                Some(Position::Tick("c".to_string()))
            )),
            Index::from("a".."c")
        );
        assert_eq!(
            Index::List(vec![Position::At(0), Position::At(2)]),
            Index::from(vec![0, 2])
        );
        assert_eq!(
            Index::Mask(vec![true, false]),
            Index::from(vec![true, false])
        );
        assert!(Index::filter("a ==").is_err());
        assert_eq!(trim(ix![0, .., ..]), ix![0]);
    }
}
