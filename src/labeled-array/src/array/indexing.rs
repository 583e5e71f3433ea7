// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use ndarray::{ArrayD, Dimension, IxDyn};
use smallvec::SmallVec;
use tracing::debug;

use super::{LabeledArray, Output};
use crate::common::Result;
use crate::dim::Dim;
use crate::index::{Index, Resolved, normalize};
use crate::{index_err, shape_err};

pub(crate) type Coords = SmallVec<[usize; 8]>;

/// How one axis of the result maps onto the source.
#[derive(Debug)]
enum OutAxis {
    New,
    Src { axis: usize, positions: Vec<usize> },
    /// Several index lists walked together.
    Broadcast(Vec<(usize, Vec<usize>)>),
    /// Elements selected by a full boolean mask.
    Points(Vec<Coords>),
}

impl OutAxis {
    fn len(&self) -> usize {
        match self {
            OutAxis::New => 1,
            OutAxis::Src { positions, .. } => positions.len(),
            OutAxis::Broadcast(lists) => lists.iter().map(|(_, ps)| ps.len()).max().unwrap_or(0),
            OutAxis::Points(points) => points.len(),
        }
    }
}

/// An index resolved against an array: the result shape, how to find the
/// source element of each result element, and the result dimensions
/// (when requested).
#[derive(Debug)]
pub(crate) struct Selection {
    fixed: Coords,
    axes: Vec<OutAxis>,
    pub(crate) shape: Vec<usize>,
    pub(crate) dims: Option<Vec<Dim>>,
}

impl Selection {
    fn new(fixed: Coords, axes: Vec<OutAxis>, dims: Option<Vec<Dim>>) -> Selection {
        let shape = axes.iter().map(|a| a.len()).collect();
        Selection {
            fixed,
            axes,
            shape,
            dims,
        }
    }

    pub(crate) fn source(&self, out: &[usize]) -> Coords {
        let mut src = self.fixed.clone();
        for (k, axis) in self.axes.iter().enumerate() {
            match axis {
                OutAxis::New => {}
                OutAxis::Src { axis, positions } => src[*axis] = positions[out[k]],
                OutAxis::Broadcast(lists) => {
                    for (axis, positions) in lists {
                        src[*axis] = if positions.len() == 1 {
                            positions[0]
                        } else {
                            positions[out[k]]
                        };
                    }
                }
                OutAxis::Points(points) => src = points[out[k]].clone(),
            }
        }
        src
    }
}

enum Item {
    New,
    Axis {
        axis: usize,
        resolved: Resolved,
        dim: Option<Dim>,
    },
}

impl Item {
    fn is_collapse(&self) -> bool {
        matches!(self, Item::Axis { resolved, .. } if resolved.is_collapse())
    }

    fn is_advanced(&self) -> bool {
        matches!(
            self,
            Item::Axis {
                resolved: Resolved::Advanced(_),
                ..
            }
        )
    }
}

impl<T: Clone> LabeledArray<T> {
    pub(crate) fn select_index(&self, index: &[Index], with_dims: bool) -> Result<Selection> {
        let normalized = normalize(index, self.ndim())?;

        if let Some(mask) = normalized.iter().find_map(|i| match i {
            Index::FullMask(mask) => Some(mask),
            _ => None,
        }) {
            let partial = |i: &Index| !matches!(i, Index::FullMask(_)) && !i.is_full();
            if normalized.iter().any(partial) {
                return index_err!(
                    BadMask,
                    "a boolean index over the whole array cannot be combined with other indices"
                        .to_string()
                );
            }
            return self.select_mask(mask, with_dims);
        }

        let mut items = Vec::with_capacity(normalized.len());
        let mut axis = 0;
        for entry in normalized.iter() {
            if matches!(entry, Index::NewAxis) {
                items.push(Item::New);
                continue;
            }
            let dim = &self.dims.as_slice()[axis];
            let (dim, resolved) = if with_dims {
                dim.view(entry)?
            } else {
                (None, dim.resolve(entry)?)
            };
            items.push(Item::Axis {
                axis,
                resolved,
                dim,
            });
            axis += 1;
        }

        let mut fixed: Coords = SmallVec::from_elem(0, self.ndim());
        for item in items.iter() {
            if let Item::Axis {
                axis,
                resolved: Resolved::Collapse(p),
                ..
            } = item
            {
                fixed[*axis] = *p;
            }
        }
        let kept: Vec<Item> = items.into_iter().filter(|i| !i.is_collapse()).collect();
        let advanced = kept.iter().filter(|i| i.is_advanced()).count();

        if advanced <= 1 {
            let mut axes = Vec::with_capacity(kept.len());
            let mut dims = Vec::with_capacity(kept.len());
            for item in kept {
                match item {
                    Item::New => {
                        axes.push(OutAxis::New);
                        dims.push(Dim::blank(1));
                    }
                    Item::Axis {
                        axis,
                        resolved,
                        dim,
                    } => {
                        let positions = resolved.positions();
                        let dim = match dim {
                            Some(dim) if advanced > 0 => dim.copy(),
                            Some(dim) => dim,
                            None => Dim::blank(positions.len()),
                        };
                        axes.push(OutAxis::Src { axis, positions });
                        dims.push(dim);
                    }
                }
            }
            return Ok(Selection::new(fixed, axes, with_dims.then_some(dims)));
        }

        self.select_pointwise(fixed, kept, with_dims)
    }

    /// Two or more list/mask indices: the lists are walked together.
    fn select_pointwise(
        &self,
        fixed: Coords,
        kept: Vec<Item>,
        with_dims: bool,
    ) -> Result<Selection> {
        let adv: Vec<usize> = kept
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_advanced())
            .map(|(k, _)| k)
            .collect();
        let adjacent = adv.windows(2).all(|w| w[1] == w[0] + 1);

        let mut lists = Vec::with_capacity(adv.len());
        let mut others = Vec::new();
        for (k, item) in kept.into_iter().enumerate() {
            match item {
                Item::Axis {
                    axis,
                    resolved: Resolved::Advanced(ps),
                    ..
                } => lists.push((axis, ps)),
                Item::New => others.push((k, OutAxis::New)),
                Item::Axis { axis, resolved, .. } => others.push((
                    k,
                    OutAxis::Src {
                        axis,
                        positions: resolved.positions(),
                    },
                )),
            }
        }

        let len = lists.iter().map(|(_, ps)| ps.len()).max().unwrap_or(0);
        if lists.iter().any(|(_, ps)| ps.len() != len && ps.len() != 1) {
            let lens: Vec<usize> = lists.iter().map(|(_, ps)| ps.len()).collect();
            return shape_err!(
                BroadcastMismatch,
                format!("indexing lists could not be broadcast together with lengths {lens:?}")
            );
        }

        let broadcast = OutAxis::Broadcast(lists);
        let mut axes: Vec<OutAxis> = Vec::with_capacity(others.len() + 1);
        if adjacent {
            let (before, after): (Vec<_>, Vec<_>) =
                others.into_iter().partition(|(k, _)| *k < adv[0]);
            axes.extend(before.into_iter().map(|(_, a)| a));
            axes.push(broadcast);
            axes.extend(after.into_iter().map(|(_, a)| a));
        } else {
            axes.push(broadcast);
            axes.extend(others.into_iter().map(|(_, a)| a));
        }

        debug!(
            lists = adv.len(),
            "several advanced indices; result dimensions are blank"
        );
        let dims = with_dims.then(|| axes.iter().map(|a| Dim::blank(a.len())).collect());
        Ok(Selection::new(fixed, axes, dims))
    }

    fn select_mask(&self, mask: &ArrayD<bool>, with_dims: bool) -> Result<Selection> {
        if mask.shape() != self.shape() {
            return index_err!(
                BadMask,
                format!(
                    "boolean index of shape {:?} for array of shape {:?}",
                    mask.shape(),
                    self.shape()
                )
            );
        }
        let points: Vec<Coords> = mask
            .indexed_iter()
            .filter(|(_, keep)| **keep)
            .map(|(idx, _)| SmallVec::from_slice(idx.slice()))
            .collect();
        let dims = with_dims.then(|| {
            if self.ndim() == 1 {
                let positions: Vec<usize> = points.iter().map(|p| p[0]).collect();
                vec![self.dims.as_slice()[0].take(&positions)]
            } else {
                debug!(
                    ndim = self.ndim(),
                    "boolean index over a multidimensional array; result dimension is blank"
                );
                vec![Dim::blank(points.len())]
            }
        });
        let fixed = SmallVec::from_elem(0, self.ndim());
        Ok(Selection::new(fixed, vec![OutAxis::Points(points)], dims))
    }

    /// Selects a sub-array. Axes indexed by a single tick disappear; the
    /// dimensions of the remaining axes are views of this array's
    /// dimensions (plain ranges) or detached copies.
    pub fn get(&self, index: &[Index]) -> Result<Output<T>> {
        let sel = self.select_index(index, true)?;
        let data = ArrayD::from_shape_fn(IxDyn(&sel.shape), |out| {
            self.data[IxDyn(&sel.source(out.slice()))].clone()
        });
        Output::from_parts(data, sel.dims)
    }

    /// The single element an index selects.
    pub fn get_one(&self, index: &[Index]) -> Result<T> {
        let sel = self.select_index(index, false)?;
        if !sel.shape.is_empty() {
            return index_err!(
                Generic,
                format!("index selects a sub-array of shape {:?}", sel.shape)
            );
        }
        Ok(self.data[IxDyn(&sel.source(&[]))].clone())
    }

    /// Writes `value` into every selected element.
    pub fn set(&mut self, index: &[Index], value: T) -> Result<()> {
        let sel = self.select_index(index, false)?;
        for out in ndarray::indices(IxDyn(&sel.shape)) {
            let src = sel.source(out.slice());
            self.data[IxDyn(&src)] = value.clone();
        }
        Ok(())
    }

    /// Writes `values`, broadcast to the selection's shape.
    pub fn set_array(&mut self, index: &[Index], values: &ArrayD<T>) -> Result<()> {
        let sel = self.select_index(index, false)?;
        let Some(values) = values.broadcast(IxDyn(&sel.shape)) else {
            return shape_err!(
                BroadcastMismatch,
                format!(
                    "could not broadcast values of shape {:?} into shape {:?}",
                    values.shape(),
                    sel.shape
                )
            );
        };
        for out in ndarray::indices(IxDyn(&sel.shape)) {
            let src = sel.source(out.slice());
            self.data[IxDyn(&src)] = values[out.slice()].clone();
        }
        Ok(())
    }
}
