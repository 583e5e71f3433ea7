// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Building array indices by dimension name instead of axis position.
//!
//! An [`Indexer`] holds a detached copy of an array's dimensions plus one
//! index entry per axis. Selecting dimensions with [`Indexer::dims`] and
//! indexing the selector binds entries for those axes only and yields a
//! new `Indexer`; the accumulated entries can then be applied with
//! [`LabeledArray::get`].

use std::fmt;

use crate::array::{LabeledArray, Output};
use crate::common::Result;
use crate::dim::Dim;
use crate::dims::{DataDims, DimKey};
use crate::index::{Index, Position, Range, Resolved, Step, normalize, trim};

#[derive(Clone, Debug)]
pub struct Indexer {
    dims: DataDims,
    indexes: Vec<Index>,
}

/// The axes picked by [`Indexer::dims`], waiting for their index values.
#[derive(Debug)]
pub struct DimsSelector<'a> {
    indexer: &'a Indexer,
    axes: Vec<usize>,
}

impl Indexer {
    /// An indexer selecting everything in an array with these dimensions.
    pub fn new(dims: &DataDims) -> Indexer {
        Indexer {
            indexes: dims.iter().map(|_| Index::full()).collect(),
            dims: dims.copy(),
        }
    }

    /// The dimensions the entries are resolved against, including blank
    /// ones for inserted axes.
    pub fn dim_set(&self) -> &DataDims {
        &self.dims
    }

    /// Selects axes by position, expression or variable name.
    pub fn dims<K: Into<DimKey> + Clone>(&self, keys: &[K]) -> Result<DimsSelector<'_>> {
        let axes = keys
            .iter()
            .map(|k| self.dims.index_of(k.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(DimsSelector {
            indexer: self,
            axes,
        })
    }

    /// Binds every axis positionally.
    pub fn index(&self, values: &[Index]) -> Result<Indexer> {
        DimsSelector {
            indexer: self,
            axes: (0..self.dims.len()).collect(),
        }
        .index(values)
    }

    /// The accumulated entries without trailing full ranges, ready for
    /// [`LabeledArray::get`].
    pub fn indexes(&self) -> Vec<Index> {
        trim(self.indexes.clone())
    }

    /// Every entry, one per axis.
    pub fn indexes_untrimmed(&self) -> &[Index] {
        &self.indexes
    }

    /// The entries resolved into purely positional indices.
    pub fn as_tuple(&self) -> Result<Vec<Index>> {
        self.indexes()
            .iter()
            .zip(self.dims.iter())
            .map(|(index, dim)| positional(dim, index))
            .collect()
    }
}

impl DimsSelector<'_> {
    /// Binds the selected axes to `values`, in selection order. When an
    /// axis is selected twice the last value wins. A `NewAxis` value
    /// inserts a blank axis right after the preceding selected axis, or
    /// before the first one when it comes first.
    pub fn index(&self, values: &[Index]) -> Result<Indexer> {
        let values = normalize(values, self.axes.len())?;
        let mut dims: Vec<Dim> = self.indexer.dims.copy().into_vec();
        let mut indexes = self.indexer.indexes.clone();

        let mut pos = 0;
        for value in values.iter() {
            if matches!(value, Index::NewAxis) {
                continue;
            }
            indexes[self.axes[pos]] = value.clone();
            pos += 1;
        }

        let mut inserts = Vec::new();
        let mut prev: Option<usize> = None;
        for value in values.iter() {
            if !matches!(value, Index::NewAxis) {
                prev = Some(prev.map_or(0, |p| p + 1));
                continue;
            }
            inserts.push(match prev {
                Some(p) => self.axes[p] + 1,
                None => self.axes.first().copied().unwrap_or(0),
            });
        }
        // Insert from the highest position down.
        inserts.sort_unstable_by(|a, b| b.cmp(a));
        for at in inserts {
            dims.insert(at, Dim::blank(1));
            indexes.insert(at, Index::NewAxis);
        }

        Ok(Indexer {
            dims: DataDims::new(dims)?,
            indexes,
        })
    }
}

fn positional(dim: &Dim, index: &Index) -> Result<Index> {
    Ok(match index {
        Index::NewAxis | Index::Mask(_) | Index::FullMask(_) => index.clone(),
        Index::Range(Range {
            step: Some(Step::Filter(_)),
            ..
        })
        | Index::List(_) => Index::List(
            dim.positions(index)?
                .into_iter()
                .map(|p| Position::At(p as isize))
                .collect(),
        ),
        Index::Range(range) => {
            let bound = |b: &Option<Position>| -> Result<Option<Position>> {
                match b {
                    None => Ok(None),
                    Some(Position::At(i)) => Ok(Some(Position::At(*i))),
                    Some(other) => Ok(Some(Position::At(dim.position_of(other)? as isize))),
                }
            };
            Index::Range(Range {
                start: bound(&range.start)?,
                stop: bound(&range.stop)?,
                step: range.step.clone(),
            })
        }
        other => match dim.resolve(other)? {
            Resolved::Collapse(p) => Index::Scalar(p as isize),
            resolved => Index::List(
                resolved
                    .positions()
                    .into_iter()
                    .map(|p| Position::At(p as isize))
                    .collect(),
            ),
        },
    })
}

impl fmt::Display for Indexer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, index) in self.indexes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{index:?}")?;
        }
        write!(f, ")")
    }
}

/// One-shot name-based read access, see [`LabeledArray::idata`].
pub struct IData<'a, T> {
    array: &'a LabeledArray<T>,
    indexer: Indexer,
    axes: Vec<usize>,
}

pub struct IDataMut<'a, T> {
    array: &'a mut LabeledArray<T>,
    indexer: Indexer,
    axes: Vec<usize>,
}

fn bind(indexer: &Indexer, axes: &[usize], values: &[Index]) -> Result<Vec<Index>> {
    let selector = DimsSelector {
        indexer,
        axes: axes.to_vec(),
    };
    Ok(selector.index(values)?.indexes())
}

impl<T: Clone> IData<'_, T> {
    pub fn get(&self, values: &[Index]) -> Result<Output<T>> {
        self.array.get(&bind(&self.indexer, &self.axes, values)?)
    }
}

impl<T: Clone> IDataMut<'_, T> {
    pub fn get(&self, values: &[Index]) -> Result<Output<T>> {
        self.array.get(&bind(&self.indexer, &self.axes, values)?)
    }

    pub fn set(&mut self, values: &[Index], value: T) -> Result<()> {
        let index = bind(&self.indexer, &self.axes, values)?;
        self.array.set(&index, value)
    }

    pub fn set_array(&mut self, values: &[Index], data: &ndarray::ArrayD<T>) -> Result<()> {
        let index = bind(&self.indexer, &self.axes, values)?;
        self.array.set_array(&index, data)
    }
}

impl<T: Clone> LabeledArray<T> {
    pub fn indexer(&self) -> Indexer {
        Indexer::new(self.dims())
    }

    /// Indexes the named axes only: `a.idata(&["a", "c"])?.get(&ix!["a0", 1])`.
    pub fn idata<K: Into<DimKey> + Clone>(&self, keys: &[K]) -> Result<IData<'_, T>> {
        let indexer = self.indexer();
        let axes = indexer.dims(keys)?.axes;
        Ok(IData {
            array: self,
            indexer,
            axes,
        })
    }

    pub fn idata_mut<K: Into<DimKey> + Clone>(&mut self, keys: &[K]) -> Result<IDataMut<'_, T>> {
        let indexer = self.indexer();
        let axes = indexer.dims(keys)?.axes;
        Ok(IDataMut {
            array: self,
            indexer,
            axes,
        })
    }
}
