// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use ndarray::{ArrayD, IxDyn, Zip};

use super::ops::result_dims;
use super::{LabeledArray, Output};
use crate::common::{ErrorKind, Result};
use crate::dims::DataDims;
use crate::element::Record;
use crate::index::Index;
use crate::value::Value;
use crate::{lookup_err, namespace_err, shape_err};

/// What a name resolved to in [`LabeledArray::lookup`].
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    Field(LabeledArray<Value>),
    Tick(Output<Record>),
}

fn field_names(array: &LabeledArray<Record>) -> Vec<String> {
    array
        .data
        .iter()
        .next()
        .map(|r| r.names().map(str::to_string).collect())
        .unwrap_or_default()
}

impl LabeledArray<Record> {
    /// Field names, taken from the first element.
    pub fn fields(&self) -> Vec<String> {
        field_names(self)
    }

    /// The values of one field, with this array's metadata.
    pub fn field(&self, name: &str) -> Result<LabeledArray<Value>> {
        let mut values = Vec::with_capacity(self.len());
        for record in self.data.iter() {
            match record.get(name) {
                Some(v) => values.push(v.clone()),
                None => return lookup_err!(FieldNotFound, format!("field {name:?} not found")),
            }
        }
        let data = match ArrayD::from_shape_vec(IxDyn(self.shape()), values) {
            Ok(data) => data,
            Err(err) => return shape_err!(ShapeMismatch, err.to_string()),
        };
        let dims = DataDims::attach_unchecked(self.dims.copy().into_vec(), data.shape());
        Ok(LabeledArray { data, dims })
    }

    /// Overwrites an existing field; `values` is broadcast to the shape.
    pub fn set_field(&mut self, name: &str, values: &ArrayD<Value>) -> Result<()> {
        if !self.fields().iter().any(|f| f == name) {
            return lookup_err!(FieldNotFound, format!("field {name:?} not found"));
        }
        let Some(values) = values.broadcast(IxDyn(self.shape())) else {
            return shape_err!(
                BroadcastMismatch,
                format!(
                    "could not broadcast values of shape {:?} into shape {:?}",
                    values.shape(),
                    self.shape()
                )
            );
        };
        Zip::from(&mut self.data).and(&values).for_each(|record, value| {
            record.set(name, value.clone());
        });
        Ok(())
    }

    /// Resolves `name` as a field first and as a tick of the first axis
    /// otherwise.
    pub fn lookup(&self, name: &str) -> Result<Lookup> {
        if self.fields().iter().any(|f| f == name) {
            return Ok(Lookup::Field(self.field(name)?));
        }
        if self.ndim() > 0 {
            match self.get(&[Index::TickName(name.to_string())]) {
                Ok(out) => return Ok(Lookup::Tick(out)),
                Err(err) if err.kind != ErrorKind::Lookup => return Err(err),
                Err(_) => {}
            }
        }
        lookup_err!(
            FieldNotFound,
            format!("field or tick named {name:?} not found")
        )
    }
}

/// Adds new fields to every record. Each column must have the array's
/// shape; the result keeps the metadata unless the columns carry
/// conflicting dimensions.
pub fn append_fields<S: AsRef<str>>(
    array: &LabeledArray<Record>,
    names: &[S],
    columns: &[&LabeledArray<Value>],
) -> Result<Output<Record>> {
    if names.len() != columns.len() {
        return shape_err!(
            ShapeMismatch,
            format!("{} field names for {} columns", names.len(), columns.len())
        );
    }
    let existing = field_names(array);
    for (i, name) in names.iter().enumerate() {
        let name = name.as_ref();
        if existing.iter().any(|f| f == name) || names[..i].iter().any(|n| n.as_ref() == name) {
            return namespace_err!(DuplicateField, format!("field {name:?} already present"));
        }
    }
    for column in columns {
        if column.shape() != array.shape() {
            return shape_err!(
                ShapeMismatch,
                format!(
                    "column of shape {:?} for array of shape {:?}",
                    column.shape(),
                    array.shape()
                )
            );
        }
    }

    let mut data = array.data.clone();
    for (name, column) in names.iter().zip(columns.iter()) {
        Zip::from(&mut data).and(&column.data).for_each(|record, value| {
            record.set(name.as_ref(), value.clone());
        });
    }

    let mut operands = vec![&array.dims];
    let mut shapes = vec![array.shape()];
    for column in columns {
        operands.push(&column.dims);
        shapes.push(column.shape());
    }
    let dims = result_dims(data.shape(), &operands, &shapes);
    Output::from_parts(data, dims)
}

/// Removes fields from every record, keeping the metadata.
pub fn drop_fields<S: AsRef<str>>(
    array: &LabeledArray<Record>,
    names: &[S],
) -> Result<LabeledArray<Record>> {
    let existing = field_names(array);
    for name in names {
        if !existing.iter().any(|f| f == name.as_ref()) {
            return lookup_err!(
                FieldNotFound,
                format!("field {:?} not found", name.as_ref())
            );
        }
    }
    let dropped = |f: &String| names.iter().any(|n| n.as_ref() == f);
    if !existing.is_empty() && existing.iter().all(dropped) {
        return namespace_err!(Generic, "cannot drop every field".to_string());
    }
    let mut out = array.copy();
    out.data.map_inplace(|record| {
        for name in names {
            record.remove(name.as_ref());
        }
    });
    Ok(out)
}

/// Joins the fields of several same-shaped record arrays.
pub fn merge_arrays(arrays: &[&LabeledArray<Record>]) -> Result<Output<Record>> {
    let Some(first) = arrays.first() else {
        return shape_err!(Generic, "nothing to merge".to_string());
    };
    let mut seen: Vec<String> = Vec::new();
    for array in arrays {
        if array.shape() != first.shape() {
            return shape_err!(
                ShapeMismatch,
                format!(
                    "cannot merge arrays of shapes {:?} and {:?}",
                    first.shape(),
                    array.shape()
                )
            );
        }
        for name in field_names(array) {
            if seen.contains(&name) {
                return namespace_err!(DuplicateField, format!("field {name:?} already present"));
            }
            seen.push(name);
        }
    }

    let mut data = first.data.clone();
    for array in arrays.iter().skip(1) {
        Zip::from(&mut data).and(&array.data).for_each(|record, other| {
            for (name, value) in other.iter() {
                record.set(name, value.clone());
            }
        });
    }
    let operands: Vec<&DataDims> = arrays.iter().map(|a| &a.dims).collect();
    let shapes: Vec<&[usize]> = arrays.iter().map(|a| a.shape()).collect();
    let dims = result_dims(data.shape(), &operands, &shapes);
    Output::from_parts(data, dims)
}
