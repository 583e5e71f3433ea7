// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::mem;

use bytemuck::Pod;

use super::LabeledArray;
use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::dims::DimSpec;
use crate::shape_err;

fn buffer_err<T>(details: String) -> Result<T> {
    Err(Error::new(ErrorKind::Io, ErrorCode::BufferSize, Some(details)))
}

/// Reinterprets native-endian bytes as elements of `T`.
fn pod_values<T: Pod>(bytes: &[u8], count: usize) -> Result<Vec<T>> {
    let size = mem::size_of::<T>();
    let Some(needed) = size.checked_mul(count) else {
        return shape_err!(
            ShapeMismatch,
            format!("{count} elements of {size} bytes overflow the address space")
        );
    };
    if bytes.len() < needed {
        return buffer_err(format!(
            "buffer of {} bytes is smaller than {count} elements of {size} bytes",
            bytes.len()
        ));
    }
    Ok(bytes[..needed]
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

impl<T: Pod> LabeledArray<T> {
    /// Builds an array of `shape` out of raw bytes. Only the bytes needed
    /// for the shape are read.
    pub fn from_buffer<D: Into<DimSpec>>(
        bytes: &[u8],
        shape: &[usize],
        dims: impl IntoIterator<Item = D>,
    ) -> Result<Self> {
        let checked = |acc: usize, n: &usize| acc.checked_mul(*n);
        let Some(count) = shape.iter().try_fold(1, checked) else {
            return shape_err!(ShapeMismatch, format!("shape {shape:?} overflows"));
        };
        let values = pod_values(bytes, count)?;
        Self::from_shape_vec(shape, values, dims)
    }

    /// Maps `path` and copies `shape` elements starting at byte `offset`.
    #[cfg(feature = "memmap")]
    pub fn from_memmap<D: Into<DimSpec>>(
        path: &std::path::Path,
        offset: usize,
        shape: &[usize],
        dims: impl IntoIterator<Item = D>,
    ) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        // SAFETY: the mapping is read-only and only lives for this call;
        // its contents are copied out before it is dropped.
        #[allow(unsafe_code)]
        let map = unsafe { memmap2::Mmap::map(&file)? };
        if offset > map.len() {
            return buffer_err(format!(
                "offset {offset} is past the end of a {} byte file",
                map.len()
            ));
        }
        tracing::debug!(path = %path.display(), offset, len = map.len(), "mapped file");
        Self::from_buffer(&map[offset..], shape, dims)
    }
}
