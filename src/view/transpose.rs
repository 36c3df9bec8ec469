//! Transposed views.

use std::sync::Arc;

use crate::array::{AbstractArray, MDArray};
use crate::attribute::Attribute;
use crate::data_type::ExtendedDataType;
use crate::dimension::Dimension;
use crate::error::MdError;

struct TransposedArray {
    parent: Arc<dyn MDArray>,
    full_name: String,
    dims: Vec<Arc<Dimension>>,
    // per view axis, the parent axis it maps to (None inserts a size-1 axis)
    axis_map: Vec<Option<usize>>,
}

impl TransposedArray {
    fn map_to_parent(
        &self,
        start: &[u64],
        count: &[usize],
        step: &[i64],
        stride: &[isize],
    ) -> (Vec<u64>, Vec<usize>, Vec<i64>, Vec<isize>) {
        let n_parent = self.parent.dimensionality();
        let mut p_start = vec![0u64; n_parent];
        let mut p_count = vec![1usize; n_parent];
        let mut p_step = vec![1i64; n_parent];
        let mut p_stride = vec![0isize; n_parent];
        for (i, mapped) in self.axis_map.iter().enumerate() {
            let Some(p) = *mapped else { continue };
            p_start[p] = start[i];
            p_count[p] = count[i];
            p_step[p] = step[i];
            p_stride[p] = stride[i];
        }
        (p_start, p_count, p_step, p_stride)
    }
}

impl AbstractArray for TransposedArray {
    fn name(&self) -> String {
        String::new()
    }

    fn full_name(&self) -> String {
        self.full_name.clone()
    }

    fn dimensions(&self) -> &[Arc<Dimension>] {
        &self.dims
    }

    fn data_type(&self) -> &ExtendedDataType {
        self.parent.data_type()
    }

    fn i_read(
        &self,
        start: &[u64],
        count: &[usize],
        step: &[i64],
        stride: &[isize],
        buffer_type: &ExtendedDataType,
        buffer: &mut [u8],
        origin: usize,
    ) -> Result<(), MdError> {
        let (p_start, p_count, p_step, p_stride) = self.map_to_parent(start, count, step, stride);
        self.parent.read(
            &p_start,
            &p_count,
            Some(&p_step),
            Some(&p_stride),
            buffer_type,
            buffer,
            origin,
        )
    }

    fn i_write(
        &self,
        start: &[u64],
        count: &[usize],
        step: &[i64],
        stride: &[isize],
        buffer_type: &ExtendedDataType,
        buffer: &[u8],
        origin: usize,
    ) -> Result<(), MdError> {
        let (p_start, p_count, p_step, p_stride) = self.map_to_parent(start, count, step, stride);
        self.parent.write(
            &p_start,
            &p_count,
            Some(&p_step),
            Some(&p_stride),
            buffer_type,
            buffer,
            origin,
        )
    }
}

impl MDArray for TransposedArray {
    fn is_writable(&self) -> bool {
        self.parent.is_writable()
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        self.parent.attributes()
    }

    fn raw_nodata(&self) -> Option<Vec<u8>> {
        self.parent.raw_nodata()
    }

    fn offset(&self) -> Option<f64> {
        self.parent.offset()
    }

    fn scale(&self) -> Option<f64> {
        self.parent.scale()
    }

    fn unit(&self) -> String {
        self.parent.unit()
    }

    fn spatial_ref(&self) -> Option<String> {
        self.parent.spatial_ref()
    }

    fn block_size(&self) -> Vec<u64> {
        let parent_block = self.parent.block_size();
        self.axis_map
            .iter()
            .map(|mapped| mapped.map_or(0, |p| parent_block[p]))
            .collect()
    }
}

/// Return a transposed view of `array`.
///
/// `axis_map` gives, for each axis of the view, the parent axis it exposes;
/// `None` entries insert new axes of size 1. Every parent axis must appear
/// exactly once.
///
/// # Errors
/// Returns [`MdError::IllegalArgument`] if an entry is out of range, a
/// parent axis is repeated, or a parent axis is missing.
pub fn transposed(
    array: Arc<dyn MDArray>,
    axis_map: &[Option<usize>],
) -> Result<Arc<dyn MDArray>, MdError> {
    let parent_dims = array.dimensions().to_vec();
    let n_parent = parent_dims.len();
    let mut used = vec![false; n_parent];
    for mapped in axis_map {
        let Some(p) = *mapped else { continue };
        if p >= n_parent {
            return Err(MdError::IllegalArgument(format!(
                "axis {p} is out of range"
            )));
        }
        if used[p] {
            return Err(MdError::IllegalArgument(format!("axis {p} is repeated")));
        }
        used[p] = true;
    }
    if used.iter().any(|u| !u) {
        return Err(MdError::illegal(
            "transposition must use every source axis exactly once",
        ));
    }
    let dims = axis_map
        .iter()
        .map(|mapped| {
            mapped.map_or_else(
                || Dimension::new("", "newaxis", "", "", 1),
                |p| parent_dims[p].clone(),
            )
        })
        .collect();
    let full_name = format!("Transposed view of {}", array.full_name());
    Ok(Arc::new(TransposedArray {
        parent: array,
        full_name,
        dims,
        axis_map: axis_map.to_vec(),
    }))
}
