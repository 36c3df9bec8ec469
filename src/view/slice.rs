//! Sliced and indexed views.

use std::sync::Arc;

use crate::array::{AbstractArray, MDArray};
use crate::attribute::Attribute;
use crate::data_type::ExtendedDataType;
use crate::dimension::Dimension;
use crate::error::MdError;

use super::expr::{self, Specifier};

/// The selection a sliced view applies along one parent axis. `incr == 0`
/// marks a dropped axis fixed at `start`.
struct AxisRange {
    start: u64,
    incr: i64,
}

struct SlicedArray {
    parent: Arc<dyn MDArray>,
    full_name: String,
    dims: Vec<Arc<Dimension>>,
    // per view axis, the parent axis it maps to (None for newaxis)
    dim_map: Vec<Option<usize>>,
    // per parent axis
    parent_ranges: Vec<AxisRange>,
}

impl SlicedArray {
    #[allow(clippy::cast_sign_loss)]
    fn map_to_parent(
        &self,
        start: &[u64],
        count: &[usize],
        step: &[i64],
        stride: &[isize],
    ) -> (Vec<u64>, Vec<usize>, Vec<i64>, Vec<isize>) {
        let n_parent = self.parent_ranges.len();
        let mut p_start: Vec<u64> = self.parent_ranges.iter().map(|r| r.start).collect();
        let mut p_count = vec![1usize; n_parent];
        let mut p_step = vec![1i64; n_parent];
        let mut p_stride = vec![0isize; n_parent];
        for (i, mapped) in self.dim_map.iter().enumerate() {
            let Some(p) = *mapped else { continue };
            let range = &self.parent_ranges[p];
            p_start[p] = if range.incr >= 0 {
                range.start + start[i] * range.incr as u64
            } else {
                range.start - start[i] * range.incr.unsigned_abs()
            };
            p_count[p] = count[i];
            p_step[p] = if count[i] == 1 { 1 } else { step[i] * range.incr };
            p_stride[p] = stride[i];
        }
        (p_start, p_count, p_step, p_stride)
    }
}

impl AbstractArray for SlicedArray {
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

impl MDArray for SlicedArray {
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
        self.dim_map
            .iter()
            .map(|mapped| mapped.map_or(0, |p| parent_block[p]))
            .collect()
    }
}

/// Return a sliced view of `array` from a bare slice clause, e.g. `"1:3,::-1"`.
///
/// # Errors
/// Returns [`MdError::IllegalArgument`] on a malformed clause, an
/// out-of-bounds index or a zero-element range.
pub fn sliced(array: Arc<dyn MDArray>, slice_expr: &str) -> Result<Arc<dyn MDArray>, MdError> {
    create_sliced(array, &expr::parse_slice_specifiers(slice_expr)?)
}

#[allow(clippy::too_many_lines, clippy::cast_sign_loss)]
pub(crate) fn create_sliced(
    parent: Arc<dyn MDArray>,
    specs: &[Specifier],
) -> Result<Arc<dyn MDArray>, MdError> {
    let src_dims = parent.dimensions().to_vec();
    if src_dims.is_empty() {
        return Err(MdError::illegal("cannot slice a 0-d array"));
    }
    let n_src = src_dims.len();
    let n_tokens = specs.len();
    let mut new_dims: Vec<Arc<Dimension>> = Vec::with_capacity(n_tokens);
    let mut dim_map: Vec<Option<usize>> = Vec::with_capacity(n_tokens);
    let mut parent_ranges: Vec<AxisRange> = Vec::with_capacity(n_src);
    let mut got_ellipsis = false;
    let mut cur_src = 0usize;
    for spec in specs {
        match spec {
            Specifier::Ellipsis => {
                if got_ellipsis {
                    return Err(MdError::illegal("only one single ellipsis is supported"));
                }
                got_ellipsis = true;
                let substitution = n_src.saturating_sub(n_tokens - 1);
                for _ in 0..substitution {
                    if cur_src >= n_src {
                        break;
                    }
                    parent_ranges.push(AxisRange { start: 0, incr: 1 });
                    new_dims.push(src_dims[cur_src].clone());
                    dim_map.push(Some(cur_src));
                    cur_src += 1;
                }
            }
            Specifier::NewAxis => {
                new_dims.push(Dimension::new("", "newaxis", "", "", 1));
                dim_map.push(None);
            }
            Specifier::Index(value) => {
                if cur_src >= n_src {
                    return Err(MdError::illegal("too many values in slice expression"));
                }
                let size = src_dims[cur_src].size();
                if (*value >= 0 && *value as u64 >= size)
                    || (*value < 0 && size < value.unsigned_abs())
                {
                    return Err(MdError::IllegalArgument(format!(
                        "index {value} is out of bounds"
                    )));
                }
                let idx = if *value < 0 {
                    size - value.unsigned_abs()
                } else {
                    *value as u64
                };
                parent_ranges.push(AxisRange {
                    start: idx,
                    incr: 0,
                });
                cur_src += 1;
            }
            Specifier::Range { start, stop, step } => {
                if cur_src >= n_src {
                    return Err(MdError::illegal("too many values in slice expression"));
                }
                let size = src_dims[cur_src].size();
                let incr = step.unwrap_or(1);
                if incr == 0 {
                    return Err(MdError::illegal("invalid increment 0"));
                }
                let mut start_idx: u64 = match start {
                    Some(s) if *s < 0 => size.saturating_sub(s.unsigned_abs()),
                    Some(s) => *s as u64,
                    None if incr > 0 => 0,
                    None => size - 1,
                };
                if start_idx >= size - 1 {
                    start_idx = size - 1;
                }
                let end_idx: u64 = match stop {
                    Some(e) if *e < 0 => size.saturating_sub(e.unsigned_abs()),
                    Some(e) => *e as u64,
                    None if incr < 0 => 0,
                    None => size,
                };
                if (incr > 0 && start_idx >= end_idx) || (incr < 0 && start_idx <= end_idx) {
                    return Err(MdError::illegal(
                        "output dimension of size 0 is not allowed",
                    ));
                }
                let inc: u64 = u64::from(stop.is_none() && incr < 0);
                let ustep = incr.unsigned_abs();
                let new_size = if incr > 0 {
                    (end_idx - start_idx) / ustep
                        + u64::from((inc + end_idx - start_idx) % ustep != 0)
                } else {
                    (inc + start_idx - end_idx) / ustep
                        + u64::from((inc + start_idx - end_idx) % ustep != 0)
                };
                if start_idx == 0 && incr == 1 && new_size == size {
                    new_dims.push(src_dims[cur_src].clone());
                } else {
                    let name = format!(
                        "subset_{}_{start_idx}_{incr}_{new_size}",
                        src_dims[cur_src].name()
                    );
                    let direction = if incr > 0 {
                        src_dims[cur_src].direction().to_string()
                    } else {
                        String::new()
                    };
                    new_dims.push(Dimension::new(
                        "",
                        name,
                        src_dims[cur_src].dim_type(),
                        direction,
                        new_size,
                    ));
                }
                dim_map.push(Some(cur_src));
                parent_ranges.push(AxisRange {
                    start: start_idx,
                    incr,
                });
                cur_src += 1;
            }
        }
    }
    for i in cur_src..n_src {
        parent_ranges.push(AxisRange { start: 0, incr: 1 });
        new_dims.push(src_dims[i].clone());
        dim_map.push(Some(i));
    }
    let full_name = format!("Sliced view of {}", parent.full_name());
    Ok(Arc::new(SlicedArray {
        parent,
        full_name,
        dims: new_dims,
        dim_map,
        parent_ranges,
    }))
}
