//! Validation of strided read/write requests.

use std::sync::Arc;

use crate::data_type::ExtendedDataType;
use crate::dimension::Dimension;
use crate::error::{IncompatibleDimensionalityError, MdError};

/// A validated request with materialized per-axis steps and buffer strides.
pub(crate) struct Prepared {
    pub steps: Vec<i64>,
    pub strides: Vec<isize>,
}

/// Check the per-axis selection of a request and materialize its steps.
pub(crate) fn check_extent(
    dims: &[Arc<Dimension>],
    start: &[u64],
    count: &[usize],
    step: Option<&[i64]>,
) -> Result<Vec<i64>, MdError> {
    let n = dims.len();
    if start.len() != n {
        return Err(IncompatibleDimensionalityError::new(start.len(), n).into());
    }
    if count.len() != n {
        return Err(IncompatibleDimensionalityError::new(count.len(), n).into());
    }
    if let Some(step) = step {
        if step.len() != n {
            return Err(IncompatibleDimensionalityError::new(step.len(), n).into());
        }
    }
    let steps: Vec<i64> = step.map_or_else(|| vec![1; n], <[i64]>::to_vec);
    for i in 0..n {
        let size = dims[i].size();
        if count[i] == 0 {
            return Err(MdError::IllegalArgument(format!("count[{i}] = 0 is invalid")));
        }
        if start[i] >= size {
            return Err(MdError::IllegalArgument(format!(
                "start[{i}] = {} exceeds dimension {} of size {size}",
                start[i],
                dims[i].name()
            )));
        }
        let span = (count[i] as u128 - 1) * u128::from(steps[i].unsigned_abs());
        if steps[i] >= 0 {
            if u128::from(start[i]) + span > u128::from(size - 1) {
                return Err(MdError::IllegalArgument(format!(
                    "selection along axis {i} goes past the end of dimension {}",
                    dims[i].name()
                )));
            }
        } else if u128::from(start[i]) < span {
            return Err(MdError::IllegalArgument(format!(
                "selection along axis {i} goes past the start of dimension {}",
                dims[i].name()
            )));
        }
    }
    Ok(steps)
}

/// Validate a full read/write request against `dims` and the destination
/// buffer, materializing default steps (1) and strides (packed row-major).
pub(crate) fn prepare(
    dims: &[Arc<Dimension>],
    start: &[u64],
    count: &[usize],
    step: Option<&[i64]>,
    stride: Option<&[isize]>,
    buffer_type: &ExtendedDataType,
    buffer_len: usize,
    origin: usize,
) -> Result<Prepared, MdError> {
    let n = dims.len();
    let element_size = buffer_type.fixed_size().ok_or_else(|| {
        MdError::not_supported("raw access with a variable-sized buffer data type")
    })?;
    if let Some(stride) = stride {
        if stride.len() != n {
            return Err(IncompatibleDimensionalityError::new(stride.len(), n).into());
        }
    }
    if n == 0 {
        let end = origin
            .checked_add(1)
            .and_then(|e| e.checked_mul(element_size));
        return match end {
            Some(end) if end <= buffer_len => Ok(Prepared {
                steps: Vec::new(),
                strides: Vec::new(),
            }),
            _ => Err(MdError::illegal("memory buffer too small")),
        };
    }
    let steps = check_extent(dims, start, count, step)?;
    let strides: Vec<isize> = match stride {
        Some(s) => s.to_vec(),
        None => {
            let mut s = vec![0isize; n];
            let mut acc: i128 = 1;
            for i in (0..n).rev() {
                s[i] = isize::try_from(acc)
                    .map_err(|_| MdError::OutOfMemory("too big count values".to_string()))?;
                acc *= count[i] as i128;
                if acc >= isize::MAX as i128 / 2 {
                    return Err(MdError::OutOfMemory("too big count values".to_string()));
                }
            }
            s
        }
    };
    // Exact extremes of the addressed element offsets relative to `origin`.
    let mut min_offset: i128 = 0;
    let mut max_offset: i128 = 0;
    for i in 0..n {
        let span = strides[i] as i128 * (count[i] as i128 - 1);
        if span < 0 {
            min_offset += span;
        } else {
            max_offset += span;
        }
    }
    let origin = origin as i128;
    if origin + min_offset < 0
        || (origin + max_offset + 1) * element_size as i128 > buffer_len as i128
    {
        return Err(MdError::illegal("memory buffer too small"));
    }
    Ok(Prepared { steps, strides })
}
