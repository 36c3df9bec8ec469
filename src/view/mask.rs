//! Validity mask views.

use std::sync::Arc;

use crate::array::{AbstractArray, MDArray};
use crate::attribute::Attribute;
use crate::data_type::{DataTypeClass, ExtendedDataType, NumericKind};
use crate::dimension::Dimension;
use crate::error::MdError;

use super::scatter;

struct MaskArray {
    parent: Arc<dyn MDArray>,
    full_name: String,
    dims: Vec<Arc<Dimension>>,
    data_type: ExtendedDataType,
    nodata: Option<f64>,
    fill_values: Vec<f64>,
    valid_min: Option<f64>,
    valid_max: Option<f64>,
    // integer parent with no criteria: every element is valid
    all_valid: bool,
}

impl MaskArray {
    fn element_valid(&self, value: f64) -> u8 {
        // NaN can never equal a fill value or satisfy a range check
        if value.is_nan() {
            return 0;
        }
        if self.nodata.is_some_and(|nodata| value == nodata) {
            return 0;
        }
        if self.fill_values.contains(&value) {
            return 0;
        }
        if self.valid_min.is_some_and(|min| value < min)
            || self.valid_max.is_some_and(|max| value > max)
        {
            return 0;
        }
        1
    }
}

impl AbstractArray for MaskArray {
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
        &self.data_type
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
        let total = count
            .iter()
            .try_fold(1usize, |acc, &c| acc.checked_mul(c))
            .ok_or_else(|| MdError::OutOfMemory("cannot allocate temporary buffer".to_string()))?;
        let mask: Vec<u8> = if self.all_valid {
            vec![1u8; total]
        } else {
            let mut temp = vec![0u8; total.checked_mul(8).ok_or_else(|| {
                MdError::OutOfMemory("cannot allocate temporary buffer".to_string())
            })?];
            self.parent.read(
                start,
                count,
                Some(step),
                None,
                &ExtendedDataType::numeric(NumericKind::Float64),
                &mut temp,
                0,
            )?;
            temp.chunks_exact(8)
                .map(|chunk| {
                    let value = f64::from_ne_bytes(chunk.try_into().unwrap_or_default());
                    self.element_valid(value)
                })
                .collect()
        };
        scatter(
            &mask,
            &self.data_type,
            count,
            stride,
            buffer_type,
            buffer,
            origin,
        )
    }
}

impl MDArray for MaskArray {
    fn block_size(&self) -> Vec<u64> {
        self.parent.block_size()
    }
}

fn attribute_f64(array: &Arc<dyn MDArray>, name: &str) -> Result<Option<f64>, MdError> {
    array.attribute(name).map(|a| a.read_as_f64()).transpose()
}

/// Return a read-only `UInt8` validity mask of `array` (1 = valid).
///
/// An element is invalid when it is NaN, equals the nodata value, a
/// `missing_value` or `_FillValue` attribute value, or falls outside
/// `valid_min` / `valid_max` / `valid_range`. A fill match wins even when
/// the value lies inside the valid range. An integer array with none of
/// those criteria short-circuits to an all-ones mask without reading.
///
/// # Errors
/// Returns [`MdError`] if `array` is non-numeric or a criteria attribute
/// cannot be read.
pub fn masked(array: Arc<dyn MDArray>) -> Result<Arc<dyn MDArray>, MdError> {
    if array.data_type().class() != DataTypeClass::Numeric {
        return Err(MdError::not_supported(
            "masks are only supported for numeric arrays",
        ));
    }
    let nodata = array.nodata_as_f64();
    let mut fill_values = Vec::new();
    for name in ["missing_value", "_FillValue"] {
        if let Some(value) = attribute_f64(&array, name)? {
            fill_values.push(value);
        }
    }
    let mut valid_min = attribute_f64(&array, "valid_min")?;
    let mut valid_max = attribute_f64(&array, "valid_max")?;
    if let Some(range) = array.attribute("valid_range") {
        let values = range.read_as_f64_vec()?;
        if values.len() >= 2 {
            valid_min = Some(values[0]);
            valid_max = Some(values[1]);
        }
    }
    let no_criteria = nodata.is_none()
        && fill_values.is_empty()
        && valid_min.is_none()
        && valid_max.is_none();
    let all_valid = no_criteria
        && array
            .data_type()
            .numeric_kind()
            .is_some_and(NumericKind::is_integer);
    let full_name = format!("Mask of {}", array.full_name());
    let dims = array.dimensions().to_vec();
    Ok(Arc::new(MaskArray {
        parent: array,
        full_name,
        dims,
        data_type: ExtendedDataType::numeric(NumericKind::UInt8),
        nodata,
        fill_values,
        valid_min,
        valid_max,
        all_valid,
    }))
}
