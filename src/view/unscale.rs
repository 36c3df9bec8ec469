//! Unscaled views, exposing `raw * scale + offset`.

use std::sync::Arc;

use num_complex::Complex64;

use crate::array::{AbstractArray, MDArray};
use crate::attribute::Attribute;
use crate::data_type::{DataTypeClass, ExtendedDataType, NumericKind};
use crate::dimension::Dimension;
use crate::error::MdError;

use super::{gather, scatter};

struct UnscaledArray {
    parent: Arc<dyn MDArray>,
    full_name: String,
    dims: Vec<Arc<Dimension>>,
    data_type: ExtendedDataType,
    scale: f64,
    offset: f64,
    parent_nodata: Option<f64>,
}

impl UnscaledArray {
    fn is_complex(&self) -> bool {
        self.data_type.numeric_kind() == Some(NumericKind::CFloat64)
    }

    fn temp_buffer(&self, count: &[usize]) -> Result<Vec<u8>, MdError> {
        let element = self.data_type.fixed_size().unwrap_or(8);
        count
            .iter()
            .try_fold(element, |acc, &c| acc.checked_mul(c))
            .map(|len| vec![0u8; len])
            .ok_or_else(|| MdError::OutOfMemory("cannot allocate temporary buffer".to_string()))
    }

    fn matches_nodata(&self, value: f64) -> bool {
        self.parent_nodata
            .is_some_and(|nodata| value == nodata || (nodata.is_nan() && value.is_nan()))
    }

    fn unscale_in_place(&self, temp: &mut [u8]) {
        if self.is_complex() {
            for chunk in temp.chunks_exact_mut(16) {
                let re = f64::from_ne_bytes(chunk[..8].try_into().unwrap_or_default());
                let im = f64::from_ne_bytes(chunk[8..].try_into().unwrap_or_default());
                let out = if self.matches_nodata(re) {
                    Complex64::new(f64::NAN, f64::NAN)
                } else {
                    Complex64::new(re, im) * self.scale + self.offset
                };
                chunk[..8].copy_from_slice(&out.re.to_ne_bytes());
                chunk[8..].copy_from_slice(&out.im.to_ne_bytes());
            }
        } else {
            for chunk in temp.chunks_exact_mut(8) {
                let value = f64::from_ne_bytes(chunk.try_into().unwrap_or_default());
                let out = if self.matches_nodata(value) {
                    f64::NAN
                } else {
                    value * self.scale + self.offset
                };
                chunk.copy_from_slice(&out.to_ne_bytes());
            }
        }
    }

    fn rescale_in_place(&self, temp: &mut [u8]) {
        let inverse = |value: f64| -> f64 {
            if value.is_nan() || self.matches_nodata(value) {
                self.parent_nodata.unwrap_or(value)
            } else {
                (value - self.offset) / self.scale
            }
        };
        if self.is_complex() {
            for chunk in temp.chunks_exact_mut(16) {
                let re = f64::from_ne_bytes(chunk[..8].try_into().unwrap_or_default());
                let im = f64::from_ne_bytes(chunk[8..].try_into().unwrap_or_default());
                if re.is_nan() || self.matches_nodata(re) {
                    let nodata = self.parent_nodata.unwrap_or(re);
                    chunk[..8].copy_from_slice(&nodata.to_ne_bytes());
                    chunk[8..].copy_from_slice(&nodata.to_ne_bytes());
                } else {
                    let out = (Complex64::new(re, im) - self.offset) / self.scale;
                    chunk[..8].copy_from_slice(&out.re.to_ne_bytes());
                    chunk[8..].copy_from_slice(&out.im.to_ne_bytes());
                }
            }
        } else {
            for chunk in temp.chunks_exact_mut(8) {
                let value = f64::from_ne_bytes(chunk.try_into().unwrap_or_default());
                chunk.copy_from_slice(&inverse(value).to_ne_bytes());
            }
        }
    }
}

impl AbstractArray for UnscaledArray {
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
        let mut temp = self.temp_buffer(count)?;
        self.parent.read(
            start,
            count,
            Some(step),
            None,
            &self.data_type,
            &mut temp,
            0,
        )?;
        self.unscale_in_place(&mut temp);
        scatter(
            &temp,
            &self.data_type,
            count,
            stride,
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
        let mut temp = self.temp_buffer(count)?;
        gather(
            buffer,
            buffer_type,
            count,
            stride,
            origin,
            &mut temp,
            &self.data_type,
        )?;
        self.rescale_in_place(&mut temp);
        self.parent
            .write(start, count, Some(step), None, &self.data_type, &temp, 0)
    }
}

impl MDArray for UnscaledArray {
    fn is_writable(&self) -> bool {
        self.parent.is_writable()
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        self.parent.attributes()
    }

    fn raw_nodata(&self) -> Option<Vec<u8>> {
        self.parent_nodata?;
        if self.is_complex() {
            let mut raw = Vec::with_capacity(16);
            raw.extend_from_slice(&f64::NAN.to_ne_bytes());
            raw.extend_from_slice(&f64::NAN.to_ne_bytes());
            Some(raw)
        } else {
            Some(f64::NAN.to_ne_bytes().to_vec())
        }
    }

    fn unit(&self) -> String {
        self.parent.unit()
    }

    fn spatial_ref(&self) -> Option<String> {
        self.parent.spatial_ref()
    }

    fn block_size(&self) -> Vec<u64> {
        self.parent.block_size()
    }
}

/// Return a view exposing `raw * scale + offset` as `Float64` (`CFloat64`
/// for complex parents), with the parent nodata surfaced as NaN. When the
/// parent is non-numeric or carries neither scale nor offset, `array` is
/// returned unchanged.
///
/// # Errors
/// Currently infallible; the `Result` keeps the view constructors uniform.
pub fn unscaled(array: Arc<dyn MDArray>) -> Result<Arc<dyn MDArray>, MdError> {
    if array.data_type().class() != DataTypeClass::Numeric {
        return Ok(array);
    }
    let (scale, offset) = (array.scale(), array.offset());
    if scale.is_none() && offset.is_none() {
        return Ok(array);
    }
    let complex = array
        .data_type()
        .numeric_kind()
        .is_some_and(NumericKind::is_complex);
    let data_type = ExtendedDataType::numeric(if complex {
        NumericKind::CFloat64
    } else {
        NumericKind::Float64
    });
    let full_name = format!("Unscaled view of {}", array.full_name());
    let dims = array.dimensions().to_vec();
    let parent_nodata = array.nodata_as_f64();
    Ok(Arc::new(UnscaledArray {
        scale: scale.unwrap_or(1.0),
        offset: offset.unwrap_or(0.0),
        parent_nodata,
        parent: array,
        full_name,
        dims,
        data_type,
    }))
}
