//! Array and group attributes.

use crate::array::AbstractArray;
use crate::data_type::{read_string_slot, DataTypeSize, ExtendedDataType, NumericKind};
use crate::error::MdError;

/// Byte width of the string slots used by the typed attribute helpers when
/// formatting fixed-size elements.
const STRING_SLOT_LEN: usize = 128;

/// A named piece of metadata attached to a group or an array.
///
/// Attributes are small arrays themselves and expose the full strided I/O
/// surface of [`AbstractArray`]. The helpers below cover the common case of
/// reading or writing the whole attribute through a scalar type.
pub trait Attribute: AbstractArray {
    /// Read the first element as a string, formatting numeric values.
    ///
    /// # Errors
    /// Returns [`MdError`] on backend failure.
    fn read_as_string(&self) -> Result<String, MdError> {
        let start = vec![0u64; self.dimensionality()];
        let count = vec![1usize; self.dimensionality()];
        if self.data_type().size() == DataTypeSize::Variable {
            let mut out = vec![String::new()];
            self.read_strings(&start, &count, &mut out)?;
            return Ok(out.pop().unwrap_or_default());
        }
        let slot = ExtendedDataType::string(STRING_SLOT_LEN);
        let mut buffer = vec![0u8; STRING_SLOT_LEN];
        self.read(&start, &count, None, None, &slot, &mut buffer, 0)?;
        Ok(read_string_slot(&buffer).into_owned())
    }

    /// Read every element as a string, row-major.
    ///
    /// # Errors
    /// Returns [`MdError`] on backend failure or an unaddressable extent.
    fn read_as_string_vec(&self) -> Result<Vec<String>, MdError> {
        let start = vec![0u64; self.dimensionality()];
        let count = extent_counts(self)?;
        let total: usize = count.iter().product();
        if self.data_type().size() == DataTypeSize::Variable {
            let mut out = vec![String::new(); total];
            self.read_strings(&start, &count, &mut out)?;
            return Ok(out);
        }
        let slot = ExtendedDataType::string(STRING_SLOT_LEN);
        let mut buffer = vec![0u8; STRING_SLOT_LEN * total];
        self.read(&start, &count, None, None, &slot, &mut buffer, 0)?;
        Ok(buffer
            .chunks_exact(STRING_SLOT_LEN)
            .map(|chunk| read_string_slot(chunk).into_owned())
            .collect())
    }

    /// Read the first element as an `f64`, parsing string values (an
    /// unparsable string reads as 0).
    ///
    /// # Errors
    /// Returns [`MdError`] on backend failure.
    fn read_as_f64(&self) -> Result<f64, MdError> {
        if self.data_type().class() == crate::data_type::DataTypeClass::String {
            return Ok(self.read_as_string()?.trim().parse().unwrap_or(0.0));
        }
        let start = vec![0u64; self.dimensionality()];
        let count = vec![1usize; self.dimensionality()];
        let mut buffer = [0u8; 8];
        self.read(
            &start,
            &count,
            None,
            None,
            &ExtendedDataType::numeric(NumericKind::Float64),
            &mut buffer,
            0,
        )?;
        Ok(f64::from_ne_bytes(buffer))
    }

    /// Read every element as an `f64`, row-major.
    ///
    /// # Errors
    /// Returns [`MdError`] on backend failure or an unaddressable extent.
    fn read_as_f64_vec(&self) -> Result<Vec<f64>, MdError> {
        if self.data_type().class() == crate::data_type::DataTypeClass::String {
            return Ok(self
                .read_as_string_vec()?
                .iter()
                .map(|s| s.trim().parse().unwrap_or(0.0))
                .collect());
        }
        let start = vec![0u64; self.dimensionality()];
        let count = extent_counts(self)?;
        let total: usize = count.iter().product();
        let mut buffer = vec![0u8; 8 * total];
        self.read(
            &start,
            &count,
            None,
            None,
            &ExtendedDataType::numeric(NumericKind::Float64),
            &mut buffer,
            0,
        )?;
        Ok(buffer
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_ne_bytes(raw)
            })
            .collect())
    }

    /// Write `value` into the first element, converting to the attribute
    /// data type.
    ///
    /// # Errors
    /// Returns [`MdError`] on conversion or backend failure.
    fn write_string(&self, value: &str) -> Result<(), MdError> {
        let start = vec![0u64; self.dimensionality()];
        let count = vec![1usize; self.dimensionality()];
        if self.data_type().size() == DataTypeSize::Variable {
            return self.write_strings(&start, &count, &[value.to_string()]);
        }
        let slot_len = value.len().max(1);
        let mut slot = vec![0u8; slot_len];
        slot[..value.len()].copy_from_slice(value.as_bytes());
        self.write(
            &start,
            &count,
            None,
            None,
            &ExtendedDataType::string(slot_len),
            &slot,
            0,
        )
    }

    /// Write `value` into the first element, converting to the attribute
    /// data type.
    ///
    /// # Errors
    /// Returns [`MdError`] on conversion or backend failure.
    fn write_f64(&self, value: f64) -> Result<(), MdError> {
        let start = vec![0u64; self.dimensionality()];
        let count = vec![1usize; self.dimensionality()];
        self.write(
            &start,
            &count,
            None,
            None,
            &ExtendedDataType::numeric(NumericKind::Float64),
            &value.to_ne_bytes(),
            0,
        )
    }

    /// Write the whole attribute from `values`, row-major.
    ///
    /// # Errors
    /// Returns [`MdError`] if `values` does not match the attribute extent
    /// or on backend failure.
    fn write_f64_slice(&self, values: &[f64]) -> Result<(), MdError> {
        let start = vec![0u64; self.dimensionality()];
        let count = extent_counts(self)?;
        let total: usize = count.iter().product();
        if values.len() != total {
            return Err(MdError::IllegalArgument(format!(
                "expected {total} values, got {}",
                values.len()
            )));
        }
        let mut buffer = Vec::with_capacity(8 * total);
        for value in values {
            buffer.extend_from_slice(&value.to_ne_bytes());
        }
        self.write(
            &start,
            &count,
            None,
            None,
            &ExtendedDataType::numeric(NumericKind::Float64),
            &buffer,
            0,
        )
    }
}

fn extent_counts(attr: &(impl Attribute + ?Sized)) -> Result<Vec<usize>, MdError> {
    attr.dimensions()
        .iter()
        .map(|d| {
            usize::try_from(d.size())
                .map_err(|_| MdError::OutOfMemory("attribute too large".to_string()))
        })
        .collect()
}
