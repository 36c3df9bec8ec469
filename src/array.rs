//! Array traits and the strided I/O entry points.
//!
//! [`AbstractArray`] is the common surface of everything that holds elements
//! (arrays and attributes): a data type, a dimension list, and strided
//! read/write. [`MDArray`] adds the array-only surface: attributes, nodata,
//! scale/offset, unit, spatial reference and block size.
//!
//! The public [`AbstractArray::read`] and [`AbstractArray::write`] entry
//! points validate every request (data type convertibility, per-axis extents,
//! buffer bounds) before dispatching to the backend primitives
//! [`AbstractArray::i_read`] / [`AbstractArray::i_write`]. Backends and views
//! implement the primitives and may assume a validated request.

use std::sync::Arc;

use crate::data_type::{ExtendedDataType, NumericKind};
use crate::dimension::Dimension;
use crate::error::{IncompatibleDataTypeError, MdError};
use crate::options::OptionList;

pub mod chunking;
pub(crate) mod validation;

use crate::attribute::Attribute;

/// The callback of a chunked traversal. Receives the chunk start indices,
/// the chunk counts, the 1-based chunk index and the total chunk count.
pub type ChunkCallback<'a> = dyn FnMut(&[u64], &[usize], u64, u64) -> Result<(), MdError> + 'a;

/// A progress callback for long-running operations. Receives the completed
/// fraction in `[0, 1]`; returning `false` cancels the operation.
pub type ProgressFn<'a> = dyn FnMut(f64) -> bool + 'a;

/// The common surface of arrays and attributes.
pub trait AbstractArray: Send + Sync {
    /// The object name.
    fn name(&self) -> String;

    /// The fully qualified object name.
    fn full_name(&self) -> String;

    /// The dimensions, from slowest to fastest varying.
    fn dimensions(&self) -> &[Arc<Dimension>];

    /// The element data type.
    fn data_type(&self) -> &ExtendedDataType;

    /// The number of dimensions.
    fn dimensionality(&self) -> usize {
        self.dimensions().len()
    }

    /// The total number of elements (1 for a zero-dimensional object).
    fn total_element_count(&self) -> u64 {
        self.dimensions().iter().map(|d| d.size()).product()
    }

    /// The backend read primitive. The request has been validated: all
    /// slices have the array dimensionality, the selection is in range, and
    /// `buffer` (with element `origin` and element `stride`s) has room for
    /// every addressed element.
    ///
    /// # Errors
    /// Returns [`MdError`] on backend failure.
    fn i_read(
        &self,
        start: &[u64],
        count: &[usize],
        step: &[i64],
        stride: &[isize],
        buffer_type: &ExtendedDataType,
        buffer: &mut [u8],
        origin: usize,
    ) -> Result<(), MdError>;

    /// The backend write primitive. See [`AbstractArray::i_read`] for the
    /// validated-request contract.
    ///
    /// # Errors
    /// Returns [`MdError::NotSupported`] unless the backend is writable.
    fn i_write(
        &self,
        _start: &[u64],
        _count: &[usize],
        _step: &[i64],
        _stride: &[isize],
        _buffer_type: &ExtendedDataType,
        _buffer: &[u8],
        _origin: usize,
    ) -> Result<(), MdError> {
        Err(MdError::not_supported(format!(
            "{} does not support writing",
            self.name()
        )))
    }

    /// Read a hyperslab into `buffer`, converting elements to `buffer_type`.
    ///
    /// `start` holds the first index per axis, `count` the number of
    /// elements per axis, `step` the index increment per axis (default 1,
    /// may be negative or zero), and `stride` the buffer element spacing per
    /// axis (default packed row-major, may be negative). `origin` is the
    /// element offset inside `buffer` of the element at the start indices.
    ///
    /// # Errors
    /// Returns [`MdError`] if the array data type cannot be converted to
    /// `buffer_type`, if the selection is out of range, or if `buffer` is
    /// too small for the addressed elements.
    fn read(
        &self,
        start: &[u64],
        count: &[usize],
        step: Option<&[i64]>,
        stride: Option<&[isize]>,
        buffer_type: &ExtendedDataType,
        buffer: &mut [u8],
        origin: usize,
    ) -> Result<(), MdError> {
        if !self.data_type().can_convert_to(buffer_type) {
            return Err(IncompatibleDataTypeError::new(
                self.data_type().to_string(),
                buffer_type.to_string(),
            )
            .into());
        }
        let prepared = validation::prepare(
            self.dimensions(),
            start,
            count,
            step,
            stride,
            buffer_type,
            buffer.len(),
            origin,
        )?;
        self.i_read(
            start,
            count,
            &prepared.steps,
            &prepared.strides,
            buffer_type,
            buffer,
            origin,
        )
    }

    /// Write a hyperslab from `buffer`, converting elements from
    /// `buffer_type`. The parameters mirror [`AbstractArray::read`].
    ///
    /// # Errors
    /// Returns [`MdError`] if `buffer_type` cannot be converted to the array
    /// data type, if the selection is out of range, if `buffer` is too
    /// small, or if the backend is not writable.
    fn write(
        &self,
        start: &[u64],
        count: &[usize],
        step: Option<&[i64]>,
        stride: Option<&[isize]>,
        buffer_type: &ExtendedDataType,
        buffer: &[u8],
        origin: usize,
    ) -> Result<(), MdError> {
        if !buffer_type.can_convert_to(self.data_type()) {
            return Err(IncompatibleDataTypeError::new(
                buffer_type.to_string(),
                self.data_type().to_string(),
            )
            .into());
        }
        let prepared = validation::prepare(
            self.dimensions(),
            start,
            count,
            step,
            stride,
            buffer_type,
            buffer.len(),
            origin,
        )?;
        self.i_write(
            start,
            count,
            &prepared.steps,
            &prepared.strides,
            buffer_type,
            buffer,
            origin,
        )
    }

    /// Read a hyperslab of an unbounded string array into `out`, row-major.
    /// `out` must hold exactly the product of `count` elements.
    ///
    /// # Errors
    /// Returns [`MdError::NotSupported`] unless the backend stores
    /// unbounded strings.
    fn read_strings(
        &self,
        _start: &[u64],
        _count: &[usize],
        _out: &mut [String],
    ) -> Result<(), MdError> {
        Err(MdError::not_supported(format!(
            "{} does not support the typed string path",
            self.name()
        )))
    }

    /// Write a hyperslab of an unbounded string array from `values`,
    /// row-major. `values` must hold exactly the product of `count`
    /// elements.
    ///
    /// # Errors
    /// Returns [`MdError::NotSupported`] unless the backend stores
    /// unbounded strings.
    fn write_strings(
        &self,
        _start: &[u64],
        _count: &[usize],
        _values: &[String],
    ) -> Result<(), MdError> {
        Err(MdError::not_supported(format!(
            "{} does not support the typed string path",
            self.name()
        )))
    }
}

/// A multidimensional array.
pub trait MDArray: AbstractArray {
    /// Whether the array accepts writes.
    fn is_writable(&self) -> bool {
        false
    }

    /// The attributes attached to the array.
    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        Vec::new()
    }

    /// Find an attribute by name.
    fn attribute(&self, name: &str) -> Option<Arc<dyn Attribute>> {
        self.attributes().into_iter().find(|a| a.name() == name)
    }

    /// Create an attribute on the array.
    ///
    /// # Errors
    /// Returns [`MdError::NotSupported`] unless the backend supports
    /// attribute creation.
    fn create_attribute(
        &self,
        _name: &str,
        _dim_sizes: &[u64],
        _data_type: ExtendedDataType,
        _options: &OptionList,
    ) -> Result<Arc<dyn Attribute>, MdError> {
        Err(MdError::not_supported("attribute creation"))
    }

    /// The nodata value as raw bytes of the array data type.
    fn raw_nodata(&self) -> Option<Vec<u8>> {
        None
    }

    /// Set or clear the nodata value, given as raw bytes of the array data
    /// type.
    ///
    /// # Errors
    /// Returns [`MdError::NotSupported`] unless the backend supports it.
    fn set_raw_nodata(&self, _nodata: Option<&[u8]>) -> Result<(), MdError> {
        Err(MdError::not_supported("setting a nodata value"))
    }

    /// The nodata value converted to `f64`, if one is set and convertible.
    fn nodata_as_f64(&self) -> Option<f64> {
        let raw = self.raw_nodata()?;
        let mut out = [0u8; 8];
        ExtendedDataType::copy_value(
            &raw,
            self.data_type(),
            &mut out,
            &ExtendedDataType::numeric(NumericKind::Float64),
        )
        .ok()?;
        Some(f64::from_ne_bytes(out))
    }

    /// Set the nodata value from an `f64`, converting it to the array data
    /// type.
    ///
    /// # Errors
    /// Returns [`MdError`] if the conversion or the backend update fails.
    fn set_nodata_f64(&self, value: f64) -> Result<(), MdError> {
        let size = self
            .data_type()
            .fixed_size()
            .ok_or_else(|| MdError::not_supported("nodata on a variable-sized data type"))?;
        let mut raw = vec![0u8; size];
        ExtendedDataType::copy_value(
            &value.to_ne_bytes(),
            &ExtendedDataType::numeric(NumericKind::Float64),
            &mut raw,
            self.data_type(),
        )?;
        self.set_raw_nodata(Some(&raw))
    }

    /// The value offset of the `raw * scale + offset` unpacking, if set.
    fn offset(&self) -> Option<f64> {
        None
    }

    /// The value scale of the `raw * scale + offset` unpacking, if set.
    fn scale(&self) -> Option<f64> {
        None
    }

    /// Set or clear the value offset.
    ///
    /// # Errors
    /// Returns [`MdError::NotSupported`] unless the backend supports it.
    fn set_offset(&self, _offset: Option<f64>) -> Result<(), MdError> {
        Err(MdError::not_supported("setting an offset"))
    }

    /// Set or clear the value scale.
    ///
    /// # Errors
    /// Returns [`MdError::NotSupported`] unless the backend supports it.
    fn set_scale(&self, _scale: Option<f64>) -> Result<(), MdError> {
        Err(MdError::not_supported("setting a scale"))
    }

    /// The unit of the array values, empty when unknown.
    fn unit(&self) -> String {
        String::new()
    }

    /// Set the unit of the array values.
    ///
    /// # Errors
    /// Returns [`MdError::NotSupported`] unless the backend supports it.
    fn set_unit(&self, _unit: &str) -> Result<(), MdError> {
        Err(MdError::not_supported("setting a unit"))
    }

    /// The spatial reference system as WKT, if set.
    fn spatial_ref(&self) -> Option<String> {
        None
    }

    /// Set or clear the spatial reference system (WKT).
    ///
    /// # Errors
    /// Returns [`MdError::NotSupported`] unless the backend supports it.
    fn set_spatial_ref(&self, _wkt: Option<&str>) -> Result<(), MdError> {
        Err(MdError::not_supported("setting a spatial reference"))
    }

    /// The natural block size per axis. 0 means no natural blocking along
    /// that axis.
    fn block_size(&self) -> Vec<u64> {
        vec![0; self.dimensionality()]
    }

    /// A chunk shape suited to whole-array traversal under `max_bytes` of
    /// temporary buffer, derived from the natural [block
    /// size](MDArray::block_size). See
    /// [`chunking::processing_chunk_size`].
    fn processing_chunk_size(&self, max_bytes: usize) -> Vec<usize> {
        let dim_sizes: Vec<u64> = self.dimensions().iter().map(|d| d.size()).collect();
        let element_size = self.data_type().fixed_size().unwrap_or(1).max(1);
        chunking::processing_chunk_size(&dim_sizes, &self.block_size(), element_size, max_bytes)
    }

    /// Invoke `callback` for every chunk of `chunk_size` intersecting the
    /// selection. See [`chunking::process_per_chunk`].
    ///
    /// # Errors
    /// Returns [`MdError`] on inconsistent parameters or when the callback
    /// fails.
    fn process_per_chunk(
        &self,
        start: &[u64],
        count: &[u64],
        chunk_size: &[usize],
        callback: &mut ChunkCallback<'_>,
    ) -> Result<(), MdError> {
        let dim_sizes: Vec<u64> = self.dimensions().iter().map(|d| d.size()).collect();
        chunking::process_per_chunk(&dim_sizes, start, count, chunk_size, callback)
    }
}

impl std::fmt::Debug for dyn MDArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MDArray")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
