//! Views over arrays.
//!
//! Views wrap an array (or another view) and present it with altered shape,
//! type or values, remapping every read and write onto the parent. The
//! variants are slicing/indexing ([`get_view`]), compound field extraction
//! ([`field_view`]), axis transposition ([`transposed`]), scale/offset
//! unpacking ([`unscaled`]), validity masking ([`masked`]) and spatial
//! resampling ([`resampled`](resample::resampled)).
//!
//! The slice grammar follows NumPy basic indexing: bracketed clauses of
//! comma-separated specifiers. `get_view("[1,::2]")` drops the first axis at
//! index 1 and keeps every other element of the second; `get_view("['f']")`
//! extracts field `f` of a compound array. Clauses compose left to right.
//! One difference with NumPy: ranges that would produce zero elements are
//! rejected, dimensions of size 0 not being allowed in the data model.

use std::sync::Arc;

use crate::array::{chunking, MDArray};
use crate::data_type::{DataTypeClass, ExtendedDataType};
use crate::error::MdError;

pub(crate) mod expr;
mod field;
mod mask;
pub mod resample;
mod slice;
mod transpose;
mod unscale;

pub use field::field_view;
pub use mask::masked;
pub use slice::sliced;
pub use transpose::transposed;
pub use unscale::unscaled;

/// Return a view of `array` described by a slicing / field access
/// expression.
///
/// # Errors
/// Returns [`MdError::IllegalArgument`] on a malformed expression, an
/// out-of-bounds index, a zero-element range, or field access on a
/// non-compound array.
pub fn get_view(array: Arc<dyn MDArray>, view_expr: &str) -> Result<Arc<dyn MDArray>, MdError> {
    let clauses = expr::parse_view_expr(view_expr)?;
    let mut current = array;
    for clause in clauses {
        current = match clause {
            expr::Clause::Field(name) => {
                if current.data_type().class() != DataTypeClass::Compound {
                    return Err(MdError::illegal(
                        "field access not allowed on non-compound data type",
                    ));
                }
                field_view(current, &name)?
            }
            expr::Clause::Slice(specs) => slice::create_sliced(current, &specs)?,
        };
    }
    Ok(current)
}

/// Ergonomic view constructors on `Arc<dyn MDArray>`.
pub trait MDArrayViewExt {
    /// See [`get_view`].
    ///
    /// # Errors
    /// See [`get_view`].
    fn view(&self, view_expr: &str) -> Result<Arc<dyn MDArray>, MdError>;

    /// See [`field_view`].
    ///
    /// # Errors
    /// See [`field_view`].
    fn field_view(&self, name: &str) -> Result<Arc<dyn MDArray>, MdError>;

    /// See [`transposed`].
    ///
    /// # Errors
    /// See [`transposed`].
    fn transposed(&self, axis_map: &[Option<usize>]) -> Result<Arc<dyn MDArray>, MdError>;

    /// See [`unscaled`].
    ///
    /// # Errors
    /// See [`unscaled`].
    fn unscaled(&self) -> Result<Arc<dyn MDArray>, MdError>;

    /// See [`masked`].
    ///
    /// # Errors
    /// See [`masked`].
    fn masked(&self) -> Result<Arc<dyn MDArray>, MdError>;
}

impl MDArrayViewExt for Arc<dyn MDArray> {
    fn view(&self, view_expr: &str) -> Result<Arc<dyn MDArray>, MdError> {
        get_view(self.clone(), view_expr)
    }

    fn field_view(&self, name: &str) -> Result<Arc<dyn MDArray>, MdError> {
        field_view(self.clone(), name)
    }

    fn transposed(&self, axis_map: &[Option<usize>]) -> Result<Arc<dyn MDArray>, MdError> {
        transposed(self.clone(), axis_map)
    }

    fn unscaled(&self) -> Result<Arc<dyn MDArray>, MdError> {
        unscaled(self.clone())
    }

    fn masked(&self) -> Result<Arc<dyn MDArray>, MdError> {
        masked(self.clone())
    }
}

/// The element offset inside a buffer of the element at `idx`.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub(crate) fn element_offset(idx: &[usize], stride: &[isize], origin: usize) -> usize {
    let mut offset = origin as isize;
    for (i, s) in idx.iter().zip(stride) {
        offset += *i as isize * *s;
    }
    // the caller's request has been bounds-checked by the read/write entry
    offset as usize
}

/// Copy a packed row-major `temp` buffer into a strided destination buffer,
/// converting each element.
pub(crate) fn scatter(
    temp: &[u8],
    temp_type: &ExtendedDataType,
    count: &[usize],
    stride: &[isize],
    buffer_type: &ExtendedDataType,
    buffer: &mut [u8],
    origin: usize,
) -> Result<(), MdError> {
    let src_size = temp_type
        .fixed_size()
        .ok_or_else(|| MdError::not_supported("variable-sized temporary"))?;
    let dst_size = buffer_type
        .fixed_size()
        .ok_or_else(|| MdError::not_supported("variable-sized buffer data type"))?;
    let mut packed = 0usize;
    chunking::for_each_index(count, &mut |idx| {
        let src = packed * src_size;
        let dst = element_offset(idx, stride, origin) * dst_size;
        ExtendedDataType::copy_value(
            &temp[src..src + src_size],
            temp_type,
            &mut buffer[dst..dst + dst_size],
            buffer_type,
        )?;
        packed += 1;
        Ok(())
    })
}

/// Copy a strided source buffer into a packed row-major `temp` buffer,
/// converting each element.
pub(crate) fn gather(
    buffer: &[u8],
    buffer_type: &ExtendedDataType,
    count: &[usize],
    stride: &[isize],
    origin: usize,
    temp: &mut [u8],
    temp_type: &ExtendedDataType,
) -> Result<(), MdError> {
    let src_size = buffer_type
        .fixed_size()
        .ok_or_else(|| MdError::not_supported("variable-sized buffer data type"))?;
    let dst_size = temp_type
        .fixed_size()
        .ok_or_else(|| MdError::not_supported("variable-sized temporary"))?;
    let mut packed = 0usize;
    chunking::for_each_index(count, &mut |idx| {
        let src = element_offset(idx, stride, origin) * src_size;
        let dst = packed * dst_size;
        ExtendedDataType::copy_value(
            &buffer[src..src + src_size],
            buffer_type,
            &mut temp[dst..dst + dst_size],
            temp_type,
        )?;
        packed += 1;
        Ok(())
    })
}
