//! Error handling for the array engine.
//!
//! Every fallible operation returns a [`MdError`]. Each variant maps to a
//! broad [`ErrorCategory`] so callers can react to the failure class without
//! matching on the exact variant.

use thiserror::Error;

/// The broad class of a failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    /// The operation is not supported by the array, view or backend.
    NotSupported,
    /// A precondition on the arguments was violated.
    IllegalArgument,
    /// A buffer or stride computation exceeded addressable memory.
    OutOfMemory,
    /// The backend reported an I/O or internal failure.
    Backend,
    /// A caller-supplied callback requested an early stop.
    Cancelled,
}

/// An incompatible dimensionality.
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
#[error("incompatible dimensionality {_0}, expected {_1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create an [`IncompatibleDimensionalityError`] with `got` dimensionality and `expected` dimensionality.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

/// A data type conversion which the type system does not allow.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("data type {_0} cannot be converted to {_1}")]
pub struct IncompatibleDataTypeError(String, String);

impl IncompatibleDataTypeError {
    /// Create an [`IncompatibleDataTypeError`] from the display names of the two types.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self(from.into(), to.into())
    }
}

/// The error type of the array engine.
#[derive(Debug, Error)]
pub enum MdError {
    /// The operation is not supported.
    #[error("not supported: {_0}")]
    NotSupported(String),
    /// A precondition on the arguments was violated.
    #[error("illegal argument: {_0}")]
    IllegalArgument(String),
    /// A buffer allocation or stride computation would exceed addressable memory.
    #[error("out of memory: {_0}")]
    OutOfMemory(String),
    /// A backend failure.
    #[error("backend failure: {_0}")]
    Backend(String),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// Incompatible data types.
    #[error(transparent)]
    IncompatibleDataType(#[from] IncompatibleDataTypeError),
    /// A callback requested an early stop.
    #[error("operation stopped by callback")]
    Stopped,
}

impl MdError {
    /// Create a [`MdError::NotSupported`] error.
    pub fn not_supported(what: impl Into<String>) -> Self {
        Self::NotSupported(what.into())
    }

    /// Create a [`MdError::IllegalArgument`] error.
    pub fn illegal(what: impl Into<String>) -> Self {
        Self::IllegalArgument(what.into())
    }

    /// The broad category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotSupported(_) => ErrorCategory::NotSupported,
            Self::IllegalArgument(_)
            | Self::IncompatibleDimensionality(_)
            | Self::IncompatibleDataType(_) => ErrorCategory::IllegalArgument,
            Self::OutOfMemory(_) => ErrorCategory::OutOfMemory,
            Self::Backend(_) => ErrorCategory::Backend,
            Self::Stopped => ErrorCategory::Cancelled,
        }
    }
}
