//! A format-agnostic engine for strided I/O, views and traversal over
//! multidimensional arrays.
//!
//! The engine models a hierarchy of [groups](group::Group) holding
//! [arrays](array::MDArray), [dimensions](dimension::Dimension) and
//! [attributes](attribute::Attribute). Arrays expose a single strided
//! read/write surface over an [extended data type](data_type::ExtendedDataType)
//! system (numeric, string and compound elements), and compose through lazy
//! [views](view): slicing with a NumPy-like index grammar, axis transposition,
//! compound field extraction, scale/offset unpacking, validity masks and grid
//! resampling. On top of that sit chunked [traversal](array::MDArray::process_per_chunk),
//! [statistics](statistics), and deep [structural copy](group::copy) between
//! backends.
//!
//! The crate ships one backend, the [in-memory backend](memory); storage
//! formats plug in by implementing the [`group::Group`] and
//! [`array::MDArray`] traits.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use hyperslab::array::AbstractArray;
//! use hyperslab::data_type::{ExtendedDataType, NumericKind};
//! use hyperslab::group::Group;
//! use hyperslab::memory::MemoryGroup;
//! use hyperslab::options::OptionList;
//! use hyperslab::view::MDArrayViewExt;
//!
//! let root = MemoryGroup::root();
//! let y = root.create_dimension("y", "", "", 2)?;
//! let x = root.create_dimension("x", "", "", 3)?;
//! let f64_type = ExtendedDataType::numeric(NumericKind::Float64);
//! let array = root.create_array("a", &[y, x], f64_type.clone(), &OptionList::new())?;
//!
//! let values: Vec<u8> = (0..6).flat_map(|v| f64::from(v).to_ne_bytes()).collect();
//! array.write(&[0, 0], &[2, 3], None, None, &f64_type, &values, 0)?;
//!
//! // read back through a view with the row order reversed
//! let flipped = array.view("[::-1,:]")?;
//! let mut out = vec![0u8; 6 * 8];
//! flipped.read(&[0, 0], &[2, 3], None, None, &f64_type, &mut out, 0)?;
//! assert_eq!(f64::from_ne_bytes(out[..8].try_into().unwrap()), 3.0);
//! # Ok::<(), hyperslab::error::MdError>(())
//! ```

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]

pub mod array;
pub mod attribute;
pub mod config;
pub mod data_type;
pub mod dimension;
pub mod error;
pub mod group;
pub mod memory;
pub mod options;
pub mod statistics;
pub mod view;
