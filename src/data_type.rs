//! Element data types.
//!
//! An [`ExtendedDataType`] describes one array element: a primitive numeric
//! kind, a string, or a compound of named components at byte offsets.
//! Fixed-size types flow through the raw strided I/O engine as byte slots;
//! strings with no length bound report [`DataTypeSize::Variable`] and are
//! served by the typed string path instead.

use derive_more::Display;
use num::ToPrimitive;

use crate::error::{IncompatibleDataTypeError, MdError};

/// The class of an [`ExtendedDataType`].
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum DataTypeClass {
    /// A primitive numeric type.
    Numeric,
    /// A string type.
    String,
    /// A compound of named components.
    Compound,
}

/// A primitive numeric kind.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum NumericKind {
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Complex of two signed 16-bit integers.
    CInt16,
    /// Complex of two signed 32-bit integers.
    CInt32,
    /// Complex of two 32-bit floating point values.
    CFloat32,
    /// Complex of two 64-bit floating point values.
    CFloat64,
}

impl NumericKind {
    /// The size of an element of this kind in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 | Self::CInt16 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 | Self::CInt32 | Self::CFloat32 => 8,
            Self::CFloat64 => 16,
        }
    }

    /// Whether this kind holds a complex value.
    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(
            self,
            Self::CInt16 | Self::CInt32 | Self::CFloat32 | Self::CFloat64
        )
    }

    /// Whether this kind is a non-complex integer.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::UInt8
                | Self::Int8
                | Self::UInt16
                | Self::Int16
                | Self::UInt32
                | Self::Int32
                | Self::UInt64
                | Self::Int64
        )
    }

    /// Whether this kind is a non-complex floating point kind.
    #[must_use]
    pub const fn is_floating(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// The inclusive integer value range of this kind, for integer kinds.
    #[must_use]
    pub const fn integer_range(self) -> Option<(i128, i128)> {
        match self {
            Self::UInt8 => Some((0, u8::MAX as i128)),
            Self::Int8 => Some((i8::MIN as i128, i8::MAX as i128)),
            Self::UInt16 => Some((0, u16::MAX as i128)),
            Self::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            Self::UInt32 => Some((0, u32::MAX as i128)),
            Self::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            Self::UInt64 => Some((0, u64::MAX as i128)),
            Self::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            _ => None,
        }
    }
}

/// The size of a data type.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataTypeSize {
    /// Fixed size (in bytes).
    Fixed(usize),
    /// Variable size.
    Variable,
}

/// A named component of a compound data type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompoundComponent {
    name: String,
    offset: usize,
    data_type: ExtendedDataType,
}

impl CompoundComponent {
    /// Create a compound component.
    #[must_use]
    pub fn new(name: impl Into<String>, offset: usize, data_type: ExtendedDataType) -> Self {
        Self {
            name: name.into(),
            offset,
            data_type,
        }
    }

    /// The component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The byte offset of the component within the compound element.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The component data type.
    #[must_use]
    pub const fn data_type(&self) -> &ExtendedDataType {
        &self.data_type
    }
}

/// An element data type. Equality is structural.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExtendedDataType {
    /// A primitive numeric type.
    Numeric(NumericKind),
    /// A string, NUL-padded into `max_len` byte slots when `max_len > 0`,
    /// of unbounded (variable) size when `max_len == 0`.
    String {
        /// Maximum string length in bytes, 0 for unbounded.
        max_len: usize,
    },
    /// A compound of named components.
    Compound {
        /// The compound type name.
        name: String,
        /// The total element size in bytes.
        size: usize,
        /// The ordered components.
        components: Vec<CompoundComponent>,
    },
}

/// Compound total sizes beyond this are rejected at creation.
const MAX_COMPOUND_SIZE: usize = (i32::MAX / 2) as usize;

impl ExtendedDataType {
    /// Create a numeric data type.
    #[must_use]
    pub const fn numeric(kind: NumericKind) -> Self {
        Self::Numeric(kind)
    }

    /// Create a string data type. `max_len == 0` means unbounded.
    #[must_use]
    pub const fn string(max_len: usize) -> Self {
        Self::String { max_len }
    }

    /// Create a compound data type.
    ///
    /// # Errors
    /// Returns [`MdError::IllegalArgument`] if `components` is empty, holds a
    /// variable-sized component, has offsets that are not monotonically
    /// non-decreasing, or does not fit in `size`.
    pub fn compound(
        name: impl Into<String>,
        size: usize,
        components: Vec<CompoundComponent>,
    ) -> Result<Self, MdError> {
        if components.is_empty() {
            return Err(MdError::illegal("compound type with no components"));
        }
        if size == 0 || size > MAX_COMPOUND_SIZE {
            return Err(MdError::IllegalArgument(format!(
                "invalid compound size {size}"
            )));
        }
        let mut last_offset = 0usize;
        for component in &components {
            let DataTypeSize::Fixed(component_size) = component.data_type.size() else {
                return Err(MdError::IllegalArgument(format!(
                    "compound component {} has no fixed size",
                    component.name
                )));
            };
            if component.offset < last_offset {
                return Err(MdError::IllegalArgument(format!(
                    "compound component {} overlaps the previous component",
                    component.name
                )));
            }
            last_offset = component
                .offset
                .checked_add(component_size)
                .ok_or_else(|| MdError::illegal("compound component offset overflow"))?;
        }
        if size < last_offset {
            return Err(MdError::IllegalArgument(format!(
                "compound size {size} smaller than its components ({last_offset})"
            )));
        }
        Ok(Self::Compound {
            name: name.into(),
            size,
            components,
        })
    }

    /// The class of this data type.
    #[must_use]
    pub const fn class(&self) -> DataTypeClass {
        match self {
            Self::Numeric(_) => DataTypeClass::Numeric,
            Self::String { .. } => DataTypeClass::String,
            Self::Compound { .. } => DataTypeClass::Compound,
        }
    }

    /// The type name. Empty except for compound types.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Compound { name, .. } => name,
            _ => "",
        }
    }

    /// The size of one element.
    #[must_use]
    pub const fn size(&self) -> DataTypeSize {
        match self {
            Self::Numeric(kind) => DataTypeSize::Fixed(kind.size()),
            Self::String { max_len: 0 } => DataTypeSize::Variable,
            Self::String { max_len } => DataTypeSize::Fixed(*max_len),
            Self::Compound { size, .. } => DataTypeSize::Fixed(*size),
        }
    }

    /// The fixed size of one element, if the type has one.
    #[must_use]
    pub const fn fixed_size(&self) -> Option<usize> {
        match self.size() {
            DataTypeSize::Fixed(size) => Some(size),
            DataTypeSize::Variable => None,
        }
    }

    /// The numeric kind, for numeric types.
    #[must_use]
    pub const fn numeric_kind(&self) -> Option<NumericKind> {
        match self {
            Self::Numeric(kind) => Some(*kind),
            _ => None,
        }
    }

    /// The components, for compound types.
    #[must_use]
    pub fn components(&self) -> Option<&[CompoundComponent]> {
        match self {
            Self::Compound { components, .. } => Some(components),
            _ => None,
        }
    }

    /// Find a compound component by name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&CompoundComponent> {
        self.components()?.iter().find(|c| c.name() == name)
    }

    /// Whether a value of this type can be converted to `other`.
    ///
    /// Numeric converts to numeric or string; string converts to string;
    /// compound converts to compound if every destination component has a
    /// same-named convertible source component (extra source components are
    /// ignored).
    #[must_use]
    pub fn can_convert_to(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Numeric(_), Self::Numeric(_) | Self::String { .. })
            | (Self::String { .. }, Self::String { .. }) => true,
            (Self::Compound { .. }, Self::Compound { .. }) => other
                .components()
                .unwrap_or_default()
                .iter()
                .all(|dst_comp| {
                    self.component(dst_comp.name())
                        .is_some_and(|src_comp| {
                            src_comp.data_type().can_convert_to(dst_comp.data_type())
                        })
                }),
            _ => false,
        }
    }

    /// Convert one element from `src`/`src_type` into `dst`/`dst_type`.
    ///
    /// Numeric conversion saturates to the destination range. Numeric to
    /// string formats with 7 significant digits for `Float32`, 17 for
    /// `Float64`, integer formatting otherwise, and `re+imj` for complex
    /// kinds. String to numeric parses the slot as a floating point value
    /// (empty parses to 0). Compound to compound recurses per destination
    /// component, matched by name in the source.
    ///
    /// # Errors
    /// Returns [`MdError`] if the conversion is not representable (e.g.
    /// compound to numeric, a destination component missing in the source,
    /// or a variable-sized destination slot).
    pub fn copy_value(
        src: &[u8],
        src_type: &Self,
        dst: &mut [u8],
        dst_type: &Self,
    ) -> Result<(), MdError> {
        match (src_type, dst_type) {
            (Self::Numeric(src_kind), Self::Numeric(dst_kind)) => {
                if src_kind == dst_kind {
                    dst[..src_kind.size()].copy_from_slice(&src[..src_kind.size()]);
                } else {
                    encode_numeric(decode_numeric(src, *src_kind), *dst_kind, dst);
                }
                Ok(())
            }
            (Self::Numeric(src_kind), Self::String { .. }) => {
                write_string_slot(&format_numeric(src, *src_kind), dst, dst_type)
            }
            (Self::String { .. }, Self::Numeric(dst_kind)) => {
                let text = read_string_slot(src);
                let value = text.trim().parse::<f64>().unwrap_or(0.0);
                encode_numeric(Scalar::Real(value), *dst_kind, dst);
                Ok(())
            }
            (Self::String { .. }, Self::String { .. }) => {
                let text = read_string_slot(src).into_owned();
                write_string_slot(&text, dst, dst_type)
            }
            (Self::Compound { .. }, Self::Compound { .. }) => {
                for dst_comp in dst_type.components().unwrap_or_default() {
                    let Some(src_comp) = src_type.component(dst_comp.name()) else {
                        return Err(MdError::IllegalArgument(format!(
                            "compound component {} missing in source type",
                            dst_comp.name()
                        )));
                    };
                    let src_size = src_comp
                        .data_type()
                        .fixed_size()
                        .ok_or_else(|| MdError::not_supported("variable-sized component"))?;
                    let dst_size = dst_comp
                        .data_type()
                        .fixed_size()
                        .ok_or_else(|| MdError::not_supported("variable-sized component"))?;
                    Self::copy_value(
                        &src[src_comp.offset()..src_comp.offset() + src_size],
                        src_comp.data_type(),
                        &mut dst[dst_comp.offset()..dst_comp.offset() + dst_size],
                        dst_comp.data_type(),
                    )?;
                }
                Ok(())
            }
            _ => Err(IncompatibleDataTypeError::new(
                src_type.to_string(),
                dst_type.to_string(),
            )
            .into()),
        }
    }
}

impl std::fmt::Display for ExtendedDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(kind) => write!(f, "{kind}"),
            Self::String { .. } => write!(f, "String"),
            Self::Compound { name, .. } if name.is_empty() => write!(f, "Compound"),
            Self::Compound { name, .. } => write!(f, "Compound({name})"),
        }
    }
}

/// An intermediate scalar value used by numeric element conversion.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Scalar {
    Int(i128),
    Real(f64),
    Complex(f64, f64),
}

impl Scalar {
    fn real(self) -> f64 {
        match self {
            // Exact only below 2^53, like any double intermediate.
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => v as f64,
            Self::Real(v) | Self::Complex(v, _) => v,
        }
    }

    fn parts(self) -> (f64, f64) {
        match self {
            Self::Complex(re, im) => (re, im),
            other => (other.real(), 0.0),
        }
    }

    fn int(self) -> i128 {
        match self {
            Self::Int(v) => v,
            other => other.real().round().to_i128().unwrap_or_else(|| {
                if other.real() < 0.0 {
                    i128::MIN
                } else {
                    i128::MAX
                }
            }),
        }
    }
}

macro_rules! ne_read {
    ($ty:ty, $bytes:expr) => {{
        let mut raw = [0u8; std::mem::size_of::<$ty>()];
        raw.copy_from_slice(&$bytes[..std::mem::size_of::<$ty>()]);
        <$ty>::from_ne_bytes(raw)
    }};
}

pub(crate) fn decode_numeric(bytes: &[u8], kind: NumericKind) -> Scalar {
    match kind {
        NumericKind::UInt8 => Scalar::Int(i128::from(bytes[0])),
        NumericKind::Int8 => Scalar::Int(i128::from(bytes[0] as i8)),
        NumericKind::UInt16 => Scalar::Int(i128::from(ne_read!(u16, bytes))),
        NumericKind::Int16 => Scalar::Int(i128::from(ne_read!(i16, bytes))),
        NumericKind::UInt32 => Scalar::Int(i128::from(ne_read!(u32, bytes))),
        NumericKind::Int32 => Scalar::Int(i128::from(ne_read!(i32, bytes))),
        NumericKind::UInt64 => Scalar::Int(i128::from(ne_read!(u64, bytes))),
        NumericKind::Int64 => Scalar::Int(i128::from(ne_read!(i64, bytes))),
        NumericKind::Float32 => Scalar::Real(f64::from(ne_read!(f32, bytes))),
        NumericKind::Float64 => Scalar::Real(ne_read!(f64, bytes)),
        NumericKind::CInt16 => Scalar::Complex(
            f64::from(ne_read!(i16, bytes)),
            f64::from(ne_read!(i16, bytes[2..])),
        ),
        NumericKind::CInt32 => Scalar::Complex(
            f64::from(ne_read!(i32, bytes)),
            f64::from(ne_read!(i32, bytes[4..])),
        ),
        NumericKind::CFloat32 => Scalar::Complex(
            f64::from(ne_read!(f32, bytes)),
            f64::from(ne_read!(f32, bytes[4..])),
        ),
        NumericKind::CFloat64 => Scalar::Complex(ne_read!(f64, bytes), ne_read!(f64, bytes[8..])),
    }
}

fn clamp_int(value: Scalar, kind: NumericKind) -> i128 {
    let (min, max) = kind.integer_range().unwrap_or((i128::MIN, i128::MAX));
    let v = match value {
        Scalar::Real(r) | Scalar::Complex(r, _) if r.is_nan() => 0,
        other => other.int(),
    };
    v.clamp(min, max)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn encode_numeric(value: Scalar, kind: NumericKind, out: &mut [u8]) {
    match kind {
        NumericKind::UInt8 => out[0] = clamp_int(value, kind) as u8,
        NumericKind::Int8 => out[0] = clamp_int(value, kind) as i8 as u8,
        NumericKind::UInt16 => {
            out[..2].copy_from_slice(&(clamp_int(value, kind) as u16).to_ne_bytes());
        }
        NumericKind::Int16 => {
            out[..2].copy_from_slice(&(clamp_int(value, kind) as i16).to_ne_bytes());
        }
        NumericKind::UInt32 => {
            out[..4].copy_from_slice(&(clamp_int(value, kind) as u32).to_ne_bytes());
        }
        NumericKind::Int32 => {
            out[..4].copy_from_slice(&(clamp_int(value, kind) as i32).to_ne_bytes());
        }
        NumericKind::UInt64 => {
            out[..8].copy_from_slice(&(clamp_int(value, kind) as u64).to_ne_bytes());
        }
        NumericKind::Int64 => {
            out[..8].copy_from_slice(&(clamp_int(value, kind) as i64).to_ne_bytes());
        }
        NumericKind::Float32 => {
            out[..4].copy_from_slice(&(value.real() as f32).to_ne_bytes());
        }
        NumericKind::Float64 => out[..8].copy_from_slice(&value.real().to_ne_bytes()),
        NumericKind::CInt16 => {
            let (re, im) = value.parts();
            out[..2].copy_from_slice(
                &(clamp_int(Scalar::Real(re), NumericKind::Int16) as i16).to_ne_bytes(),
            );
            out[2..4].copy_from_slice(
                &(clamp_int(Scalar::Real(im), NumericKind::Int16) as i16).to_ne_bytes(),
            );
        }
        NumericKind::CInt32 => {
            let (re, im) = value.parts();
            out[..4].copy_from_slice(
                &(clamp_int(Scalar::Real(re), NumericKind::Int32) as i32).to_ne_bytes(),
            );
            out[4..8].copy_from_slice(
                &(clamp_int(Scalar::Real(im), NumericKind::Int32) as i32).to_ne_bytes(),
            );
        }
        NumericKind::CFloat32 => {
            let (re, im) = value.parts();
            out[..4].copy_from_slice(&(re as f32).to_ne_bytes());
            out[4..8].copy_from_slice(&(im as f32).to_ne_bytes());
        }
        NumericKind::CFloat64 => {
            let (re, im) = value.parts();
            out[..8].copy_from_slice(&re.to_ne_bytes());
            out[8..16].copy_from_slice(&im.to_ne_bytes());
        }
    }
}

/// Format `value` with `digits` significant digits, `%g` style: decimal for
/// moderate exponents, exponential otherwise, trailing zeros trimmed.
#[must_use]
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let digits = digits.max(1);
    let exponential = format!("{value:.*e}", digits - 1);
    let (mantissa, exponent) = exponential
        .split_once('e')
        .unwrap_or((exponential.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    #[allow(clippy::cast_possible_wrap)]
    if exponent < -4 || exponent >= digits as i32 {
        format!("{}e{:+03}", trim_trailing_zeros(mantissa), exponent)
    } else {
        #[allow(clippy::cast_sign_loss)]
        let precision = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_trailing_zeros(&format!("{value:.precision$}")).to_string()
    }
}

fn trim_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn format_numeric(bytes: &[u8], kind: NumericKind) -> String {
    let significant = |part: f64| match kind {
        NumericKind::Float32 | NumericKind::CFloat32 => format_significant(part, 7),
        NumericKind::Float64 | NumericKind::CFloat64 => format_significant(part, 17),
        _ => format_significant(part, 17),
    };
    match decode_numeric(bytes, kind) {
        Scalar::Int(v) => v.to_string(),
        Scalar::Real(v) => significant(v),
        Scalar::Complex(re, im) => {
            let (re, im) = if kind.is_integer() || matches!(kind, NumericKind::CInt16 | NumericKind::CInt32) {
                #[allow(clippy::cast_possible_truncation)]
                ((re as i64).to_string(), (im as i64).to_string())
            } else {
                (significant(re), significant(im))
            };
            if im.starts_with('-') {
                format!("{re}{im}j")
            } else {
                format!("{re}+{im}j")
            }
        }
    }
}

/// Decode the string in a NUL-padded slot (or in a whole byte buffer).
pub(crate) fn read_string_slot(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
}

/// Encode `text` into a fixed string slot, truncating and NUL-padding.
pub(crate) fn write_string_slot(
    text: &str,
    dst: &mut [u8],
    dst_type: &ExtendedDataType,
) -> Result<(), MdError> {
    let Some(slot_len) = dst_type.fixed_size() else {
        return Err(MdError::not_supported(
            "cannot write into a variable-sized string slot",
        ));
    };
    let n = text.len().min(slot_len);
    dst[..n].copy_from_slice(&text.as_bytes()[..n]);
    dst[n..slot_len].fill(0);
    Ok(())
}
