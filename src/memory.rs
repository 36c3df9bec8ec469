//! In-memory backend.
//!
//! A [`MemoryGroup`] hierarchy holds its arrays and attributes in heap
//! buffers, with no persistence. It is the reference backend of the engine
//! and the natural destination of a deep copy when no storage format is
//! involved.

use std::collections::BTreeMap;
use std::sync::Arc;

use itertools::izip;
use parking_lot::RwLock;

use crate::array::validation;
use crate::array::{AbstractArray, MDArray};
use crate::attribute::Attribute;
use crate::data_type::{
    read_string_slot, write_string_slot, DataTypeClass, DataTypeSize, ExtendedDataType,
};
use crate::dimension::Dimension;
use crate::error::MdError;
use crate::group::Group;
use crate::options::OptionList;
use crate::view::element_offset;

fn child_full_name(parent_full_name: &str, name: &str) -> String {
    if parent_full_name == "/" {
        format!("/{name}")
    } else {
        format!("{parent_full_name}/{name}")
    }
}

/// Element strides of the flat row-major storage, slowest axis first.
fn storage_strides(dims: &[Arc<Dimension>]) -> Vec<u64> {
    let mut strides = vec![1u64; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1].size();
    }
    strides
}

/// The flat storage element addressed by `idx` of a validated selection.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn storage_element(start: &[u64], step: &[i64], strides: &[u64], idx: &[usize]) -> usize {
    let mut element = 0i128;
    for (&first, &inc, &stride, &i) in izip!(start, step, strides, idx) {
        element += (i128::from(first) + i as i128 * i128::from(inc)) * i128::from(stride);
    }
    element as usize
}

fn element_count(dims: &[Arc<Dimension>]) -> Result<usize, MdError> {
    dims.iter()
        .try_fold(1usize, |acc, d| {
            let size = usize::try_from(d.size()).ok()?;
            acc.checked_mul(size)
        })
        .ok_or_else(|| MdError::OutOfMemory("array extent exceeds addressable memory".to_string()))
}

enum Payload {
    Raw(RwLock<Vec<u8>>),
    Strings(RwLock<Vec<String>>),
}

impl Payload {
    fn allocate(data_type: &ExtendedDataType, elements: usize) -> Result<Self, MdError> {
        match data_type.size() {
            DataTypeSize::Variable => Ok(Self::Strings(RwLock::new(vec![
                String::new();
                elements
            ]))),
            DataTypeSize::Fixed(size) => {
                let bytes = elements.checked_mul(size).ok_or_else(|| {
                    MdError::OutOfMemory("array extent exceeds addressable memory".to_string())
                })?;
                Ok(Self::Raw(RwLock::new(vec![0u8; bytes])))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read(
        &self,
        data_type: &ExtendedDataType,
        dims: &[Arc<Dimension>],
        start: &[u64],
        count: &[usize],
        step: &[i64],
        stride: &[isize],
        buffer_type: &ExtendedDataType,
        buffer: &mut [u8],
        origin: usize,
    ) -> Result<(), MdError> {
        let strides = storage_strides(dims);
        let slot = buffer_type
            .fixed_size()
            .ok_or_else(|| MdError::not_supported("variable-sized buffer elements"))?;
        match self {
            Self::Raw(data) => {
                let data = data.read();
                let element = match data_type.fixed_size() {
                    Some(size) => size,
                    None => return Err(MdError::not_supported("raw access to unbounded strings")),
                };
                let same_type = data_type == buffer_type;
                crate::array::chunking::for_each_index(count, &mut |idx| {
                    let src = storage_element(start, step, &strides, idx) * element;
                    let dst = element_offset(idx, stride, origin) * slot;
                    if same_type {
                        buffer[dst..dst + slot].copy_from_slice(&data[src..src + element]);
                        Ok(())
                    } else {
                        ExtendedDataType::copy_value(
                            &data[src..src + element],
                            data_type,
                            &mut buffer[dst..dst + slot],
                            buffer_type,
                        )
                    }
                })
            }
            Self::Strings(values) => {
                let values = values.read();
                crate::array::chunking::for_each_index(count, &mut |idx| {
                    let src = storage_element(start, step, &strides, idx);
                    let dst = element_offset(idx, stride, origin) * slot;
                    write_string_slot(&values[src], &mut buffer[dst..dst + slot], buffer_type)
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &self,
        data_type: &ExtendedDataType,
        dims: &[Arc<Dimension>],
        start: &[u64],
        count: &[usize],
        step: &[i64],
        stride: &[isize],
        buffer_type: &ExtendedDataType,
        buffer: &[u8],
        origin: usize,
    ) -> Result<(), MdError> {
        let strides = storage_strides(dims);
        let slot = buffer_type
            .fixed_size()
            .ok_or_else(|| MdError::not_supported("variable-sized buffer elements"))?;
        match self {
            Self::Raw(data) => {
                let mut data = data.write();
                let element = match data_type.fixed_size() {
                    Some(size) => size,
                    None => return Err(MdError::not_supported("raw access to unbounded strings")),
                };
                let same_type = data_type == buffer_type;
                crate::array::chunking::for_each_index(count, &mut |idx| {
                    let dst = storage_element(start, step, &strides, idx) * element;
                    let src = element_offset(idx, stride, origin) * slot;
                    if same_type {
                        data[dst..dst + element].copy_from_slice(&buffer[src..src + slot]);
                        Ok(())
                    } else {
                        ExtendedDataType::copy_value(
                            &buffer[src..src + slot],
                            buffer_type,
                            &mut data[dst..dst + element],
                            data_type,
                        )
                    }
                })
            }
            Self::Strings(values) => {
                let mut values = values.write();
                let text_type = ExtendedDataType::string(64);
                crate::array::chunking::for_each_index(count, &mut |idx| {
                    let dst = storage_element(start, step, &strides, idx);
                    let src = element_offset(idx, stride, origin) * slot;
                    values[dst] = if buffer_type.class() == DataTypeClass::String {
                        read_string_slot(&buffer[src..src + slot]).into_owned()
                    } else {
                        let mut text = [0u8; 64];
                        ExtendedDataType::copy_value(
                            &buffer[src..src + slot],
                            buffer_type,
                            &mut text,
                            &text_type,
                        )?;
                        read_string_slot(&text).into_owned()
                    };
                    Ok(())
                })
            }
        }
    }

    fn read_strings(
        &self,
        dims: &[Arc<Dimension>],
        start: &[u64],
        count: &[usize],
        out: &mut [String],
    ) -> Result<(), MdError> {
        let Self::Strings(values) = self else {
            return Err(MdError::not_supported(
                "the typed string path requires unbounded strings",
            ));
        };
        validation::check_extent(dims, start, count, None)?;
        let total: usize = count.iter().product();
        if out.len() != total {
            return Err(MdError::IllegalArgument(format!(
                "expected {total} output slots, got {}",
                out.len()
            )));
        }
        let strides = storage_strides(dims);
        let values = values.read();
        let step = vec![1i64; dims.len()];
        let mut next = 0usize;
        crate::array::chunking::for_each_index(count, &mut |idx| {
            out[next] = values[storage_element(start, &step, &strides, idx)].clone();
            next += 1;
            Ok(())
        })
    }

    fn write_strings(
        &self,
        dims: &[Arc<Dimension>],
        start: &[u64],
        count: &[usize],
        new_values: &[String],
    ) -> Result<(), MdError> {
        let Self::Strings(values) = self else {
            return Err(MdError::not_supported(
                "the typed string path requires unbounded strings",
            ));
        };
        validation::check_extent(dims, start, count, None)?;
        let total: usize = count.iter().product();
        if new_values.len() != total {
            return Err(MdError::IllegalArgument(format!(
                "expected {total} input values, got {}",
                new_values.len()
            )));
        }
        let strides = storage_strides(dims);
        let mut values = values.write();
        let step = vec![1i64; dims.len()];
        let mut next = 0usize;
        crate::array::chunking::for_each_index(count, &mut |idx| {
            values[storage_element(start, &step, &strides, idx)] = new_values[next].clone();
            next += 1;
            Ok(())
        })
    }
}

/// An attribute stored in memory.
pub struct MemoryAttribute {
    name: String,
    full_name: String,
    dims: Vec<Arc<Dimension>>,
    data_type: ExtendedDataType,
    payload: Payload,
}

impl MemoryAttribute {
    fn create(
        parent_full_name: &str,
        name: &str,
        dim_sizes: &[u64],
        data_type: ExtendedDataType,
    ) -> Result<Arc<Self>, MdError> {
        if dim_sizes.contains(&0) {
            return Err(MdError::illegal("dimension size 0 is not allowed"));
        }
        let full_name = child_full_name(parent_full_name, name);
        let dims: Vec<Arc<Dimension>> = dim_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| Dimension::new(&full_name, format!("dim{i}"), "", "", size))
            .collect();
        let elements = element_count(&dims)?;
        let payload = Payload::allocate(&data_type, elements)?;
        Ok(Arc::new(Self {
            name: name.to_string(),
            full_name,
            dims,
            data_type,
            payload,
        }))
    }
}

impl AbstractArray for MemoryAttribute {
    fn name(&self) -> String {
        self.name.clone()
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
        self.payload.read(
            &self.data_type,
            &self.dims,
            start,
            count,
            step,
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
        self.payload.write(
            &self.data_type,
            &self.dims,
            start,
            count,
            step,
            stride,
            buffer_type,
            buffer,
            origin,
        )
    }

    fn read_strings(
        &self,
        start: &[u64],
        count: &[usize],
        out: &mut [String],
    ) -> Result<(), MdError> {
        self.payload.read_strings(&self.dims, start, count, out)
    }

    fn write_strings(
        &self,
        start: &[u64],
        count: &[usize],
        values: &[String],
    ) -> Result<(), MdError> {
        self.payload.write_strings(&self.dims, start, count, values)
    }
}

impl Attribute for MemoryAttribute {}

/// An array stored in memory.
pub struct MemoryArray {
    name: String,
    full_name: String,
    dims: Vec<Arc<Dimension>>,
    data_type: ExtendedDataType,
    block: Vec<u64>,
    payload: Payload,
    attributes: RwLock<BTreeMap<String, Arc<MemoryAttribute>>>,
    nodata: RwLock<Option<Vec<u8>>>,
    offset: RwLock<Option<f64>>,
    scale: RwLock<Option<f64>>,
    unit: RwLock<String>,
    spatial_ref: RwLock<Option<String>>,
}

impl MemoryArray {
    fn create(
        parent_full_name: &str,
        name: &str,
        dims: &[Arc<Dimension>],
        data_type: ExtendedDataType,
        options: &OptionList,
    ) -> Result<Arc<Self>, MdError> {
        let block = match options.fetch("BLOCKSIZE") {
            Some(value) => {
                let block: Vec<u64> = value
                    .split(',')
                    .map(|t| t.trim().parse::<u64>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| {
                        MdError::IllegalArgument(format!("invalid BLOCKSIZE value: {value}"))
                    })?;
                if block.len() != dims.len() {
                    return Err(MdError::IllegalArgument(format!(
                        "BLOCKSIZE must hold {} values",
                        dims.len()
                    )));
                }
                block
            }
            None => vec![0; dims.len()],
        };
        let elements = element_count(dims)?;
        let payload = Payload::allocate(&data_type, elements)?;
        Ok(Arc::new(Self {
            name: name.to_string(),
            full_name: child_full_name(parent_full_name, name),
            dims: dims.to_vec(),
            data_type,
            block,
            payload,
            attributes: RwLock::new(BTreeMap::new()),
            nodata: RwLock::new(None),
            offset: RwLock::new(None),
            scale: RwLock::new(None),
            unit: RwLock::new(String::new()),
            spatial_ref: RwLock::new(None),
        }))
    }
}

impl AbstractArray for MemoryArray {
    fn name(&self) -> String {
        self.name.clone()
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
        self.payload.read(
            &self.data_type,
            &self.dims,
            start,
            count,
            step,
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
        self.payload.write(
            &self.data_type,
            &self.dims,
            start,
            count,
            step,
            stride,
            buffer_type,
            buffer,
            origin,
        )
    }

    fn read_strings(
        &self,
        start: &[u64],
        count: &[usize],
        out: &mut [String],
    ) -> Result<(), MdError> {
        self.payload.read_strings(&self.dims, start, count, out)
    }

    fn write_strings(
        &self,
        start: &[u64],
        count: &[usize],
        values: &[String],
    ) -> Result<(), MdError> {
        self.payload.write_strings(&self.dims, start, count, values)
    }
}

impl MDArray for MemoryArray {
    fn is_writable(&self) -> bool {
        true
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        self.attributes
            .read()
            .values()
            .map(|a| a.clone() as Arc<dyn Attribute>)
            .collect()
    }

    fn create_attribute(
        &self,
        name: &str,
        dim_sizes: &[u64],
        data_type: ExtendedDataType,
        _options: &OptionList,
    ) -> Result<Arc<dyn Attribute>, MdError> {
        let mut attributes = self.attributes.write();
        if attributes.contains_key(name) {
            return Err(MdError::IllegalArgument(format!(
                "an attribute named {name} already exists"
            )));
        }
        let attribute = MemoryAttribute::create(&self.full_name, name, dim_sizes, data_type)?;
        attributes.insert(name.to_string(), attribute.clone());
        Ok(attribute)
    }

    fn raw_nodata(&self) -> Option<Vec<u8>> {
        self.nodata.read().clone()
    }

    fn set_raw_nodata(&self, nodata: Option<&[u8]>) -> Result<(), MdError> {
        if let Some(bytes) = nodata {
            let size = self
                .data_type
                .fixed_size()
                .ok_or_else(|| MdError::not_supported("nodata on a variable-sized data type"))?;
            if bytes.len() != size {
                return Err(MdError::IllegalArgument(format!(
                    "nodata value must be {size} bytes, got {}",
                    bytes.len()
                )));
            }
        }
        *self.nodata.write() = nodata.map(<[u8]>::to_vec);
        Ok(())
    }

    fn offset(&self) -> Option<f64> {
        *self.offset.read()
    }

    fn scale(&self) -> Option<f64> {
        *self.scale.read()
    }

    fn set_offset(&self, offset: Option<f64>) -> Result<(), MdError> {
        *self.offset.write() = offset;
        Ok(())
    }

    fn set_scale(&self, scale: Option<f64>) -> Result<(), MdError> {
        *self.scale.write() = scale;
        Ok(())
    }

    fn unit(&self) -> String {
        self.unit.read().clone()
    }

    fn set_unit(&self, unit: &str) -> Result<(), MdError> {
        *self.unit.write() = unit.to_string();
        Ok(())
    }

    fn spatial_ref(&self) -> Option<String> {
        self.spatial_ref.read().clone()
    }

    fn set_spatial_ref(&self, wkt: Option<&str>) -> Result<(), MdError> {
        *self.spatial_ref.write() = wkt.map(str::to_string);
        Ok(())
    }

    fn block_size(&self) -> Vec<u64> {
        self.block.clone()
    }
}

/// A group stored in memory.
pub struct MemoryGroup {
    name: String,
    full_name: String,
    groups: RwLock<BTreeMap<String, Arc<MemoryGroup>>>,
    arrays: RwLock<BTreeMap<String, Arc<MemoryArray>>>,
    dims: RwLock<BTreeMap<String, Arc<Dimension>>>,
    attributes: RwLock<BTreeMap<String, Arc<MemoryAttribute>>>,
}

impl MemoryGroup {
    /// Create an empty root group.
    #[must_use]
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            name: "/".to_string(),
            full_name: "/".to_string(),
            groups: RwLock::new(BTreeMap::new()),
            arrays: RwLock::new(BTreeMap::new()),
            dims: RwLock::new(BTreeMap::new()),
            attributes: RwLock::new(BTreeMap::new()),
        })
    }
}

impl Group for MemoryGroup {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn full_name(&self) -> String {
        self.full_name.clone()
    }

    fn array_names(&self) -> Vec<String> {
        self.arrays.read().keys().cloned().collect()
    }

    fn open_array(&self, name: &str) -> Option<Arc<dyn MDArray>> {
        let array = self.arrays.read().get(name)?.clone();
        Some(array)
    }

    fn create_array(
        &self,
        name: &str,
        dimensions: &[Arc<Dimension>],
        data_type: ExtendedDataType,
        options: &OptionList,
    ) -> Result<Arc<dyn MDArray>, MdError> {
        if name.is_empty() {
            return Err(MdError::IllegalArgument(
                "empty array name not supported".to_string(),
            ));
        }
        let mut arrays = self.arrays.write();
        if arrays.contains_key(name) {
            return Err(MdError::IllegalArgument(format!(
                "an array named {name} already exists"
            )));
        }
        let array = MemoryArray::create(&self.full_name, name, dimensions, data_type, options)?;
        arrays.insert(name.to_string(), array.clone());
        Ok(array)
    }

    fn group_names(&self) -> Vec<String> {
        self.groups.read().keys().cloned().collect()
    }

    fn open_group(&self, name: &str) -> Option<Arc<dyn Group>> {
        let group = self.groups.read().get(name)?.clone();
        Some(group)
    }

    fn create_group(&self, name: &str, _options: &OptionList) -> Result<Arc<dyn Group>, MdError> {
        if name.is_empty() {
            return Err(MdError::IllegalArgument(
                "empty group name not supported".to_string(),
            ));
        }
        let mut groups = self.groups.write();
        if groups.contains_key(name) {
            return Err(MdError::IllegalArgument(format!(
                "a group named {name} already exists"
            )));
        }
        let group = Arc::new(Self {
            name: name.to_string(),
            full_name: child_full_name(&self.full_name, name),
            groups: RwLock::new(BTreeMap::new()),
            arrays: RwLock::new(BTreeMap::new()),
            dims: RwLock::new(BTreeMap::new()),
            attributes: RwLock::new(BTreeMap::new()),
        });
        groups.insert(name.to_string(), group.clone());
        Ok(group)
    }

    fn dimensions(&self) -> Vec<Arc<Dimension>> {
        self.dims.read().values().cloned().collect()
    }

    fn create_dimension(
        &self,
        name: &str,
        dim_type: &str,
        direction: &str,
        size: u64,
    ) -> Result<Arc<Dimension>, MdError> {
        if size == 0 {
            return Err(MdError::illegal("dimension size 0 is not allowed"));
        }
        let mut dims = self.dims.write();
        if dims.contains_key(name) {
            return Err(MdError::IllegalArgument(format!(
                "a dimension named {name} already exists"
            )));
        }
        let dim = Dimension::new(&self.full_name, name, dim_type, direction, size);
        dims.insert(name.to_string(), dim.clone());
        Ok(dim)
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        self.attributes
            .read()
            .values()
            .map(|a| a.clone() as Arc<dyn Attribute>)
            .collect()
    }

    fn create_attribute(
        &self,
        name: &str,
        dim_sizes: &[u64],
        data_type: ExtendedDataType,
        _options: &OptionList,
    ) -> Result<Arc<dyn Attribute>, MdError> {
        let mut attributes = self.attributes.write();
        if attributes.contains_key(name) {
            return Err(MdError::IllegalArgument(format!(
                "an attribute named {name} already exists"
            )));
        }
        let attribute = MemoryAttribute::create(&self.full_name, name, dim_sizes, data_type)?;
        attributes.insert(name.to_string(), attribute.clone());
        Ok(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::NumericKind;

    fn f64_type() -> ExtendedDataType {
        ExtendedDataType::numeric(NumericKind::Float64)
    }

    fn i32_type() -> ExtendedDataType {
        ExtendedDataType::numeric(NumericKind::Int32)
    }

    fn sample_array(rows: u64, cols: u64) -> Arc<dyn MDArray> {
        let root = MemoryGroup::root();
        let y = root.create_dimension("y", "", "", rows).unwrap();
        let x = root.create_dimension("x", "", "", cols).unwrap();
        root.create_array("a", &[y, x], f64_type(), &OptionList::new())
            .unwrap()
    }

    fn as_f64(bytes: &[u8]) -> Vec<f64> {
        bytes
            .chunks_exact(8)
            .map(|c| f64::from_ne_bytes(c.try_into().unwrap()))
            .collect()
    }

    fn to_bytes(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn memory_array_round_trip() {
        let array = sample_array(2, 3);
        let values: Vec<f64> = (0..6).map(f64::from).collect();
        array
            .write(&[0, 0], &[2, 3], None, None, &f64_type(), &to_bytes(&values), 0)
            .unwrap();
        let mut out = vec![0u8; 6 * 8];
        array
            .read(&[0, 0], &[2, 3], None, None, &f64_type(), &mut out, 0)
            .unwrap();
        assert_eq!(as_f64(&out), values);
    }

    #[test]
    fn memory_array_strided_read() {
        let array = sample_array(2, 4);
        let values: Vec<f64> = (0..8).map(f64::from).collect();
        array
            .write(&[0, 0], &[2, 4], None, None, &f64_type(), &to_bytes(&values), 0)
            .unwrap();
        // every other column of the second row
        let mut out = vec![0u8; 2 * 8];
        array
            .read(&[1, 0], &[1, 2], Some(&[1, 2]), None, &f64_type(), &mut out, 0)
            .unwrap();
        assert_eq!(as_f64(&out), vec![4.0, 6.0]);
    }

    #[test]
    fn memory_array_negative_step_read() {
        let array = sample_array(1, 4);
        let values = [10.0, 11.0, 12.0, 13.0];
        array
            .write(&[0, 0], &[1, 4], None, None, &f64_type(), &to_bytes(&values), 0)
            .unwrap();
        let mut out = vec![0u8; 4 * 8];
        array
            .read(&[0, 3], &[1, 4], Some(&[1, -1]), None, &f64_type(), &mut out, 0)
            .unwrap();
        assert_eq!(as_f64(&out), vec![13.0, 12.0, 11.0, 10.0]);
    }

    #[test]
    fn memory_array_converting_write() {
        let array = sample_array(1, 2);
        let ints: Vec<u8> = [7i32, 8].iter().flat_map(|v| v.to_ne_bytes()).collect();
        array
            .write(&[0, 0], &[1, 2], None, None, &i32_type(), &ints, 0)
            .unwrap();
        let mut out = vec![0u8; 2 * 8];
        array
            .read(&[0, 0], &[1, 2], None, None, &f64_type(), &mut out, 0)
            .unwrap();
        assert_eq!(as_f64(&out), vec![7.0, 8.0]);
    }

    #[test]
    fn memory_array_rejects_out_of_range() {
        let array = sample_array(2, 3);
        let mut out = vec![0u8; 6 * 8];
        assert!(array
            .read(&[0, 2], &[2, 2], None, None, &f64_type(), &mut out, 0)
            .is_err());
    }

    #[test]
    fn memory_string_array_round_trip() {
        let root = MemoryGroup::root();
        let x = root.create_dimension("x", "", "", 2).unwrap();
        let array = root
            .create_array("s", &[x], ExtendedDataType::string(0), &OptionList::new())
            .unwrap();
        let values = vec!["alpha".to_string(), "beta".to_string()];
        array.write_strings(&[0], &[2], &values).unwrap();
        let mut out = vec![String::new(); 2];
        array.read_strings(&[0], &[2], &mut out).unwrap();
        assert_eq!(out, values);
        // the raw path sees NUL-padded fixed slots
        let slot = ExtendedDataType::string(8);
        let mut raw = vec![0u8; 16];
        array.read(&[0], &[2], None, None, &slot, &mut raw, 0).unwrap();
        assert_eq!(&raw[..5], b"alpha");
        assert_eq!(raw[5], 0);
        assert_eq!(&raw[8..12], b"beta");
    }

    #[test]
    fn memory_array_blocksize_option() {
        let root = MemoryGroup::root();
        let y = root.create_dimension("y", "", "", 100).unwrap();
        let x = root.create_dimension("x", "", "", 200).unwrap();
        let options = OptionList::from_slice(&["BLOCKSIZE=10,20"]);
        let array = root
            .create_array("a", &[y, x], f64_type(), &options)
            .unwrap();
        assert_eq!(array.block_size(), vec![10, 20]);
        let bad = OptionList::from_slice(&["BLOCKSIZE=10"]);
        let z = root.create_dimension("z", "", "", 3).unwrap();
        assert!(root
            .create_array("b", &[z.clone(), z], f64_type(), &bad)
            .is_err());
    }

    #[test]
    fn memory_rejects_zero_sized_dimensions() {
        let root = MemoryGroup::root();
        assert!(matches!(
            root.create_dimension("x", "", "", 0).unwrap_err(),
            MdError::IllegalArgument(_)
        ));
        assert!(root
            .create_attribute("a", &[2, 0], f64_type(), &OptionList::new())
            .is_err());
    }

    #[test]
    fn memory_group_hierarchy() {
        let root = MemoryGroup::root();
        let sub = root.create_group("sub", &OptionList::new()).unwrap();
        assert_eq!(sub.full_name(), "/sub");
        assert!(root.create_group("sub", &OptionList::new()).is_err());
        assert_eq!(root.group_names(), vec!["sub".to_string()]);
        let leaf = sub.create_group("leaf", &OptionList::new()).unwrap();
        assert_eq!(leaf.full_name(), "/sub/leaf");
    }

    #[test]
    fn memory_attribute_scalar() {
        let root = MemoryGroup::root();
        let attr = root
            .create_attribute("title", &[], ExtendedDataType::string(0), &OptionList::new())
            .unwrap();
        attr.write_string("hello").unwrap();
        assert_eq!(attr.read_as_string().unwrap(), "hello");
    }
}
