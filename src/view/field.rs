//! Compound field extraction views.

use std::sync::Arc;

use crate::array::{AbstractArray, MDArray};
use crate::attribute::Attribute;
use crate::data_type::{CompoundComponent, DataTypeClass, ExtendedDataType};
use crate::dimension::Dimension;
use crate::error::MdError;

struct FieldArray {
    parent: Arc<dyn MDArray>,
    full_name: String,
    dims: Vec<Arc<Dimension>>,
    data_type: ExtendedDataType,
    component_name: String,
}

impl FieldArray {
    /// A single-component compound of the parent's element layout that
    /// exposes just the extracted field as `component_type`. Delegating a
    /// request through it makes the parent's element conversion do the
    /// extraction.
    fn wrap_as_compound(&self, component_type: &ExtendedDataType) -> Result<ExtendedDataType, MdError> {
        let size = component_type
            .fixed_size()
            .ok_or_else(|| MdError::not_supported("variable-sized buffer data type"))?;
        ExtendedDataType::compound(
            "",
            size,
            vec![CompoundComponent::new(
                self.component_name.clone(),
                0,
                component_type.clone(),
            )],
        )
    }
}

impl AbstractArray for FieldArray {
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
        let wrapped = self.wrap_as_compound(buffer_type)?;
        self.parent.read(
            start,
            count,
            Some(step),
            Some(stride),
            &wrapped,
            buffer,
            origin,
        )
    }
}

impl MDArray for FieldArray {
    fn raw_nodata(&self) -> Option<Vec<u8>> {
        let parent_nodata = self.parent.raw_nodata()?;
        let size = self.data_type.fixed_size()?;
        let wrapped = self.wrap_as_compound(&self.data_type).ok()?;
        let mut nodata = vec![0u8; size];
        ExtendedDataType::copy_value(
            &parent_nodata,
            self.parent.data_type(),
            &mut nodata,
            &wrapped,
        )
        .ok()?;
        Some(nodata)
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        self.parent.attributes()
    }

    fn offset(&self) -> Option<f64> {
        self.parent.offset()
    }

    fn scale(&self) -> Option<f64> {
        self.parent.scale()
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

/// Return a read-only view exposing one component of a compound array.
///
/// # Errors
/// Returns [`MdError::IllegalArgument`] if `array` is not compound or has
/// no component named `name`.
pub fn field_view(array: Arc<dyn MDArray>, name: &str) -> Result<Arc<dyn MDArray>, MdError> {
    if array.data_type().class() != DataTypeClass::Compound {
        return Err(MdError::illegal(
            "field access not allowed on non-compound data type",
        ));
    }
    let Some(component) = array.data_type().component(name) else {
        return Err(MdError::IllegalArgument(format!("cannot find field {name}")));
    };
    let data_type = component.data_type().clone();
    let full_name = format!("Extract field view of {}", array.full_name());
    let dims = array.dimensions().to_vec();
    Ok(Arc::new(FieldArray {
        parent: array,
        full_name,
        dims,
        data_type,
        component_name: name.to_string(),
    }))
}
