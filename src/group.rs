//! Group hierarchy.
//!
//! Groups form a tree rooted at `/`, each holding arrays, dimensions,
//! attributes and child groups. Objects are addressed either by simple name
//! within their group or by `/`-separated full name from the root.

use std::sync::Arc;

use crate::array::MDArray;
use crate::attribute::Attribute;
use crate::data_type::ExtendedDataType;
use crate::dimension::Dimension;
use crate::error::MdError;
use crate::options::OptionList;

pub mod copy;

/// A node of the group hierarchy.
pub trait Group: Send + Sync {
    /// The group name (`/` for the root).
    fn name(&self) -> String;

    /// The fully qualified group name.
    fn full_name(&self) -> String;

    /// The names of the arrays in this group.
    fn array_names(&self) -> Vec<String>;

    /// Open an array of this group by name.
    fn open_array(&self, name: &str) -> Option<Arc<dyn MDArray>>;

    /// Create an array in this group.
    ///
    /// # Errors
    /// Returns [`MdError`] on name collision or unsupported parameters.
    fn create_array(
        &self,
        name: &str,
        dimensions: &[Arc<Dimension>],
        data_type: ExtendedDataType,
        options: &OptionList,
    ) -> Result<Arc<dyn MDArray>, MdError>;

    /// The names of the child groups.
    fn group_names(&self) -> Vec<String>;

    /// Open a child group by name.
    fn open_group(&self, name: &str) -> Option<Arc<dyn Group>>;

    /// Create a child group.
    ///
    /// # Errors
    /// Returns [`MdError`] on name collision or unsupported parameters.
    fn create_group(&self, name: &str, options: &OptionList) -> Result<Arc<dyn Group>, MdError>;

    /// The dimensions declared in this group.
    fn dimensions(&self) -> Vec<Arc<Dimension>>;

    /// Create a dimension in this group.
    ///
    /// # Errors
    /// Returns [`MdError`] on name collision or unsupported parameters.
    fn create_dimension(
        &self,
        name: &str,
        dim_type: &str,
        direction: &str,
        size: u64,
    ) -> Result<Arc<Dimension>, MdError>;

    /// The attributes attached to this group.
    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        Vec::new()
    }

    /// Find an attribute by name.
    fn attribute(&self, name: &str) -> Option<Arc<dyn Attribute>> {
        self.attributes().into_iter().find(|a| a.name() == name)
    }

    /// Create an attribute on this group.
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
}

/// Walk `full_name` from `root` down to the group containing the leaf,
/// returning that group and the leaf name.
fn inner_most_group(
    root: &Arc<dyn Group>,
    full_name: &str,
) -> Option<(Arc<dyn Group>, String)> {
    let tokens: Vec<&str> = full_name.split('/').filter(|t| !t.is_empty()).collect();
    let (leaf, path) = tokens.split_last()?;
    let mut current = root.clone();
    for token in path {
        current = current.open_group(token)?;
    }
    Some((current, (*leaf).to_string()))
}

/// Open a dimension anywhere under `root` by its full name.
#[must_use]
pub fn open_dimension_from_full_name(
    root: &Arc<dyn Group>,
    full_name: &str,
) -> Option<Arc<Dimension>> {
    let (group, leaf) = inner_most_group(root, full_name)?;
    group.dimensions().into_iter().find(|d| d.name() == leaf)
}

/// Open an array anywhere under `root` by its full name.
#[must_use]
pub fn open_array_from_full_name(
    root: &Arc<dyn Group>,
    full_name: &str,
) -> Option<Arc<dyn MDArray>> {
    let (group, leaf) = inner_most_group(root, full_name)?;
    group.open_array(&leaf)
}

/// Open a group anywhere under `root` by its full name.
#[must_use]
pub fn open_group_from_full_name(
    root: &Arc<dyn Group>,
    full_name: &str,
) -> Option<Arc<dyn Group>> {
    let tokens: Vec<&str> = full_name.split('/').filter(|t| !t.is_empty()).collect();
    let mut current = root.clone();
    for token in tokens {
        current = current.open_group(token)?;
    }
    Some(current)
}
