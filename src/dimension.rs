//! Array dimensions.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::array::MDArray;
use crate::error::{IncompatibleDimensionalityError, MdError};

/// A named axis of one or more arrays.
///
/// A dimension has a fixed size and may be bound to a one-dimensional
/// *indexing variable* holding the coordinate value of each index along the
/// axis. The binding is weak, a dimension never keeps its indexing variable
/// alive.
pub struct Dimension {
    name: String,
    full_name: String,
    dim_type: String,
    direction: String,
    size: u64,
    indexing_variable: RwLock<Option<Weak<dyn MDArray>>>,
}

impl Dimension {
    /// Create a dimension inside the group with full name `parent_full_name`.
    #[must_use]
    pub fn new(
        parent_full_name: &str,
        name: impl Into<String>,
        dim_type: impl Into<String>,
        direction: impl Into<String>,
        size: u64,
    ) -> Arc<Self> {
        let name = name.into();
        let full_name = if parent_full_name == "/" {
            format!("/{name}")
        } else {
            format!("{parent_full_name}/{name}")
        };
        Arc::new(Self {
            name,
            full_name,
            dim_type: dim_type.into(),
            direction: direction.into(),
            size,
            indexing_variable: RwLock::new(None),
        })
    }

    /// The dimension name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fully qualified dimension name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The dimension type (e.g. `HORIZONTAL_X`), possibly empty.
    #[must_use]
    pub fn dim_type(&self) -> &str {
        &self.dim_type
    }

    /// The dimension direction (e.g. `EAST`), possibly empty.
    #[must_use]
    pub fn direction(&self) -> &str {
        &self.direction
    }

    /// The number of elements along the dimension.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// The indexing variable bound to this dimension, if any is still alive.
    #[must_use]
    pub fn indexing_variable(&self) -> Option<Arc<dyn MDArray>> {
        self.indexing_variable.read().as_ref()?.upgrade()
    }

    /// Bind `array` as the indexing variable of this dimension.
    ///
    /// # Errors
    /// Returns [`MdError`] unless `array` is one-dimensional with the same
    /// size as this dimension.
    pub fn set_indexing_variable(&self, array: Arc<dyn MDArray>) -> Result<(), MdError> {
        let dims = array.dimensions().to_vec();
        if dims.len() != 1 {
            return Err(IncompatibleDimensionalityError::new(dims.len(), 1).into());
        }
        if dims[0].size() != self.size {
            return Err(MdError::IllegalArgument(format!(
                "indexing variable {} has size {}, dimension {} has size {}",
                array.name(),
                dims[0].size(),
                self.name,
                self.size
            )));
        }
        *self.indexing_variable.write() = Some(Arc::downgrade(&array));
        Ok(())
    }
}

impl std::fmt::Debug for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dimension")
            .field("full_name", &self.full_name)
            .field("dim_type", &self.dim_type)
            .field("direction", &self.direction)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
