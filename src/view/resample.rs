//! Resampled views, reprojecting the two trailing axes through an external
//! warp engine.
//!
//! The engine itself performs no reprojection. A [`ResampledArray`] exposes
//! the caller-chosen [`OutputGrid`] as its two trailing dimensions and, per
//! outer (non-spatial) index tuple, hands a 2-D [`PlaneSource`] facade over
//! the parent plus a [`SourceGeoref`] to the [`WarpEngine`] collaborator.
//! The warped plane is cached and flushed whenever the outer index
//! advances.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::array::{AbstractArray, MDArray};
use crate::data_type::{ExtendedDataType, NumericKind};
use crate::dimension::Dimension;
use crate::error::{IncompatibleDimensionalityError, MdError};

use super::element_offset;

/// The grid a resampled view exposes.
#[derive(Clone, Debug)]
pub struct OutputGrid {
    /// Output width (fastest varying axis).
    pub width: u64,
    /// Output height.
    pub height: u64,
    /// Affine geotransform of the output grid.
    pub geo_transform: [f64; 6],
    /// Spatial reference of the output grid as WKT, if any.
    pub srs_wkt: Option<String>,
}

/// The georeferencing of the source plane handed to the warp engine.
#[derive(Clone, Debug)]
pub enum SourceGeoref {
    /// A regular grid described by an affine geotransform.
    Affine([f64; 6]),
    /// An irregular grid described by per-column / per-row coordinates.
    Geolocation {
        /// X coordinate of each source column.
        x: Vec<f64>,
        /// Y coordinate of each source row.
        y: Vec<f64>,
    },
}

/// A 2-D facade over one source plane, read by the warp engine.
pub trait PlaneSource {
    /// Plane width in elements.
    fn width(&self) -> u64;

    /// Plane height in rows.
    fn height(&self) -> u64;

    /// Read `rows` full-width rows starting at `first_row`, row-major.
    ///
    /// # Errors
    /// Returns [`MdError`] on backend failure.
    fn read_rows(&self, first_row: u64, rows: usize, out: &mut [f64]) -> Result<(), MdError>;
}

/// The external reprojection collaborator of a resampled view.
pub trait WarpEngine: Send + Sync {
    /// Fill the whole output plane (`output.width * output.height`
    /// elements, row-major) from `source`.
    ///
    /// # Errors
    /// Returns [`MdError`] on warp failure.
    fn warp_plane(
        &self,
        source: &dyn PlaneSource,
        source_georef: &SourceGeoref,
        output: &OutputGrid,
        resampling: &str,
        out: &mut [f64],
    ) -> Result<(), MdError>;
}

/// Infer an affine geotransform from per-column and per-row coordinate
/// values with regular spacing. The tolerance on spacing jitter is 1e-3 of
/// the spacing; the transform origin is shifted half a step so indices
/// address pixel areas, not centers.
#[must_use]
pub fn guess_geo_transform(x: &[f64], y: &[f64]) -> Option<[f64; 6]> {
    let sx = regular_spacing(x)?;
    let sy = regular_spacing(y)?;
    Some([x[0] - sx / 2.0, sx, 0.0, y[0] - sy / 2.0, 0.0, sy])
}

fn regular_spacing(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let spacing = values[1] - values[0];
    if spacing == 0.0 {
        return None;
    }
    let tolerance = spacing.abs() * 1e-3;
    values
        .windows(2)
        .all(|w| ((w[1] - w[0]) - spacing).abs() <= tolerance)
        .then_some(spacing)
}

struct PlaneFacade<'a> {
    parent: &'a dyn MDArray,
    outer: &'a [u64],
    width: u64,
    height: u64,
    plane: RwLock<Option<Vec<f64>>>,
}

impl PlaneFacade<'_> {
    fn fill(&self) -> Result<(), MdError> {
        if self.plane.read().is_some() {
            return Ok(());
        }
        let n = self.parent.dimensionality();
        let mut start = self.outer.to_vec();
        start.extend_from_slice(&[0, 0]);
        let mut count = vec![1usize; n];
        let height = to_usize(self.height)?;
        let width = to_usize(self.width)?;
        count[n - 2] = height;
        count[n - 1] = width;
        let total = height
            .checked_mul(width)
            .ok_or_else(|| MdError::OutOfMemory("source plane too large".to_string()))?;
        let mut raw = vec![0u8; total * 8];
        self.parent.read(
            &start,
            &count,
            None,
            None,
            &ExtendedDataType::numeric(NumericKind::Float64),
            &mut raw,
            0,
        )?;
        *self.plane.write() = Some(
            raw.chunks_exact(8)
                .map(|c| f64::from_ne_bytes(c.try_into().unwrap_or_default()))
                .collect(),
        );
        Ok(())
    }
}

impl PlaneSource for PlaneFacade<'_> {
    fn width(&self) -> u64 {
        self.width
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn read_rows(&self, first_row: u64, rows: usize, out: &mut [f64]) -> Result<(), MdError> {
        self.fill()?;
        let width = to_usize(self.width)?;
        let first = to_usize(first_row)?.checked_mul(width).ok_or_else(|| {
            MdError::OutOfMemory("source plane too large".to_string())
        })?;
        let len = rows * width;
        let guard = self.plane.read();
        let Some(plane) = guard.as_ref() else {
            return Err(MdError::Backend("plane cache unexpectedly empty".to_string()));
        };
        if first + len > plane.len() || out.len() < len {
            return Err(MdError::illegal("row block out of range"));
        }
        out[..len].copy_from_slice(&plane[first..first + len]);
        Ok(())
    }
}

fn to_usize(value: u64) -> Result<usize, MdError> {
    usize::try_from(value).map_err(|_| MdError::OutOfMemory("extent too large".to_string()))
}

/// See [`resampled`].
pub struct ResampledArray {
    parent: Arc<dyn MDArray>,
    engine: Arc<dyn WarpEngine>,
    output: OutputGrid,
    resampling: String,
    georef: SourceGeoref,
    full_name: String,
    dims: Vec<Arc<Dimension>>,
    data_type: ExtendedDataType,
    // warped plane of the most recent outer index tuple
    cache: RwLock<Option<(Vec<u64>, Vec<f64>)>>,
}

impl ResampledArray {
    fn warped_plane(&self, outer: &[u64]) -> Result<Vec<f64>, MdError> {
        if let Some((cached_outer, plane)) = self.cache.read().as_ref() {
            if cached_outer == outer {
                return Ok(plane.clone());
            }
        }
        let parent_dims = self.parent.dimensions();
        let n = parent_dims.len();
        let facade = PlaneFacade {
            parent: self.parent.as_ref(),
            outer,
            width: parent_dims[n - 1].size(),
            height: parent_dims[n - 2].size(),
            plane: RwLock::new(None),
        };
        let total = to_usize(self.output.width)?
            .checked_mul(to_usize(self.output.height)?)
            .ok_or_else(|| MdError::OutOfMemory("output plane too large".to_string()))?;
        let mut plane = vec![0f64; total];
        self.engine.warp_plane(
            &facade,
            &self.georef,
            &self.output,
            &self.resampling,
            &mut plane,
        )?;
        *self.cache.write() = Some((outer.to_vec(), plane.clone()));
        Ok(plane)
    }
}

impl AbstractArray for ResampledArray {
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

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
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
        let n = self.dims.len();
        let (ny, nx) = (n - 2, n - 1);
        let element_size = buffer_type
            .fixed_size()
            .ok_or_else(|| MdError::not_supported("variable-sized buffer data type"))?;
        let f64_type = ExtendedDataType::numeric(NumericKind::Float64);
        let width = to_usize(self.output.width)?;
        crate::array::chunking::for_each_index(&count[..ny], &mut |outer_idx| {
            let outer: Vec<u64> = outer_idx
                .iter()
                .enumerate()
                .map(|(i, &idx)| (start[i] as i64 + idx as i64 * step[i]) as u64)
                .collect();
            let plane = self.warped_plane(&outer)?;
            let outer_offset = element_offset(outer_idx, &stride[..ny], origin);
            for y in 0..count[ny] {
                let src_y = (start[ny] as i64 + y as i64 * step[ny]) as usize;
                for x in 0..count[nx] {
                    let src_x = (start[nx] as i64 + x as i64 * step[nx]) as usize;
                    let value = plane[src_y * width + src_x];
                    let dst = (outer_offset as isize
                        + y as isize * stride[ny]
                        + x as isize * stride[nx]) as usize
                        * element_size;
                    ExtendedDataType::copy_value(
                        &value.to_ne_bytes(),
                        &f64_type,
                        &mut buffer[dst..dst + element_size],
                        buffer_type,
                    )?;
                }
            }
            Ok(())
        })
    }
}

impl MDArray for ResampledArray {
    fn raw_nodata(&self) -> Option<Vec<u8>> {
        self.parent
            .nodata_as_f64()
            .map(|v| v.to_ne_bytes().to_vec())
    }

    fn unit(&self) -> String {
        self.parent.unit()
    }

    fn spatial_ref(&self) -> Option<String> {
        self.output.srs_wkt.clone()
    }
}

fn coordinate_values(dim: &Arc<Dimension>) -> Result<Option<Vec<f64>>, MdError> {
    let Some(var) = dim.indexing_variable() else {
        return Ok(None);
    };
    let n = to_usize(dim.size())?;
    let mut raw = vec![0u8; n * 8];
    var.read(
        &[0],
        &[n],
        None,
        None,
        &ExtendedDataType::numeric(NumericKind::Float64),
        &mut raw,
        0,
    )?;
    Ok(Some(
        raw.chunks_exact(8)
            .map(|c| f64::from_ne_bytes(c.try_into().unwrap_or_default()))
            .collect(),
    ))
}

/// Return a read-only view of `array` with its two trailing axes
/// reprojected onto `output` through `engine`.
///
/// The source georeferencing is an affine transform inferred from the
/// trailing dimensions' indexing variables when their spacing is regular
/// (see [`guess_geo_transform`]), else a geolocation description built from
/// the same coordinate values.
///
/// # Errors
/// Returns [`MdError`] if `array` has fewer than two dimensions, `output`
/// has a zero extent, or the trailing dimensions carry no indexing
/// variables.
pub fn resampled(
    array: Arc<dyn MDArray>,
    engine: Arc<dyn WarpEngine>,
    output: OutputGrid,
    resampling: &str,
) -> Result<Arc<dyn MDArray>, MdError> {
    let parent_dims = array.dimensions().to_vec();
    let n = parent_dims.len();
    if n < 2 {
        return Err(IncompatibleDimensionalityError::new(n, 2).into());
    }
    if output.width == 0 || output.height == 0 {
        return Err(MdError::illegal("output grid size 0 is not allowed"));
    }
    let x = coordinate_values(&parent_dims[n - 1])?;
    let y = coordinate_values(&parent_dims[n - 2])?;
    let (Some(x), Some(y)) = (x, y) else {
        return Err(MdError::not_supported(
            "cannot determine source georeferencing without indexing variables",
        ));
    };
    let georef = guess_geo_transform(&x, &y)
        .map_or(SourceGeoref::Geolocation { x, y }, SourceGeoref::Affine);
    let mut dims: Vec<Arc<Dimension>> = parent_dims[..n - 2].to_vec();
    dims.push(Dimension::new(
        "",
        "resampled_y",
        "HORIZONTAL_Y",
        "",
        output.height,
    ));
    dims.push(Dimension::new(
        "",
        "resampled_x",
        "HORIZONTAL_X",
        "",
        output.width,
    ));
    let full_name = format!("Resampled view of {}", array.full_name());
    Ok(Arc::new(ResampledArray {
        parent: array,
        engine,
        output,
        resampling: resampling.to_string(),
        georef,
        full_name,
        dims,
        data_type: ExtendedDataType::numeric(NumericKind::Float64),
        cache: RwLock::new(None),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_transform_from_regular_coordinates() {
        let x = [0.5, 1.5, 2.5, 3.5];
        let y = [10.0, 8.0, 6.0];
        let gt = guess_geo_transform(&x, &y).unwrap();
        assert_eq!(gt, [0.0, 1.0, 0.0, 11.0, 0.0, -2.0]);
    }

    #[test]
    fn geo_transform_rejects_irregular_spacing() {
        assert!(guess_geo_transform(&[0.0, 1.0, 2.5], &[0.0, 1.0]).is_none());
        assert!(guess_geo_transform(&[0.0], &[0.0, 1.0]).is_none());
        // jitter below the tolerance is accepted
        assert!(guess_geo_transform(&[0.0, 1.0, 2.0005], &[0.0, 1.0]).is_some());
    }
}
