//! Deep structural copy of groups and arrays.
//!
//! [`copy_group`] recreates a source hierarchy (dimensions, attributes,
//! arrays, child groups) under a destination group, streaming array
//! payloads chunk by chunk. Progress is reported as copied cost over
//! [`total_copy_cost`], where structural objects carry fixed costs and
//! array payloads their byte size, so the fraction is monotone across the
//! whole walk.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::array::{AbstractArray, MDArray, ProgressFn};
use crate::config::global_config;
use crate::data_type::{DataTypeSize, ExtendedDataType, NumericKind};
use crate::dimension::Dimension;
use crate::error::MdError;
use crate::group::{open_dimension_from_full_name, Group};
use crate::options::OptionList;
use crate::statistics::compute_statistics;
use crate::view::unscaled;

/// Fixed copy cost of a group, for progress accounting.
pub const GROUP_COPY_COST: u64 = 1000;
/// Fixed copy cost of an attribute, for progress accounting.
pub const ATTRIBUTE_COPY_COST: u64 = 100;
/// Fixed copy cost of an array besides its payload, for progress
/// accounting.
pub const ARRAY_COPY_COST: u64 = 1000;

fn array_bytes(array: &Arc<dyn MDArray>) -> u64 {
    let element = array.data_type().fixed_size().unwrap_or(0) as u64;
    array.total_element_count().saturating_mul(element)
}

/// The total copy cost of a group hierarchy, the denominator of the
/// progress fraction reported by [`copy_group`].
#[must_use]
pub fn total_copy_cost(group: &Arc<dyn Group>) -> u64 {
    let mut cost = GROUP_COPY_COST + group.attributes().len() as u64 * ATTRIBUTE_COPY_COST;
    for name in group.array_names() {
        if let Some(array) = group.open_array(&name) {
            cost += ARRAY_COPY_COST
                + array.attributes().len() as u64 * ATTRIBUTE_COPY_COST
                + array_bytes(&array);
        }
    }
    for name in group.group_names() {
        if let Some(sub) = group.open_group(&name) {
            cost += total_copy_cost(&sub);
        }
    }
    cost
}

struct CopyContext<'a, 'b> {
    strict: bool,
    options: &'a OptionList,
    current_cost: u64,
    total_cost: u64,
    progress: &'a mut ProgressFn<'b>,
}

impl CopyContext<'_, '_> {
    /// Report progress, counting `extra_cost` beyond the booked cost.
    #[allow(clippy::cast_precision_loss)]
    fn report(&mut self, extra_cost: f64) -> Result<(), MdError> {
        let fraction = if self.total_cost == 0 {
            1.0
        } else {
            ((self.current_cost as f64 + extra_cost) / self.total_cost as f64).min(1.0)
        };
        if (self.progress)(fraction) {
            Ok(())
        } else {
            Err(MdError::Stopped)
        }
    }

    /// A child failure aborts a strict copy and is skipped otherwise.
    fn child_failed(&self, error: MdError) -> Result<(), MdError> {
        if self.strict {
            Err(error)
        } else {
            Ok(())
        }
    }
}

fn copy_attribute_value(
    dst: &Arc<dyn crate::attribute::Attribute>,
    src: &Arc<dyn crate::attribute::Attribute>,
) -> Result<(), MdError> {
    let start = vec![0u64; src.dimensionality()];
    let count = src
        .dimensions()
        .iter()
        .map(|d| {
            usize::try_from(d.size())
                .map_err(|_| MdError::OutOfMemory("attribute too large".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let total: usize = count.iter().product();
    match src.data_type().size() {
        DataTypeSize::Variable => {
            let mut values = vec![String::new(); total];
            src.read_strings(&start, &count, &mut values)?;
            dst.write_strings(&start, &count, &values)
        }
        DataTypeSize::Fixed(size) => {
            let mut buffer = vec![0u8; total * size];
            src.read(&start, &count, None, None, src.data_type(), &mut buffer, 0)?;
            dst.write(&start, &count, None, None, src.data_type(), &buffer, 0)
        }
    }
}

fn copy_attributes(
    ctx: &mut CopyContext<'_, '_>,
    attrs: &[Arc<dyn crate::attribute::Attribute>],
    create: &mut dyn FnMut(
        &str,
        &[u64],
        ExtendedDataType,
    ) -> Result<Arc<dyn crate::attribute::Attribute>, MdError>,
) -> Result<(), MdError> {
    for attr in attrs {
        let dim_sizes: Vec<u64> = attr.dimensions().iter().map(|d| d.size()).collect();
        match create(&attr.name(), &dim_sizes, attr.data_type().clone()) {
            Ok(dst_attr) => {
                if let Err(error) = copy_attribute_value(&dst_attr, attr) {
                    ctx.child_failed(error)?;
                }
            }
            Err(error) => ctx.child_failed(error)?,
        }
    }
    ctx.current_cost += attrs.len() as u64 * ATTRIBUTE_COPY_COST;
    ctx.report(0.0)
}

fn copy_values(
    ctx: &mut CopyContext<'_, '_>,
    src: &Arc<dyn MDArray>,
    target: &Arc<dyn MDArray>,
    copy_type: &ExtendedDataType,
    src_nodata_to_nan: Option<f64>,
) -> Result<(), MdError> {
    let total_bytes = array_bytes(src);
    if src.data_type().size() == DataTypeSize::Variable {
        // unbounded strings go through the typed path in one piece
        let start = vec![0u64; src.dimensionality()];
        let count = src
            .dimensions()
            .iter()
            .map(|d| {
                usize::try_from(d.size())
                    .map_err(|_| MdError::OutOfMemory("array too large".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let total: usize = count.iter().product();
        let mut values = vec![String::new(); total];
        src.read_strings(&start, &count, &mut values)?;
        target.write_strings(&start, &count, &values)?;
        ctx.current_cost += total_bytes;
        return ctx.report(0.0);
    }
    let element = copy_type
        .fixed_size()
        .ok_or_else(|| MdError::not_supported("variable-sized copy type"))?;
    if src.dimensionality() == 0 {
        let mut buffer = vec![0u8; element];
        src.read(&[], &[], None, None, copy_type, &mut buffer, 0)?;
        target.write(&[], &[], None, None, copy_type, &buffer, 0)?;
        ctx.current_cost += total_bytes;
        return ctx.report(0.0);
    }
    let budget = ctx
        .options
        .fetch("SWATH_SIZE")
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| global_config().chunk_byte_budget());
    let chunk_size = src.processing_chunk_size(budget);
    let temp_len = chunk_size
        .iter()
        .try_fold(element, |acc, &c| acc.checked_mul(c))
        .ok_or_else(|| MdError::OutOfMemory("cannot allocate temporary buffer".to_string()))?;
    let mut temp = vec![0u8; temp_len];
    let start = vec![0u64; src.dimensionality()];
    let count: Vec<u64> = src.dimensions().iter().map(|d| d.size()).collect();
    let result = src.process_per_chunk(
        &start,
        &count,
        &chunk_size,
        &mut |chunk_start, chunk_count, chunk_idx, chunk_total| {
            src.read(chunk_start, chunk_count, None, None, copy_type, &mut temp, 0)?;
            if let Some(nodata) = src_nodata_to_nan {
                for chunk in temp.chunks_exact_mut(8) {
                    let value = f64::from_ne_bytes(chunk.try_into().unwrap_or_default());
                    if value == nodata {
                        chunk.copy_from_slice(&f64::NAN.to_ne_bytes());
                    }
                }
            }
            target.write(chunk_start, chunk_count, None, None, copy_type, &temp, 0)?;
            #[allow(clippy::cast_precision_loss)]
            ctx.report(chunk_idx as f64 / chunk_total as f64 * total_bytes as f64)
        },
    );
    ctx.current_cost += total_bytes;
    result
}

#[allow(clippy::needless_pass_by_value)]
fn copy_array_inner(
    ctx: &mut CopyContext<'_, '_>,
    dst: &Arc<dyn MDArray>,
    src: &Arc<dyn MDArray>,
    write_target: Option<Arc<dyn MDArray>>,
) -> Result<(), MdError> {
    let src_attrs = src.attributes();
    copy_attributes(ctx, &src_attrs, &mut |name, dim_sizes, data_type| {
        dst.create_attribute(name, dim_sizes, data_type, &OptionList::new())
    })?;
    if let Some(wkt) = src.spatial_ref() {
        if let Err(error) = dst.set_spatial_ref(Some(&wkt)) {
            ctx.child_failed(error)?;
        }
    }
    let autoscaled = write_target.is_some();
    if !autoscaled {
        if let Some(nodata) = src.raw_nodata() {
            if src.data_type() == dst.data_type() {
                if let Err(error) = dst.set_raw_nodata(Some(&nodata)) {
                    ctx.child_failed(error)?;
                }
            }
        }
        if let Some(offset) = src.offset() {
            if let Err(error) = dst.set_offset(Some(offset)) {
                ctx.child_failed(error)?;
            }
        }
        if let Some(scale) = src.scale() {
            if let Err(error) = dst.set_scale(Some(scale)) {
                ctx.child_failed(error)?;
            }
        }
    }
    let unit = src.unit();
    if !unit.is_empty() {
        if let Err(error) = dst.set_unit(&unit) {
            ctx.child_failed(error)?;
        }
    }
    ctx.current_cost += ARRAY_COPY_COST;
    let (target, copy_type, nodata_to_nan) = match write_target {
        Some(view) => (
            view,
            ExtendedDataType::numeric(NumericKind::Float64),
            src.nodata_as_f64(),
        ),
        None => (dst.clone(), src.data_type().clone(), None),
    };
    copy_values(ctx, src, &target, &copy_type, nodata_to_nan)
}

fn autoscale_kind(options: &OptionList) -> Result<NumericKind, MdError> {
    let name = options.fetch_default("AUTOSCALE_DATA_TYPE", "UInt16");
    for (token, kind) in [
        ("Byte", NumericKind::UInt8),
        ("UInt16", NumericKind::UInt16),
        ("Int16", NumericKind::Int16),
        ("UInt32", NumericKind::UInt32),
        ("Int32", NumericKind::Int32),
    ] {
        if name.eq_ignore_ascii_case(token) {
            return Ok(kind);
        }
    }
    Err(MdError::IllegalArgument(format!(
        "invalid value for AUTOSCALE_DATA_TYPE: {name}"
    )))
}

#[allow(clippy::cast_precision_loss)]
fn kind_max(kind: NumericKind) -> f64 {
    match kind.integer_range() {
        Some((_, max)) => max as f64,
        None => f64::MAX,
    }
}

#[allow(clippy::too_many_lines)]
fn copy_group_inner(
    ctx: &mut CopyContext<'_, '_>,
    dst_root: &Arc<dyn Group>,
    dst: &Arc<dyn Group>,
    src: &Arc<dyn Group>,
) -> Result<(), MdError> {
    ctx.current_cost += GROUP_COPY_COST;
    let mut existing_dims: BTreeMap<String, Arc<Dimension>> = BTreeMap::new();
    // source indexing-variable name -> dimension name, re-linked after the
    // named array has been copied
    let mut indexing_map: BTreeMap<String, String> = BTreeMap::new();
    for dim in src.dimensions() {
        match dst.create_dimension(dim.name(), dim.dim_type(), dim.direction(), dim.size()) {
            Ok(created) => {
                existing_dims.insert(dim.name().to_string(), created);
            }
            Err(error) => ctx.child_failed(error)?,
        }
        if let Some(var) = dim.indexing_variable() {
            indexing_map.insert(var.name(), dim.name().to_string());
        }
    }
    let src_attrs = src.attributes();
    copy_attributes(ctx, &src_attrs, &mut |name, dim_sizes, data_type| {
        dst.create_attribute(name, dim_sizes, data_type, &OptionList::new())
    })?;
    for array_name in src.array_names() {
        let Some(src_array) = src.open_array(&array_name) else {
            ctx.child_failed(MdError::Backend(format!("cannot open array {array_name}")))?;
            continue;
        };
        let src_dims = src_array.dimensions().to_vec();
        let mut dst_dims = Vec::with_capacity(src_dims.len());
        for dim in &src_dims {
            let resolved = open_dimension_from_full_name(dst_root, dim.full_name())
                .filter(|d| d.size() == dim.size())
                .or_else(|| {
                    existing_dims
                        .get(dim.name())
                        .filter(|d| d.size() == dim.size())
                        .cloned()
                });
            let resolved = match resolved {
                Some(d) => d,
                None => {
                    let mut dim_name = dim.name().to_string();
                    if existing_dims.contains_key(&dim_name) {
                        dim_name = format!("{}_{array_name}", dim.name());
                        let mut suffix = 2;
                        while existing_dims.contains_key(&dim_name) {
                            dim_name = format!("{}_{array_name}_{suffix}", dim.name());
                            suffix += 1;
                        }
                    }
                    let created = dst.create_dimension(
                        &dim_name,
                        dim.dim_type(),
                        dim.direction(),
                        dim.size(),
                    )?;
                    existing_dims.insert(dim_name, created.clone());
                    created
                }
            };
            dst_dims.push(resolved);
        }
        let scoped = ctx.options.array_scoped(&array_name, src_dims.len());
        let autoscale = ctx.options.fetch_bool("AUTOSCALE", false)
            && src_array
                .data_type()
                .numeric_kind()
                .is_some_and(NumericKind::is_floating);
        let mut autoscale_stats = None;
        let dst_type = if autoscale {
            let kind = autoscale_kind(ctx.options)?;
            autoscale_stats = Some((kind, compute_statistics(&src_array, None, None)?));
            ExtendedDataType::numeric(kind)
        } else {
            src_array.data_type().clone()
        };
        let dst_array = match dst.create_array(&array_name, &dst_dims, dst_type, &scoped) {
            Ok(array) => array,
            Err(error) => {
                ctx.child_failed(error)?;
                continue;
            }
        };
        let write_target = if let Some((kind, stats)) = autoscale_stats {
            let has_nodata = src_array.raw_nodata().is_some();
            let reserve = f64::from(u8::from(has_nodata));
            let span = kind_max(kind) - reserve;
            let scale = if stats.max > stats.min && span > 0.0 {
                (stats.max - stats.min) / span
            } else {
                1.0
            };
            dst_array.set_offset(Some(stats.min))?;
            dst_array.set_scale(Some(scale))?;
            if has_nodata {
                dst_array.set_nodata_f64(kind_max(kind))?;
            }
            Some(unscaled(dst_array.clone())?)
        } else {
            None
        };
        copy_array_inner(ctx, &dst_array, &src_array, write_target)?;
        if let Some(dim_name) = indexing_map.get(&array_name) {
            if let Some(dim) = existing_dims.get(dim_name) {
                // best effort, a failed link does not fail the copy
                let _ = dim.set_indexing_variable(dst_array.clone());
            }
        }
    }
    for group_name in src.group_names() {
        let Some(src_sub) = src.open_group(&group_name) else {
            ctx.child_failed(MdError::Backend(format!("cannot open group {group_name}")))?;
            continue;
        };
        match dst.create_group(&group_name, &OptionList::new()) {
            Ok(dst_sub) => copy_group_inner(ctx, dst_root, &dst_sub, &src_sub)?,
            Err(error) => ctx.child_failed(error)?,
        }
    }
    ctx.report(0.0)
}

/// Deep copy `src` (dimensions, attributes, arrays, child groups) into
/// `dst`. `dst_root` is the root under which dimension full names are
/// resolved, usually the root group of the destination hierarchy.
///
/// `strict` aborts on the first child failure instead of skipping.
/// Recognized options: `AUTOSCALE`, `AUTOSCALE_DATA_TYPE`, `SWATH_SIZE`,
/// and `ARRAY:`-scoped creation options.
///
/// # Errors
/// Returns [`MdError::Stopped`] when `progress` cancels, or the first
/// child failure under `strict`.
pub fn copy_group(
    dst: &Arc<dyn Group>,
    dst_root: &Arc<dyn Group>,
    src: &Arc<dyn Group>,
    strict: bool,
    options: &OptionList,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), MdError> {
    let mut accept = |_: f64| true;
    let progress: &mut ProgressFn<'_> = match progress {
        Some(p) => p,
        None => &mut accept,
    };
    let mut ctx = CopyContext {
        strict,
        options,
        current_cost: 0,
        total_cost: total_copy_cost(src),
        progress,
    };
    copy_group_inner(&mut ctx, dst_root, dst, src)
}

/// Deep copy a single array (attributes, metadata, payload) into `dst`.
///
/// # Errors
/// Returns [`MdError::Stopped`] when `progress` cancels, or the first
/// failure under `strict`.
pub fn copy_array(
    dst: &Arc<dyn MDArray>,
    src: &Arc<dyn MDArray>,
    strict: bool,
    options: &OptionList,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), MdError> {
    let mut accept = |_: f64| true;
    let progress: &mut ProgressFn<'_> = match progress {
        Some(p) => p,
        None => &mut accept,
    };
    let total = ARRAY_COPY_COST
        + src.attributes().len() as u64 * ATTRIBUTE_COPY_COST
        + array_bytes(src);
    let mut ctx = CopyContext {
        strict,
        options,
        current_cost: 0,
        total_cost: total,
        progress,
    };
    copy_array_inner(&mut ctx, dst, src, None)
}
