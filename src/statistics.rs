//! Statistics over array values.

use std::sync::Arc;

use crate::array::{AbstractArray, MDArray, ProgressFn};
use crate::config::global_config;
use crate::data_type::{ExtendedDataType, NumericKind};
use crate::error::MdError;
use crate::view::masked;

/// Summary statistics of the valid elements of an array.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Statistics {
    /// Smallest valid value (0 when no element is valid).
    pub min: f64,
    /// Largest valid value (0 when no element is valid).
    pub max: f64,
    /// Arithmetic mean of the valid values.
    pub mean: f64,
    /// Population standard deviation of the valid values.
    pub std_dev: f64,
    /// Number of valid elements.
    pub valid_count: u64,
}

/// A sidecar persistence collaborator for computed statistics, keyed by the
/// array's full name.
pub trait StatisticsCache: Send + Sync {
    /// Previously stored statistics for `path`, if any.
    fn statistics(&self, path: &str) -> Option<Statistics>;

    /// Store statistics for `path`.
    fn set_statistics(&self, path: &str, statistics: &Statistics);

    /// Forget any stored statistics for `path`.
    fn clear_statistics(&self, path: &str);
}

/// Compute statistics over the valid elements of `array`, chunk by chunk.
///
/// Validity follows the array's [mask](crate::view::masked). Stored
/// statistics from `cache` are returned without recomputation; freshly
/// computed results are offered back to it. The standard deviation is the
/// population deviation, `sqrt(M2 / count)`.
///
/// # Errors
/// Returns [`MdError::NotSupported`] for complex-typed arrays,
/// [`MdError::Stopped`] when `progress` cancels, or any backend failure.
pub fn compute_statistics(
    array: &Arc<dyn MDArray>,
    mut progress: Option<&mut ProgressFn<'_>>,
    cache: Option<&dyn StatisticsCache>,
) -> Result<Statistics, MdError> {
    if array
        .data_type()
        .numeric_kind()
        .map_or(true, NumericKind::is_complex)
    {
        return Err(MdError::not_supported(
            "statistics are not supported for this data type",
        ));
    }
    let full_name = array.full_name();
    if let Some(cache) = cache {
        if let Some(stored) = cache.statistics(&full_name) {
            return Ok(stored);
        }
    }
    let mask = masked(array.clone())?;
    let f64_type = ExtendedDataType::numeric(NumericKind::Float64);
    let u8_type = ExtendedDataType::numeric(NumericKind::UInt8);
    let chunk_size = array.processing_chunk_size(global_config().chunk_byte_budget());
    let start = vec![0u64; array.dimensionality()];
    let count: Vec<u64> = array.dimensions().iter().map(|d| d.size()).collect();

    let mut min = f64::MAX;
    let mut max = f64::MIN;
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    let mut valid_count = 0u64;
    array.process_per_chunk(
        &start,
        &count,
        &chunk_size,
        &mut |chunk_start, chunk_count, chunk_idx, chunk_total| {
            let elements: usize = chunk_count.iter().product();
            let mut values = vec![0u8; elements * 8];
            array.read(chunk_start, chunk_count, None, None, &f64_type, &mut values, 0)?;
            let mut valid = vec![0u8; elements];
            mask.read(chunk_start, chunk_count, None, None, &u8_type, &mut valid, 0)?;
            for (chunk, &is_valid) in values.chunks_exact(8).zip(&valid) {
                if is_valid == 0 {
                    continue;
                }
                let value = f64::from_ne_bytes(chunk.try_into().unwrap_or_default());
                valid_count += 1;
                min = min.min(value);
                max = max.max(value);
                let delta = value - mean;
                #[allow(clippy::cast_precision_loss)]
                {
                    mean += delta / valid_count as f64;
                }
                m2 += delta * (value - mean);
            }
            if let Some(progress) = progress.as_mut() {
                #[allow(clippy::cast_precision_loss)]
                if !progress(chunk_idx as f64 / chunk_total as f64) {
                    return Err(MdError::Stopped);
                }
            }
            Ok(())
        },
    )?;
    let statistics = if valid_count == 0 {
        Statistics {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            std_dev: 0.0,
            valid_count: 0,
        }
    } else {
        #[allow(clippy::cast_precision_loss)]
        Statistics {
            min,
            max,
            mean,
            std_dev: (m2 / valid_count as f64).sqrt(),
            valid_count,
        }
    };
    if let Some(cache) = cache {
        cache.set_statistics(&full_name, &statistics);
    }
    Ok(statistics)
}

/// A trivial in-memory [`StatisticsCache`].
#[derive(Debug, Default)]
pub struct MemoryStatisticsCache(parking_lot::RwLock<std::collections::BTreeMap<String, Statistics>>);

impl MemoryStatisticsCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatisticsCache for MemoryStatisticsCache {
    fn statistics(&self, path: &str) -> Option<Statistics> {
        self.0.read().get(path).copied()
    }

    fn set_statistics(&self, path: &str, statistics: &Statistics) {
        self.0.write().insert(path.to_string(), *statistics);
    }

    fn clear_statistics(&self, path: &str) {
        self.0.write().remove(path);
    }
}
