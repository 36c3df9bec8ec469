//! Chunked traversal of array selections.
//!
//! [`processing_chunk_size`] derives a chunk shape from an array's natural
//! block size and a byte budget. [`process_per_chunk`] walks a selection in
//! chunks aligned on multiples of that shape, so each natural block is
//! touched by exactly one chunk.

use crate::error::{IncompatibleDimensionalityError, MdError};

use super::ChunkCallback;

/// Derive a chunk shape suited to traversing an array of `dim_sizes` under a
/// temporary buffer of at most `max_bytes`.
///
/// Starts from `block_size` clamped per axis into `1..=dim_sizes[i]` (0
/// means no natural blocking and clamps to 1). If the resulting chunk does
/// not fill half the budget, chunks are grown from the fastest varying axis
/// backward, by whole multiples of the natural block, until the budget or
/// the dimension size is reached.
#[must_use]
pub fn processing_chunk_size(
    dim_sizes: &[u64],
    block_size: &[u64],
    element_size: usize,
    max_bytes: usize,
) -> Vec<usize> {
    let n = dim_sizes.len();
    let mut chunk: Vec<usize> = (0..n)
        .map(|i| {
            let clamped = block_size[i].clamp(1, dim_sizes[i].max(1));
            usize::try_from(clamped).unwrap_or(usize::MAX)
        })
        .collect();
    // Reduce from the last axis backward if the chunk cannot be addressed.
    let mut chunk_bytes: u128 = element_size as u128;
    for c in &chunk {
        chunk_bytes = chunk_bytes.saturating_mul(*c as u128);
    }
    if chunk_bytes > usize::MAX as u128 {
        let mut acc = element_size as u128;
        for i in (0..n).rev() {
            if acc.saturating_mul(chunk[i] as u128) > usize::MAX as u128 {
                chunk[i] = 1;
            } else {
                acc *= chunk[i] as u128;
            }
        }
        chunk_bytes = acc;
    }
    if chunk_bytes > (max_bytes / 2) as u128 {
        return chunk;
    }
    let original = chunk.clone();
    // element_size * product of the original chunk sizes up to each axis
    let mut acc_from_start = vec![0u128; n];
    let mut acc = element_size as u128;
    for i in 0..n {
        acc = acc.saturating_mul(original[i] as u128);
        acc_from_start[i] = acc;
    }
    let mut voxels_from_end: u128 = 1;
    for i in (0..n).rev() {
        let current_block = acc_from_start[i].saturating_mul(voxels_from_end);
        let multiplier = max_bytes as u128 / current_block.max(1);
        if multiplier >= 2 {
            let whole_blocks = u128::from(dim_sizes[i].div_ceil(original[i] as u64));
            let grown = (chunk[i] as u128 * multiplier.min(whole_blocks))
                .min(u128::from(dim_sizes[i]));
            chunk[i] = usize::try_from(grown).unwrap_or(usize::MAX);
        }
        voxels_from_end = voxels_from_end.saturating_mul(chunk[i] as u128);
    }
    chunk
}

/// Invoke `callback` once per chunk of `chunk_size` intersecting the
/// selection `start`/`count`, in row-major order.
///
/// Chunk boundaries fall on multiples of `chunk_size`, so the first and
/// last chunk along an axis may be partial. The callback receives the chunk
/// start indices, the chunk counts, the 1-based running chunk index and the
/// total chunk count, and may stop the traversal by returning an error
/// (return [`MdError::Stopped`] for a plain cancellation).
///
/// A zero-dimensional selection yields a single callback invocation.
///
/// # Errors
/// Returns [`MdError::IllegalArgument`] on an inconsistent selection or
/// chunk shape, or the first error returned by the callback.
pub fn process_per_chunk(
    dim_sizes: &[u64],
    start: &[u64],
    count: &[u64],
    chunk_size: &[usize],
    callback: &mut ChunkCallback<'_>,
) -> Result<(), MdError> {
    let n = dim_sizes.len();
    for len in [start.len(), count.len(), chunk_size.len()] {
        if len != n {
            return Err(IncompatibleDimensionalityError::new(len, n).into());
        }
    }
    if n == 0 {
        return callback(&[], &[], 1, 1);
    }
    let mut start_block = vec![0u64; n];
    let mut blocks_minus_one = vec![0u64; n];
    let mut total: u128 = 1;
    for i in 0..n {
        let size = dim_sizes[i];
        if count[i] == 0 || count[i] > size || start[i] > size - count[i] {
            return Err(MdError::illegal("inconsistent start[] / count[] values"));
        }
        let chunk = chunk_size[i] as u64;
        if chunk == 0 || chunk > size {
            return Err(MdError::illegal("inconsistent chunk_size[] values"));
        }
        start_block[i] = start[i] / chunk;
        let end_block = (start[i] + count[i] - 1) / chunk;
        blocks_minus_one[i] = end_block - start_block[i];
        total *= u128::from(blocks_minus_one[i]) + 1;
    }
    let total =
        u64::try_from(total).map_err(|_| MdError::OutOfMemory("too many chunks".to_string()))?;
    let mut block_idx = vec![0u64; n];
    let mut chunk_start = vec![0u64; n];
    let mut chunk_count = vec![0usize; n];
    let mut current = 1u64;
    loop {
        for i in 0..n {
            let chunk = chunk_size[i] as u64;
            let b = block_idx[i];
            let first = if b == 0 {
                start[i]
            } else {
                (start_block[i] + b) * chunk
            };
            let end = if b == blocks_minus_one[i] {
                start[i] + count[i]
            } else {
                (start_block[i] + b + 1) * chunk
            };
            chunk_start[i] = first;
            chunk_count[i] = usize::try_from(end - first)
                .map_err(|_| MdError::OutOfMemory("chunk too large".to_string()))?;
        }
        callback(&chunk_start, &chunk_count, current, total)?;
        let mut axis = n;
        loop {
            if axis == 0 {
                return Ok(());
            }
            axis -= 1;
            if block_idx[axis] < blocks_minus_one[axis] {
                block_idx[axis] += 1;
                break;
            }
            block_idx[axis] = 0;
        }
        current += 1;
    }
}

/// Visit every index tuple of the extent `count`, row-major. An empty
/// extent visits the single zero-dimensional tuple.
pub(crate) fn for_each_index(
    count: &[usize],
    f: &mut dyn FnMut(&[usize]) -> Result<(), MdError>,
) -> Result<(), MdError> {
    if count.is_empty() {
        return f(&[]);
    }
    if count.contains(&0) {
        return Ok(());
    }
    let mut idx = vec![0usize; count.len()];
    loop {
        f(&idx)?;
        let mut axis = count.len();
        loop {
            if axis == 0 {
                return Ok(());
            }
            axis -= 1;
            idx[axis] += 1;
            if idx[axis] < count[axis] {
                break;
            }
            idx[axis] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_grows_within_budget() {
        assert_eq!(processing_chunk_size(&[1000], &[0], 1, 100), [100]);
        assert_eq!(processing_chunk_size(&[10, 100], &[1, 10], 1, 1000), [10, 100]);
        // over half the budget already, kept as-is
        assert_eq!(
            processing_chunk_size(&[4, 1000], &[2, 300], 4, 4000),
            [2, 300]
        );
    }

    #[test]
    fn chunk_size_clamps_blocks() {
        assert_eq!(processing_chunk_size(&[5], &[64], 8, 1), [5]);
        assert_eq!(processing_chunk_size(&[5, 7], &[0, 0], 8, 0), [1, 1]);
    }

    #[test]
    fn per_chunk_partial_edges() {
        let mut seen = Vec::new();
        process_per_chunk(&[10], &[2], &[6], &[4], &mut |start, count, cur, total| {
            seen.push((start.to_vec(), count.to_vec(), cur, total));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            [
                (vec![2], vec![2], 1, 2),
                (vec![4], vec![4], 2, 2),
            ]
        );
    }

    #[test]
    fn per_chunk_row_major_order() {
        let mut seen = Vec::new();
        process_per_chunk(
            &[4, 10],
            &[1, 2],
            &[2, 6],
            &[2, 4],
            &mut |start, count, cur, total| {
                assert_eq!(total, 4);
                seen.push((start.to_vec(), count.to_vec(), cur));
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(
            seen,
            [
                (vec![1, 2], vec![1, 2], 1),
                (vec![1, 4], vec![1, 4], 2),
                (vec![2, 2], vec![1, 2], 3),
                (vec![2, 4], vec![1, 4], 4),
            ]
        );
    }

    #[test]
    fn per_chunk_zero_dimensional() {
        let mut calls = 0;
        process_per_chunk(&[], &[], &[], &[], &mut |start, count, cur, total| {
            assert!(start.is_empty() && count.is_empty());
            assert_eq!((cur, total), (1, 1));
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn per_chunk_rejects_inconsistent_selection() {
        let err = process_per_chunk(&[10], &[5], &[6], &[4], &mut |_, _, _, _| Ok(()));
        assert!(err.is_err());
        assert!(process_per_chunk(&[10], &[0], &[4], &[0], &mut |_, _, _, _| Ok(())).is_err());
    }

    #[test]
    fn per_chunk_stops_on_callback_error() {
        let mut calls = 0;
        let result = process_per_chunk(&[10], &[0], &[10], &[2], &mut |_, _, cur, _| {
            calls += 1;
            if cur == 2 {
                Err(MdError::Stopped)
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(MdError::Stopped)));
        assert_eq!(calls, 2);
    }

    #[test]
    fn index_iteration_is_row_major() {
        let mut seen = Vec::new();
        for_each_index(&[2, 3], &mut |idx| {
            seen.push(idx.to_vec());
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            [
                [0, 0], [0, 1], [0, 2],
                [1, 0], [1, 1], [1, 2],
            ]
        );
    }
}
