//! Structural operations (`spec.md` §4.7, component C7): copy, slice,
//! squeeze, resize, append, insert, delete, and orthogonal selection.
//!
//! Two layers, per `spec.md` §9: a `_into` function generic over any
//! [`ChunkStore`] that writes into a destination the caller already built,
//! and a convenience function bounded by [`CreateStore`] that fabricates
//! the destination itself. `resize`, `append`, `insert`, and `delete` always
//! need [`CreateStore`], since they rebuild-and-swap rather than renumber
//! chunks in place. `squeeze`/`squeeze_index` need neither: they only
//! reinterpret the shape descriptor, never touching the store.

use crate::array::CatervaArray;
use crate::cache::ChunkCache;
use crate::context::ConstructionContext;
use crate::error::CatervaError;
use crate::shape::{Coord, Odometer, ShapeDescriptor};
use crate::store::{ChunkStore, CreateStore};

fn region_nitems(start: &[i64], stop: &[i64]) -> i64 {
    start.iter().zip(stop.iter()).map(|(a, b)| b - a).product()
}

/// Copy the region `[start, stop)` of `src` into `dst`, whose shape must
/// already equal `stop - start`. Works across any two store types,
/// including a different tiling on either side.
pub fn slice_into<S: ChunkStore, D: ChunkStore>(
    src: &mut CatervaArray<S>,
    start: &[i64],
    stop: &[i64],
    dst: &mut CatervaArray<D>,
) -> Result<(), CatervaError> {
    let extents: Vec<i64> = start.iter().zip(stop.iter()).map(|(a, b)| b - a).collect();
    if dst.shape() != extents.as_slice() {
        return Err(CatervaError::invalid_shape(
            "destination shape does not match the sliced region's extent",
        ));
    }
    let typesize = src.typesize() as usize;
    let mut buf = vec![0u8; region_nitems(start, stop) as usize * typesize];
    src.read_region(start, stop, &mut buf)?;
    let zeros = vec![0i64; extents.len()];
    dst.write_region(&zeros, &extents, &buf)
}

/// Slice `src` into a freshly created array with the given tiling.
pub fn slice<S: ChunkStore, D: CreateStore>(
    src: &mut CatervaArray<S>,
    start: &[i64],
    stop: &[i64],
    chunkshape: &[i64],
    blockshape: &[i64],
) -> Result<CatervaArray<D>, CatervaError> {
    let extents: Vec<i64> = start.iter().zip(stop.iter()).map(|(a, b)| b - a).collect();
    let ctx = ConstructionContext::new(&extents, chunkshape, blockshape, src.typesize())?;
    let mut dst = CatervaArray::<D>::empty(ctx)?;
    slice_into(src, start, stop, &mut dst)?;
    Ok(dst)
}

/// Copy the whole of `src` into `dst`, whose shape must equal `src`'s.
/// Unlike [`slice_into`], `dst` may use a completely different tiling —
/// this is how a caller re-chunks or re-blocks an existing array.
pub fn copy_into<S: ChunkStore, D: ChunkStore>(
    src: &mut CatervaArray<S>,
    dst: &mut CatervaArray<D>,
) -> Result<(), CatervaError> {
    let shape = src.shape().to_vec();
    let zeros = vec![0i64; shape.len()];
    slice_into(src, &zeros, &shape, dst)
}

/// Copy `src` into a freshly created array with the given tiling
/// (`spec.md` testable property: copy is retiling-invariant — the bytes
/// read back are identical regardless of the destination's chunkshape and
/// blockshape).
pub fn copy<S: ChunkStore, D: CreateStore>(
    src: &mut CatervaArray<S>,
    chunkshape: &[i64],
    blockshape: &[i64],
) -> Result<CatervaArray<D>, CatervaError> {
    let shape = src.shape().to_vec();
    let zeros = vec![0i64; shape.len()];
    slice(src, &zeros, &shape, chunkshape, blockshape)
}

fn squeeze_axes<S: ChunkStore>(array: &mut CatervaArray<S>, axis: Option<i64>) -> Result<(), CatervaError> {
    let ndim = array.ndim();
    let shape = array.shape().to_vec();
    let chunkshape = array.chunkshape().to_vec();
    let blockshape = array.blockshape().to_vec();

    let keep: Vec<bool> = match axis {
        None => shape.iter().map(|&e| e != 1).collect(),
        Some(ax) => {
            if ax < 0 || ax as usize >= ndim {
                return Err(CatervaError::bad_axis(ax, "axis out of range"));
            }
            let ax = ax as usize;
            if shape[ax] != 1 {
                return Err(CatervaError::NotSqueezable {
                    axis: ax,
                    extent: shape[ax],
                });
            }
            (0..ndim).map(|i| i != ax).collect()
        }
    };

    // An axis can only be dropped without touching the store if it
    // contributes nothing to a chunk's physical byte layout, i.e. its
    // chunkshape (and therefore blockshape) is 1 — otherwise the bytes
    // currently stored interleave real items with per-chunk padding along
    // that axis, and removing it from the stride computation would silently
    // misalign every read.
    for (i, &k) in keep.iter().enumerate() {
        if !k && (chunkshape[i] != 1 || blockshape[i] != 1) {
            return Err(CatervaError::NotSqueezable {
                axis: i,
                extent: shape[i],
            });
        }
    }

    let new_shape: Vec<i64> = shape.iter().zip(&keep).filter(|(_, k)| **k).map(|(e, _)| *e).collect();
    let new_chunkshape: Vec<i64> = chunkshape
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(e, _)| *e)
        .collect();
    let new_blockshape: Vec<i64> = blockshape
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(e, _)| *e)
        .collect();

    if new_shape.is_empty() {
        return Err(CatervaError::invalid_shape("squeeze would remove every axis"));
    }

    // The stored chunks are untouched (`spec.md`:136) — only the descriptor
    // is rebuilt, over the surviving axes' own extents.
    array.desc = ShapeDescriptor::new(&new_shape, &new_chunkshape, &new_blockshape)?;
    Ok(())
}

/// Drop every axis of extent 1, in place. The store is never touched: only
/// the shape descriptor is recomputed over the surviving axes.
pub fn squeeze<S: ChunkStore>(array: &mut CatervaArray<S>) -> Result<(), CatervaError> {
    squeeze_axes(array, None)
}

/// Drop a single named axis, which must have extent 1, in place.
pub fn squeeze_index<S: ChunkStore>(array: &mut CatervaArray<S>, axis: i64) -> Result<(), CatervaError> {
    squeeze_axes(array, Some(axis))
}

/// Grow or shrink `array` along a single `axis` to `new_extent`, applying
/// the change at `start` (grow inserts padding there, shrink removes items
/// there) — the single-axis step `resize` composes over every changed axis.
/// Implemented as rebuild-and-swap: a fresh store of the new shape is
/// populated from the surviving prefix/suffix of the old store, then
/// swapped in. Grown padding reads back as zero (see `DESIGN.md` Open
/// Question 2); it is up to the caller (e.g. [`insert`]/[`append`]) to
/// overwrite it afterwards.
fn resize_axis<S: CreateStore>(
    array: &mut CatervaArray<S>,
    axis: usize,
    new_extent: i64,
    start: i64,
) -> Result<(), CatervaError> {
    let shape = array.shape().to_vec();
    let old_extent = shape[axis];
    if new_extent == old_extent {
        return Ok(());
    }
    if new_extent < 0 {
        return Err(CatervaError::bad_axis(axis as i64, "resize target extent is negative"));
    }
    let max_extent = old_extent.max(new_extent);
    if start < 0 || start > max_extent {
        return Err(CatervaError::bad_axis(axis as i64, "resize start is out of range"));
    }
    // Shrinking removes exactly `old_extent - new_extent` items starting at
    // `start`; that window has to fit inside the existing extent.
    if new_extent < old_extent && start > new_extent {
        return Err(CatervaError::bad_axis(axis as i64, "resize start leaves a gap when shrinking"));
    }
    if new_extent > old_extent && start > old_extent {
        return Err(CatervaError::bad_axis(axis as i64, "resize start is beyond the existing extent"));
    }

    let ndim = array.ndim();
    let typesize = array.typesize() as usize;
    let chunkshape = array.chunkshape().to_vec();
    let blockshape = array.blockshape().to_vec();
    let mut new_shape = shape.clone();
    new_shape[axis] = new_extent;
    let ctx = ConstructionContext::new(&new_shape, &chunkshape, &blockshape, array.typesize())?;
    let mut new_array = CatervaArray::<S>::empty(ctx)?;

    // Prefix [0, start) survives untouched on both sides of the change.
    if start > 0 {
        let zeros = vec![0i64; ndim];
        let mut stop = shape.clone();
        stop[axis] = start;
        let mut tmp = vec![0u8; region_nitems(&zeros, &stop) as usize * typesize];
        array.read_region(&zeros, &stop, &mut tmp)?;
        new_array.write_region(&zeros, &stop, &tmp)?;
    }

    if new_extent > old_extent {
        // Grow: shift the old suffix [start, old_extent) up by the delta,
        // leaving [start, start + delta) as zero-filled padding.
        if start < old_extent {
            let delta = new_extent - old_extent;
            let mut src_start = vec![0i64; ndim];
            src_start[axis] = start;
            let src_stop = shape.clone();
            let mut tmp = vec![0u8; region_nitems(&src_start, &src_stop) as usize * typesize];
            array.read_region(&src_start, &src_stop, &mut tmp)?;

            let mut dst_start = src_start.clone();
            dst_start[axis] = start + delta;
            let mut dst_stop = new_shape.clone();
            dst_stop[axis] = new_extent;
            for i in 0..ndim {
                if i != axis {
                    dst_stop[i] = src_stop[i];
                }
            }
            new_array.write_region(&dst_start, &dst_stop, &tmp)?;
        }
    } else {
        // Shrink: the removed range is [start, start + delta); the surviving
        // suffix shifts down to close the gap.
        let delta = old_extent - new_extent;
        let removed_end = start + delta;
        if removed_end < old_extent {
            let mut src_start = vec![0i64; ndim];
            src_start[axis] = removed_end;
            let src_stop = shape.clone();
            let mut tmp = vec![0u8; region_nitems(&src_start, &src_stop) as usize * typesize];
            array.read_region(&src_start, &src_stop, &mut tmp)?;

            let mut dst_start = src_start.clone();
            dst_start[axis] = start;
            let mut dst_stop = new_shape.clone();
            dst_stop[axis] = new_extent;
            for i in 0..ndim {
                if i != axis {
                    dst_stop[i] = src_stop[i];
                }
            }
            new_array.write_region(&dst_start, &dst_stop, &tmp)?;
        }
    }

    let old_store = std::mem::replace(&mut array.store, new_array.store);
    array.desc = new_array.desc;
    array.cache = ChunkCache::new();
    old_store.destroy()
}

/// Change `array`'s shape to `new_shape`, applying the change on each axis
/// at `start[i]` (grow inserts uninitialized — zero-read — padding there;
/// shrink removes items there). `spec.md` §4.7 `resize`.
pub fn resize<S: CreateStore>(
    array: &mut CatervaArray<S>,
    new_shape: &[i64],
    start: &[i64],
) -> Result<(), CatervaError> {
    let ndim = array.ndim();
    if new_shape.len() != ndim || start.len() != ndim {
        return Err(CatervaError::invalid_shape("resize must preserve ndim"));
    }
    for axis in 0..ndim {
        resize_axis(array, axis, new_shape[axis], start[axis])?;
    }
    Ok(())
}

fn axis_extent_from_buf(shape: &[i64], typesize: usize, axis: usize, buf_len: usize) -> Result<i64, CatervaError> {
    let mut other: i64 = 1;
    for (i, &e) in shape.iter().enumerate() {
        if i != axis {
            other *= e;
        }
    }
    let row_bytes = other as usize * typesize;
    if row_bytes == 0 || buf_len % row_bytes != 0 {
        return Err(CatervaError::BadBufferSize {
            expected: row_bytes,
            actual: buf_len,
        });
    }
    Ok((buf_len / row_bytes) as i64)
}

/// Shorthand for a resize-grow at the far end of `axis` plus a from-buffer
/// write into the newly allocated region. `spec.md` §4.7 `append`.
pub fn append<S: CreateStore>(array: &mut CatervaArray<S>, axis: i64, buf: &[u8]) -> Result<(), CatervaError> {
    let ndim = array.ndim();
    if axis < 0 || axis as usize >= ndim {
        return Err(CatervaError::bad_axis(axis, "axis out of range"));
    }
    let ax = axis as usize;
    let shape = array.shape().to_vec();
    let add_extent = axis_extent_from_buf(&shape, array.typesize() as usize, ax, buf.len())?;
    let old_extent = shape[ax];

    resize_axis(array, ax, old_extent + add_extent, old_extent)?;

    let mut start = vec![0i64; ndim];
    start[ax] = old_extent;
    let mut stop = array.shape().to_vec();
    stop[ax] = old_extent + add_extent;
    array.write_region(&start, &stop, buf)
}

/// Resize-grow at position `at` along `axis` followed by a from-buffer
/// write into `[at, at + k)` on that axis. `spec.md` §4.7 `insert`.
pub fn insert<S: CreateStore>(
    array: &mut CatervaArray<S>,
    axis: i64,
    at: i64,
    buf: &[u8],
) -> Result<(), CatervaError> {
    let ndim = array.ndim();
    if axis < 0 || axis as usize >= ndim {
        return Err(CatervaError::bad_axis(axis, "axis out of range"));
    }
    let ax = axis as usize;
    let shape = array.shape().to_vec();
    if at < 0 || at > shape[ax] {
        return Err(CatervaError::bad_axis(axis, "insert index out of range"));
    }
    let typesize = array.typesize() as usize;
    let insert_extent = axis_extent_from_buf(&shape, typesize, ax, buf.len())?;

    resize_axis(array, ax, shape[ax] + insert_extent, at)?;

    let mut start = vec![0i64; ndim];
    start[ax] = at;
    let mut stop = array.shape().to_vec();
    stop[ax] = at + insert_extent;
    array.write_region(&start, &stop, buf)
}

/// Resize-shrink along `axis`, removing `[at, at + len)`. `spec.md` §4.7
/// `delete`.
pub fn delete<S: CreateStore>(array: &mut CatervaArray<S>, axis: i64, at: i64, len: i64) -> Result<(), CatervaError> {
    let ndim = array.ndim();
    if axis < 0 || axis as usize >= ndim {
        return Err(CatervaError::bad_axis(axis, "axis out of range"));
    }
    let ax = axis as usize;
    let shape = array.shape().to_vec();
    if at < 0 || len < 0 || at + len > shape[ax] {
        return Err(CatervaError::bad_axis(axis, "delete range out of bounds"));
    }

    resize_axis(array, ax, shape[ax] - len, at)
}

fn validate_selection(shape: &[i64], indices: &[Vec<i64>]) -> Result<(), CatervaError> {
    if indices.len() != shape.len() {
        return Err(CatervaError::invalid_shape(
            "selection rank does not match array ndim",
        ));
    }
    for (axis, idxs) in indices.iter().enumerate() {
        for &i in idxs {
            if i < 0 || i >= shape[axis] {
                return Err(CatervaError::bad_axis(axis as i64, "selection index out of bounds"));
            }
        }
    }
    Ok(())
}

/// Read the Cartesian product of per-axis index lists into `out`, in
/// row-major order of the selection shape (`spec.md` §4.7 orthogonal
/// selection).
// TODO: batch contiguous ascending runs along the last axis into a single
// `read_region` call instead of one per point.
pub fn orthogonal_read<S: ChunkStore>(
    array: &mut CatervaArray<S>,
    indices: &[Vec<i64>],
    out: &mut [u8],
) -> Result<(), CatervaError> {
    let shape = array.shape().to_vec();
    validate_selection(&shape, indices)?;
    let ndim = indices.len();
    let typesize = array.typesize() as usize;

    let total: i64 = indices.iter().map(|v| v.len() as i64).product();
    if out.len() != total as usize * typesize {
        return Err(CatervaError::BadBufferSize {
            expected: total as usize * typesize,
            actual: out.len(),
        });
    }

    let lo = Coord::default();
    let mut hi = Coord::default();
    for i in 0..ndim {
        hi[i] = indices[i].len() as i64;
    }

    let mut point = vec![0u8; typesize];
    let mut pos = 0usize;
    for counters in Odometer::new(lo, hi, ndim) {
        let coord: Vec<i64> = (0..ndim).map(|i| indices[i][counters[i] as usize]).collect();
        let stop: Vec<i64> = coord.iter().map(|c| c + 1).collect();
        array.read_region(&coord, &stop, &mut point)?;
        out[pos..pos + typesize].copy_from_slice(&point);
        pos += typesize;
    }
    Ok(())
}

/// Write `input` onto the Cartesian product of per-axis index lists, in
/// row-major order of the selection shape.
pub fn orthogonal_write<S: ChunkStore>(
    array: &mut CatervaArray<S>,
    indices: &[Vec<i64>],
    input: &[u8],
) -> Result<(), CatervaError> {
    let shape = array.shape().to_vec();
    validate_selection(&shape, indices)?;
    let ndim = indices.len();
    let typesize = array.typesize() as usize;

    let total: i64 = indices.iter().map(|v| v.len() as i64).product();
    if input.len() != total as usize * typesize {
        return Err(CatervaError::BadBufferSize {
            expected: total as usize * typesize,
            actual: input.len(),
        });
    }

    let lo = Coord::default();
    let mut hi = Coord::default();
    for i in 0..ndim {
        hi[i] = indices[i].len() as i64;
    }

    let mut pos = 0usize;
    for counters in Odometer::new(lo, hi, ndim) {
        let coord: Vec<i64> = (0..ndim).map(|i| indices[i][counters[i] as usize]).collect();
        let stop: Vec<i64> = coord.iter().map(|c| c + 1).collect();
        array.write_region(&coord, &stop, &input[pos..pos + typesize])?;
        pos += typesize;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::MemStore;

    fn filled_array(shape: &[i64], chunkshape: &[i64], blockshape: &[i64]) -> CatervaArray<MemStore> {
        let nitems: i64 = shape.iter().product();
        let buf: Vec<u8> = (0..nitems as i32).flat_map(|i| i.to_le_bytes()).collect();
        let ctx = ConstructionContext::new(shape, chunkshape, blockshape, 4).unwrap();
        CatervaArray::from_buffer(ctx, &buf).unwrap()
    }

    #[test]
    fn slice_extracts_sub_region() {
        let mut a = filled_array(&[4, 4], &[2, 2], &[1, 1]);
        let mut sliced: CatervaArray<MemStore> = slice(&mut a, &[1, 1], &[3, 3], &[2, 2], &[1, 1]).unwrap();
        let buf = sliced.to_buffer().unwrap();
        let vals: Vec<i32> = buf.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals, vec![5, 6, 9, 10]);
    }

    #[test]
    fn copy_is_retiling_invariant() {
        let mut a = filled_array(&[6, 6], &[2, 2], &[1, 1]);
        let original = a.to_buffer().unwrap();
        let mut retiled: CatervaArray<MemStore> = copy(&mut a, &[3, 3], &[3, 3]).unwrap();
        assert_eq!(retiled.to_buffer().unwrap(), original);
    }

    #[test]
    fn squeeze_drops_size_one_axes() {
        let mut a = filled_array(&[1, 4, 1], &[1, 2, 1], &[1, 1, 1]);
        let before = a.to_buffer().unwrap();
        squeeze(&mut a).unwrap();
        assert_eq!(a.shape(), &[4]);
        assert_eq!(a.to_buffer().unwrap(), before);
    }

    #[test]
    fn squeeze_index_rejects_non_unit_axis() {
        let mut a = filled_array(&[2, 4], &[2, 2], &[1, 1]);
        assert!(squeeze_index(&mut a, 0).is_err());
    }

    #[test]
    fn squeeze_does_not_recompress_stored_chunks() {
        let mut a = filled_array(&[1, 4], &[1, 4], &[1, 2]);
        let chunk_before = a.store.read_chunk(0).unwrap();
        squeeze(&mut a).unwrap();
        assert_eq!(a.shape(), &[4]);
        let chunk_after = a.store.read_chunk(0).unwrap();
        assert_eq!(chunk_after, chunk_before);
    }

    #[test]
    fn squeeze_rejects_axis_tiled_wider_than_one() {
        let mut a = filled_array(&[3, 1], &[3, 2], &[1, 1]);
        assert!(squeeze(&mut a).is_err());
    }

    #[test]
    fn resize_grow_then_shrink_preserves_prefix() {
        let mut a = filled_array(&[4], &[2], &[1]);
        let original = a.to_buffer().unwrap();
        resize(&mut a, &[8], &[4]).unwrap();
        assert_eq!(a.shape(), &[8]);
        resize(&mut a, &[4], &[4]).unwrap();
        assert_eq!(a.to_buffer().unwrap(), original);
    }

    #[test]
    fn resize_at_arbitrary_position_shifts_tail() {
        let mut a = filled_array(&[4], &[2], &[1]);
        resize(&mut a, &[6], &[2]).unwrap();
        let buf = a.to_buffer().unwrap();
        let vals: Vec<i32> = buf.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals[..2], [0, 1]);
        assert_eq!(vals[4..], [2, 3]);

        resize(&mut a, &[4], &[2]).unwrap();
        let buf = a.to_buffer().unwrap();
        let vals: Vec<i32> = buf.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals, vec![0, 1, 2, 3]);
    }

    #[test]
    fn grow_at_position_then_delete_same_range_restores_original() {
        // spec.md §8 property 6: growing axis a by k at position p, then
        // deleting [p, p+k) on axis a, yields the original array.
        let mut a = filled_array(&[6], &[2], &[1]);
        let original = a.to_buffer().unwrap();
        resize(&mut a, &[9], &[2]).unwrap();
        delete(&mut a, 0, 2, 3).unwrap();
        assert_eq!(a.shape(), &[6]);
        assert_eq!(a.to_buffer().unwrap(), original);
    }

    #[test]
    fn append_extends_last_axis() {
        let mut a = filled_array(&[2, 2], &[2, 2], &[1, 1]);
        let extra: Vec<u8> = [10i32, 11].iter().flat_map(|i| i.to_le_bytes()).collect();
        append(&mut a, 0, &extra).unwrap();
        assert_eq!(a.shape(), &[3, 2]);
        let buf = a.to_buffer().unwrap();
        let vals: Vec<i32> = buf.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals, vec![0, 1, 2, 3, 10, 11]);
    }

    #[test]
    fn insert_shifts_subsequent_rows() {
        let mut a = filled_array(&[2, 2], &[2, 2], &[1, 1]);
        let row: Vec<u8> = [99i32, 98].iter().flat_map(|i| i.to_le_bytes()).collect();
        insert(&mut a, 0, 1, &row).unwrap();
        assert_eq!(a.shape(), &[3, 2]);
        let buf = a.to_buffer().unwrap();
        let vals: Vec<i32> = buf.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals, vec![0, 1, 99, 98, 2, 3]);
    }

    #[test]
    fn delete_removes_range_and_shifts() {
        let mut a = filled_array(&[4, 2], &[2, 2], &[1, 1]);
        delete(&mut a, 0, 1, 2).unwrap();
        assert_eq!(a.shape(), &[2, 2]);
        let buf = a.to_buffer().unwrap();
        let vals: Vec<i32> = buf.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals, vec![0, 1, 6, 7]);
    }

    #[test]
    fn orthogonal_selection_roundtrips() {
        let mut a = filled_array(&[4, 4], &[2, 2], &[1, 1]);
        let indices = vec![vec![0, 2], vec![1, 3]];
        let mut out = vec![0u8; 4 * 4];
        orthogonal_read(&mut a, &indices, &mut out).unwrap();
        let vals: Vec<i32> = out.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals, vec![1, 3, 9, 11]);

        let patch: Vec<u8> = [100i32, 101, 102, 103].iter().flat_map(|i| i.to_le_bytes()).collect();
        orthogonal_write(&mut a, &indices, &patch).unwrap();
        let mut out2 = vec![0u8; 4 * 4];
        orthogonal_read(&mut a, &indices, &mut out2).unwrap();
        assert_eq!(out2, patch);
    }

    #[test]
    fn orthogonal_read_on_sparse_array_reads_zero_not_stale_bytes() {
        let ctx = ConstructionContext::new(&[4, 4], &[2, 2], &[1, 1], 4).unwrap();
        let mut a: CatervaArray<MemStore> = CatervaArray::empty(ctx).unwrap();
        // Write one point so a later point's read can't accidentally reuse
        // its bytes out of a stale scratch buffer.
        a.write_region(&[0, 0], &[1, 1], &0xABCDu32.to_le_bytes()).unwrap();

        let indices = vec![vec![0, 3], vec![0, 3]];
        let mut out = vec![0xffu8; 4 * 4];
        orthogonal_read(&mut a, &indices, &mut out).unwrap();
        let vals: Vec<i32> = out.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals, vec![0xABCDu32 as i32, 0, 0, 0]);
    }
}
