//! Region I/O kernel (`spec.md` §4.6, component C6): the only place that
//! moves bytes between a caller's flat buffer and a store's compressed
//! chunks. Every structural operation in [`crate::ops`] and every
//! constructor in [`crate::array`] is built on top of [`read_region`] and
//! [`write_region`].
//!
//! Chunks that have never been written (sparse arrays, or axes beyond the
//! declared shape inside a padded last chunk) read back as zero — there is
//! no "uninitialized" value visible through this API (`spec.md` §4.6 edge
//! cases, padding invisibility).

use crate::cache::ChunkCache;
use crate::config::DMAX;
use crate::error::CatervaError;
use crate::shape::{row_major_strides, Coord, ShapeDescriptor};
use crate::store::ChunkStore;

fn row_major_strides_of(extents: &[i64]) -> Coord {
    let mut c = Coord::default();
    for (o, v) in c.iter_mut().zip(extents.iter()) {
        *o = *v;
    }
    row_major_strides(&c, extents.len())
}

/// Visits every contiguous last-axis run inside one chunk's intersection
/// with the caller's region, in row-major order (`spec.md` §9: prefer
/// axis-contiguous copies over element-at-a-time).
fn for_each_row(
    ndim: usize,
    intra_start: &Coord,
    intra_stop: &Coord,
    buf_start: &Coord,
    chunk_item_strides: &Coord,
    buf_item_strides: &[i64],
    mut visit: impl FnMut(i64, i64, i64),
) {
    let row_len = intra_stop[ndim - 1] - intra_start[ndim - 1];
    if row_len <= 0 {
        return;
    }
    if ndim == 1 {
        visit(intra_start[0], buf_start[0], row_len);
        return;
    }

    let mut lo = [0i64; DMAX];
    let mut hi = [0i64; DMAX];
    lo[..ndim - 1].copy_from_slice(&intra_start[..ndim - 1]);
    hi[..ndim - 1].copy_from_slice(&intra_stop[..ndim - 1]);

    for prefix in crate::shape::Odometer::new(lo, hi, ndim - 1) {
        let mut chunk_off = intra_start[ndim - 1] * chunk_item_strides[ndim - 1];
        let mut buf_off = buf_start[ndim - 1] * buf_item_strides[ndim - 1];
        for i in 0..ndim - 1 {
            chunk_off += prefix[i] * chunk_item_strides[i];
            buf_off += (buf_start[i] + (prefix[i] - intra_start[i])) * buf_item_strides[i];
        }
        visit(chunk_off, buf_off, row_len);
    }
}

/// Read the half-open region `[start, stop)` of an array into `out`, which
/// must be exactly `Π(stop[i] - start[i]) * typesize` bytes.
pub fn read_region<S: ChunkStore>(
    desc: &ShapeDescriptor,
    store: &S,
    cache: &mut ChunkCache,
    start: &[i64],
    stop: &[i64],
    out: &mut [u8],
) -> Result<(), CatervaError> {
    validate_region(desc, start, stop)?;
    let typesize = store.typesize() as usize;
    let out_extents: Vec<i64> = (0..desc.ndim).map(|i| stop[i] - start[i]).collect();
    let expected = out_extents.iter().product::<i64>() as usize * typesize;
    if out.len() != expected {
        return Err(CatervaError::BadBufferSize {
            expected,
            actual: out.len(),
        });
    }
    let buf_strides = row_major_strides_of(&out_extents);

    // Never-written chunks read back as zero; zero the whole destination up
    // front so that guarantee holds regardless of what the caller passed in.
    out.fill(0);

    for region in desc.region_covers(start, stop) {
        if region.chunk_index >= store.nchunks() {
            continue;
        }
        let chunk_buf = cache.get_or_load(region.chunk_index, || store.read_chunk(region.chunk_index))?;
        for_each_row(
            desc.ndim,
            &region.intra_start,
            &region.intra_stop,
            &region.buf_start,
            &desc.item_chunk_strides,
            &buf_strides[..desc.ndim],
            |chunk_item_off, buf_item_off, row_len_items| {
                let chunk_byte = chunk_item_off as usize * typesize;
                let buf_byte = buf_item_off as usize * typesize;
                let n = row_len_items as usize * typesize;
                out[buf_byte..buf_byte + n].copy_from_slice(&chunk_buf[chunk_byte..chunk_byte + n]);
            },
        );
    }
    Ok(())
}

/// Write `input` (exactly `Π(stop[i] - start[i]) * typesize` bytes) into the
/// half-open region `[start, stop)`. Chunks touched for the first time are
/// materialized zero-filled before the write is applied, so a subsequent
/// partial read of the same chunk sees zeros outside the written region.
pub fn write_region<S: ChunkStore>(
    desc: &ShapeDescriptor,
    store: &mut S,
    cache: &mut ChunkCache,
    start: &[i64],
    stop: &[i64],
    input: &[u8],
) -> Result<(), CatervaError> {
    validate_region(desc, start, stop)?;
    let typesize = store.typesize() as usize;
    let in_extents: Vec<i64> = (0..desc.ndim).map(|i| stop[i] - start[i]).collect();
    let expected = in_extents.iter().product::<i64>() as usize * typesize;
    if input.len() != expected {
        return Err(CatervaError::BadBufferSize {
            expected,
            actual: input.len(),
        });
    }
    let in_strides = row_major_strides_of(&in_extents);
    let chunk_bytes = desc.chunknitems as usize * typesize;

    for region in desc.region_covers(start, stop) {
        let whole_chunk = (0..desc.ndim).all(|i| {
            region.intra_start[i] == 0 && region.intra_stop[i] == desc.chunkshape[i]
        });

        let mut chunk_buf = if whole_chunk {
            vec![0u8; chunk_bytes]
        } else if region.chunk_index < store.nchunks() {
            store.read_chunk(region.chunk_index)?
        } else {
            vec![0u8; chunk_bytes]
        };

        for_each_row(
            desc.ndim,
            &region.intra_start,
            &region.intra_stop,
            &region.buf_start,
            &desc.item_chunk_strides,
            &in_strides[..desc.ndim],
            |chunk_item_off, buf_item_off, row_len_items| {
                let chunk_byte = chunk_item_off as usize * typesize;
                let buf_byte = buf_item_off as usize * typesize;
                let n = row_len_items as usize * typesize;
                chunk_buf[chunk_byte..chunk_byte + n].copy_from_slice(&input[buf_byte..buf_byte + n]);
            },
        );

        ensure_chunk_slot(store, region.chunk_index, chunk_bytes)?;
        store.replace_chunk(region.chunk_index, &chunk_buf)?;
        cache.invalidate();
    }
    Ok(())
}

/// Pad `store` with zero-filled placeholder chunks up to (but not
/// including) `idx`, so `replace_chunk(idx, ...)` is always valid. Mirrors
/// the append-only addressing of the original Blosc2 super-chunk.
fn ensure_chunk_slot<S: ChunkStore>(store: &mut S, idx: usize, chunk_bytes: usize) -> Result<(), CatervaError> {
    while store.nchunks() <= idx {
        store.append_chunk(&vec![0u8; chunk_bytes])?;
    }
    Ok(())
}

fn validate_region(desc: &ShapeDescriptor, start: &[i64], stop: &[i64]) -> Result<(), CatervaError> {
    if start.len() != desc.ndim || stop.len() != desc.ndim {
        return Err(CatervaError::invalid_shape("region rank does not match array ndim"));
    }
    for i in 0..desc.ndim {
        if start[i] < 0 || stop[i] < start[i] || stop[i] > desc.shape[i] {
            return Err(CatervaError::OutOfBounds {
                start: crate::shape::coord_from_slice(start),
                stop: crate::shape::coord_from_slice(stop),
                shape: desc.shape,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::MemStore;
    use crate::store::{CreateStore, StoreParams};

    fn desc() -> ShapeDescriptor {
        ShapeDescriptor::new(&[10, 10], &[4, 4], &[2, 2]).unwrap()
    }

    #[test]
    fn write_then_read_whole_array() {
        let d = desc();
        let mut store = MemStore::create(StoreParams::new(4), Vec::new()).unwrap();
        let mut cache = ChunkCache::new();
        let input: Vec<u8> = (0..d.nitems).flat_map(|i| (i as i32).to_le_bytes()).collect();
        write_region(&d, &mut store, &mut cache, &[0, 0], &[10, 10], &input).unwrap();

        let mut out = vec![0u8; input.len()];
        read_region(&d, &store, &mut cache, &[0, 0], &[10, 10], &mut out).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn unwritten_region_reads_zero() {
        let d = desc();
        let store = MemStore::create(StoreParams::new(4), Vec::new()).unwrap();
        let mut cache = ChunkCache::new();
        let mut out = vec![0xffu8; 4 * 4 * 4];
        read_region(&d, &store, &mut cache, &[0, 0], &[4, 4], &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn partial_write_preserves_rest_of_chunk() {
        let d = desc();
        let mut store = MemStore::create(StoreParams::new(4), Vec::new()).unwrap();
        let mut cache = ChunkCache::new();

        let ones = vec![1u8; 4 * 4 * 4];
        write_region(&d, &mut store, &mut cache, &[0, 0], &[4, 4], &ones).unwrap();

        let patch = vec![2u8; 4];
        write_region(&d, &mut store, &mut cache, &[0, 0], &[1, 1], &patch).unwrap();

        let mut out = vec![0u8; ones.len()];
        read_region(&d, &store, &mut cache, &[0, 0], &[4, 4], &mut out).unwrap();
        assert_eq!(&out[0..4], &[2, 2, 2, 2]);
        assert_eq!(&out[4..8], &[1, 1, 1, 1]);
    }

    #[test]
    fn rejects_out_of_bounds_region() {
        let d = desc();
        let store = MemStore::create(StoreParams::new(4), Vec::new()).unwrap();
        let mut cache = ChunkCache::new();
        let mut out = vec![0u8; 4];
        assert!(read_region(&d, &store, &mut cache, &[9, 9], &[11, 10], &mut out).is_err());
    }

    #[test]
    fn rejects_bad_buffer_size() {
        let d = desc();
        let mut store = MemStore::create(StoreParams::new(4), Vec::new()).unwrap();
        let mut cache = ChunkCache::new();
        let bad = vec![0u8; 3];
        assert!(write_region(&d, &mut store, &mut cache, &[0, 0], &[1, 1], &bad).is_err());
    }
}
