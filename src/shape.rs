//! Shape/tiling algebra (`spec.md` §3, §4.1 — components C1 and half of C3).
//!
//! Per `spec.md` §9 Design Notes, the shape and stride vectors are
//! fixed-capacity inline arrays of length [`DMAX`], not heap `Vec`s: they
//! are small, hot, and walked in tight loops by the region I/O kernel.

use crate::config::{DMAX, MAX_CHUNK_BLOCK_EXTENT};
use crate::error::CatervaError;

/// A coordinate, stride, or extent vector. Entries at index `>= ndim` for
/// whichever descriptor owns this vector are unused (`spec.md` §3).
pub type Coord = [i64; DMAX];

/// Build a [`Coord`] from a slice, zero-padding beyond its length.
pub fn coord_from_slice(values: &[i64]) -> Coord {
    let mut out = Coord::default();
    for (o, v) in out.iter_mut().zip(values.iter()) {
        *o = *v;
    }
    out
}

fn div_ceil(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

fn product(extents: &Coord, ndim: usize) -> i64 {
    extents[..ndim].iter().product()
}

/// Row-major (C-order) strides over `extents`: `strides[ndim-1] == 1`,
/// `strides[i] == strides[i+1] * extents[i+1]`.
pub(crate) fn row_major_strides(extents: &Coord, ndim: usize) -> Coord {
    let mut strides = Coord::default();
    if ndim == 0 {
        return strides;
    }
    strides[ndim - 1] = 1;
    for i in (0..ndim - 1).rev() {
        strides[i] = strides[i + 1] * extents[i + 1];
    }
    strides
}

/// `coord_to_offset(c, strides) -> i64` (`spec.md` §4.1): dot product.
pub fn coord_to_offset(coord: &[i64], strides: &[i64]) -> i64 {
    coord.iter().zip(strides.iter()).map(|(c, s)| c * s).sum()
}

/// `offset_to_coord(i, extents) -> c` (`spec.md` §4.1): quotient/remainder
/// descent, most-significant axis first. `strides` must be the row-major
/// strides corresponding to the extents being decoded.
pub fn offset_to_coord(mut offset: i64, strides: &[i64], ndim: usize) -> Coord {
    let mut out = Coord::default();
    for i in 0..ndim {
        out[i] = offset / strides[i];
        offset %= strides[i];
    }
    out
}

/// The shape/tiling descriptor for one array: the three declared shape
/// vectors, their padded counterparts, and item counts (`spec.md` §3).
///
/// Block-level layout (`blockshape`, `extchunkshape`, `blocknitems`,
/// `extchunknitems`) is recorded here because `spec.md` §3 names it as part
/// of the descriptor, but this engine never addresses items at block
/// granularity itself: the block codec is out of scope (`spec.md` §1,
/// "block codec ... treated as a black box"), so block-sized compression
/// tuning is forwarded to `blosc::Context` as-is and the region I/O kernel
/// in [`crate::io`] only ever decomposes a region down to whole chunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeDescriptor {
    pub ndim: usize,

    pub shape: Coord,
    pub chunkshape: Coord,
    pub blockshape: Coord,
    pub extshape: Coord,
    pub extchunkshape: Coord,

    pub nitems: i64,
    pub chunknitems: i64,
    pub extnitems: i64,
    pub blocknitems: i64,
    pub extchunknitems: i64,

    /// Row-major strides over `shape`.
    pub item_array_strides: Coord,
    /// Row-major strides over `chunkshape`; what the region I/O kernel uses
    /// to address items inside a decompressed chunk buffer.
    pub item_chunk_strides: Coord,
    /// Row-major strides over `chunk_grid_shape`; converts a chunk
    /// coordinate to the linear chunk index the store addresses chunks by.
    pub chunk_array_strides: Coord,

    /// `ceil(shape[i] / chunkshape[i])`, i.e. the chunk grid's own shape.
    /// Needed to derive `chunk_array_strides` and the expected chunk count
    /// (invariant 3).
    pub chunk_grid_shape: Coord,
}

impl ShapeDescriptor {
    /// Validates invariants 1-2 of `spec.md` §3 and computes every derived
    /// shape, item count, and stride vector.
    pub fn new(shape: &[i64], chunkshape: &[i64], blockshape: &[i64]) -> Result<Self, CatervaError> {
        let ndim = shape.len();
        if ndim == 0 || ndim > DMAX {
            return Err(CatervaError::invalid_shape(format!(
                "ndim {ndim} out of range [1, {DMAX}]"
            )));
        }
        if chunkshape.len() != ndim || blockshape.len() != ndim {
            return Err(CatervaError::invalid_shape(
                "shape, chunkshape and blockshape must have the same length",
            ));
        }
        for i in 0..ndim {
            if shape[i] < 1 {
                return Err(CatervaError::invalid_shape(format!(
                    "shape[{i}] = {} is not positive",
                    shape[i]
                )));
            }
            if chunkshape[i] < 1 {
                return Err(CatervaError::invalid_shape(format!(
                    "chunkshape[{i}] = {} is not positive",
                    chunkshape[i]
                )));
            }
            if blockshape[i] < 1 || blockshape[i] > chunkshape[i] {
                return Err(CatervaError::invalid_shape(format!(
                    "blockshape[{i}] = {} must be in [1, chunkshape[{i}]={}]",
                    blockshape[i], chunkshape[i]
                )));
            }
            if chunkshape[i] > MAX_CHUNK_BLOCK_EXTENT || blockshape[i] > MAX_CHUNK_BLOCK_EXTENT {
                return Err(CatervaError::invalid_shape(format!(
                    "chunk/block extent at axis {i} exceeds 32-bit range"
                )));
            }
        }

        let shape_c = coord_from_slice(shape);
        let chunkshape_c = coord_from_slice(chunkshape);
        let blockshape_c = coord_from_slice(blockshape);

        let mut extshape = Coord::default();
        let mut extchunkshape = Coord::default();
        let mut chunk_grid_shape = Coord::default();
        for i in 0..ndim {
            chunk_grid_shape[i] = div_ceil(shape[i], chunkshape[i]);
            extshape[i] = chunk_grid_shape[i] * chunkshape[i];
            extchunkshape[i] = div_ceil(chunkshape[i], blockshape[i]) * blockshape[i];
        }

        let nitems = product(&shape_c, ndim);
        let chunknitems = product(&chunkshape_c, ndim);
        let extnitems = product(&extshape, ndim);
        let blocknitems = product(&blockshape_c, ndim);
        let extchunknitems = product(&extchunkshape, ndim);

        let item_array_strides = row_major_strides(&shape_c, ndim);
        let item_chunk_strides = row_major_strides(&chunkshape_c, ndim);
        let chunk_array_strides = row_major_strides(&chunk_grid_shape, ndim);

        Ok(Self {
            ndim,
            shape: shape_c,
            chunkshape: chunkshape_c,
            blockshape: blockshape_c,
            extshape,
            extchunkshape,
            nitems,
            chunknitems,
            extnitems,
            blocknitems,
            extchunknitems,
            item_array_strides,
            item_chunk_strides,
            chunk_array_strides,
            chunk_grid_shape,
        })
    }

    pub fn shape(&self) -> &[i64] {
        &self.shape[..self.ndim]
    }

    pub fn chunkshape(&self) -> &[i64] {
        &self.chunkshape[..self.ndim]
    }

    pub fn blockshape(&self) -> &[i64] {
        &self.blockshape[..self.ndim]
    }

    pub fn extshape(&self) -> &[i64] {
        &self.extshape[..self.ndim]
    }

    /// Total number of chunks the tiling implies (invariant 3).
    pub fn expected_nchunks(&self) -> usize {
        product(&self.chunk_grid_shape, self.ndim) as usize
    }

    /// Lazily enumerate the chunks intersected by the half-open region
    /// `[start, stop)` (`spec.md` §4.1). Yields nothing if `stop[i] ==
    /// start[i]` for any axis.
    pub fn region_covers<'a>(&'a self, start: &[i64], stop: &[i64]) -> RegionCover<'a> {
        debug_assert_eq!(start.len(), self.ndim);
        debug_assert_eq!(stop.len(), self.ndim);

        let empty = (0..self.ndim).any(|i| stop[i] <= start[i]);
        let odometer = if empty {
            Odometer::empty()
        } else {
            let mut lo = Coord::default();
            let mut hi = Coord::default();
            for i in 0..self.ndim {
                lo[i] = start[i].div_euclid(self.chunkshape[i]);
                hi[i] = (stop[i] - 1).div_euclid(self.chunkshape[i]) + 1;
            }
            Odometer::new(lo, hi, self.ndim)
        };

        RegionCover {
            desc: self,
            start: coord_from_slice(start),
            stop: coord_from_slice(stop),
            odometer,
        }
    }
}

/// A per-axis counter that enumerates every [`Coord`] in `[lo, hi)`,
/// row-major (last axis fastest). Preferred over recursion per `spec.md`
/// §9 Design Notes: it scales to `DMAX` axes and is trivially testable in
/// isolation.
pub struct Odometer {
    lo: Coord,
    hi: Coord,
    cur: Coord,
    ndim: usize,
    done: bool,
}

impl Odometer {
    pub fn new(lo: Coord, hi: Coord, ndim: usize) -> Self {
        let done = (0..ndim).any(|i| lo[i] >= hi[i]);
        Self {
            lo,
            hi,
            cur: lo,
            ndim,
            done,
        }
    }

    pub fn empty() -> Self {
        Self {
            lo: Coord::default(),
            hi: Coord::default(),
            cur: Coord::default(),
            ndim: 0,
            done: true,
        }
    }
}

impl Iterator for Odometer {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        if self.done {
            return None;
        }
        let out = self.cur;

        let mut axis = self.ndim as isize - 1;
        loop {
            if axis < 0 {
                self.done = true;
                break;
            }
            let a = axis as usize;
            self.cur[a] += 1;
            if self.cur[a] < self.hi[a] {
                break;
            }
            self.cur[a] = self.lo[a];
            axis -= 1;
        }

        Some(out)
    }
}

/// One chunk intersected by a region, with the intra-chunk sub-region and
/// the corresponding sub-region of the caller's flat buffer.
#[derive(Clone, Copy, Debug)]
pub struct ChunkRegion {
    pub chunk_index: usize,
    pub chunk_coord: Coord,
    pub intra_start: Coord,
    pub intra_stop: Coord,
    pub buf_start: Coord,
    pub buf_stop: Coord,
}

/// Iterator returned by [`ShapeDescriptor::region_covers`].
pub struct RegionCover<'a> {
    desc: &'a ShapeDescriptor,
    start: Coord,
    stop: Coord,
    odometer: Odometer,
}

impl<'a> Iterator for RegionCover<'a> {
    type Item = ChunkRegion;

    fn next(&mut self) -> Option<ChunkRegion> {
        let chunk_coord = self.odometer.next()?;
        let ndim = self.desc.ndim;

        let mut intra_start = Coord::default();
        let mut intra_stop = Coord::default();
        let mut buf_start = Coord::default();
        let mut buf_stop = Coord::default();

        for i in 0..ndim {
            let chunk_origin = chunk_coord[i] * self.desc.chunkshape[i];
            let cs = self.start[i].max(chunk_origin);
            let ce = self.stop[i].min(chunk_origin + self.desc.chunkshape[i]);
            intra_start[i] = cs - chunk_origin;
            intra_stop[i] = ce - chunk_origin;
            buf_start[i] = cs - self.start[i];
            buf_stop[i] = ce - self.start[i];
        }

        let chunk_index =
            coord_to_offset(&chunk_coord[..ndim], &self.desc.chunk_array_strides[..ndim]) as usize;

        Some(ChunkRegion {
            chunk_index,
            chunk_coord,
            intra_start,
            intra_stop,
            buf_start,
            buf_stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_shapes_2d() {
        let d = ShapeDescriptor::new(&[10, 10], &[4, 4], &[2, 2]).unwrap();
        assert_eq!(d.extshape(), &[12, 12]);
        assert_eq!(d.nitems, 100);
        assert_eq!(d.chunknitems, 16);
        assert_eq!(d.expected_nchunks(), 9); // ceil(10/4)^2 = 3^2
        assert_eq!(d.extchunknitems, 16); // chunkshape already a multiple of blockshape
    }

    #[test]
    fn rejects_bad_shape() {
        assert!(ShapeDescriptor::new(&[0], &[1], &[1]).is_err());
        assert!(ShapeDescriptor::new(&[1], &[1], &[2]).is_err());
        assert!(ShapeDescriptor::new(&[1; 9], &[1; 9], &[1; 9]).is_err());
    }

    #[test]
    fn odometer_row_major_order() {
        let lo = coord_from_slice(&[0, 0]);
        let hi = coord_from_slice(&[2, 3]);
        let coords: Vec<_> = Odometer::new(lo, hi, 2).map(|c| (c[0], c[1])).collect();
        assert_eq!(
            coords,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    #[test]
    fn region_covers_empty_on_zero_width() {
        let d = ShapeDescriptor::new(&[10, 10], &[4, 4], &[2, 2]).unwrap();
        let covers: Vec<_> = d.region_covers(&[2, 3], &[2, 7]).collect();
        assert!(covers.is_empty());
    }

    #[test]
    fn region_covers_whole_array_sums_to_nitems() {
        let d = ShapeDescriptor::new(&[10, 10], &[4, 4], &[2, 2]).unwrap();
        let total: i64 = d
            .region_covers(&[0, 0], &[10, 10])
            .map(|cr| {
                (0..2)
                    .map(|i| cr.intra_stop[i] - cr.intra_start[i])
                    .product::<i64>()
            })
            .sum();
        assert_eq!(total, d.nitems);
    }

    #[test]
    fn coord_offset_roundtrip() {
        let d = ShapeDescriptor::new(&[5, 7, 3], &[5, 7, 3], &[5, 7, 3]).unwrap();
        for i in 0..d.nitems {
            let c = offset_to_coord(i, &d.item_array_strides[..3], 3);
            let back = coord_to_offset(&c[..3], &d.item_array_strides[..3]);
            assert_eq!(back, i);
        }
    }
}
