//! The array type itself and its constructors (`spec.md` §4.3-§4.5,
//! components C3 and C5).

use log::debug;

use crate::cache::ChunkCache;
use crate::config::SHAPE_METALAYER_NAME;
use crate::context::ConstructionContext;
use crate::error::CatervaError;
use crate::io::{read_region, write_region};
use crate::meta;
use crate::shape::ShapeDescriptor;
use crate::store::{ChunkStore, CreateStore, FrameStore, StoreParams};

/// How much of the array has been materialized in its store. Purely
/// informational — every read sees logical zeros for chunks that don't
/// exist yet regardless of phase (`spec.md` §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Partial,
    Full,
}

/// A chunked, blocked, compressed N-dimensional array backed by a
/// [`ChunkStore`] of type `S`.
pub struct CatervaArray<S: ChunkStore> {
    pub(crate) desc: ShapeDescriptor,
    pub(crate) store: S,
    pub(crate) cache: ChunkCache,
}

impl<S: ChunkStore> CatervaArray<S> {
    pub fn shape(&self) -> &[i64] {
        self.desc.shape()
    }

    pub fn chunkshape(&self) -> &[i64] {
        self.desc.chunkshape()
    }

    pub fn blockshape(&self) -> &[i64] {
        self.desc.blockshape()
    }

    pub fn ndim(&self) -> usize {
        self.desc.ndim
    }

    pub fn typesize(&self) -> u32 {
        self.store.typesize()
    }

    pub fn nitems(&self) -> i64 {
        self.desc.nitems
    }

    pub fn descriptor(&self) -> &ShapeDescriptor {
        &self.desc
    }

    pub fn phase(&self) -> Phase {
        let nchunks = self.store.nchunks();
        if nchunks == 0 {
            Phase::Empty
        } else if nchunks >= self.desc.expected_nchunks() {
            Phase::Full
        } else {
            Phase::Partial
        }
    }

    /// Read the region `[start, stop)` into `out` (`spec.md` §4.6).
    pub fn read_region(&mut self, start: &[i64], stop: &[i64], out: &mut [u8]) -> Result<(), CatervaError> {
        read_region(&self.desc, &self.store, &mut self.cache, start, stop, out)
    }

    /// Write `input` into the region `[start, stop)` (`spec.md` §4.6).
    pub fn write_region(&mut self, start: &[i64], stop: &[i64], input: &[u8]) -> Result<(), CatervaError> {
        write_region(&self.desc, &mut self.store, &mut self.cache, start, stop, input)
    }

    /// Read the entire array into a flat, row-major buffer.
    pub fn to_buffer(&mut self) -> Result<Vec<u8>, CatervaError> {
        let shape = self.desc.shape().to_vec();
        let zeros = vec![0i64; shape.len()];
        let mut out = vec![0u8; self.desc.nitems as usize * self.typesize() as usize];
        self.read_region(&zeros, &shape, &mut out)?;
        Ok(out)
    }

    /// Attach a store the caller already constructed and populated, reading
    /// back its shape descriptor from the reserved metalayer.
    ///
    /// `spec.md` §4.5 `from_store`.
    pub fn from_store(store: S) -> Result<Self, CatervaError> {
        let meta_bytes = store
            .metalayer_get(SHAPE_METALAYER_NAME)
            .ok_or_else(|| CatervaError::not_caterva("store has no shape metalayer"))?;
        let desc = meta::deserialize(&meta_bytes)?.into_descriptor()?;
        Ok(Self {
            desc,
            store,
            cache: ChunkCache::new(),
        })
    }
}

impl<S: CreateStore> CatervaArray<S> {
    fn new_with_store(ctx: ConstructionContext) -> Result<Self, CatervaError> {
        let meta_bytes = meta::serialize_descriptor(&ctx.desc)?;
        let mut metalayers = ctx.metalayers;
        metalayers.push((SHAPE_METALAYER_NAME.to_string(), meta_bytes));
        let store = S::create(ctx.store_params, metalayers)?;
        Ok(Self {
            desc: ctx.desc,
            store,
            cache: ChunkCache::new(),
        })
    }

    /// An array with no chunks materialized at all: every read returns
    /// zeros until written. `spec.md` §4.5 `uninit`/`empty` — the two
    /// collapse to the same sparse representation in this engine, since
    /// there is no unsafe uninitialized-memory path to expose.
    pub fn empty(ctx: ConstructionContext) -> Result<Self, CatervaError> {
        debug!("creating empty array, shape={:?}", ctx.desc.shape());
        Self::new_with_store(ctx)
    }

    /// Alias of [`Self::empty`]. `spec.md` §4.5 `uninit`: we never hand back
    /// genuinely uninitialized bytes, so this is just a documented synonym.
    pub fn uninit(ctx: ConstructionContext) -> Result<Self, CatervaError> {
        Self::empty(ctx)
    }

    /// Fully materialize the array with every chunk zero-filled.
    pub fn zeros(ctx: ConstructionContext) -> Result<Self, CatervaError> {
        Self::filled(ctx, 0)
    }

    /// Fully materialize the array with every byte of every chunk set to
    /// `fill_byte`.
    pub fn filled(ctx: ConstructionContext, fill_byte: u8) -> Result<Self, CatervaError> {
        let nchunks = ctx.desc.expected_nchunks();
        let chunk_bytes = ctx.desc.chunknitems as usize * ctx.store_params.typesize as usize;
        let mut array = Self::new_with_store(ctx)?;
        let chunk = vec![fill_byte; chunk_bytes];
        for _ in 0..nchunks {
            array.store.append_chunk(&chunk)?;
        }
        Ok(array)
    }

    /// Build a fully materialized array from a flat, row-major buffer
    /// covering the whole declared shape.
    pub fn from_buffer(ctx: ConstructionContext, buf: &[u8]) -> Result<Self, CatervaError> {
        let expected = ctx.desc.nitems as usize * ctx.store_params.typesize as usize;
        if buf.len() != expected {
            return Err(CatervaError::BadBufferSize {
                expected,
                actual: buf.len(),
            });
        }
        let shape: Vec<i64> = ctx.desc.shape().to_vec();
        let zeros = vec![0i64; shape.len()];
        let mut array = Self::new_with_store(ctx)?;
        array.write_region(&zeros, &shape, buf)?;
        Ok(array)
    }
}

impl<S: FrameStore> CatervaArray<S> {
    /// Rehydrate an array from a contiguous serialized frame (`spec.md`
    /// §4.5 `from_frame`). `copy` controls whether the frame's chunk bytes
    /// are shared or duplicated — see [`crate::store::FrameStore`].
    pub fn from_frame(bytes: bytes::Bytes, copy: bool) -> Result<Self, CatervaError> {
        let store = S::from_contiguous_frame(bytes, copy)?;
        Self::from_store(store)
    }

    /// Serialize this array's store to a contiguous in-memory frame
    /// (`spec.md` §4.8 `to_frame`).
    pub fn to_frame(&self) -> Result<Vec<u8>, CatervaError> {
        self.store.to_contiguous_frame()
    }
}

/// Persistence glue (`spec.md` §4.8, component C8): create or reopen an
/// array rooted at a filesystem path, and stream any array's chunks into a
/// fresh on-disk store.
#[cfg(feature = "filesystem")]
pub mod persist {
    use std::path::Path;

    use super::*;
    use crate::store::fs::FileSystemStore;

    impl CatervaArray<FileSystemStore> {
        /// Create a new on-disk array, writing its shape metalayer
        /// immediately (`spec.md` §4.5 constructors, specialized for the
        /// one store that needs a caller-supplied path rather than
        /// [`CreateStore::create`]).
        pub fn create_on_disk(
            ctx: ConstructionContext,
            path: impl AsRef<Path>,
            parents: bool,
        ) -> Result<Self, CatervaError> {
            let meta_bytes = meta::serialize_descriptor(&ctx.desc)?;
            let mut metalayers = ctx.metalayers;
            metalayers.push((SHAPE_METALAYER_NAME.to_string(), meta_bytes));
            let store = FileSystemStore::create_at(path, parents, ctx.store_params, metalayers)?;
            Ok(Self {
                desc: ctx.desc,
                store,
                cache: ChunkCache::new(),
            })
        }

        /// Reopen an array previously written by [`Self::create_on_disk`]
        /// or [`save`]. `spec.md` §4.8 `open`.
        pub fn open(path: impl AsRef<Path>) -> Result<Self, CatervaError> {
            Self::from_store(FileSystemStore::open(path)?)
        }
    }

    /// Stream every chunk and metalayer of `array` into a brand-new
    /// on-disk store at `path`. `spec.md` §4.8 `save`.
    pub fn save<S: ChunkStore>(
        array: &CatervaArray<S>,
        path: impl AsRef<Path>,
        parents: bool,
    ) -> Result<(), CatervaError> {
        let meta_bytes = meta::serialize_descriptor(&array.desc)?;
        let mut metalayers: Vec<(String, Vec<u8>)> = array
            .store
            .metalayer_names()
            .into_iter()
            .filter(|name| name != SHAPE_METALAYER_NAME)
            .filter_map(|name| array.store.metalayer_get(&name).map(|bytes| (name, bytes)))
            .collect();
        metalayers.push((SHAPE_METALAYER_NAME.to_string(), meta_bytes));

        let mut dst = FileSystemStore::create_at(path, parents, StoreParams::new(array.typesize()), metalayers)?;
        for idx in 0..array.store.nchunks() {
            let bytes = array.store.read_chunk(idx)?;
            dst.append_chunk(&bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::MemStore;

    fn ctx() -> ConstructionContext {
        ConstructionContext::new(&[4, 4], &[2, 2], &[1, 1], 4).unwrap()
    }

    #[test]
    fn empty_array_reads_zero() {
        let mut array: CatervaArray<MemStore> = CatervaArray::empty(ctx()).unwrap();
        assert_eq!(array.phase(), Phase::Empty);
        let buf = array.to_buffer().unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn zeros_array_is_full() {
        let array: CatervaArray<MemStore> = CatervaArray::zeros(ctx()).unwrap();
        assert_eq!(array.phase(), Phase::Full);
    }

    #[test]
    fn from_buffer_roundtrips() {
        let input: Vec<u8> = (0..16i32).flat_map(|i| i.to_le_bytes()).collect();
        let mut array: CatervaArray<MemStore> = CatervaArray::from_buffer(ctx(), &input).unwrap();
        assert_eq!(array.to_buffer().unwrap(), input);
    }

    #[test]
    fn from_store_recovers_shape() {
        let array: CatervaArray<MemStore> = CatervaArray::zeros(ctx()).unwrap();
        let frame = array.to_frame().unwrap();
        let restored: CatervaArray<MemStore> =
            CatervaArray::from_frame(bytes::Bytes::from(frame), true).unwrap();
        assert_eq!(restored.shape(), array.shape());
        assert_eq!(restored.chunkshape(), array.chunkshape());
    }

    #[cfg(feature = "filesystem")]
    #[test]
    fn save_then_open_roundtrips() {
        use crate::store::fs::FileSystemStore;
        use tempdir::TempDir;

        let input: Vec<u8> = (0..16i32).flat_map(|i| i.to_le_bytes()).collect();
        let mem: CatervaArray<MemStore> = CatervaArray::from_buffer(ctx(), &input).unwrap();

        let dir = TempDir::new("caterva-array-persist").unwrap();
        let path = dir.path().join("arr.cat");
        persist::save(&mem, &path, true).unwrap();

        let mut reopened = CatervaArray::<FileSystemStore>::open(&path).unwrap();
        assert_eq!(reopened.shape(), mem.shape());
        assert_eq!(reopened.to_buffer().unwrap(), input);
    }

    #[cfg(feature = "filesystem")]
    #[test]
    fn create_on_disk_then_write() {
        use crate::store::fs::FileSystemStore;
        use tempdir::TempDir;

        let dir = TempDir::new("caterva-array-persist").unwrap();
        let path = dir.path().join("arr.cat");
        let mut arr = CatervaArray::<FileSystemStore>::create_on_disk(ctx(), &path, true).unwrap();
        let input: Vec<u8> = (0..16i32).flat_map(|i| i.to_le_bytes()).collect();
        arr.write_region(&[0, 0], &[4, 4], &input).unwrap();
        assert_eq!(arr.to_buffer().unwrap(), input);
    }
}
