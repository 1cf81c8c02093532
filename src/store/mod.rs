//! The compressed super-chunk store: the external collaborator boundary
//! described in `spec.md` §1/§6. The core only ever talks to a store
//! through [`ChunkStore`]; everything about compression, on-disk layout,
//! and the metalayer catalog lives behind that trait.

use crate::error::CatervaError;

pub mod mem;

#[cfg(feature = "filesystem")]
pub mod fs;

/// A named, free-form byte blob attached to a store (`spec.md` glossary:
/// "Metalayer"). The engine uses one, reserved, to carry the serialized
/// shape descriptor; callers may attach up to
/// [`crate::config::MAX_USER_METALAYERS`] more.
pub type Metalayers = Vec<(String, Vec<u8>)>;

/// Compression parameters for a store: compressor, level, shuffle filter,
/// and block size, the knobs `blosc::Context` exposes.
#[derive(Clone, Debug)]
pub struct StoreParams {
    pub typesize: u32,
    pub cname: blosc::Compressor,
    pub clevel: blosc::Clevel,
    pub shuffle: blosc::ShuffleMode,
    pub blocksize: usize,
}

impl StoreParams {
    pub fn new(typesize: u32) -> Self {
        Self {
            typesize,
            cname: blosc::Compressor::BloscLZ,
            clevel: blosc::Clevel::L5,
            shuffle: blosc::ShuffleMode::Byte,
            blocksize: 0,
        }
    }

    pub(crate) fn context(&self) -> blosc::Context {
        blosc::Context::new()
            .compressor(self.cname)
            .expect("compressor is always a valid variant")
            .clevel(self.clevel)
            .shuffle(self.shuffle)
            .blocksize(if self.blocksize == 0 {
                None
            } else {
                Some(self.blocksize)
            })
    }

    pub(crate) fn compress(&self, bytes: &[u8]) -> Vec<u8> {
        self.context().compress(bytes).into()
    }
}

/// Shared by every [`ChunkStore`] backend: chunks are always stored
/// compressed, so reading one back is always this call.
pub(crate) fn decompress_chunk(compressed: &[u8]) -> Result<Vec<u8>, CatervaError> {
    // Safety: `compressed` always came from `StoreParams::compress` (or a
    // frame round trip of bytes that did), so it carries a valid blosc2
    // header.
    unsafe {
        blosc::decompress_bytes(compressed)
            .map_err(|e| CatervaError::not_caterva(format!("corrupt chunk: {e}")))
    }
}

/// The core's only contract with persistence (`spec.md` §6): append a
/// fixed-size raw chunk, replace one in place, read one back, report
/// typesize and chunk count, and carry a metalayer catalog.
///
/// Chunks are addressed by position in append order, mirroring the
/// append-only super-chunk of the original C library: writing chunk `k`
/// for the first time means appending placeholder chunks up to `k` if
/// necessary (see `CatervaArray::ensure_chunk`), then appending or
/// replacing the target.
pub trait ChunkStore {
    fn typesize(&self) -> u32;

    fn nchunks(&self) -> usize;

    /// Append a new chunk, returning its index.
    fn append_chunk(&mut self, bytes: &[u8]) -> Result<usize, CatervaError>;

    /// Replace an existing chunk. `idx` must be `< self.nchunks()`.
    fn replace_chunk(&mut self, idx: usize, bytes: &[u8]) -> Result<(), CatervaError>;

    /// Decompress and return chunk `idx`. `idx` must be `< self.nchunks()`.
    fn read_chunk(&self, idx: usize) -> Result<Vec<u8>, CatervaError>;

    fn metalayer_add(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), CatervaError>;

    fn metalayer_get(&self, name: &str) -> Option<Vec<u8>>;

    fn metalayer_names(&self) -> Vec<String>;

    /// Release any resources backing this store once it has been replaced
    /// by a rebuilt one (`spec.md` §4.7's rebuild-and-swap structural ops).
    /// The default is a no-op, correct for a purely in-memory store; a
    /// store that owns on-disk state overrides this to remove it.
    fn destroy(self) -> Result<(), CatervaError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Stores which can be created fresh, with no caller-supplied location —
/// `spec.md` §6's `create(params, metalayers) -> store`. [`mem::MemStore`]
/// creates in memory; [`fs::FileSystemStore`] creates at a fresh temporary
/// directory, since the trait has no path parameter to forward one through.
/// A caller who wants to choose the path uses `FileSystemStore::create_at`
/// directly (see `crate::array::persist`) instead of going through this
/// trait.
pub trait CreateStore: ChunkStore + Sized {
    fn create(params: StoreParams, metalayers: Metalayers) -> Result<Self, CatervaError>;
}

/// Stores that can rehydrate from a contiguous in-memory frame
/// (`spec.md` §4.5 `from_frame`, §4.8 `to_frame`).
///
/// The C API's `copy` flag distinguishes a zero-copy borrow of caller
/// memory from a duplicated owned frame; Rust has no equivalent of a raw
/// borrowed pointer escaping this call, so both variants return an owned
/// `Self`. We still honor the intent: `bytes::Bytes` is reference-counted,
/// so `copy = false` shares the caller's allocation (slicing each chunk
/// out of it for free) while `copy = true` duplicates every chunk into a
/// fresh allocation, matching "duplicates into an owned sparse store".
pub trait FrameStore: ChunkStore + Sized {
    fn to_contiguous_frame(&self) -> Result<Vec<u8>, CatervaError>;

    fn from_contiguous_frame(bytes: bytes::Bytes, copy: bool) -> Result<Self, CatervaError>;
}
