//! Compile-time limits for the engine.
//!
//! There is no global mutable configuration here: every array carries its
//! own tiling and store handle, and the only shared state is these
//! constants. See `spec.md` §9 ("No hidden global state").

/// Maximum number of dimensions an array may have.
pub const DMAX: usize = 8;

/// Format version written as the first byte of a serialized shape
/// descriptor. Must never exceed 127 (the high bit is reserved).
pub const META_VERSION: u8 = 0;

/// Name under which the serialized shape descriptor is stored as a
/// metalayer in the backing store.
pub const SHAPE_METALAYER_NAME: &str = "caterva";

/// Upper bound on the number of metalayers a store may carry, mirroring
/// `BLOSC2_MAX_METALAYERS` in the original C library.
pub const STORE_MAX_METALAYERS: usize = 16;

/// Number of user-settable metalayers, after reserving one slot for the
/// shape descriptor itself.
pub const MAX_USER_METALAYERS: usize = STORE_MAX_METALAYERS - 1;

/// Largest value a chunk or block extent may take (`spec.md` §6: 32-bit).
pub const MAX_CHUNK_BLOCK_EXTENT: i64 = i32::MAX as i64;
