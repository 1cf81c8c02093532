//! Error kinds surfaced by the engine (`spec.md` §7).

use thiserror::Error;

use crate::shape::Coord;

/// Everything that can go wrong calling into this crate.
///
/// Every public operation returns `Result<_, CatervaError>`: there is no
/// panicking path for caller-triggered conditions (dimensionality mismatch,
/// bad bounds, malformed metadata, short buffers). Internal invariants
/// that indicate a bug in this crate rather than bad caller input still use
/// `debug_assert!` / `unreachable!`.
#[derive(Error, Debug)]
pub enum CatervaError {
    /// `ndim` out of range, zero/negative extent, block > chunk, exceeds `DMAX`.
    #[error("invalid shape: {reason}")]
    InvalidShape { reason: String },

    /// A region coordinate fell outside `[0, shape[i]]`, or `start > stop`.
    #[error("region [{start:?}, {stop:?}) is out of bounds for shape {shape:?}")]
    OutOfBounds {
        start: Coord,
        stop: Coord,
        shape: Coord,
    },

    /// Caller buffer size did not match `Π region_extent * typesize`.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BadBufferSize { expected: usize, actual: usize },

    /// Axis index outside `[0, ndim)`, or resize parameters inconsistent.
    #[error("bad axis {axis}: {reason}")]
    BadAxis { axis: i64, reason: String },

    /// Squeeze requested on an axis with extent > 1, or on an extent-1 axis
    /// whose chunkshape/blockshape isn't also 1 (dropping it would change
    /// the store's physical chunk layout, not just reinterpret it).
    #[error("axis {axis} has extent {extent}, not squeezable")]
    NotSqueezable { axis: usize, extent: i64 },

    /// Store lacks the shape metalayer, or it is an incompatible version.
    #[error("not a caterva store: {reason}")]
    NotCaterva { reason: String },

    /// Opaque pass-through from the backing store.
    #[error("store error: {0}")]
    StoreError(#[from] std::io::Error),

    /// Allocation failure for descriptors or tile buffers.
    #[error("out of memory: {0}")]
    Oom(String),
}

impl CatervaError {
    pub(crate) fn invalid_shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            reason: reason.into(),
        }
    }

    pub(crate) fn bad_axis(axis: i64, reason: impl Into<String>) -> Self {
        Self::BadAxis {
            axis,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_caterva(reason: impl Into<String>) -> Self {
        Self::NotCaterva {
            reason: reason.into(),
        }
    }
}
