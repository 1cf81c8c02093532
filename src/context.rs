//! Construction context (`spec.md` §4.5, component C5): the one place that
//! validates a shape/tiling/compression triple before any store exists.
//! Every constructor in [`crate::array`] builds one of these first.

use crate::config::MAX_USER_METALAYERS;
use crate::error::CatervaError;
use crate::shape::ShapeDescriptor;
use crate::store::{Metalayers, StoreParams};

/// Everything needed to create a new array: the validated shape descriptor,
/// the compression parameters for its store, and any caller-supplied
/// metalayers (the shape descriptor's own metalayer is added separately by
/// the constructor, not here — see `spec.md` §4.5).
pub struct ConstructionContext {
    pub desc: ShapeDescriptor,
    pub store_params: StoreParams,
    pub metalayers: Metalayers,
}

impl ConstructionContext {
    pub fn new(
        shape: &[i64],
        chunkshape: &[i64],
        blockshape: &[i64],
        typesize: u32,
    ) -> Result<Self, CatervaError> {
        let desc = ShapeDescriptor::new(shape, chunkshape, blockshape)?;
        Ok(Self {
            desc,
            store_params: StoreParams::new(typesize),
            metalayers: Vec::new(),
        })
    }

    pub fn with_compressor(mut self, cname: blosc::Compressor) -> Self {
        self.store_params.cname = cname;
        self
    }

    pub fn with_clevel(mut self, clevel: blosc::Clevel) -> Self {
        self.store_params.clevel = clevel;
        self
    }

    pub fn with_shuffle(mut self, shuffle: blosc::ShuffleMode) -> Self {
        self.store_params.shuffle = shuffle;
        self
    }

    pub fn with_blocksize(mut self, blocksize: usize) -> Self {
        self.store_params.blocksize = blocksize;
        self
    }

    /// Attach a user metalayer. Errors once `MAX_USER_METALAYERS` (one slot
    /// short of the store's hard cap, the other being reserved for the
    /// shape descriptor) is exceeded.
    pub fn with_metalayer(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, CatervaError> {
        if self.metalayers.len() >= MAX_USER_METALAYERS {
            return Err(CatervaError::not_caterva("too many user metalayers"));
        }
        self.metalayers.push((name.into(), bytes));
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_valid_context() {
        let ctx = ConstructionContext::new(&[10, 10], &[4, 4], &[2, 2], 8).unwrap();
        assert_eq!(ctx.desc.nitems, 100);
        assert_eq!(ctx.store_params.typesize, 8);
    }

    #[test]
    fn rejects_too_many_metalayers() {
        let mut ctx = ConstructionContext::new(&[10], &[4], &[2], 8).unwrap();
        for i in 0..MAX_USER_METALAYERS {
            ctx = ctx.with_metalayer(format!("layer{i}"), vec![0]).unwrap();
        }
        assert!(ctx.with_metalayer("one_too_many", vec![0]).is_err());
    }

    #[test]
    fn propagates_invalid_shape() {
        assert!(ConstructionContext::new(&[0], &[1], &[1], 4).is_err());
    }
}
