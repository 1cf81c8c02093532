//! Meta codec (`spec.md` §4.2, component C2).
//!
//! Serializes the shape descriptor as a compact byte string: a version
//! byte, an `ndim` byte, then `shape`, `chunkshape`, `blockshape`
//! (truncated to `ndim` entries) as self-delimiting little-endian base-128
//! varints, chosen over fixed-width fields since shape entries span a much
//! wider range than chunk/block extents.

use crate::config::{DMAX, MAX_CHUNK_BLOCK_EXTENT, META_VERSION};
use crate::error::CatervaError;
use crate::shape::{coord_from_slice, ShapeDescriptor};

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(bytes: &[u8], pos: &mut usize) -> Result<u64, CatervaError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = *bytes
            .get(*pos)
            .ok_or_else(|| CatervaError::not_caterva("truncated meta: varint ran off the end"))?;
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 64 {
            return Err(CatervaError::not_caterva("malformed varint (too long)"));
        }
    }
    Ok(result)
}

/// Serialize `(ndim, shape, chunkshape, blockshape)` as the engine's
/// compact meta format. Exact inverse of [`deserialize`].
pub fn serialize(ndim: usize, shape: &[i64], chunkshape: &[i64], blockshape: &[i64]) -> Result<Vec<u8>, CatervaError> {
    if ndim == 0 || ndim > DMAX {
        return Err(CatervaError::invalid_shape(format!(
            "ndim {ndim} out of range [1, {DMAX}]"
        )));
    }
    if shape.len() != ndim || chunkshape.len() != ndim || blockshape.len() != ndim {
        return Err(CatervaError::invalid_shape(
            "shape/chunkshape/blockshape length does not match ndim",
        ));
    }
    for i in 0..ndim {
        if shape[i] < 0 {
            return Err(CatervaError::invalid_shape("shape entries must be non-negative"));
        }
        if chunkshape[i] > MAX_CHUNK_BLOCK_EXTENT || blockshape[i] > MAX_CHUNK_BLOCK_EXTENT {
            return Err(CatervaError::invalid_shape(
                "chunk/block extent exceeds 32-bit range",
            ));
        }
    }

    let mut out = Vec::with_capacity(2 + ndim * 3 * 4);
    out.push(META_VERSION);
    out.push(ndim as u8);
    for i in 0..ndim {
        write_varint(&mut out, shape[i] as u64);
    }
    for i in 0..ndim {
        write_varint(&mut out, chunkshape[i] as u64);
    }
    for i in 0..ndim {
        write_varint(&mut out, blockshape[i] as u64);
    }
    Ok(out)
}

pub fn serialize_descriptor(desc: &ShapeDescriptor) -> Result<Vec<u8>, CatervaError> {
    serialize(desc.ndim, desc.shape(), desc.chunkshape(), desc.blockshape())
}

/// Parsed-but-unvalidated meta fields, ready to feed into
/// [`crate::shape::ShapeDescriptor::new`].
pub struct DecodedMeta {
    pub ndim: usize,
    pub shape: Vec<i64>,
    pub chunkshape: Vec<i64>,
    pub blockshape: Vec<i64>,
}

/// Deserialize bytes produced by [`serialize`]. Fails cleanly (never
/// panics) on truncated or version-incompatible input.
pub fn deserialize(bytes: &[u8]) -> Result<DecodedMeta, CatervaError> {
    if bytes.len() < 2 {
        return Err(CatervaError::not_caterva("meta too short to contain a header"));
    }
    let version = bytes[0];
    if version != META_VERSION {
        return Err(CatervaError::not_caterva(format!(
            "unsupported meta version {version}"
        )));
    }
    let ndim = bytes[1] as usize;
    if ndim == 0 || ndim > DMAX {
        return Err(CatervaError::not_caterva(format!("meta ndim {ndim} out of range")));
    }

    let mut pos = 2usize;
    let mut shape = Vec::with_capacity(ndim);
    for _ in 0..ndim {
        shape.push(read_varint(bytes, &mut pos)? as i64);
    }
    let mut chunkshape = Vec::with_capacity(ndim);
    for _ in 0..ndim {
        chunkshape.push(read_varint(bytes, &mut pos)? as i64);
    }
    let mut blockshape = Vec::with_capacity(ndim);
    for _ in 0..ndim {
        blockshape.push(read_varint(bytes, &mut pos)? as i64);
    }

    Ok(DecodedMeta {
        ndim,
        shape,
        chunkshape,
        blockshape,
    })
}

impl DecodedMeta {
    pub fn into_descriptor(self) -> Result<ShapeDescriptor, CatervaError> {
        ShapeDescriptor::new(&self.shape, &self.chunkshape, &self.blockshape)
    }

    pub fn shape_coord(&self) -> crate::shape::Coord {
        coord_from_slice(&self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_s6() {
        let shape = [100i64, 200, 300];
        let chunkshape = [10i64, 20, 30];
        let blockshape = [5i64, 5, 5];
        let bytes = serialize(3, &shape, &chunkshape, &blockshape).unwrap();
        let decoded = deserialize(&bytes).unwrap();
        assert_eq!(decoded.ndim, 3);
        assert_eq!(decoded.shape, shape);
        assert_eq!(decoded.chunkshape, chunkshape);
        assert_eq!(decoded.blockshape, blockshape);
    }

    #[test]
    fn roundtrip_large_values() {
        let shape = [i64::MAX / 2, 1, (1u64 << 40) as i64];
        let chunkshape = [1i64, 1, 1];
        let blockshape = [1i64, 1, 1];
        let bytes = serialize(3, &shape, &chunkshape, &blockshape).unwrap();
        let decoded = deserialize(&bytes).unwrap();
        assert_eq!(decoded.shape, shape);
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = serialize(2, &[10, 10], &[4, 4], &[2, 2]).unwrap();
        for cut in 0..bytes.len() {
            assert!(deserialize(&bytes[..cut]).is_err());
        }
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = serialize(2, &[10, 10], &[4, 4], &[2, 2]).unwrap();
        bytes[0] = 99;
        assert!(deserialize(&bytes).is_err());
    }
}
