//! In-memory chunk store.
//!
//! Each chunk is kept compressed, as a `Bytes` handle, with compression
//! applied on the way in via `blosc::Context`.

use bytes::Bytes;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::config::STORE_MAX_METALAYERS;
use crate::error::CatervaError;
use crate::store::{decompress_chunk, ChunkStore, CreateStore, FrameStore, Metalayers, StoreParams};

pub struct MemStore {
    params: StoreParams,
    chunks: Vec<Bytes>,
    metalayers: Vec<(String, Vec<u8>)>,
}

impl ChunkStore for MemStore {
    fn typesize(&self) -> u32 {
        self.params.typesize
    }

    fn nchunks(&self) -> usize {
        self.chunks.len()
    }

    fn append_chunk(&mut self, bytes: &[u8]) -> Result<usize, CatervaError> {
        let compressed = self.params.compress(bytes);
        self.chunks.push(Bytes::from(compressed));
        Ok(self.chunks.len() - 1)
    }

    fn replace_chunk(&mut self, idx: usize, bytes: &[u8]) -> Result<(), CatervaError> {
        if idx >= self.chunks.len() {
            return Err(CatervaError::bad_axis(idx as i64, "chunk index out of range"));
        }
        let compressed = self.params.compress(bytes);
        self.chunks[idx] = Bytes::from(compressed);
        Ok(())
    }

    fn read_chunk(&self, idx: usize) -> Result<Vec<u8>, CatervaError> {
        let compressed = self
            .chunks
            .get(idx)
            .ok_or_else(|| CatervaError::bad_axis(idx as i64, "chunk index out of range"))?;
        decompress_chunk(compressed)
    }

    fn metalayer_add(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), CatervaError> {
        if let Some(entry) = self.metalayers.iter_mut().find(|(n, _)| n == name) {
            entry.1 = bytes;
            return Ok(());
        }
        if self.metalayers.len() >= STORE_MAX_METALAYERS {
            return Err(CatervaError::not_caterva("metalayer catalog is full"));
        }
        self.metalayers.push((name.to_string(), bytes));
        Ok(())
    }

    fn metalayer_get(&self, name: &str) -> Option<Vec<u8>> {
        self.metalayers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.clone())
    }

    fn metalayer_names(&self) -> Vec<String> {
        self.metalayers.iter().map(|(n, _)| n.clone()).collect()
    }
}

impl CreateStore for MemStore {
    fn create(params: StoreParams, metalayers: Metalayers) -> Result<Self, CatervaError> {
        if metalayers.len() > STORE_MAX_METALAYERS {
            return Err(CatervaError::not_caterva("metalayer catalog is full"));
        }
        Ok(Self {
            params,
            chunks: Vec::new(),
            metalayers,
        })
    }
}

/// Frame layout: a small header followed by each chunk's compressed bytes
/// and the metalayer catalog, all as explicit little-endian fields.
impl FrameStore for MemStore {
    fn to_contiguous_frame(&self) -> Result<Vec<u8>, CatervaError> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(self.params.typesize)?;
        out.write_u64::<LittleEndian>(self.chunks.len() as u64)?;
        for chunk in &self.chunks {
            out.write_u64::<LittleEndian>(chunk.len() as u64)?;
            out.write_all(chunk)?;
        }
        out.write_u32::<LittleEndian>(self.metalayers.len() as u32)?;
        for (name, bytes) in &self.metalayers {
            let name_bytes = name.as_bytes();
            out.write_u16::<LittleEndian>(name_bytes.len() as u16)?;
            out.write_all(name_bytes)?;
            out.write_u64::<LittleEndian>(bytes.len() as u64)?;
            out.write_all(bytes)?;
        }
        Ok(out)
    }

    fn from_contiguous_frame(bytes: Bytes, copy: bool) -> Result<Self, CatervaError> {
        let mut cursor = Cursor::new(&bytes[..]);
        let typesize = cursor.read_u32::<LittleEndian>()?;
        let nchunks = cursor.read_u64::<LittleEndian>()? as usize;

        let mut chunks = Vec::with_capacity(nchunks);
        for _ in 0..nchunks {
            let len = cursor.read_u64::<LittleEndian>()? as usize;
            let start = cursor.position() as usize;
            let end = start + len;
            if end > bytes.len() {
                return Err(CatervaError::not_caterva("frame truncated inside a chunk"));
            }
            let chunk = if copy {
                Bytes::copy_from_slice(&bytes[start..end])
            } else {
                bytes.slice(start..end)
            };
            chunks.push(chunk);
            cursor.set_position(end as u64);
        }

        let nmeta = cursor.read_u32::<LittleEndian>()? as usize;
        let mut metalayers = Vec::with_capacity(nmeta);
        for _ in 0..nmeta {
            let name_len = cursor.read_u16::<LittleEndian>()? as usize;
            let mut name_buf = vec![0u8; name_len];
            cursor.read_exact(&mut name_buf)?;
            let name = String::from_utf8(name_buf)
                .map_err(|_| CatervaError::not_caterva("metalayer name is not valid utf-8"))?;
            let data_len = cursor.read_u64::<LittleEndian>()? as usize;
            let mut data = vec![0u8; data_len];
            cursor.read_exact(&mut data)?;
            metalayers.push((name, data));
        }

        Ok(Self {
            params: StoreParams::new(typesize),
            chunks,
            metalayers,
        })
    }
}
