//! Chunk cache (`spec.md` §4.4, component C4).
//!
//! Single-slot, write-through, read-side cache: never a source of
//! correctness, only avoids redundant decompression when a read region
//! falls entirely inside the chunk already loaded. Modeled as a tagged
//! variant rather than a sentinel chunk index, per `spec.md` §9 Design
//! Notes.

use log::trace;

use crate::error::CatervaError;

pub enum ChunkCache {
    Empty,
    Loaded { chunk_index: usize, buf: Vec<u8> },
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::Empty
    }
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::Empty
    }

    /// If the cache already names `chunk_index`, returns its buffer;
    /// otherwise calls `loader` to decompress the chunk, stores the
    /// result, and returns that.
    pub fn get_or_load(
        &mut self,
        chunk_index: usize,
        loader: impl FnOnce() -> Result<Vec<u8>, CatervaError>,
    ) -> Result<&[u8], CatervaError> {
        let hit = matches!(self, Self::Loaded { chunk_index: k, .. } if *k == chunk_index);
        if !hit {
            trace!("chunk cache miss for chunk {chunk_index}, decompressing");
            let buf = loader()?;
            *self = Self::Loaded { chunk_index, buf };
        }
        match self {
            Self::Loaded { buf, .. } => Ok(buf),
            Self::Empty => unreachable!("just populated the cache"),
        }
    }

    /// Mark the cache empty. Called on any write path that may alter any
    /// chunk's content.
    pub fn invalidate(&mut self) {
        if !matches!(self, Self::Empty) {
            trace!("invalidating chunk cache");
        }
        *self = Self::Empty;
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_once_then_hits() {
        let mut cache = ChunkCache::new();
        let mut loads = 0;
        {
            let buf = cache
                .get_or_load(3, || {
                    loads += 1;
                    Ok(vec![1, 2, 3])
                })
                .unwrap();
            assert_eq!(buf, &[1, 2, 3]);
        }
        let _ = cache.get_or_load(3, || {
            loads += 1;
            Ok(vec![9, 9, 9])
        });
        assert_eq!(loads, 1);
    }

    #[test]
    fn invalidate_forces_reload() {
        let mut cache = ChunkCache::new();
        cache.get_or_load(1, || Ok(vec![1])).unwrap();
        cache.invalidate();
        assert!(cache.is_empty());
        let mut loads = 0;
        cache
            .get_or_load(1, || {
                loads += 1;
                Ok(vec![1])
            })
            .unwrap();
        assert_eq!(loads, 1);
    }
}
