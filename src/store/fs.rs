//! Filesystem-backed chunk store: one file per chunk under `<base>/chunks`,
//! one file per metalayer under `<base>/metalayers`, and a small header
//! recording typesize and chunk count. Uses `fs4::FileExt` advisory locking
//! around every read/write, and `walkdir` to enumerate the metalayer
//! directory.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fs4::FileExt;

use crate::config::STORE_MAX_METALAYERS;
use crate::error::CatervaError;
use crate::store::{decompress_chunk, ChunkStore, CreateStore, Metalayers, StoreParams};

const HEADER_FILE: &str = "header";
const CHUNKS_DIR: &str = "chunks";
const METALAYERS_DIR: &str = "metalayers";

pub struct FileSystemStore {
    base_path: PathBuf,
    typesize: u32,
    nchunks: usize,
}

impl FileSystemStore {
    fn chunk_path(&self, idx: usize) -> PathBuf {
        self.base_path.join(CHUNKS_DIR).join(format!("{idx}.chunk"))
    }

    fn metalayer_path(&self, name: &str) -> PathBuf {
        self.base_path.join(METALAYERS_DIR).join(format!("{name}.meta"))
    }

    fn write_header(&self) -> Result<(), CatervaError> {
        let mut f = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(self.base_path.join(HEADER_FILE))?;
        f.lock_exclusive()?;
        f.write_u32::<LittleEndian>(self.typesize)?;
        f.write_u64::<LittleEndian>(self.nchunks as u64)?;
        Ok(())
    }

    /// Create a brand-new store rooted at `path`, which must not already
    /// exist. `parents` controls whether missing ancestor directories are
    /// created, mirroring `std::fs::create_dir_all` vs `create_dir`.
    pub fn create_at(
        path: impl AsRef<Path>,
        parents: bool,
        params: StoreParams,
        metalayers: Metalayers,
    ) -> Result<Self, CatervaError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(CatervaError::StoreError(std::io::Error::new(
                ErrorKind::AlreadyExists,
                "store path already exists",
            )));
        }
        if metalayers.len() > STORE_MAX_METALAYERS {
            return Err(CatervaError::not_caterva("metalayer catalog is full"));
        }
        if parents {
            fs::create_dir_all(path)?;
        } else {
            fs::create_dir(path)?;
        }
        fs::create_dir(path.join(CHUNKS_DIR))?;
        fs::create_dir(path.join(METALAYERS_DIR))?;

        let mut store = Self {
            base_path: path.canonicalize()?,
            typesize: params.typesize,
            nchunks: 0,
        };
        store.write_header()?;
        for (name, bytes) in metalayers {
            store.metalayer_add(&name, bytes)?;
        }
        Ok(store)
    }

    /// Open an existing store rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatervaError> {
        let base_path = path.as_ref().canonicalize()?;
        let mut f = File::open(base_path.join(HEADER_FILE))?;
        f.lock_shared()?;
        let typesize = f.read_u32::<LittleEndian>()?;
        let nchunks = f.read_u64::<LittleEndian>()? as usize;
        Ok(Self {
            base_path,
            typesize,
            nchunks,
        })
    }
}

impl ChunkStore for FileSystemStore {
    fn typesize(&self) -> u32 {
        self.typesize
    }

    fn nchunks(&self) -> usize {
        self.nchunks
    }

    fn append_chunk(&mut self, bytes: &[u8]) -> Result<usize, CatervaError> {
        let compressed = StoreParams::new(self.typesize).compress(bytes);
        let idx = self.nchunks;
        let mut f = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.chunk_path(idx))?;
        f.lock_exclusive()?;
        f.write_all(&compressed)?;
        self.nchunks += 1;
        self.write_header()?;
        Ok(idx)
    }

    fn replace_chunk(&mut self, idx: usize, bytes: &[u8]) -> Result<(), CatervaError> {
        if idx >= self.nchunks {
            return Err(CatervaError::bad_axis(idx as i64, "chunk index out of range"));
        }
        let compressed = StoreParams::new(self.typesize).compress(bytes);
        let mut f = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(self.chunk_path(idx))?;
        f.lock_exclusive()?;
        f.write_all(&compressed)?;
        Ok(())
    }

    fn read_chunk(&self, idx: usize) -> Result<Vec<u8>, CatervaError> {
        if idx >= self.nchunks {
            return Err(CatervaError::bad_axis(idx as i64, "chunk index out of range"));
        }
        let mut f = File::open(self.chunk_path(idx))?;
        f.lock_shared()?;
        let mut compressed = Vec::new();
        f.read_to_end(&mut compressed)?;
        decompress_chunk(&compressed)
    }

    fn metalayer_add(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), CatervaError> {
        if !self.metalayer_path(name).exists() && self.metalayer_names().len() >= STORE_MAX_METALAYERS {
            return Err(CatervaError::not_caterva("metalayer catalog is full"));
        }
        let mut f = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(self.metalayer_path(name))?;
        f.lock_exclusive()?;
        f.write_all(&bytes)?;
        Ok(())
    }

    fn metalayer_get(&self, name: &str) -> Option<Vec<u8>> {
        let mut f = File::open(self.metalayer_path(name)).ok()?;
        f.lock_shared().ok()?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf).ok()?;
        Some(buf)
    }

    fn metalayer_names(&self) -> Vec<String> {
        let dir = self.base_path.join(METALAYERS_DIR);
        walkdir::WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            })
            .collect()
    }

    fn destroy(self) -> Result<(), CatervaError> {
        fs::remove_dir_all(&self.base_path)?;
        Ok(())
    }
}

/// Rebuild-and-swap structural ops (`spec.md` §4.7) need to fabricate a
/// fresh store with no caller-supplied path; a filesystem store creates
/// itself at a throwaway directory and relies on [`ChunkStore::destroy`]
/// being called on whatever it replaces to avoid leaking it. A caller who
/// wants a specific on-disk location uses [`FileSystemStore::create_at`]
/// directly (see `crate::array::persist`).
impl CreateStore for FileSystemStore {
    fn create(params: StoreParams, metalayers: Metalayers) -> Result<Self, CatervaError> {
        let scratch_root = tempdir::TempDir::new("caterva-scratch")?.into_path();
        Self::create_at(scratch_root.join("store"), true, params, metalayers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn params() -> StoreParams {
        StoreParams::new(8)
    }

    #[test]
    fn create_append_read_roundtrips() {
        let dir = TempDir::new("caterva-fs-test").unwrap();
        let path = dir.path().join("arr.cat");
        let mut store = FileSystemStore::create_at(&path, true, params(), Vec::new()).unwrap();
        let idx = store.append_chunk(&[1u8; 8]).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(store.read_chunk(0).unwrap(), vec![1u8; 8]);
    }

    #[test]
    fn reopen_preserves_chunks_and_metalayers() {
        let dir = TempDir::new("caterva-fs-test").unwrap();
        let path = dir.path().join("arr.cat");
        {
            let mut store = FileSystemStore::create_at(&path, true, params(), Vec::new()).unwrap();
            store.append_chunk(&[2u8; 8]).unwrap();
            store.metalayer_add("caterva", vec![9, 9]).unwrap();
        }
        let reopened = FileSystemStore::open(&path).unwrap();
        assert_eq!(reopened.nchunks(), 1);
        assert_eq!(reopened.read_chunk(0).unwrap(), vec![2u8; 8]);
        assert_eq!(reopened.metalayer_get("caterva"), Some(vec![9, 9]));
        assert_eq!(reopened.metalayer_names(), vec!["caterva".to_string()]);
    }

    #[test]
    fn create_at_existing_path_fails() {
        let dir = TempDir::new("caterva-fs-test").unwrap();
        let path = dir.path().join("arr.cat");
        FileSystemStore::create_at(&path, true, params(), Vec::new()).unwrap();
        assert!(FileSystemStore::create_at(&path, true, params(), Vec::new()).is_err());
    }

    #[test]
    fn create_via_createstore_trait_is_usable_and_destroy_removes_it() {
        let mut store = <FileSystemStore as CreateStore>::create(params(), Vec::new()).unwrap();
        store.append_chunk(&[3u8; 8]).unwrap();
        let base_path = store.base_path.clone();
        assert!(base_path.exists());
        store.destroy().unwrap();
        assert!(!base_path.exists());
    }
}
