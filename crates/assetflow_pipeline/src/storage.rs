//! # Cache Storage
//!
//! Filesystem capability used by the cache stage: existence check,
//! whole-file read, create-if-absent write and removal of an unreadable
//! entry. One file per content id.
//!
//! Existence is checked before reading without any lock, so two workers may
//! both miss and both download. Writes are create-if-absent, which makes the
//! second store a no-op.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::asset::AssetId;

/// Per-lane blob store keyed by content id.
pub trait CacheStorage: Send + Sync + 'static {
    /// Returns true if an entry exists for `id`.
    fn exists(&self, id: AssetId) -> bool;

    /// Reads the whole entry.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the entry is missing or unreadable.
    fn read(&self, id: AssetId) -> io::Result<Vec<u8>>;

    /// Writes an entry unless one already exists. Returns false if it did.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    fn write_new(&self, id: AssetId, bytes: &[u8]) -> io::Result<bool>;

    /// Deletes the entry for `id`. A missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the entry exists but cannot be removed.
    fn remove(&self, id: AssetId) -> io::Result<()>;
}

/// Cache entries as files in one directory.
#[derive(Clone, Debug)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    /// Opens (creating if needed) a cache directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Cache directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `id`'s entry.
    #[must_use]
    pub fn path_for(&self, id: AssetId) -> PathBuf {
        self.root.join(id.cache_file_name())
    }
}

impl CacheStorage for DiskCacheStorage {
    fn exists(&self, id: AssetId) -> bool {
        self.path_for(id).is_file()
    }

    fn read(&self, id: AssetId) -> io::Result<Vec<u8>> {
        fs::read(self.path_for(id))
    }

    fn write_new(&self, id: AssetId, bytes: &[u8]) -> io::Result<bool> {
        let path = self.path_for(id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e),
        };
        if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_data()) {
            // Leave no partial entry behind for a later load to trip over.
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        Ok(true)
    }

    fn remove(&self, id: AssetId) -> io::Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result,
        }
    }
}

/// In-memory store for tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    entries: RwLock<HashMap<AssetId, Vec<u8>>>,
}

impl MemoryCacheStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Overwrites an entry unconditionally.
    pub fn insert(&self, id: AssetId, bytes: Vec<u8>) {
        self.entries.write().insert(id, bytes);
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn exists(&self, id: AssetId) -> bool {
        self.entries.read().contains_key(&id)
    }

    fn read(&self, id: AssetId) -> io::Result<Vec<u8>> {
        self.entries
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no cache entry for {id}")))
    }

    fn write_new(&self, id: AssetId, bytes: &[u8]) -> io::Result<bool> {
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return Ok(false);
        }
        entries.insert(id, bytes.to_vec());
        Ok(true)
    }

    fn remove(&self, id: AssetId) -> io::Result<()> {
        self.entries.write().remove(&id);
        Ok(())
    }
}
