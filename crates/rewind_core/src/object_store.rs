//! Content-addressed object storage backing the shadow history.

use crate::error::{CheckpointError, Result};
use crate::fs_util::write_atomic;
use crate::object_id::{envelope, ObjectId, ObjectKind, HEADER_LEN, MAGIC};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Largest single blob accepted (100 MiB). The recorder skips project files
/// above this before reading them.
pub(crate) const MAX_BLOB_SIZE: usize = 100 * 1024 * 1024;

/// Default zstd level; see `[storage] compression_level`.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Content-addressed object storage.
///
/// Objects live at `objects/<shard>/<hex>` as zstd-compressed envelopes.
/// Writing the same content twice is a no-op, and every read re-hashes the
/// payload so a damaged object is reported instead of restored.
///
/// # Examples
///
/// ```
/// use rewind_core::ObjectStore;
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let store = ObjectStore::new(tmp.path().join("objects"));
///
/// let id = store.put_blob(b"hello world").unwrap();
/// assert_eq!(store.get_blob(id).unwrap(), b"hello world");
/// ```
pub struct ObjectStore {
    root: PathBuf,
    compression_level: i32,
}

impl ObjectStore {
    /// Creates a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Overrides the zstd compression level used for new objects.
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Returns the root directory of this object store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores raw bytes and returns their id.
    ///
    /// # Errors
    ///
    /// Returns `BlobTooLarge` above the size limit, or an I/O error.
    pub fn put_blob(&self, data: &[u8]) -> Result<ObjectId> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(CheckpointError::BlobTooLarge {
                size: data.len(),
                limit: MAX_BLOB_SIZE,
            });
        }
        self.put(ObjectKind::Blob, data)
    }

    /// Retrieves raw bytes by id.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound`, `HashMismatch` or `CorruptedObject`.
    pub fn get_blob(&self, id: ObjectId) -> Result<Vec<u8>> {
        self.get(id, ObjectKind::Blob)
    }

    /// Stores a tree or commit using postcard's deterministic encoding.
    pub fn put_typed<T: Serialize>(&self, value: &T) -> Result<ObjectId> {
        let encoded = postcard::to_allocvec(value)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        self.put(ObjectKind::Typed, &encoded)
    }

    /// Loads and decodes a typed object.
    pub fn get_typed<T: DeserializeOwned>(&self, id: ObjectId) -> Result<T> {
        let payload = self.get(id, ObjectKind::Typed)?;
        postcard::from_bytes(&payload).map_err(|e| CheckpointError::Deserialization(e.to_string()))
    }

    /// Checks if an object exists in the store.
    pub fn exists(&self, id: ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    fn object_path(&self, id: ObjectId) -> PathBuf {
        self.root.join(id.shard()).join(id.as_hex())
    }

    fn put(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::for_payload(kind, payload);
        if self.exists(id) {
            return Ok(id);
        }

        let path = self.object_path(id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let compressed = zstd::encode_all(envelope(kind, payload).as_slice(), self.compression_level)
            .map_err(|e| CheckpointError::Compression(e.to_string()))?;
        write_atomic(&path, &compressed)?;

        Ok(id)
    }

    fn get(&self, id: ObjectId, expected_kind: ObjectKind) -> Result<Vec<u8>> {
        let path = self.object_path(id);
        if !path.is_file() {
            return Err(CheckpointError::ObjectNotFound(id.as_hex()));
        }

        let compressed = fs::read(&path)?;
        let raw = zstd::decode_all(compressed.as_slice())
            .map_err(|e| CheckpointError::Compression(e.to_string()))?;

        let corrupted = |reason: String| CheckpointError::CorruptedObject {
            path: path.clone(),
            reason,
        };

        if raw.len() < HEADER_LEN {
            return Err(corrupted("object too small".to_string()));
        }
        if &raw[..5] != MAGIC {
            return Err(corrupted("invalid magic bytes".to_string()));
        }

        let kind = ObjectKind::from_byte(raw[5])
            .ok_or_else(|| corrupted(format!("unknown kind: {}", raw[5])))?;
        if kind != expected_kind {
            return Err(corrupted(format!(
                "expected {:?}, got {:?}",
                expected_kind, kind
            )));
        }

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&raw[6..HEADER_LEN]);
        let declared = u64::from_le_bytes(len_bytes) as usize;
        let payload = &raw[HEADER_LEN..];
        if payload.len() != declared {
            return Err(corrupted(format!(
                "length mismatch: header says {}, got {}",
                declared,
                payload.len()
            )));
        }

        let actual = ObjectId::for_payload(kind, payload);
        if actual != id {
            return Err(CheckpointError::HashMismatch {
                expected: id.as_hex(),
                actual: actual.as_hex(),
            });
        }

        Ok(payload.to_vec())
    }
}
