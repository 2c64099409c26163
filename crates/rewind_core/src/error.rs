//! Error types for rewind_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for checkpoint operations.
///
/// The component APIs (`CheckpointRecorder`, `RestoreEngine`, ...) return these
/// directly. The `Checkpoints` facade never lets them escape; it logs them and
/// returns a sentinel instead.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Object with the given ID was not found in the store.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Hash verification failed during object read.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// The expected object ID
        expected: String,
        /// The actual computed hash
        actual: String,
    },

    /// The object file is corrupted or has invalid format.
    #[error("corrupted object at {}: {}", path.display(), reason)]
    CorruptedObject {
        /// Path to the corrupted object
        path: PathBuf,
        /// Description of the corruption
        reason: String,
    },

    /// Invalid hex string for ObjectId parsing.
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// Serialization error during typed object operations.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error during typed object operations.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// Blob exceeds maximum allowed size.
    #[error("blob too large: {size} bytes exceeds limit of {limit} bytes")]
    BlobTooLarge {
        /// Actual size of the blob
        size: usize,
        /// Maximum allowed size
        limit: usize,
    },

    /// Reference not found.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// Invalid ref file content or format.
    #[error("invalid ref at {}: {}", path.display(), reason)]
    InvalidRef {
        /// Path to the invalid ref file
        path: PathBuf,
        /// Description of what's invalid
        reason: String,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpointing is disabled for this session (initialization failed).
    #[error("checkpointing is disabled: {0}")]
    Disabled(String),

    /// No checkpoint with this id exists in the metadata index.
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// The history commit step failed; nothing was recorded.
    #[error("commit failed: {0}")]
    CommitFailed(String),

    /// A history operation ran past its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Name of the operation that timed out
        operation: String,
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// Shadow repository is locked and the holder could not be identified.
    #[error("shadow repository locked by another process")]
    RepositoryLocked,

    /// Shadow repository lock is held by a live process.
    #[error("shadow repository lock held by another process (PID: {pid})")]
    LockHeld {
        /// Process ID holding the lock
        pid: u32,
    },

    /// A captured path escapes the project or is otherwise unusable.
    #[error("invalid path {}: {}", path.display(), reason)]
    InvalidPath {
        /// The offending path
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// metadata.json could not be written or encoded.
    #[error("metadata error: {0}")]
    MetadataError(String),
}

impl CheckpointError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::CorruptedObject { .. } | Self::HashMismatch { .. } => {
                Some("The shadow history is damaged. Older checkpoints may not restore; new ones are unaffected.")
            }
            Self::Disabled(_) => {
                Some("Check that the state directory is writable, or set REWIND_HOME to a writable location.")
            }
            Self::CheckpointNotFound(_) => Some("Run 'rewind list' to see available checkpoints."),
            Self::LockHeld { .. } | Self::RepositoryLocked => {
                Some("Another rewind process is working on this project. Wait for it to finish, or remove the LOCK file if that process is gone.")
            }
            Self::Timeout { .. } => Some("Increase [history] timeout_ms in config.toml."),
            Self::ConfigError(_) => Some("Fix or delete config.toml in the state directory."),
            _ => None,
        }
    }
}

/// Convenience Result type for rewind_core operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;
