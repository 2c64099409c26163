//! Opaque conversation snapshots.

use crate::error::{CheckpointError, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Caller-supplied blob stored next to a checkpoint.
///
/// The subsystem stores and returns the bytes verbatim and never looks inside.
/// The JSON helpers are conveniences for callers; nothing in this crate calls
/// `to_json` on a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(Vec<u8>);

impl Snapshot {
    /// Wraps raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Serializes any value to JSON bytes.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_vec(value)
            .map(Self)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))
    }

    /// Decodes the bytes as JSON into `T`.
    pub fn to_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.0).map_err(|e| CheckpointError::Deserialization(e.to_string()))
    }

    /// The stored bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the snapshot, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}
