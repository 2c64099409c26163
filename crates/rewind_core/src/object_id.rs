//! Object identification and the canonical envelope hashed into every id.

use crate::error::{CheckpointError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte BLAKE3 content hash identifying an object in the shadow history.
///
/// Commit ids double as the `historyRef` recorded for each checkpoint, so the
/// hex form is what ends up in `metadata.json`.
///
/// # Examples
///
/// ```
/// use rewind_core::ObjectId;
///
/// let id = ObjectId::from_bytes([0xab; 32]);
/// assert_eq!(id.as_hex().len(), 64);
/// assert_eq!(id.shard(), "ab");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// The length of an ObjectId as a hex string.
    pub const HEX_LEN: usize = 64;

    /// Creates an ObjectId from raw bytes.
    #[inline]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying hash bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, always 64 characters.
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First byte as hex, used as the object directory shard.
    pub fn shard(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Parses an ObjectId from a hex string, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError::InvalidHex` if the string is not exactly
    /// 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != Self::HEX_LEN {
            return Err(CheckpointError::InvalidHex(format!(
                "expected {} hex chars, got {}",
                Self::HEX_LEN,
                s.len()
            )));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| CheckpointError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub(crate) fn for_payload(kind: ObjectKind, payload: &[u8]) -> Self {
        let hash = blake3::hash(&envelope(kind, payload));
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({}...)", &self.as_hex()[..12])
    }
}

/// Discriminant stored in the envelope so a blob can never be read back as a
/// tree or commit.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ObjectKind {
    /// Raw bytes (captured file contents, snapshot payloads).
    Blob = 1,
    /// postcard-encoded tree or commit.
    Typed = 2,
}

impl ObjectKind {
    pub(crate) fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Blob),
            2 => Some(Self::Typed),
            _ => None,
        }
    }
}

pub(crate) const MAGIC: &[u8; 5] = b"RWND1";

/// Size of magic + kind + little-endian u64 length.
pub(crate) const HEADER_LEN: usize = 5 + 1 + 8;

/// Builds the bytes that are hashed and stored: magic, kind, length, payload.
pub(crate) fn envelope(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(kind as u8);
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
    out
}
