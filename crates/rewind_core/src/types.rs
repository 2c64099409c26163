//! Objects stored in the shadow history: trees and commits.

use crate::ObjectId;
use serde::{Deserialize, Serialize};

/// Committer recorded on every shadow commit. Fixed so the history never
/// depends on the host user's configuration.
pub const COMMITTER: &str = "rewind <rewind@localhost>";

/// Directory listing snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    /// Sorted list of entries (MUST be sorted by name for determinism).
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Creates a new tree, automatically sorting entries by name.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    /// Looks up a direct child by name.
    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }
}

/// Entry in a tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// File or directory name (single path component).
    pub name: String,
    /// Type of entry.
    pub kind: TreeEntryKind,
    /// Blob id for files, tree id for directories.
    pub id: ObjectId,
}

/// Type of tree entry.
#[repr(u8)]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEntryKind {
    /// Regular file (blob).
    Blob = 1,
    /// Directory (subtree).
    Tree = 2,
}

/// A recorded point in the shadow history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Parent commit ids (empty for the initial commit).
    pub parents: Vec<ObjectId>,
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Committer identity, always [`COMMITTER`].
    pub author: String,
    /// Commit message: operation label plus captured file list.
    pub message: String,
    /// Root of the worktree snapshot (`files/`, `snapshots/`).
    pub root_tree: ObjectId,
}
