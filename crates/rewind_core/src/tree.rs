//! Conversions between flat `path -> blob` maps and nested trees.

use crate::error::{CheckpointError, Result};
use crate::types::{Tree, TreeEntry, TreeEntryKind};
use crate::{ObjectId, ObjectStore};
use std::collections::BTreeMap;

/// Flat view of a tree: slash-separated path to blob id, sorted by path.
pub type PathMap = BTreeMap<String, ObjectId>;

/// Stores the nested trees for `paths` and returns the root tree id.
///
/// Paths use `/` separators and must not contain empty components.
pub fn build_tree(paths: &PathMap, store: &ObjectStore) -> Result<ObjectId> {
    let split: Vec<(Vec<&str>, ObjectId)> = paths
        .iter()
        .map(|(path, id)| (path.split('/').collect(), *id))
        .collect();

    if let Some((path, _)) = split
        .iter()
        .find(|(parts, _)| parts.iter().any(|p| p.is_empty() || *p == "." || *p == ".."))
    {
        return Err(CheckpointError::InvalidPath {
            path: path.join("/").into(),
            reason: "empty or relative path component".to_string(),
        });
    }

    let refs: Vec<(&[&str], ObjectId)> = split.iter().map(|(p, id)| (p.as_slice(), *id)).collect();
    build_level(&refs, store)
}

fn build_level(paths: &[(&[&str], ObjectId)], store: &ObjectStore) -> Result<ObjectId> {
    let mut blobs: Vec<TreeEntry> = Vec::new();
    let mut subdirs: BTreeMap<&str, Vec<(&[&str], ObjectId)>> = BTreeMap::new();

    for (parts, id) in paths {
        match parts {
            [name] => blobs.push(TreeEntry {
                name: (*name).to_string(),
                kind: TreeEntryKind::Blob,
                id: *id,
            }),
            [dir, rest @ ..] => subdirs.entry(*dir).or_default().push((rest, *id)),
            [] => {}
        }
    }

    for (dir, children) in subdirs {
        if blobs.iter().any(|b| b.name == dir) {
            return Err(CheckpointError::InvalidPath {
                path: dir.into(),
                reason: "recorded both as a file and as a directory".to_string(),
            });
        }
        let id = build_level(&children, store)?;
        blobs.push(TreeEntry {
            name: dir.to_string(),
            kind: TreeEntryKind::Tree,
            id,
        });
    }

    store.put_typed(&Tree::new(blobs))
}

/// Inserts `path`, first dropping entries that would clash with it: a file
/// at one of its ancestors, or anything stored beneath it.
///
/// A project path can change kind between checkpoints (`a` becomes `a/`),
/// and the newest capture wins.
pub fn insert_replacing(paths: &mut PathMap, path: &str, id: ObjectId) {
    let mut ancestor = path;
    while let Some((parent, _)) = ancestor.rsplit_once('/') {
        paths.remove(parent);
        ancestor = parent;
    }

    let prefix = format!("{}/", path);
    let nested: Vec<String> = paths
        .range(prefix.clone()..)
        .take_while(|(key, _)| key.starts_with(&prefix))
        .map(|(key, _)| key.clone())
        .collect();
    for key in nested {
        paths.remove(&key);
    }

    paths.insert(path.to_string(), id);
}

/// Expands a stored tree back into a flat path map.
pub fn flatten_tree(root: ObjectId, store: &ObjectStore) -> Result<PathMap> {
    let mut out = PathMap::new();
    flatten_into(root, "", store, &mut out)?;
    Ok(out)
}

fn flatten_into(id: ObjectId, prefix: &str, store: &ObjectStore, out: &mut PathMap) -> Result<()> {
    let tree: Tree = store.get_typed(id)?;
    for entry in tree.entries {
        let path = if prefix.is_empty() {
            entry.name
        } else {
            format!("{}/{}", prefix, entry.name)
        };
        match entry.kind {
            TreeEntryKind::Blob => {
                out.insert(path, entry.id);
            }
            TreeEntryKind::Tree => flatten_into(entry.id, &path, store, out)?,
        }
    }
    Ok(())
}

/// Finds the blob stored at `path` inside the tree, if any.
pub fn lookup_path(root: ObjectId, path: &str, store: &ObjectStore) -> Result<Option<ObjectId>> {
    let mut current = root;
    let mut parts = path.split('/').peekable();

    while let Some(part) = parts.next() {
        let tree: Tree = store.get_typed(current)?;
        let Some(entry) = tree.entry(part) else {
            return Ok(None);
        };
        match (entry.kind, parts.peek().is_some()) {
            (TreeEntryKind::Blob, false) => return Ok(Some(entry.id)),
            (TreeEntryKind::Tree, true) => current = entry.id,
            _ => return Ok(None),
        }
    }

    Ok(None)
}
