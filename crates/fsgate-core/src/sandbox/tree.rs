//! Depth-bounded directory tree serialization

use crate::types::{DirectoryEntry, EntryKind, TreeNode};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

pub const DEFAULT_TREE_DEPTH: usize = 3;
pub const MIN_TREE_DEPTH: usize = 1;
pub const MAX_TREE_DEPTH: usize = 10;

/// Clamp a caller-supplied depth into `[MIN_TREE_DEPTH, MAX_TREE_DEPTH]`
pub fn clamp_depth(requested: Option<i64>) -> usize {
    match requested {
        None => DEFAULT_TREE_DEPTH,
        Some(depth) => depth.clamp(MIN_TREE_DEPTH as i64, MAX_TREE_DEPTH as i64) as usize,
    }
}

/// An immediate child of a directory, in file name order.
///
/// `name` is for display only and may be lossy; traversal uses `path`.
pub(crate) struct Child {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
    pub is_symlink: bool,
}

/// Enumerate the immediate children of `dir`, sorted by file name.
///
/// Symlinks are not followed for traversal but report the kind of their target;
/// a dangling link reports as a file.
pub(crate) fn read_children(dir: &Path) -> Result<Vec<Child>, walkdir::Error> {
    let mut children = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let is_symlink = entry.path_is_symlink();
        let is_dir = if is_symlink {
            std::fs::metadata(entry.path())
                .map(|m| m.is_dir())
                .unwrap_or(false)
        } else {
            entry.file_type().is_dir()
        };

        children.push(Child {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path().to_path_buf(),
            kind: if is_dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            is_symlink,
        });
    }

    Ok(children)
}

/// List `dir` as flat entries
pub(crate) fn list_entries(dir: &Path) -> Result<Vec<DirectoryEntry>, walkdir::Error> {
    Ok(read_children(dir)?
        .into_iter()
        .map(|c| DirectoryEntry {
            name: c.name,
            kind: c.kind,
        })
        .collect())
}

/// Builds [`TreeNode`]s, expanding at most `max_depth` levels below the root
pub struct TreeBuilder {
    max_depth: usize,
}

impl TreeBuilder {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.clamp(MIN_TREE_DEPTH, MAX_TREE_DEPTH),
        }
    }

    /// Build the tree rooted at `root`.
    ///
    /// Only a failure to list `root` itself is returned as an error; failures
    /// below it are recorded on the affected node.
    pub fn build(&self, root: &Path) -> Result<TreeNode, walkdir::Error> {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned());

        let children = self.expand(root, self.max_depth)?;
        Ok(TreeNode::directory(name, children))
    }

    fn expand(&self, dir: &Path, budget: usize) -> Result<Vec<TreeNode>, walkdir::Error> {
        Ok(read_children(dir)?
            .into_iter()
            .map(|child| self.expand_child(child, budget))
            .collect())
    }

    /// Turn one child into a node; a subdirectory that cannot be listed
    /// carries the error instead of children.
    fn expand_child(&self, child: Child, budget: usize) -> TreeNode {
        match child.kind {
            EntryKind::File => TreeNode::file(child.name),
            EntryKind::Directory if child.is_symlink => TreeNode::unexpanded(child.name),
            EntryKind::Directory if budget <= 1 => TreeNode::truncated(child.name),
            EntryKind::Directory => match self.expand(&child.path, budget - 1) {
                Ok(grandchildren) => TreeNode::directory(child.name, grandchildren),
                Err(e) => {
                    warn!("Cannot list {:?}: {}", child.path, e);
                    TreeNode::failed(child.name, describe(&e))
                }
            },
        }
    }
}

fn describe(error: &walkdir::Error) -> String {
    match error.io_error() {
        Some(io) => io.to_string(),
        None => error.to_string(),
    }
}
