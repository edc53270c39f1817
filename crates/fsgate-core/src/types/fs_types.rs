//! Results produced by the filesystem operations

use serde::{Deserialize, Serialize};

/// Kind of a directory entry. Symlinks report the kind of their target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One immediate child returned by `list_directory`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// Node of a depth-bounded directory tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Present only on directories that were expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
    /// Set when the depth budget ran out before this directory
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    /// Why this directory's contents could not be listed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TreeNode {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            children: None,
            truncated: false,
            error: None,
        }
    }

    pub fn directory(name: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            children: Some(children),
            truncated: false,
            error: None,
        }
    }

    /// Directory past the depth budget
    pub fn truncated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            children: None,
            truncated: true,
            error: None,
        }
    }

    /// Directory that is not descended into, e.g. a symlink to a directory
    pub fn unexpanded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            children: None,
            truncated: false,
            error: None,
        }
    }

    /// Directory whose listing failed
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            children: None,
            truncated: false,
            error: Some(error.into()),
        }
    }
}

/// Result of a file write operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileWriteResult {
    pub path: String,
    pub bytes_written: u64,
    pub created: bool,
}
