//! Permission registry for allow-listed directories

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Separator between a directory and its permission token in a raw entry
pub const PERMISSION_DELIMITER: char = ':';

/// Access level granted to an allowed directory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadOnly => "read-only",
            Permission::ReadWrite => "read-write",
        }
    }

    pub fn allows_write(&self) -> bool {
        matches!(self, Permission::ReadWrite)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ConfigError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "read-only" => Ok(Permission::ReadOnly),
            "read-write" => Ok(Permission::ReadWrite),
            other => Err(ConfigError::InvalidPermissionToken(other.to_string())),
        }
    }
}

/// A directory the server may touch, with symlinks already resolved
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AllowedDirectory {
    pub canonical_path: PathBuf,
    pub permission: Permission,
}

impl AllowedDirectory {
    /// Segment-wise containment: `/tmp2` is not inside `/tmp`
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.canonical_path)
    }
}

/// Split a raw `path:permission` entry on its last delimiter
pub fn split_entry(entry: &str) -> Result<(&str, &str), ConfigError> {
    entry
        .rsplit_once(PERMISSION_DELIMITER)
        .ok_or_else(|| ConfigError::MissingPermission(entry.to_string()))
}

/// Ordered, immutable set of allowed directories.
///
/// Built once at startup and then shared read-only. Lookups walk the
/// directories in declaration order and the first containing entry wins,
/// so a read-only parent listed before a read-write child shadows it.
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    directories: Vec<AllowedDirectory>,
}

impl PermissionRegistry {
    /// Build the registry from `(raw_path, permission_token)` pairs
    pub fn build<I, P, T>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (P, T)>,
        P: AsRef<str>,
        T: AsRef<str>,
    {
        let mut directories: Vec<AllowedDirectory> = Vec::new();

        for (raw_path, token) in entries {
            let permission: Permission = token.as_ref().parse()?;
            let canonical_path = Self::canonicalize_root(raw_path.as_ref())?;

            if directories.iter().any(|d| d.canonical_path == canonical_path) {
                return Err(ConfigError::DuplicatePath(canonical_path));
            }

            info!("Allowing {} ({})", canonical_path.display(), permission);
            directories.push(AllowedDirectory {
                canonical_path,
                permission,
            });
        }

        if directories.is_empty() {
            return Err(ConfigError::EmptyConfiguration);
        }

        Ok(Self { directories })
    }

    /// Parse raw `path:permission` entries, skipping blank ones
    pub fn from_entries<'a, I>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let pairs = entries
            .into_iter()
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(split_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Self::build(pairs)
    }

    /// Allowed directories in lookup order
    pub fn entries(&self) -> &[AllowedDirectory] {
        &self.directories
    }

    /// First allowed directory containing an already-canonical path
    pub fn find(&self, canonical: &Path) -> Option<&AllowedDirectory> {
        self.directories.iter().find(|d| d.contains(canonical))
    }

    fn canonicalize_root(raw: &str) -> Result<PathBuf, ConfigError> {
        let expanded = super::resolve::expand_home(Path::new(raw));
        let canonical = std::fs::canonicalize(&expanded).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::PathNotFound(expanded.clone()),
            _ => ConfigError::Inaccessible {
                path: expanded.clone(),
                source: e,
            },
        })?;

        if !canonical.is_dir() {
            return Err(ConfigError::NotADirectory(canonical));
        }
        Ok(canonical)
    }
}
