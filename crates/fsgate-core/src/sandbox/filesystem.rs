//! File system operations with permission checks

use super::permissions::PermissionRegistry;
use super::tree::{clamp_depth, list_entries, TreeBuilder};
use super::validator::{validate, ResolvedPath};
use crate::config::{ServerConfig, SizeLimit};
use crate::error::{Error, NotFoundError, Result, SizeError};
use crate::types::*;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// File system handler with permission checking.
///
/// Cheap to clone; clones share the same immutable registry.
#[derive(Debug, Clone)]
pub struct FileSystemHandler {
    registry: Arc<PermissionRegistry>,
    size_limit: SizeLimit,
}

impl FileSystemHandler {
    pub fn new(registry: Arc<PermissionRegistry>, size_limit: SizeLimit) -> Self {
        Self {
            registry,
            size_limit,
        }
    }

    pub fn from_config(config: ServerConfig) -> Self {
        Self::new(Arc::new(config.registry), config.size_limit)
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    pub fn size_limit(&self) -> SizeLimit {
        self.size_limit
    }

    /// Read a text file
    pub async fn read_file(&self, path: &str) -> Result<String> {
        let resolved = validate(path, false, &self.registry)?;
        debug!("Reading file: {:?}", resolved.path());

        let metadata = fs::metadata(resolved.path()).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::NotFound(NotFoundError::FileNotFound(path.to_string()))
            } else {
                Error::Io(e)
            }
        })?;

        if !metadata.is_file() {
            return Err(NotFoundError::NotAFile(path.to_string()).into());
        }

        if let Some(limit) = self.size_limit.exceeded_by(metadata.len()) {
            return Err(SizeError::TooLarge {
                actual: metadata.len(),
                limit,
            }
            .into());
        }

        let content = self.read_bounded(&resolved).await?;
        String::from_utf8(content).map_err(|_| Error::BinaryFile(path.to_string()))
    }

    /// Read at most one byte past the ceiling so a file that grew after the
    /// size check is still rejected.
    async fn read_bounded(&self, resolved: &ResolvedPath) -> Result<Vec<u8>> {
        let file = fs::File::open(resolved.path()).await?;
        let mut buffer = Vec::new();

        match self.size_limit.bytes() {
            Some(limit) => {
                file.take(limit.saturating_add(1))
                    .read_to_end(&mut buffer)
                    .await?;
                let actual = buffer.len() as u64;
                if actual > limit {
                    return Err(SizeError::TooLarge { actual, limit }.into());
                }
            }
            None => {
                let mut file = file;
                file.read_to_end(&mut buffer).await?;
            }
        }

        Ok(buffer)
    }

    /// Write a text file, replacing any existing content
    pub async fn write_file(&self, path: &str, content: &str) -> Result<FileWriteResult> {
        let resolved = validate(path, true, &self.registry)?;

        let size = content.len() as u64;
        if let Some(limit) = self.size_limit.exceeded_by(size) {
            return Err(SizeError::TooLarge {
                actual: size,
                limit,
            }
            .into());
        }

        debug!("Writing file: {:?}", resolved.path());

        let existed_before = match fs::metadata(resolved.path()).await {
            Ok(metadata) if metadata.is_dir() => {
                return Err(NotFoundError::NotAFile(path.to_string()).into());
            }
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::Io(e)),
        };

        // Create parent directories if needed
        if let Some(parent) = resolved.path().parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(resolved.path(), content).await?;

        info!("Wrote {} bytes to {:?}", size, resolved.path());

        Ok(FileWriteResult {
            path: resolved.path().to_string_lossy().to_string(),
            bytes_written: size,
            created: !existed_before,
        })
    }

    /// List the immediate children of a directory, sorted by name
    pub async fn list_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        let resolved = validate(path, false, &self.registry)?;
        Self::ensure_directory(resolved.path(), path).await?;

        debug!("Listing directory: {:?}", resolved.path());

        let dir = resolved.into_path_buf();
        run_blocking(move || list_entries(&dir).map_err(io::Error::from)).await
    }

    /// Build a directory tree, `max_depth` clamped to `[1, 10]` (default 3)
    pub async fn directory_tree(&self, path: &str, max_depth: Option<i64>) -> Result<TreeNode> {
        let resolved = validate(path, false, &self.registry)?;
        Self::ensure_directory(resolved.path(), path).await?;

        let depth = clamp_depth(max_depth);
        debug!("Building tree for {:?} (depth {})", resolved.path(), depth);

        let root = resolved.into_path_buf();
        run_blocking(move || {
            TreeBuilder::new(depth)
                .build(&root)
                .map_err(io::Error::from)
        })
        .await
    }

    async fn ensure_directory(resolved: &Path, requested: &str) -> Result<()> {
        let metadata = fs::metadata(resolved).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::NotFound(NotFoundError::DirectoryNotFound(requested.to_string()))
            } else {
                Error::Io(e)
            }
        })?;

        if !metadata.is_dir() {
            return Err(NotFoundError::NotADirectory(requested.to_string()).into());
        }
        Ok(())
    }
}

/// Run blocking directory traversal off the async worker threads
async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)?
        .map_err(Error::Io)
}
