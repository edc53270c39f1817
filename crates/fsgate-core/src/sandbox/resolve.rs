//! Symlink-aware path canonicalization that tolerates missing leaves

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Upper bound on symlink hops while resolving a single path (matches Linux `MAXSYMLINKS`)
const MAX_SYMLINK_HOPS: usize = 40;

/// Expand a leading `~` component to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Resolve `path` to an absolute location with every symlink resolved.
///
/// Unlike [`std::fs::canonicalize`] the target does not have to exist: once a
/// component is missing, it and everything after it are appended literally
/// (`..` still pops). Symlinks are followed even when dangling, so the result
/// always reflects where a subsequent create would land.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let expanded = expand_home(path);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };

    let mut resolved = PathBuf::new();
    let mut pending: VecDeque<OsString> = VecDeque::new();
    let mut hops = 0usize;
    // Once a component is missing nothing below it can exist, so skip the lookups.
    let mut missing_from: Option<usize> = None;

    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                resolved.push(component.as_os_str());
            }
            other => pending.push_back(other.as_os_str().to_os_string()),
        }
    }

    while let Some(part) = pending.pop_front() {
        if part == "." {
            continue;
        }
        if part == ".." {
            resolved.pop();
            if let Some(depth) = missing_from {
                if resolved.components().count() < depth {
                    missing_from = None;
                }
            }
            continue;
        }

        let candidate = resolved.join(&part);
        if missing_from.is_some() {
            resolved = candidate;
            continue;
        }

        match std::fs::symlink_metadata(&candidate) {
            Ok(meta) if meta.file_type().is_symlink() => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(io::Error::other("too many levels of symbolic links"));
                }
                let target = std::fs::read_link(&candidate)?;
                if target.is_absolute() {
                    resolved = PathBuf::new();
                }
                let mut target_parts = Vec::new();
                for component in target.components() {
                    match component {
                        Component::Prefix(_) | Component::RootDir => {
                            resolved.push(component.as_os_str());
                        }
                        other => target_parts.push(other.as_os_str().to_os_string()),
                    }
                }
                for target_part in target_parts.into_iter().rev() {
                    pending.push_front(target_part);
                }
            }
            Ok(_) => resolved = candidate,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                missing_from = Some(candidate.components().count());
                resolved = candidate;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(resolved)
}
