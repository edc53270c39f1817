//! Path validation against the permission registry
//!
//! Every operation handler goes through [`validate`] before it touches the
//! filesystem. The decision is made on the fully resolved path, never on the
//! raw input, so symlinks pointing out of an allowed directory are denied and
//! symlinks pointing into one are judged by their target.

use super::permissions::{Permission, PermissionRegistry};
use super::resolve::resolve_path;
use crate::error::AccessError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A canonical path proven to live inside an allowed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    path: PathBuf,
    permission: Permission,
}

impl ResolvedPath {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Permission of the allowed directory that matched
    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Resolve `requested` and check it against the registry.
///
/// Fails closed: a path that no allowed directory contains is always denied.
pub fn validate(
    requested: &str,
    require_write: bool,
    registry: &PermissionRegistry,
) -> Result<ResolvedPath, AccessError> {
    let canonical = resolve_path(Path::new(requested)).map_err(|e| {
        warn!("Could not resolve {}: {}", requested, e);
        AccessError::Unresolvable {
            path: requested.to_string(),
            reason: e.to_string(),
        }
    })?;

    let Some(allowed) = registry.find(&canonical) else {
        warn!("Denied {} (resolved to {:?})", requested, canonical);
        return Err(AccessError::OutsideAllowedDirectories(requested.to_string()));
    };

    if require_write && !allowed.permission.allows_write() {
        warn!("Denied write to {:?}: {:?} is read-only", canonical, allowed.canonical_path);
        return Err(AccessError::WritePermissionDenied(
            allowed.canonical_path.clone(),
        ));
    }

    debug!("Validated {} -> {:?} ({})", requested, canonical, allowed.permission);
    Ok(ResolvedPath {
        path: canonical,
        permission: allowed.permission,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn registry_for(dirs: &[(&TempDir, &str)]) -> PermissionRegistry {
        PermissionRegistry::build(
            dirs.iter()
                .map(|(d, p)| (d.path().to_str().unwrap().to_string(), *p)),
        )
        .unwrap()
    }

    fn as_str(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    #[test]
    fn test_path_inside_read_write_dir() {
        let dir = tempdir().unwrap();
        let registry = registry_for(&[(&dir, "read-write")]);

        let target = dir.path().join("a.txt");
        let resolved = validate(as_str(&target), true, &registry).unwrap();

        assert_eq!(
            resolved.path(),
            std::fs::canonicalize(dir.path()).unwrap().join("a.txt")
        );
        assert_eq!(resolved.permission(), Permission::ReadWrite);
    }

    #[test]
    fn test_allowed_root_itself_is_contained() {
        let dir = tempdir().unwrap();
        let registry = registry_for(&[(&dir, "read-only")]);

        assert!(validate(as_str(dir.path()), false, &registry).is_ok());
    }

    #[test]
    fn test_write_denied_under_read_only_dir() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let registry = registry_for(&[(&dir, "read-only")]);

        for candidate in [
            dir.path().join("a.txt"),
            dir.path().join("nested/b.txt"),
            dir.path().join("new/dir/c.txt"),
            dir.path().to_path_buf(),
        ] {
            let result = validate(as_str(&candidate), true, &registry);
            assert!(
                matches!(result, Err(AccessError::WritePermissionDenied(_))),
                "{:?} should be write-denied",
                candidate
            );
            assert!(validate(as_str(&candidate), false, &registry).is_ok());
        }
    }

    #[test]
    fn test_outside_allowed_directories() {
        let dir = tempdir().unwrap();
        let registry = registry_for(&[(&dir, "read-write")]);

        let result = validate("/etc/passwd", false, &registry);
        assert!(matches!(
            result,
            Err(AccessError::OutsideAllowedDirectories(p)) if p == "/etc/passwd"
        ));
    }

    #[test]
    fn test_dot_dot_escape_is_denied() {
        let dir = tempdir().unwrap();
        let registry = registry_for(&[(&dir, "read-write")]);

        let escape = dir.path().join("../outside.txt");
        let result = validate(as_str(&escape), false, &registry);
        assert!(matches!(result, Err(AccessError::OutsideAllowedDirectories(_))));
    }

    #[test]
    fn test_sibling_prefix_is_not_contained() {
        let parent = tempdir().unwrap();
        let allowed = parent.path().join("data");
        let sibling = parent.path().join("data2");
        std::fs::create_dir(&allowed).unwrap();
        std::fs::create_dir(&sibling).unwrap();

        let registry =
            PermissionRegistry::build([(as_str(&allowed), "read-write")]).unwrap();

        let result = validate(as_str(&sibling.join("x.txt")), false, &registry);
        assert!(matches!(result, Err(AccessError::OutsideAllowedDirectories(_))));
    }

    #[test]
    fn test_first_declared_match_wins() {
        let parent = tempdir().unwrap();
        let child = parent.path().join("child");
        std::fs::create_dir(&child).unwrap();

        let registry = PermissionRegistry::build([
            (as_str(&child), "read-write"),
            (as_str(parent.path()), "read-only"),
        ])
        .unwrap();
        assert!(validate(as_str(&child.join("f.txt")), true, &registry).is_ok());

        let registry = PermissionRegistry::build([
            (as_str(parent.path()), "read-only"),
            (as_str(&child), "read-write"),
        ])
        .unwrap();
        assert!(matches!(
            validate(as_str(&child.join("f.txt")), true, &registry),
            Err(AccessError::WritePermissionDenied(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_pointing_outside_is_denied() {
        let allowed = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            allowed.path().join("link.txt"),
        )
        .unwrap();
        std::os::unix::fs::symlink(outside.path(), allowed.path().join("linkdir")).unwrap();

        let registry = registry_for(&[(&allowed, "read-write")]);

        for candidate in [
            allowed.path().join("link.txt"),
            allowed.path().join("linkdir/secret.txt"),
            allowed.path().join("linkdir/new.txt"),
        ] {
            let result = validate(as_str(&candidate), false, &registry);
            assert!(
                matches!(result, Err(AccessError::OutsideAllowedDirectories(_))),
                "{:?} should be denied",
                candidate
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_outside_pointing_inside_is_judged_by_target() {
        let allowed = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::fs::write(allowed.path().join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(
            allowed.path().join("real.txt"),
            outside.path().join("alias.txt"),
        )
        .unwrap();

        let registry = registry_for(&[(&allowed, "read-only")]);

        let resolved =
            validate(as_str(&outside.path().join("alias.txt")), false, &registry).unwrap();
        assert_eq!(
            resolved.path(),
            std::fs::canonicalize(allowed.path().join("real.txt")).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_escape_is_denied() {
        let allowed = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("planted.txt"),
            allowed.path().join("trap.txt"),
        )
        .unwrap();

        let registry = registry_for(&[(&allowed, "read-write")]);

        let result = validate(as_str(&allowed.path().join("trap.txt")), true, &registry);
        assert!(matches!(result, Err(AccessError::OutsideAllowedDirectories(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_unresolvable() {
        let allowed = tempdir().unwrap();
        std::os::unix::fs::symlink("loop", allowed.path().join("loop")).unwrap();

        let registry = registry_for(&[(&allowed, "read-write")]);

        let result = validate(as_str(&allowed.path().join("loop")), false, &registry);
        assert!(matches!(result, Err(AccessError::Unresolvable { .. })));
    }
}
