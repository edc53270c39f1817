//! Path confinement and sandboxed file system operations
//!
//! This module provides:
//! - The permission registry of allowed directories
//! - Symlink-aware path resolution and validation
//! - File system operations that validate before acting
//! - Depth-bounded directory trees

mod filesystem;
pub mod permissions;
pub mod resolve;
pub mod tree;
pub mod validator;

pub use filesystem::FileSystemHandler;
pub use permissions::{AllowedDirectory, Permission, PermissionRegistry};
pub use tree::TreeBuilder;
pub use validator::{validate, ResolvedPath};
