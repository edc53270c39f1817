//! fsgate Core Library
//!
//! Confines filesystem access from a tool-calling client to an
//! administrator-declared set of directories, each read-only or read-write.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      fsgate-core                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  config.rs     - Environment configuration, size limit      │
//! │  sandbox/      - Registry, path validator, fs operations    │
//! │  mcp/          - MCP transport, protocol, tools, server     │
//! │  types/        - Shared type definitions                    │
//! │  error.rs      - Error types                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod mcp;
pub mod sandbox;
pub mod types;

// Re-export commonly used types
pub use config::{ServerConfig, SizeLimit};
pub use error::{AccessError, ConfigError, Error, NotFoundError, Result, SizeError};
pub use types::*;

// Re-export MCP components
pub use mcp::{McpServer, ProtocolHandler, Tool, ToolRegistry, Transport};

// Re-export sandbox components
pub use sandbox::{
    validate, AllowedDirectory, FileSystemHandler, Permission, PermissionRegistry, ResolvedPath,
    TreeBuilder,
};
