//! Core type definitions for fsgate
//!
//! Filesystem operation results and the MCP wire types.

mod fs_types;
mod mcp_types;

pub use fs_types::*;
pub use mcp_types::*;
