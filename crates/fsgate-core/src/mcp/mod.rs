//! MCP (Model Context Protocol) server implementation
//!
//! Serves the sandboxed filesystem tools to a tool-calling client via
//! newline-delimited JSON-RPC over stdin/stdout.
//!
//! - `Transport` - line framing and background reader/writer tasks
//! - `ProtocolHandler` - method dispatch and response construction
//! - `Tool` - one callable tool; `ToolRegistry` holds the fixed set
//! - `McpServer` - the request loop, one task per request

mod protocol;
mod server;
pub mod tools;
mod transport;

pub use protocol::ProtocolHandler;
pub use server::McpServer;
pub use tools::{
    DirectoryTreeTool, ListDirectoryTool, ReadFileTool, Tool, ToolRegistry, WriteFileTool,
};
pub use transport::{ResponseSender, Transport};
