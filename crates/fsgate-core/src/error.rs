//! Error types for fsgate

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fsgate operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Access denied: {0}")]
    Access(#[from] AccessError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("{0}")]
    Size(#[from] SizeError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Cannot read binary file: {0}. Only text files supported.")]
    BinaryFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Startup configuration errors. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("ALLOWED_PATHS environment variable required")]
    MissingConfiguration,

    #[error("No valid paths in ALLOWED_PATHS")]
    EmptyConfiguration,

    #[error("Invalid entry (missing :permission): {0}")]
    MissingPermission(String),

    #[error("Invalid permission '{0}' (must be read-only or read-write)")]
    InvalidPermissionToken(String),

    #[error("Path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Cannot access {}: {source}", path.display())]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Duplicate path in ALLOWED_PATHS: {}", .0.display())]
    DuplicatePath(PathBuf),

    #[error("MAX_FILE_SIZE_MB must be a positive integer, got: {0}")]
    InvalidSizeLimit(String),
}

/// Denials produced by the path validator
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("path outside allowed directories: {0}")]
    OutsideAllowedDirectories(String),

    #[error("write permission denied: {} is read-only", .0.display())]
    WritePermissionDenied(PathBuf),

    #[error("cannot resolve path {path}: {reason}")]
    Unresolvable { path: String, reason: String },
}

/// The path is permitted but does not name the expected kind of entity
#[derive(Error, Debug)]
pub enum NotFoundError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),
}

/// Size ceiling violations, for both reads and writes
#[derive(Error, Debug)]
pub enum SizeError {
    #[error("File too large: {} (limit: {})", human_size(.actual, 1), human_size(.limit, 0))]
    TooLarge { actual: u64, limit: u64 },
}

/// JSON-RPC level failures
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Transport closed")]
    TransportClosed,
}

impl ProtocolError {
    /// JSON-RPC 2.0 error code for this failure
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::Parse(_) => -32700,
            ProtocolError::InvalidRequest(_) => -32600,
            ProtocolError::MethodNotFound(_) => -32601,
            ProtocolError::InvalidParams(_) | ProtocolError::UnknownTool(_) => -32602,
            ProtocolError::Internal(_) | ProtocolError::TransportClosed => -32603,
        }
    }
}

const MIB: u64 = 1024 * 1024;

fn human_size(bytes: &u64, precision: usize) -> String {
    if *bytes >= MIB {
        format!("{:.*}MB", precision, *bytes as f64 / MIB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
