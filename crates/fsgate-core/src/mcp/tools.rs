//! Tool definitions exposed over MCP

use crate::error::{ProtocolError, Result};
use crate::sandbox::FileSystemHandler;
use crate::types::ToolDefinition;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// A callable tool backed by the sandboxed filesystem
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn definition(&self) -> ToolDefinition;

    /// Run the tool; the returned string becomes the text content of the result
    async fn call(&self, fs: &FileSystemHandler, arguments: serde_json::Value) -> Result<String>;
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: serde_json::Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| ProtocolError::InvalidParams(format!("{}: {}", tool, e)).into())
}

fn path_schema(description: &str) -> serde_json::Value {
    json!({ "type": "string", "description": description })
}

#[derive(Debug, Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct TreeArgs {
    path: String,
    #[serde(default)]
    max_depth: Option<i64>,
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Read file contents from allowed directories. Only UTF-8 text files \
                          within the configured size limit can be read."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "path": path_schema("Path to file to read") },
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, fs: &FileSystemHandler, arguments: serde_json::Value) -> Result<String> {
        let args: PathArgs = parse_args(self.name(), arguments)?;
        fs.read_file(&args.path).await
    }
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Write content to a file in a read-write directory, replacing it if it \
                          exists. Missing parent directories are created."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": path_schema("Path to file to write"),
                    "content": { "type": "string", "description": "Text content to write" }
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn call(&self, fs: &FileSystemHandler, arguments: serde_json::Value) -> Result<String> {
        let args: WriteArgs = parse_args(self.name(), arguments)?;
        let result = fs.write_file(&args.path, &args.content).await?;
        Ok(serde_json::to_string(&result)?)
    }
}

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "List the immediate entries of a directory, sorted by name.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "path": path_schema("Directory to list") },
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, fs: &FileSystemHandler, arguments: serde_json::Value) -> Result<String> {
        let args: PathArgs = parse_args(self.name(), arguments)?;
        let entries = fs.list_directory(&args.path).await?;
        Ok(serde_json::to_string(&entries)?)
    }
}

pub struct DirectoryTreeTool;

#[async_trait]
impl Tool for DirectoryTreeTool {
    fn name(&self) -> &'static str {
        "directory_tree"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Recursive JSON tree of a directory. Depth defaults to 3 and is \
                          clamped to 1..=10; directories past the limit are marked truncated."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": path_schema("Root directory of the tree"),
                    "max_depth": {
                        "type": "integer",
                        "description": "Levels to expand below the root (1-10, default 3)",
                        "minimum": 1,
                        "maximum": 10
                    }
                },
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, fs: &FileSystemHandler, arguments: serde_json::Value) -> Result<String> {
        let args: TreeArgs = parse_args(self.name(), arguments)?;
        let tree = fs.directory_tree(&args.path, args.max_depth).await?;
        Ok(serde_json::to_string_pretty(&tree)?)
    }
}

/// Fixed set of tools served by this process
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// The four filesystem tools
    pub fn builtin() -> Self {
        Self::new(vec![
            Arc::new(ReadFileTool),
            Arc::new(WriteFileTool),
            Arc::new(ListDirectoryTool),
            Arc::new(DirectoryTreeTool),
        ])
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
