//! MCP server loop

use super::protocol::ProtocolHandler;
use super::transport::Transport;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::mcp::tools::ToolRegistry;
use crate::sandbox::FileSystemHandler;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Tools-only MCP server.
///
/// Each request is handled on its own task; they share the protocol handler
/// (and through it the immutable permission registry) without locking.
pub struct McpServer {
    protocol: Arc<ProtocolHandler>,
}

impl McpServer {
    pub fn new(protocol: ProtocolHandler) -> Self {
        Self {
            protocol: Arc::new(protocol),
        }
    }

    pub fn from_config(config: ServerConfig) -> Self {
        Self::new(ProtocolHandler::new(
            FileSystemHandler::from_config(config),
            ToolRegistry::builtin(),
        ))
    }

    pub fn protocol(&self) -> &ProtocolHandler {
        &self.protocol
    }

    /// Serve until the input stream closes, then drain in-flight requests
    pub async fn run(&self, mut transport: Transport) -> Result<()> {
        let sender = transport.sender();
        let mut in_flight = JoinSet::new();

        while let Some(line) = transport.recv_line().await {
            let request = match self.protocol.parse_line(&line) {
                Ok(request) => request,
                Err(e) => {
                    error!("Discarding malformed message: {}", e);
                    let response = self.protocol.create_error_response(
                        serde_json::Value::Null,
                        e.code(),
                        &e.to_string(),
                    );
                    sender.send(&response).await?;
                    continue;
                }
            };

            let protocol = Arc::clone(&self.protocol);
            let sender = sender.clone();
            in_flight.spawn(async move {
                if let Some(response) = protocol.handle(request).await {
                    if let Err(e) = sender.send(&response).await {
                        error!("Failed to send response: {}", e);
                    }
                }
            });

            // Reap finished handlers so the set does not grow unbounded
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    error!("Request handler panicked: {}", e);
                }
            }
        }

        debug!("Input closed, waiting for {} in-flight requests", in_flight.len());
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("Request handler panicked: {}", e);
            }
        }

        drop(sender);
        transport.shutdown().await;
        info!("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizeLimit;
    use crate::sandbox::PermissionRegistry;
    use crate::types::JsonRpcResponse;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::tempdir;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Feed `input` lines to a server and collect every response by id
    async fn exchange(
        config: ServerConfig,
        input: Vec<serde_json::Value>,
    ) -> (HashMap<String, JsonRpcResponse>, Vec<JsonRpcResponse>) {
        let (mut client_in, server_in) = duplex(64 * 1024);
        let (server_out, client_out) = duplex(64 * 1024);

        let server = McpServer::from_config(config);
        let handle = tokio::spawn(async move {
            server.run(Transport::new(server_in, server_out)).await
        });

        for message in input {
            let line = match message {
                serde_json::Value::String(raw) => raw,
                other => other.to_string(),
            };
            client_in.write_all(line.as_bytes()).await.unwrap();
            client_in.write_all(b"\n").await.unwrap();
        }
        drop(client_in);

        let mut by_id = HashMap::new();
        let mut anonymous = Vec::new();
        let mut lines = BufReader::new(client_out).lines();
        while let Some(line) = lines.next_line().await.unwrap() {
            let response: JsonRpcResponse = serde_json::from_str(&line).unwrap();
            match &response.id {
                Some(serde_json::Value::Null) | None => anonymous.push(response),
                Some(id) => {
                    by_id.insert(id.to_string(), response);
                }
            }
        }

        handle.await.unwrap().unwrap();
        (by_id, anonymous)
    }

    fn text(response: &JsonRpcResponse) -> String {
        response.result.as_ref().unwrap()["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_full_session() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/d1")).unwrap();
        std::fs::write(dir.path().join("sub/f1.txt"), "1").unwrap();
        let registry =
            PermissionRegistry::build([(dir.path().to_str().unwrap(), "read-write")]).unwrap();
        let config = ServerConfig {
            registry,
            size_limit: SizeLimit::default(),
        };
        let file = dir.path().join("a.txt");

        let (responses, anonymous) = exchange(
            config,
            vec![
                json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
                json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                       "params": {"name": "write_file", "arguments": {"path": file, "content": "hi"}}}),
                json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                       "params": {"name": "list_directory", "arguments": {"path": dir.path().join("sub")}}}),
                json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                       "params": {"name": "directory_tree",
                                  "arguments": {"path": dir.path().join("sub"), "max_depth": 1}}}),
                json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call",
                       "params": {"name": "read_file", "arguments": {"path": "/etc/passwd"}}}),
                json!("this is not json"),
            ],
        )
        .await;

        assert_eq!(responses.len(), 5);
        assert_eq!(
            responses["1"].result.as_ref().unwrap()["serverInfo"]["name"],
            "filesystem"
        );

        let written: serde_json::Value = serde_json::from_str(&text(&responses["2"])).unwrap();
        assert_eq!(written["bytesWritten"], 2);

        let listed: serde_json::Value = serde_json::from_str(&text(&responses["3"])).unwrap();
        assert_eq!(
            listed,
            json!([
                {"name": "d1", "type": "directory"},
                {"name": "f1.txt", "type": "file"}
            ])
        );

        let tree: serde_json::Value = serde_json::from_str(&text(&responses["4"])).unwrap();
        assert_eq!(tree["children"][0]["truncated"], true);

        let denied = responses["5"].result.as_ref().unwrap();
        assert_eq!(denied["isError"], true);

        assert_eq!(anonymous.len(), 1);
        assert_eq!(anonymous[0].error.as_ref().unwrap().code, -32700);

        assert_eq!(std::fs::read_to_string(&file).unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_bad_lines_get_errors_and_serving_continues() {
        let dir = tempdir().unwrap();
        let registry =
            PermissionRegistry::build([(dir.path().to_str().unwrap(), "read-only")]).unwrap();
        let config = ServerConfig {
            registry,
            size_limit: SizeLimit::default(),
        };

        let (mut client_in, server_in) = duplex(64 * 1024);
        let (server_out, client_out) = duplex(64 * 1024);
        let server = McpServer::from_config(config);
        let handle = tokio::spawn(async move {
            server.run(Transport::new(server_in, server_out)).await
        });

        client_in.write_all(b"\xff\xfe garbage\n").await.unwrap();
        client_in.write_all(b"{\"jsonrpc\":\"2.0\",\"id\":9}\n").await.unwrap();
        client_in
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
            .await
            .unwrap();
        drop(client_in);

        let mut lines = BufReader::new(client_out).lines();
        let mut responses = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            responses.push(serde_json::from_str::<JsonRpcResponse>(&line).unwrap());
        }
        handle.await.unwrap().unwrap();

        let codes: Vec<_> = responses
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| e.code))
            .collect();
        assert_eq!(codes, vec![-32700, -32600]);

        let ping = responses
            .iter()
            .find(|r| r.id == Some(json!(1)))
            .expect("ping answered");
        assert_eq!(ping.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_concurrent_calls_all_answered() {
        let dir = tempdir().unwrap();
        let registry =
            PermissionRegistry::build([(dir.path().to_str().unwrap(), "read-write")]).unwrap();
        let config = ServerConfig {
            registry,
            size_limit: SizeLimit::default(),
        };

        let requests = (0..20)
            .map(|i| {
                json!({"jsonrpc": "2.0", "id": i, "method": "tools/call",
                       "params": {"name": "write_file", "arguments": {
                           "path": dir.path().join(format!("f{}.txt", i)),
                           "content": format!("{}", i)
                       }}})
            })
            .collect();

        let (responses, _) = exchange(config, requests).await;

        assert_eq!(responses.len(), 20);
        for i in 0..20 {
            assert_eq!(
                std::fs::read_to_string(dir.path().join(format!("f{}.txt", i))).unwrap(),
                i.to_string()
            );
        }
    }
}
