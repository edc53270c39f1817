//! Newline-delimited JSON-RPC transport over a byte stream

use crate::error::{Error, ProtocolError, Result};
use crate::types::JsonRpcResponse;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

const CHANNEL_CAPACITY: usize = 100;

/// Transport layer for MCP communication.
///
/// Uses channels so request handlers running on separate tasks can reply
/// without contending for the output stream.
pub struct Transport {
    /// Channel to send data to the writer task
    outgoing_tx: mpsc::Sender<String>,
    /// Channel to receive raw lines from the reader task
    incoming_rx: mpsc::Receiver<Vec<u8>>,
    /// Background tasks
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

/// Cloneable handle for sending responses
#[derive(Clone)]
pub struct ResponseSender {
    tx: mpsc::Sender<String>,
}

impl ResponseSender {
    /// Send a JSON-RPC response (non-blocking)
    pub async fn send(&self, response: &JsonRpcResponse) -> Result<()> {
        let json = serde_json::to_string(response)?;
        trace!("Sending response: {}", json);
        self.tx
            .send(json)
            .await
            .map_err(|_| Error::Protocol(ProtocolError::TransportClosed))
    }
}

impl Transport {
    /// Serve on the process's stdin/stdout
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Create a transport over any reader/writer pair
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (incoming_tx, incoming_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);

        let reader_task = tokio::spawn(Self::read_task(reader, incoming_tx));
        let writer_task = tokio::spawn(Self::write_task(writer, outgoing_rx));

        Self {
            outgoing_tx,
            incoming_rx,
            reader_task,
            writer_task,
        }
    }

    /// Background task to read input lines.
    ///
    /// Lines are forwarded as raw bytes and decoded by the protocol layer, so
    /// invalid UTF-8 does not end the input.
    async fn read_task<R>(reader: R, tx: mpsc::Sender<Vec<u8>>)
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => {
                    debug!("Input closed");
                    break;
                }
                Ok(_) => {
                    let trimmed = trim_ascii(&line);
                    if !trimmed.is_empty() {
                        trace!("Received: {}", String::from_utf8_lossy(trimmed));
                        if tx.send(trimmed.to_vec()).await.is_err() {
                            warn!("Failed to forward input line, channel closed");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!("Error reading input: {}", e);
                    break;
                }
            }
        }
    }

    /// Background task to write output lines
    async fn write_task<W>(mut writer: W, mut rx: mpsc::Receiver<String>)
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(data) = rx.recv().await {
            if let Err(e) = writer.write_all(data.as_bytes()).await {
                error!("Failed to write output: {}", e);
                break;
            }
            if let Err(e) = writer.write_all(b"\n").await {
                error!("Failed to write newline: {}", e);
                break;
            }
            if let Err(e) = writer.flush().await {
                error!("Failed to flush output: {}", e);
                break;
            }
        }
        debug!("Writer task ended");
    }

    pub fn sender(&self) -> ResponseSender {
        ResponseSender {
            tx: self.outgoing_tx.clone(),
        }
    }

    /// Receive the next non-empty input line; `None` once input is closed
    pub async fn recv_line(&mut self) -> Option<Vec<u8>> {
        self.incoming_rx.recv().await
    }

    /// Flush pending responses and stop the background tasks.
    ///
    /// Waits for every [`ResponseSender`] clone to be dropped.
    pub async fn shutdown(self) {
        drop(self.outgoing_tx);
        self.reader_task.abort();
        if let Err(e) = self.writer_task.await {
            error!("Writer task failed: {}", e);
        }
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
