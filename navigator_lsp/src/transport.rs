//! JSON-RPC transport for LSP communication.
//!
//! Frames messages with Content-Length headers over the byte streams of the
//! spawned language server. The transport is generic over the underlying
//! streams so the session can hand it any pipe pair.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// JSON-RPC message types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

/// JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Request ID (can be number or string).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

/// Framed transport over a reader/writer pair.
pub struct Transport<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> Transport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport reading server output from `reader` and writing
    /// client traffic to `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Splits the transport into separate read and write halves.
    pub fn split(self) -> (TransportReader<R>, TransportWriter<W>) {
        (
            TransportReader {
                reader: self.reader,
            },
            TransportWriter {
                writer: self.writer,
            },
        )
    }
}

/// Write half of the transport.
pub struct TransportWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> TransportWriter<W> {
    /// Sends a JSON-RPC request.
    pub async fn send_request(
        &mut self,
        id: impl Into<RequestId>,
        method: &str,
        params: Option<Value>,
    ) -> std::io::Result<()> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            method: method.to_string(),
            params,
        };
        self.send_message(&serde_json::to_value(request)?).await
    }

    /// Sends a JSON-RPC notification.
    pub async fn send_notification(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> std::io::Result<()> {
        let notification = JsonRpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        };
        self.send_message(&serde_json::to_value(notification)?).await
    }

    async fn send_message(&mut self, message: &Value) -> std::io::Result<()> {
        let content = serde_json::to_string(message)?;
        let header = format!("Content-Length: {}\r\n\r\n", content.len());

        self.writer.write_all(header.as_bytes()).await?;
        self.writer.write_all(content.as_bytes()).await?;
        self.writer.flush().await?;

        log::trace!("Sent: {}", content);
        Ok(())
    }
}

/// Read half of the transport.
pub struct TransportReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> TransportReader<R> {
    /// Reads the next JSON-RPC message.
    pub async fn read_message(&mut self) -> std::io::Result<Value> {
        // Read headers
        let mut content_length: Option<usize> = None;
        let mut header_line = String::new();

        loop {
            header_line.clear();
            let bytes_read = self.reader.read_line(&mut header_line).await?;
            if bytes_read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Server closed connection",
                ));
            }

            let line = header_line.trim();
            if line.is_empty() {
                break;
            }

            if let Some(len_str) = line.strip_prefix("Content-Length: ") {
                content_length = Some(len_str.parse().map_err(|_| {
                    std::io::Error::new(std::io::ErrorKind::InvalidData, "Invalid Content-Length")
                })?);
            }
        }

        let content_length = content_length.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Missing Content-Length header",
            )
        })?;

        // Read content
        let mut content = vec![0u8; content_length];
        self.reader.read_exact(&mut content).await?;

        let content_str = String::from_utf8(content).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "Invalid UTF-8 in message")
        })?;

        log::trace!("Received: {}", content_str);

        serde_json::from_str(&content_str).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("Invalid JSON: {}", e))
        })
    }
}

/// Parses a JSON-RPC message to determine its type.
pub fn parse_message(value: &Value) -> Option<JsonRpcMessage> {
    // Response: has id and result/error but no method
    if value.get("id").is_some() && value.get("method").is_none() {
        return serde_json::from_value(value.clone())
            .ok()
            .map(JsonRpcMessage::Response);
    }

    // Request: has id and method
    if value.get("id").is_some() && value.get("method").is_some() {
        return serde_json::from_value(value.clone())
            .ok()
            .map(JsonRpcMessage::Request);
    }

    // Notification: has method but no id
    if value.get("method").is_some() && value.get("id").is_none() {
        return serde_json::from_value(value.clone())
            .ok()
            .map(JsonRpcMessage::Notification);
    }

    None
}
