//! Minimal HTTP/1.1 framing for the development server.
//!
//! Only the request line is interpreted. Responses are assembled by hand and
//! always close the connection, except for the event stream.

use bytes::Bytes;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Body sent with every 404 response.
pub const NOT_FOUND_BODY: &str = "<html><body><h1>Not Found</h1></body></html>";

/// Body sent with every 500 response.
pub const INTERNAL_ERROR_BODY: &str = "<html><body><h1>Internal Server Error</h1></body></html>";

/// Response head that opens a Server-Sent Events stream.
pub const SSE_HANDSHAKE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/event-stream\r\n\
    Cache-Control: no-cache\r\n\
    Connection: keep-alive\r\n\
    Access-Control-Allow-Origin: *\r\n\
    \r\n";

/// The parsed first line of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

/// Parse `METHOD TARGET [VERSION]` by splitting on whitespace.
///
/// Returns `None` for anything without an origin-form target, which the
/// caller treats as a malformed request.
pub fn parse_request_line(line: &str) -> Option<RequestLine> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let version = parts.next().unwrap_or("HTTP/1.0");

    if !target.starts_with('/') {
        return None;
    }

    Some(RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
    })
}

/// Response status codes used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    InternalServerError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

/// A complete, non-streaming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: String,
    pub body: Bytes,
}

impl Response {
    /// 200 with the given body.
    pub fn ok(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status: Status::Ok,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// 404 with the fixed HTML body.
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            content_type: "text/html".to_string(),
            body: Bytes::from_static(NOT_FOUND_BODY.as_bytes()),
        }
    }

    /// 500 with the fixed HTML body.
    pub fn internal_error() -> Self {
        Self {
            status: Status::InternalServerError,
            content_type: "text/html".to_string(),
            body: Bytes::from_static(INTERNAL_ERROR_BODY.as_bytes()),
        }
    }

    /// Status line and headers, including the blank line.
    pub fn head(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Cache-Control: no-cache\r\n\
             Connection: close\r\n\
             \r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type,
            self.body.len()
        )
    }

    /// Write head and body to `writer`.
    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(self.head().as_bytes()).await?;
        writer.write_all(&self.body).await?;
        writer.flush().await
    }
}

/// Determine content type from file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
