//! Development server with live reload via Server-Sent Events.
//!
//! Accepts plain TCP connections, reads the request line, and either opens
//! an event stream on `/sse` or serves a file from the root (cache first,
//! disk on a miss). In watch mode HTML documents get the reload client
//! injected on the way out.

use crate::dev::http::{self, Response, SSE_HANDSHAKE};
use crate::dev::hub::Subscription;
use crate::dev::shutdown::Shutdown;
use crate::dev::state::{ServerState, SharedState};
use crate::error::{CliError, Result};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use std::fs::Metadata;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Path of the reload event stream.
pub const SSE_PATH: &str = "/sse";

/// Upper bound on the request head we are willing to buffer.
const MAX_REQUEST_HEAD: u64 = 8 * 1024;

/// How long a client may take to send its request line.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// How long we wait for the rest of the header block before answering anyway.
const HEADER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Pause after a failed accept, so a full fd table does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

const RELOAD_SNIPPET: &str = concat!(
    "<script>\n",
    include_str!("../../assets/dev/reload-client.js"),
    "</script>\n"
);

/// Development server bound to a listening socket.
pub struct DevServer {
    listener: TcpListener,
    state: SharedState,
}

impl DevServer {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Server`] if the address cannot be bound (usually
    /// because the port is already in use).
    pub async fn bind(state: SharedState, addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CliError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        Ok(Self { listener, state })
    }

    /// Address the server is actually listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until shutdown.
    ///
    /// Each connection runs in its own task and is never awaited here.
    pub async fn run(self, mut shutdown: Shutdown) {
        let connection_shutdown = shutdown.clone();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::trace!("Accepted connection from {}", peer);
                        let state = Arc::clone(&self.state);
                        let shutdown = connection_shutdown.clone();
                        tokio::spawn(handle_connection(stream, state, shutdown));
                    }
                    Err(e) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                        if shutdown.sleep(ACCEPT_BACKOFF).await {
                            break;
                        }
                    }
                },
                _ = shutdown.wait() => break,
            }
        }

        tracing::debug!("Accept loop stopped");
    }
}

/// Where a request target leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Open a reload event stream
    Events,
    /// Serve this path, which may not exist
    File(PathBuf),
    /// Target escapes the root or cannot be decoded
    NotFound,
}

/// Map a request target onto the served root.
pub fn route(target: &str, root: &Path, default_document: &str) -> Route {
    let path = target.split(['?', '#']).next().unwrap_or_default();

    match path {
        SSE_PATH => Route::Events,
        "/" => Route::File(root.join(default_document)),
        _ => {
            let Ok(decoded) = percent_decode_str(path).decode_utf8() else {
                return Route::NotFound;
            };

            match resolve_under(root, &decoded) {
                Some(resolved) => Route::File(resolved),
                None => Route::NotFound,
            }
        }
    }
}

/// Join a decoded URL path onto `root`, refusing anything that climbs out.
fn resolve_under(root: &Path, decoded: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();

    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(resolved)
}

async fn handle_connection(mut stream: TcpStream, state: SharedState, shutdown: Shutdown) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };

    tracing::debug!("{} {}", request.method, request.target);

    let response = match route(
        &request.target,
        state.root(),
        &state.config().default_document,
    ) {
        Route::Events => {
            stream_events(stream, &state, shutdown).await;
            return;
        }
        Route::File(path) => serve_file(&state, &path).await,
        Route::NotFound => {
            tracing::debug!("Rejected path: {}", request.target);
            Response::not_found()
        }
    };

    if let Err(e) = response.write_to(&mut stream).await {
        tracing::debug!("Failed to write response: {}", e);
        return;
    }
    let _ = stream.shutdown().await;
}

/// Read the request line and discard the remaining header lines.
///
/// Only the request line is subject to the read timeout. The drain that
/// follows has its own shorter bound, so a client that never finishes its
/// headers still gets an answer.
async fn read_request(stream: &mut TcpStream) -> Option<http::RequestLine> {
    let mut reader = BufReader::new((&mut *stream).take(MAX_REQUEST_HEAD));

    let mut first = String::new();
    match tokio::time::timeout(REQUEST_READ_TIMEOUT, reader.read_line(&mut first)).await {
        Ok(Ok(n)) if n > 0 => {}
        Ok(_) => {
            tracing::trace!("Empty request, closing connection");
            return None;
        }
        Err(_) => {
            tracing::debug!("Timed out waiting for request line");
            return None;
        }
    }

    let Some(request) = http::parse_request_line(&first) else {
        tracing::trace!("Malformed request line, closing connection");
        return None;
    };

    // Draining the headers keeps the close from turning into a reset
    if tokio::time::timeout(HEADER_DRAIN_TIMEOUT, drain_headers(&mut reader))
        .await
        .is_err()
    {
        tracing::trace!("Header block incomplete, answering anyway");
    }

    Some(request)
}

async fn drain_headers<R>(reader: &mut R)
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) if line.trim_end().is_empty() => break,
            Ok(_) => {}
        }
    }
}

/// Resolve `requested` to a regular file, falling back to the directory's
/// default document.
async fn locate(requested: &Path, default_document: &str) -> Option<(PathBuf, Metadata)> {
    let metadata = tokio::fs::metadata(requested).await.ok()?;
    if metadata.is_file() {
        return Some((requested.to_path_buf(), metadata));
    }

    if metadata.is_dir() {
        let index = requested.join(default_document);
        let metadata = tokio::fs::metadata(&index).await.ok()?;
        if metadata.is_file() {
            return Some((index, metadata));
        }
    }

    None
}

/// Build the response for a file under the root.
pub async fn serve_file(state: &ServerState, requested: &Path) -> Response {
    let Some((path, metadata)) = locate(requested, &state.config().default_document).await else {
        tracing::debug!("Not found: {}", requested.display());
        return Response::not_found();
    };

    serve_located(state, path, &metadata).await
}

/// Respond with a file `locate` has already found.
///
/// The file may still vanish or turn unreadable before the read, which
/// answers 500.
async fn serve_located(state: &ServerState, path: PathBuf, metadata: &Metadata) -> Response {
    let content_type = http::content_type_for(&path);

    if state.config().watch && content_type == "text/html" {
        return match read_from_disk(state, &path).await {
            Ok(content) => Response::ok(content_type, inject_reload_script(&content)),
            Err(e) => read_failed(&path, e),
        };
    }

    if let Some(cached) = state.cache().get(&path) {
        return Response::ok(cached.content_type, cached.content);
    }

    // Stat before reading, so a write racing the read leaves a stale stamp
    let observed = metadata.modified().ok();

    match read_from_disk(state, &path).await {
        Ok(content) => {
            let content = Bytes::from(content);
            if let Some(modified) = observed {
                state
                    .cache()
                    .put_at(path, content.clone(), content_type, modified);
            }
            Response::ok(content_type, content)
        }
        Err(e) => read_failed(&path, e),
    }
}

async fn read_from_disk(state: &ServerState, path: &Path) -> std::io::Result<Vec<u8>> {
    state.record_disk_read();
    tokio::fs::read(path).await
}

fn read_failed(path: &Path, error: std::io::Error) -> Response {
    tracing::warn!("Failed to read {}: {}", path.display(), error);
    Response::internal_error()
}

/// Keep an event stream open until the peer leaves or the server stops.
async fn stream_events(mut stream: TcpStream, state: &ServerState, mut shutdown: Shutdown) {
    if let Err(e) = stream.write_all(SSE_HANDSHAKE.as_bytes()).await {
        tracing::debug!("Failed to open event stream: {}", e);
        return;
    }

    let Subscription { id, mut frames } = state.hub().subscribe();
    tracing::info!("Client {} connected via SSE", id);

    let (mut reader, mut writer) = stream.split();
    let mut scratch = [0u8; 512];

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if writer.write_all(&frame).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            read = reader.read(&mut scratch) => match read {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            },
            _ = shutdown.wait() => break,
        }
    }

    state.hub().unsubscribe(id);
    tracing::debug!("Client {} disconnected", id);
}

/// Insert the reload client into an HTML document.
///
/// The script goes before the last `</body>` (any case), else before the
/// last `</html>`, else at the end.
pub fn inject_reload_script(html: &[u8]) -> Vec<u8> {
    let lowered = html.to_ascii_lowercase();
    let position = rfind(&lowered, b"</body>").or_else(|| rfind(&lowered, b"</html>"));

    let snippet = RELOAD_SNIPPET.as_bytes();
    let mut out = Vec::with_capacity(html.len() + snippet.len());

    match position {
        Some(pos) => {
            out.extend_from_slice(&html[..pos]);
            out.extend_from_slice(snippet);
            out.extend_from_slice(&html[pos..]);
        }
        None => {
            out.extend_from_slice(html);
            out.extend_from_slice(snippet);
        }
    }

    out
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}
