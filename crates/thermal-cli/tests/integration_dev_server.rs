//! Integration tests for the development server.
//!
//! Each test binds a real listener on an ephemeral port and talks to it over
//! TCP, the way a browser would.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use thermal_cli::config::ServeConfig;
use thermal_cli::dev::{
    run_watch_loop, shutdown, ChangeDetector, DevServer, ServerState, SharedState,
    ShutdownTrigger,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};

const INDEX_HTML: &str = "<html><head><title>Home</title></head><body><h1>Hello</h1></body></html>";

fn write_site(root: &Path) {
    fs::write(root.join("index.html"), INDEX_HTML).unwrap();
    fs::write(root.join("style.css"), "body { color: red; }").unwrap();
    fs::create_dir(root.join("docs")).unwrap();
    fs::write(root.join("docs").join("index.html"), "<p>docs</p>").unwrap();
}

fn config_for(root: &Path, watch: bool) -> ServeConfig {
    ServeConfig {
        root: root.canonicalize().unwrap(),
        watch,
        poll_interval_ms: 50,
        active_poll_interval_ms: 50,
        idle_poll_interval_ms: 50,
        min_poll_interval_ms: 10,
        ..ServeConfig::default()
    }
}

async fn start(config: ServeConfig) -> (SharedState, SocketAddr, ShutdownTrigger) {
    let state: SharedState = Arc::new(ServerState::new(config));
    let server = DevServer::bind(Arc::clone(&state), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    let (trigger, signal) = shutdown::channel();
    tokio::spawn(server.run(signal));

    (state, addr, trigger)
}

/// Send a raw request and read until the server closes the connection.
async fn raw_request(addr: SocketAddr, request: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("server should close the connection")
        .unwrap();
    response
}

/// GET `target` and split the response into head and body.
async fn get(addr: SocketAddr, target: &str) -> (String, Vec<u8>) {
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\n", target);
    let response = raw_request(addr, &request).await;

    let split = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response should contain a header terminator");
    let head = String::from_utf8(response[..split].to_vec()).unwrap();
    let body = response[split + 4..].to_vec();
    (head, body)
}

fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn test_root_serves_index_with_reload_script() {
    let temp = TempDir::new().unwrap();
    write_site(temp.path());
    let (_state, addr, _trigger) = start(config_for(temp.path(), true)).await;

    let (head, body) = get(addr, "/").await;

    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(header(&head, "Content-Type"), Some("text/html"));
    assert_eq!(
        header(&head, "Content-Length"),
        Some(body.len().to_string().as_str())
    );

    let text = String::from_utf8(body).unwrap();
    let script = text.find("<script>").expect("reload script injected");
    let body_close = text.rfind("</body>").unwrap();
    assert!(script < body_close);
    assert!(text.contains("new EventSource('/sse')"));
    assert!(text.starts_with("<html><head><title>Home</title></head><body><h1>Hello</h1>"));
}

#[tokio::test]
async fn test_root_without_watch_mode_is_verbatim() {
    let temp = TempDir::new().unwrap();
    write_site(temp.path());
    let (_state, addr, _trigger) = start(config_for(temp.path(), false)).await;

    let (head, body) = get(addr, "/").await;

    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, INDEX_HTML.as_bytes());
}

#[tokio::test]
async fn test_missing_file_is_404_with_fixed_body() {
    let temp = TempDir::new().unwrap();
    write_site(temp.path());
    let (_state, addr, _trigger) = start(config_for(temp.path(), false)).await;

    let (head, body) = get(addr, "/missing.txt").await;

    assert!(head.starts_with("HTTP/1.1 404 Not Found"));
    assert_eq!(header(&head, "Content-Length"), Some("44"));
    assert_eq!(body.len(), 44);
    assert_eq!(body, b"<html><body><h1>Not Found</h1></body></html>");
}

#[tokio::test]
async fn test_second_request_is_served_from_cache() {
    let temp = TempDir::new().unwrap();
    write_site(temp.path());
    let (state, addr, _trigger) = start(config_for(temp.path(), false)).await;

    let (head1, body1) = get(addr, "/style.css").await;
    let (head2, body2) = get(addr, "/style.css").await;

    assert_eq!(header(&head1, "Content-Type"), Some("text/css"));
    assert_eq!(head1, head2);
    assert_eq!(body1, body2);
    assert_eq!(body1, b"body { color: red; }");
    assert_eq!(state.disk_reads(), 1);
}

#[tokio::test]
async fn test_query_string_and_directory_index() {
    let temp = TempDir::new().unwrap();
    write_site(temp.path());
    let (_state, addr, _trigger) = start(config_for(temp.path(), false)).await;

    let (head, body) = get(addr, "/style.css?v=123").await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, b"body { color: red; }");

    let (head, body) = get(addr, "/docs/").await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, b"<p>docs</p>");
}

#[tokio::test]
async fn test_traversal_is_rejected() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("site");
    fs::create_dir(&root).unwrap();
    write_site(&root);
    fs::write(temp.path().join("secret.txt"), "top secret").unwrap();
    let (_state, addr, _trigger) = start(config_for(&root, false)).await;

    for target in ["/../secret.txt", "/%2e%2e/secret.txt", "/docs/../../secret.txt"] {
        let (head, body) = get(addr, target).await;
        assert!(head.starts_with("HTTP/1.1 404"), "{target}");
        assert!(!contains(&body, b"top secret"), "{target}");
    }
}

#[tokio::test]
async fn test_malformed_request_closes_without_response() {
    let temp = TempDir::new().unwrap();
    write_site(temp.path());
    let (_state, addr, _trigger) = start(config_for(temp.path(), false)).await;

    assert!(raw_request(addr, "\r\n\r\n").await.is_empty());
    assert!(raw_request(addr, "GARBAGE\r\n\r\n").await.is_empty());

    // The server keeps serving afterwards
    let (head, _) = get(addr, "/").await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
}

#[tokio::test]
async fn test_incomplete_header_block_still_gets_answer() {
    let temp = TempDir::new().unwrap();
    write_site(temp.path());
    let (_state, addr, _trigger) = start(config_for(temp.path(), false)).await;

    // No blank line, and the socket stays open
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /style.css HTTP/1.1\r\nHost: localhost\r\n")
        .await
        .unwrap();

    let mut response = Vec::new();
    timeout(Duration::from_secs(3), stream.read_to_end(&mut response))
        .await
        .expect("server should answer without the full header block")
        .unwrap();

    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(contains(&response, b"body { color: red; }"));
}

/// Read from `stream` until `needle` shows up, returning everything read.
async fn read_until(stream: &mut TcpStream, needle: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    timeout(Duration::from_secs(10), async {
        while !contains(&buffer, needle) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed early");
            buffer.extend_from_slice(&chunk[..n]);
        }
    })
    .await
    .expect("expected data did not arrive");

    buffer
}

async fn wait_for_subscribers(state: &SharedState, count: usize) {
    timeout(Duration::from_secs(5), async {
        while state.hub().subscriber_count() != count {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count never reached");
}

#[tokio::test]
async fn test_sse_handshake_and_reload_on_change() {
    let temp = TempDir::new().unwrap();
    write_site(temp.path());
    let config = config_for(temp.path(), true);
    let (state, addr, trigger) = start(config).await;

    let mut detector = ChangeDetector::new(state.root(), state.filter().clone());
    detector.prime().unwrap();
    let (_watch_trigger, watch_signal) = shutdown::channel();
    tokio::spawn(run_watch_loop(detector, Arc::clone(&state), watch_signal));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /sse HTTP/1.1\r\nAccept: text/event-stream\r\n\r\n")
        .await
        .unwrap();

    let head = read_until(&mut stream, b"\r\n\r\n").await;
    let head = String::from_utf8(head).unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(header(&head, "Content-Type"), Some("text/event-stream"));
    assert_eq!(header(&head, "Cache-Control"), Some("no-cache"));
    assert_eq!(header(&head, "Connection"), Some("keep-alive"));
    assert_eq!(header(&head, "Access-Control-Allow-Origin"), Some("*"));

    wait_for_subscribers(&state, 1).await;

    fs::write(temp.path().join("about.html"), "<p>about</p>").unwrap();

    let frames = read_until(&mut stream, b"data: reload\n\n").await;
    assert!(contains(&frames, b"data: reload\n\n"));

    trigger.trigger();
}

#[tokio::test]
async fn test_disconnected_subscriber_is_removed() {
    let temp = TempDir::new().unwrap();
    write_site(temp.path());
    let (state, addr, _trigger) = start(config_for(temp.path(), true)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /sse HTTP/1.1\r\n\r\n").await.unwrap();
    read_until(&mut stream, b"\r\n\r\n").await;
    wait_for_subscribers(&state, 1).await;

    drop(stream);

    wait_for_subscribers(&state, 0).await;
    assert_eq!(state.hub().broadcast("reload"), 0);
}

#[tokio::test]
async fn test_shutdown_closes_event_streams() {
    let temp = TempDir::new().unwrap();
    write_site(temp.path());
    let (state, addr, trigger) = start(config_for(temp.path(), true)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /sse HTTP/1.1\r\n\r\n").await.unwrap();
    read_until(&mut stream, b"\r\n\r\n").await;
    wait_for_subscribers(&state, 1).await;

    trigger.trigger();

    let mut rest = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .expect("stream should close on shutdown")
        .unwrap();
    wait_for_subscribers(&state, 0).await;
}
