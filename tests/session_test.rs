//! End-to-end session tests over a real loopback listener.

use archd::server::{bind_first_free, serve};
use archd::StrategyRegistry;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const READ_TIMEOUT: Duration = Duration::from_secs(10);

async fn start_server() -> SocketAddr {
    let listener = bind_first_free("127.0.0.1", &[0]).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = Arc::new(StrategyRegistry::new("/nonexistent/rar"));
    tokio::spawn(async move {
        let _ = serve(listener, registry).await;
    });
    addr
}

struct Client {
    stream: TcpStream,
    pending: String,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            pending: String::new(),
        }
    }

    async fn send(&mut self, line: &str) {
        self.stream
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Read until `needle` shows up; return everything up to and including it.
    async fn expect(&mut self, needle: &str) -> String {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(pos) = self.pending.find(needle) {
                let end = pos + needle.len();
                let seen = self.pending[..end].to_string();
                self.pending.drain(..end);
                return seen;
            }
            let n = timeout(READ_TIMEOUT, self.stream.read(&mut buf))
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {:?}, have {:?}", needle, self.pending))
                .unwrap();
            assert!(n > 0, "connection closed waiting for {:?}", needle);
            self.pending.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    }

    /// Read until the server closes the connection.
    async fn drain_to_eof(&mut self) -> String {
        let mut rest = Vec::new();
        timeout(READ_TIMEOUT, self.stream.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        let mut all = std::mem::take(&mut self.pending);
        all.push_str(&String::from_utf8_lossy(&rest));
        all
    }
}

async fn greeted(addr: SocketAddr) -> Client {
    let mut client = Client::connect(addr).await;
    client.expect("Welcome!").await;
    client.expect("Enter command (").await;
    client
}

async fn run_command(client: &mut Client, command: &str, format: &str, path: &Path, params: Option<&str>) -> String {
    client.send(command).await;
    client.expect("Enter archive type").await;
    client.send(format).await;
    client.expect("Enter the full path to the archive: ").await;
    client.send(&path.to_string_lossy()).await;
    if let Some(params) = params {
        client.send(params).await;
    }
    client.expect("Enter command (").await
}

#[tokio::test]
async fn test_welcome_lists_commands() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    let banner = client.expect("): ").await;

    assert!(banner.contains("Welcome!"));
    for keyword in [
        "create",
        "extract",
        "add",
        "remove",
        "edit_metadata",
        "show_metadata",
        "test",
        "split",
        "help",
        "exit",
    ] {
        assert!(banner.contains(keyword), "missing {} in {:?}", keyword, banner);
    }
}

#[tokio::test]
async fn test_unknown_command_keeps_session() {
    let addr = start_server().await;
    let mut client = greeted(addr).await;

    client.send("list").await;
    client.expect("Unknown command.").await;

    client.send("help").await;
    client.expect("Available commands:").await;
}

#[tokio::test]
async fn test_unknown_format_returns_to_command() {
    let addr = start_server().await;
    let mut client = greeted(addr).await;

    client.send("create").await;
    client.expect("Enter archive type (tar.gz, zip, rar, ace): ").await;
    client.send("7z").await;
    client.expect("Unknown archive type.").await;

    // The next line is read as a command, not a path
    client.send("help").await;
    let reply = client.expect("Available commands:").await;
    assert!(!reply.contains("Enter the full path"));
}

#[tokio::test]
async fn test_create_and_extract_flow() {
    let addr = start_server().await;
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a.txt");
    let b = temp.path().join("b.txt");
    fs::write(&a, "first").unwrap();
    fs::write(&b, "second").unwrap();
    let archive = temp.path().join("bundle");
    let out = temp.path().join("out");

    let mut client = greeted(addr).await;

    let params = format!("{} {}", a.display(), b.display());
    let created = run_command(&mut client, "create", "zip", &archive, Some(&params)).await;
    assert!(created.contains("created successfully"), "{}", created);
    assert!(temp.path().join("bundle.zip").exists());

    let zip = temp.path().join("bundle.zip");
    let extracted = run_command(
        &mut client,
        "extract",
        "zip",
        &zip,
        Some(&out.to_string_lossy()),
    )
    .await;
    assert!(extracted.contains("Archive extracted to"), "{}", extracted);
    assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "first");
    assert_eq!(fs::read_to_string(out.join("b.txt")).unwrap(), "second");

    // Parameterless operations go straight from path to result
    let tested = run_command(&mut client, "test", "zip", &zip, None).await;
    assert!(tested.contains("is valid"), "{}", tested);
}

#[tokio::test]
async fn test_unsupported_format_reports_failure() {
    let addr = start_server().await;
    let temp = TempDir::new().unwrap();
    let mut client = greeted(addr).await;

    let reply = run_command(&mut client, "show_metadata", "ace", &temp.path().join("x.ace"), None).await;

    assert!(reply.contains("not supported"), "{}", reply);
}

#[tokio::test]
async fn test_bad_split_size_keeps_session() {
    let addr = start_server().await;
    let temp = TempDir::new().unwrap();
    let mut client = greeted(addr).await;

    let reply = run_command(
        &mut client,
        "split",
        "zip",
        &temp.path().join("x.zip"),
        Some("lots"),
    )
    .await;
    assert!(reply.contains("Invalid part size"), "{}", reply);

    client.send("help").await;
    client.expect("Available commands:").await;
}

#[tokio::test]
async fn test_exit_closes_connection() {
    let addr = start_server().await;
    let mut client = greeted(addr).await;

    client.send("exit").await;
    let rest = client.drain_to_eof().await;

    assert!(rest.contains("Goodbye."));
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let addr = start_server().await;
    let mut first = greeted(addr).await;
    let mut second = greeted(addr).await;

    // First peer parks mid-dialogue
    first.send("create").await;
    first.expect("Enter archive type").await;

    second.send("help").await;
    second.expect("Available commands:").await;
    second.send("exit").await;
    second.drain_to_eof().await;

    first.send("zip").await;
    first.expect("Enter the full path to the archive: ").await;
}
