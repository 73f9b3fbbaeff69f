//! Common test utilities for `LanShare` integration tests.
//!
//! Servers run on loopback with an ephemeral port and clients resolve codes
//! through a `StaticDirectory`, so these helpers need no multicast.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use lanshare_core::client::{ClientConfig, ContentClient};
use lanshare_core::code::SessionCode;
use lanshare_core::discovery::StaticDirectory;
use lanshare_core::server::{Content, ContentServer, ServerConfig, ServerHandle};

/// Create a temporary directory for test files.
///
/// The directory will be automatically cleaned up when the returned
/// `TempDir` is dropped.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Generate random bytes for testing.
pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Assert that two files have identical content.
pub fn assert_files_equal(path1: &Path, path2: &Path) {
    let content1 = std::fs::read(path1).expect("Failed to read first file");
    let content2 = std::fs::read(path2).expect("Failed to read second file");
    assert_eq!(content1, content2, "File contents differ");
}

/// Create a test directory structure with multiple files.
pub fn create_test_directory(base: &Path, name: &str) -> PathBuf {
    let dir = base.join(name);
    std::fs::create_dir_all(&dir).expect("Failed to create test directory");

    create_test_file(&dir, "file1.txt", b"Hello, LanShare!");
    create_test_file(&dir, "file2.txt", b"Second test file content");
    create_test_file(&dir, "subdir/nested.txt", b"Nested file in subdirectory");

    dir
}

/// Every regular file under `root`, keyed by its `/`-separated relative path.
pub fn collect_files(root: &Path) -> BTreeMap<String, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("entry under root")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            let content = std::fs::read(entry.path()).expect("Failed to read file");
            (relative, content)
        })
        .collect()
}

/// Number of entries directly inside `dir`.
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}

/// A session code unique to this test run.
pub fn unique_code(prefix: &str) -> SessionCode {
    use rand::Rng;
    let suffix: u32 = rand::thread_rng().gen();
    SessionCode::parse(&format!("{prefix}-{suffix:08x}")).expect("valid code")
}

/// Server configuration bound to an ephemeral loopback port.
pub fn loopback_config(output_dir: &Path) -> ServerConfig {
    ServerConfig {
        bind: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
        output_dir: output_dir.to_path_buf(),
        ..ServerConfig::default()
    }
}

/// Start a server for `content` and return its handle plus a directory that
/// resolves `code` to it.
pub async fn start_server(
    code: &SessionCode,
    content: Content,
    output_dir: &Path,
) -> (ServerHandle, StaticDirectory) {
    let server = ContentServer::bind(content, loopback_config(output_dir))
        .await
        .expect("Failed to bind server");
    let address = server.local_addr();
    let handle = server.spawn();
    (handle, StaticDirectory::new().with(code.clone(), address))
}

/// A client writing into `output_dir`.
pub fn client(directory: StaticDirectory, output_dir: &Path) -> ContentClient<StaticDirectory> {
    let config = ClientConfig {
        output_dir: output_dir.to_path_buf(),
        ..ClientConfig::default()
    };
    ContentClient::new(directory, config).expect("Failed to build client")
}

/// Serve `router` on an ephemeral loopback port for the rest of the test.
pub async fn start_router(router: axum::Router) -> SocketAddrV4 {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("Failed to bind router");
    let std::net::SocketAddr::V4(address) = listener.local_addr().expect("local address") else {
        panic!("expected an IPv4 listener");
    };
    tokio::spawn(async move { axum::serve(listener, router).await });
    address
}

/// Poll `condition` every 20 ms until it holds, failing after five seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
