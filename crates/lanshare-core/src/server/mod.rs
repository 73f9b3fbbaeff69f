//! Role-based HTTP content server.
//!
//! A server exposes exactly one role for its whole lifetime, chosen by the
//! [`Content`] it is built with:
//!
//! | Content | Role | Extra routes |
//! |---------|------|--------------|
//! | `Text` | Text Sender | `GET /text` |
//! | `File` | File Sender | `GET/HEAD /download` |
//! | `Inbox` | Upload Receiver | `POST /upload` |
//!
//! Every server answers the capability probe (`GET /lanshare`) and a small
//! landing page (`GET /`).
//!
//! ## Lifecycle
//!
//! ```text
//! Unregistered -> Registered -> Serving -> Stopped
//! ```
//!
//! [`ContentServer::bind`] claims the port, [`ContentServer::register`]
//! announces the session, and [`ContentServer::serve`] runs until its shutdown
//! future resolves and then releases the announcement.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanshare_core::server::{Content, ContentServer, ServerConfig};
//!
//! let mut server = ContentServer::bind(Content::Text("hello".into()), ServerConfig::default()).await?;
//! server.register(registry, &code).await?;
//! server.serve(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```

mod error;
mod handlers;

pub use error::{ApiError, ApiResult};

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, MethodRouter},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::archive::{self, ArchiveBlob};
use crate::code::SessionCode;
use crate::config::Config;
use crate::discovery::{ServiceRegistry, Session};
use crate::error::{Error, Result};
use crate::progress::ProgressTracker;
use crate::protocol::{self, Role, TransferDescriptor};

/// Configuration for a content server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: SocketAddrV4,
    /// Where uploads are written
    pub output_dir: PathBuf,
    /// Extract uploaded archives unless the uploader says otherwise
    pub decompress: bool,
    /// Download chunk size
    pub chunk_size: usize,
    /// Concurrent uploads tracked
    pub progress_slots: usize,
    /// Upload size cap in bytes
    pub max_upload_size: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, crate::DEFAULT_PORT),
            output_dir: PathBuf::from("."),
            decompress: true,
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            progress_slots: crate::DEFAULT_PROGRESS_SLOTS,
            max_upload_size: None,
        }
    }
}

impl ServerConfig {
    /// Build a server configuration from the user configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.network.port),
            output_dir: config.output_dir(),
            decompress: config.transfer.decompress,
            chunk_size: config.transfer.chunk_size,
            progress_slots: config.transfer.progress_slots,
            max_upload_size: config.transfer.max_upload_size,
        }
    }
}

/// What a server offers.
#[derive(Debug)]
pub enum Content {
    /// A piece of text
    Text(String),
    /// One file, possibly an archive built for this session
    File(SharedFile),
    /// Accept uploads into the output directory
    Inbox,
}

impl Content {
    /// The role this content implies.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Text(_) => Role::TextSender,
            Self::File(_) => Role::FileSender,
            Self::Inbox => Role::UploadReceiver,
        }
    }
}

/// A file prepared for download.
///
/// When the file is an archive built by [`SharedFile::prepare`], the archive
/// lives exactly as long as this value.
#[derive(Debug)]
pub struct SharedFile {
    path: PathBuf,
    name: String,
    size: u64,
    compressed: bool,
    _archive: Option<ArchiveBlob>,
}

impl SharedFile {
    /// Prepare `paths` for sharing.
    ///
    /// Several paths, a directory, or `compress` produce one archive; a single
    /// regular file is shared as-is.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty list, `FileNotFound` for a missing
    /// path, or the archive error if compression fails.
    pub async fn prepare(paths: &[PathBuf], compress: bool) -> Result<Self> {
        let Some(first) = paths.first() else {
            return Err(Error::InvalidInput("no paths to share".to_string()));
        };
        if let Some(missing) = paths.iter().find(|p| !p.exists()) {
            return Err(Error::FileNotFound(missing.display().to_string()));
        }

        if archive::needs_archive(paths, compress) {
            let blob = archive::compress_async(paths.to_vec()).await?;
            return Ok(Self {
                path: blob.path().to_path_buf(),
                name: blob.suggested_name().to_string(),
                size: blob.size()?,
                compressed: true,
                _archive: Some(blob),
            });
        }

        let path = tokio::fs::canonicalize(first).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::InvalidInput(format!("'{}' has no file name", first.display())))?;
        let size = tokio::fs::metadata(&path).await?.len();

        Ok(Self {
            path,
            name,
            size,
            compressed: false,
            _archive: None,
        })
    }

    /// Location of the bytes on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name announced to receivers.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Whether the file is an archive built for this session.
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Transfer metadata for this file.
    #[must_use]
    pub fn descriptor(&self) -> TransferDescriptor {
        TransferDescriptor {
            file_name: self.name.clone(),
            file_size: self.size,
            compressed: self.compressed,
        }
    }
}

/// Observable server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Bound, not announced
    Unregistered,
    /// Announced, not yet accepting requests
    Registered,
    /// Accepting requests
    Serving,
    /// Shut down; the announcement has been released
    Stopped,
}

#[derive(Debug)]
pub(crate) struct ServerState {
    pub(crate) content: Content,
    pub(crate) config: ServerConfig,
    pub(crate) progress: ProgressTracker,
}

pub(crate) type SharedState = Arc<ServerState>;

/// A bound content server.
#[derive(Debug)]
pub struct ContentServer {
    listener: TcpListener,
    local_addr: SocketAddrV4,
    state: SharedState,
    registration: Option<(Arc<ServiceRegistry>, Session)>,
    lifecycle: watch::Sender<Lifecycle>,
}

impl ContentServer {
    /// Bind the listener for `content`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(content: Content, config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind).await?;
        let local_addr = match listener.local_addr()? {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(addr) => {
                return Err(Error::InvalidInput(format!("IPv4 address required, got {addr}")));
            }
        };

        tracing::info!(role = %content.role(), address = %local_addr, "Content server bound");

        let progress = ProgressTracker::new(config.progress_slots);
        let (lifecycle, _) = watch::channel(Lifecycle::Unregistered);

        Ok(Self {
            listener,
            local_addr,
            state: Arc::new(ServerState {
                content,
                config,
                progress,
            }),
            registration: None,
            lifecycle,
        })
    }

    /// The address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    /// The role this server exposes.
    #[must_use]
    pub fn role(&self) -> Role {
        self.state.content.role()
    }

    /// The upload progress pool.
    #[must_use]
    pub fn progress(&self) -> ProgressTracker {
        self.state.progress.clone()
    }

    /// Watch the server's lifecycle.
    #[must_use]
    pub fn lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    /// The router serving this server's role.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Announce this server under `code`.
    ///
    /// # Errors
    ///
    /// Returns `CodeExists` if the code is taken, or an error if the server
    /// is already registered.
    pub async fn register(&mut self, registry: Arc<ServiceRegistry>, code: &SessionCode) -> Result<Session> {
        if let Some((_, session)) = &self.registration {
            return Err(Error::Internal(format!(
                "server already registered as '{}'",
                session.code
            )));
        }

        let session = registry.register(code, self.role(), self.local_addr).await?;
        self.registration = Some((registry, session.clone()));
        self.lifecycle.send_replace(Lifecycle::Registered);
        Ok(session)
    }

    /// Serve requests until `shutdown` resolves, then release the registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept loop fails.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            local_addr,
            state,
            registration,
            lifecycle,
        } = self;

        let app = build_router(state);
        lifecycle.send_replace(Lifecycle::Serving);
        tracing::info!(address = %local_addr, "Content server serving");

        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        if let Some((registry, session)) = registration {
            if let Err(e) = registry.release(&session).await {
                tracing::warn!(code = %session.code, "Failed to release session: {e}");
            }
        }

        lifecycle.send_replace(Lifecycle::Stopped);
        tracing::info!(address = %local_addr, "Content server stopped");

        result.map_err(Error::Io)
    }

    /// Run the server on a background task.
    #[must_use]
    pub fn spawn(self) -> ServerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let lifecycle = self.lifecycle();
        let local_addr = self.local_addr;

        let task = tokio::spawn(self.serve(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        }));

        ServerHandle {
            shutdown_tx,
            task,
            lifecycle,
            local_addr,
        }
    }
}

/// Handle to a spawned server. Dropping it also stops the server.
#[derive(Debug)]
pub struct ServerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
    lifecycle: watch::Receiver<Lifecycle>,
    local_addr: SocketAddrV4,
}

impl ServerHandle {
    /// The address the server listens on.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    /// Watch the server's lifecycle.
    #[must_use]
    pub fn lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.clone()
    }

    /// Signal graceful shutdown and wait for the server to stop.
    ///
    /// # Errors
    ///
    /// Returns the server's own error, or `Internal` if its task panicked.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx.send_replace(true);
        self.task
            .await
            .map_err(|e| Error::Internal(format!("server task failed: {e}")))?
    }
}

fn build_router(state: SharedState) -> Router {
    let router = Router::new()
        .route(protocol::PROBE_PATH, get(handlers::probe))
        .route(protocol::INDEX_PATH, get(handlers::index));

    let router = match &state.content {
        Content::Text(_) => router.route(protocol::TEXT_PATH, get(handlers::text)),
        Content::File(_) => router.route(protocol::DOWNLOAD_PATH, get(handlers::download)),
        Content::Inbox => {
            let mut upload: MethodRouter<SharedState> =
                post(handlers::upload).layer(DefaultBodyLimit::disable());
            if let Some(limit) = state.config.max_upload_size {
                let limit = usize::try_from(limit).unwrap_or(usize::MAX);
                upload = upload.layer(RequestBodyLimitLayer::new(limit));
            }
            router.route(protocol::UPLOAD_PATH, upload)
        }
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "lanshare-test-boundary";

    fn test_config(output_dir: &Path) -> ServerConfig {
        ServerConfig {
            bind: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
            output_dir: output_dir.to_path_buf(),
            ..ServerConfig::default()
        }
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn multipart_request(file_name: &str, data: &[u8], compress: Option<bool>) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                protocol::UPLOAD_FIELD
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(protocol::UPLOAD_PATH)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(compress) = compress {
            builder = builder.header(protocol::headers::COMPRESS, compress.to_string());
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn get_request(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_probe_reports_role() {
        let dir = TempDir::new().unwrap();
        for (content, label) in [
            (Content::Text("hi".into()), "Text Sender"),
            (Content::Inbox, "Upload Receiver"),
        ] {
            let server = ContentServer::bind(content, test_config(dir.path())).await.unwrap();
            let response = server.router().oneshot(get_request(protocol::PROBE_PATH)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, label);
        }
    }

    #[tokio::test]
    async fn test_text_route() {
        let dir = TempDir::new().unwrap();
        let server = ContentServer::bind(Content::Text("hello".into()), test_config(dir.path()))
            .await
            .unwrap();
        assert_eq!(server.role(), Role::TextSender);

        let response = server.router().oneshot(get_request(protocol::TEXT_PATH)).await.unwrap();
        assert_eq!(body_string(response).await, "hello");

        let response = server
            .router()
            .oneshot(get_request(protocol::DOWNLOAD_PATH))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_get_and_head() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("report.txt");
        std::fs::write(&file_path, b"quarterly numbers").unwrap();

        let shared = SharedFile::prepare(&[file_path], false).await.unwrap();
        assert!(!shared.is_compressed());
        let server = ContentServer::bind(Content::File(shared), test_config(dir.path()))
            .await
            .unwrap();

        let response = server
            .router()
            .oneshot(get_request(protocol::DOWNLOAD_PATH))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let descriptor = TransferDescriptor::from_headers(response.headers()).unwrap();
        assert_eq!(descriptor.file_name, "report.txt");
        assert_eq!(descriptor.file_size, 17);
        assert!(!descriptor.compressed);
        assert_eq!(body_string(response).await, "quarterly numbers");

        let head = Request::builder()
            .method(Method::HEAD)
            .uri(protocol::DOWNLOAD_PATH)
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(head).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            TransferDescriptor::from_headers(response.headers()).unwrap().file_size,
            17
        );
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_prepare_directory_builds_archive() {
        let dir = TempDir::new().unwrap();
        let photos = dir.path().join("photos");
        std::fs::create_dir(&photos).unwrap();
        std::fs::write(photos.join("a.jpg"), b"jpeg").unwrap();

        let shared = SharedFile::prepare(&[photos], false).await.unwrap();
        assert!(shared.is_compressed());
        assert_eq!(shared.name(), "photos.zip");
        assert!(archive::is_archive(shared.path()));

        let archive_path = shared.path().to_path_buf();
        drop(shared);
        assert!(!archive_path.exists());
    }

    #[tokio::test]
    async fn test_prepare_rejects_bad_input() {
        assert!(matches!(
            SharedFile::prepare(&[], false).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            SharedFile::prepare(&[PathBuf::from("/definitely/not/here")], false).await,
            Err(Error::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_writes_file_and_releases_slot() {
        let dir = TempDir::new().unwrap();
        let server = ContentServer::bind(Content::Inbox, test_config(dir.path()))
            .await
            .unwrap();
        let progress = server.progress();

        let response = server
            .router()
            .oneshot(multipart_request("a.txt", b"hello", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "a.txt (5 B) successfully received!");
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"hello");
        assert_eq!(progress.available(), progress.capacity());

        let response = server
            .router()
            .oneshot(multipart_request("a.txt", b"again", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"hello");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_upload_strips_directories_from_name() {
        let dir = TempDir::new().unwrap();
        let inbox = dir.path().join("inbox");
        let server = ContentServer::bind(Content::Inbox, test_config(&inbox)).await.unwrap();

        let response = server
            .router()
            .oneshot(multipart_request("../escape.txt", b"x", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(inbox.join("escape.txt").exists());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_archive_follows_compress_header() {
        let source = TempDir::new().unwrap();
        let folder = source.path().join("docs");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("one.txt"), b"1").unwrap();
        let blob = archive::compress(&[folder]).unwrap();
        let bytes = std::fs::read(blob.path()).unwrap();

        let dir = TempDir::new().unwrap();
        let server = ContentServer::bind(Content::Inbox, test_config(dir.path()))
            .await
            .unwrap();

        let response = server
            .router()
            .oneshot(multipart_request("docs.zip", &bytes, Some(true)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(std::fs::read(dir.path().join("docs").join("one.txt")).unwrap(), b"1");
        assert!(!dir.path().join("docs.zip").exists());

        let response = server
            .router()
            .oneshot(multipart_request("kept.zip", &bytes, Some(false)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(dir.path().join("kept.zip").exists());
        assert!(!dir.path().join("kept").exists());
    }

    #[tokio::test]
    async fn test_upload_without_field_is_rejected() {
        let dir = TempDir::new().unwrap();
        let server = ContentServer::bind(Content::Inbox, test_config(dir.path()))
            .await
            .unwrap();
        let progress = server.progress();

        let request = Request::builder()
            .method(Method::POST)
            .uri(protocol::UPLOAD_PATH)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(format!("--{BOUNDARY}--\r\n")))
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(progress.available(), progress.capacity());
    }

    #[tokio::test]
    async fn test_spawn_lifecycle() {
        let dir = TempDir::new().unwrap();
        let server = ContentServer::bind(Content::Text("x".into()), test_config(dir.path()))
            .await
            .unwrap();
        let lifecycle = server.lifecycle();
        assert_eq!(*lifecycle.borrow(), Lifecycle::Unregistered);

        let handle = server.spawn();
        let mut watcher = handle.lifecycle();
        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            watcher.wait_for(|state| *state == Lifecycle::Serving),
        )
        .await
        .unwrap()
        .unwrap();

        handle.shutdown().await.unwrap();
        assert_eq!(*lifecycle.borrow(), Lifecycle::Stopped);
    }
}
