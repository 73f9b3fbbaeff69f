//! Client side of a session: look a code up, probe its role, move the content.
//!
//! Every operation starts the same way: resolve the code through a
//! [`SessionLookup`], then ask the session what it is (`GET /lanshare`). Only
//! when the role matches the operation does any content move, so a `send` to a
//! text sender fails before a single byte is uploaded.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanshare_core::client::{ClientConfig, ContentClient, Received};
//! use lanshare_core::discovery::ServiceRegistry;
//!
//! let client = ContentClient::new(ServiceRegistry::new()?, ClientConfig::default())?;
//! match client.receive(&code).await? {
//!     Received::Text(text) => println!("{text}"),
//!     Received::File(path) => println!("Saved to {}", path.display()),
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::io::ReaderStream;

use crate::archive::{self, ArchiveBlob};
use crate::code::SessionCode;
use crate::discovery::{Announcement, SessionLookup};
use crate::error::{Error, Result};
use crate::naming;
use crate::protocol::{self, Role, TransferDescriptor};

/// Default timeout for probe, text and metadata requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Where received files are written
    pub output_dir: PathBuf,
    /// Extract received archives
    pub decompress: bool,
    /// Timeout for short requests; downloads and uploads are not bounded
    pub request_timeout: Duration,
    /// Upload chunk size
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            decompress: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ClientConfig {
    /// Build a client configuration from the user configuration.
    #[must_use]
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            output_dir: config.output_dir(),
            decompress: config.transfer.decompress,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chunk_size: config.transfer.chunk_size,
        }
    }
}

/// What `receive` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Text served by a text sender
    Text(String),
    /// Path of the saved file, or of the extracted directory
    File(PathBuf),
}

/// Current state of a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferState {
    /// Nothing in progress
    #[default]
    Idle,
    /// Bytes are moving
    Transferring,
    /// Unpacking a received archive
    Extracting,
    /// Transfer completed successfully
    Completed,
    /// Transfer failed
    Failed,
}

/// Progress of the current transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferProgress {
    /// Current state
    pub state: TransferState,
    /// Name of the file being moved
    pub file_name: String,
    /// Bytes moved so far
    pub bytes_transferred: u64,
    /// Bytes expected in total
    pub total_bytes: u64,
}

impl TransferProgress {
    fn start(file_name: &str, total_bytes: u64) -> Self {
        Self {
            state: TransferState::Transferring,
            file_name: file_name.to_string(),
            bytes_transferred: 0,
            total_bytes,
        }
    }

    /// Get progress as a percentage (0.0 - 100.0).
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_transferred as f64 / self.total_bytes as f64) * 100.0
        }
    }
}

/// Discovers sessions and transfers content with them.
#[derive(Debug)]
pub struct ContentClient<L> {
    lookup: L,
    http: reqwest::Client,
    config: ClientConfig,
    progress: Arc<watch::Sender<TransferProgress>>,
}

impl<L: SessionLookup> ContentClient<L> {
    /// Create a client resolving codes through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(lookup: L, config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .no_proxy()
            .build()?;
        let (progress, _) = watch::channel(TransferProgress::default());

        Ok(Self {
            lookup,
            http,
            config,
            progress: Arc::new(progress),
        })
    }

    /// The client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Subscribe to transfer progress.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<TransferProgress> {
        self.progress.subscribe()
    }

    /// Resolve `code` and ask the session for its role.
    ///
    /// # Errors
    ///
    /// Returns `CodeNotFound` if nothing answers for the code, or
    /// `UnexpectedRole` if the probe answer is not a known role.
    pub async fn probe(&self, code: &SessionCode) -> Result<(Announcement, Role)> {
        let announcement = self
            .lookup
            .lookup(code)
            .await?
            .ok_or_else(|| Error::CodeNotFound(code.to_string()))?;

        let label = self
            .http
            .get(format!("{}{}", announcement.base_url(), protocol::PROBE_PATH))
            .timeout(self.config.request_timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let role = Role::from_label(&label).ok_or_else(|| Error::UnexpectedRole {
            code: code.to_string(),
            label: label.trim().to_string(),
        })?;

        tracing::debug!(code = %code, address = %announcement.address, role = %role, "Probed session");
        Ok((announcement, role))
    }

    /// Pull whatever the session under `code` shares.
    ///
    /// # Errors
    ///
    /// Returns `CodeNotFound`, `IsNotSender` for an upload receiver,
    /// `SizeMismatch` if a download is cut short, or a transport error.
    pub async fn receive(&self, code: &SessionCode) -> Result<Received> {
        let (announcement, role) = self.probe(code).await?;

        match role {
            Role::UploadReceiver => Err(Error::IsNotSender(code.to_string())),
            Role::TextSender => {
                let text = self
                    .http
                    .get(format!("{}{}", announcement.base_url(), protocol::TEXT_PATH))
                    .timeout(self.config.request_timeout)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                tracing::info!(code = %code, bytes = text.len(), "Received text");
                Ok(Received::Text(text))
            }
            Role::FileSender => {
                let result = self.download(&announcement).await;
                if result.is_err() {
                    self.progress.send_modify(|p| p.state = TransferState::Failed);
                }
                result.map(Received::File)
            }
        }
    }

    /// Fetch a file sender's transfer metadata without downloading.
    ///
    /// # Errors
    ///
    /// Returns `CodeNotFound`, `IsNotSender` for an upload receiver, or
    /// `UnexpectedRole` for a text sender.
    pub async fn inspect(&self, code: &SessionCode) -> Result<TransferDescriptor> {
        let (announcement, role) = self.probe(code).await?;

        match role {
            Role::FileSender => {}
            Role::UploadReceiver => return Err(Error::IsNotSender(code.to_string())),
            Role::TextSender => {
                return Err(Error::UnexpectedRole {
                    code: code.to_string(),
                    label: role.label().to_string(),
                })
            }
        }

        let response = self
            .http
            .head(format!("{}{}", announcement.base_url(), protocol::DOWNLOAD_PATH))
            .timeout(self.config.request_timeout)
            .send()
            .await?
            .error_for_status()?;

        TransferDescriptor::from_headers(response.headers())
    }

    /// Push `paths` to the upload receiver under `code`.
    ///
    /// Several paths, a directory, or `compress` are sent as one archive.
    /// Returns the server's HTTP status verbatim.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty list, `FileNotFound` for a missing
    /// path, `CodeNotFound`, or `IsNotReceiver` when the session is a sender.
    /// Role errors are raised before anything is archived or uploaded.
    pub async fn send(&self, code: &SessionCode, paths: &[PathBuf], compress: bool) -> Result<u16> {
        let Some(first) = paths.first() else {
            return Err(Error::InvalidInput("no paths to send".to_string()));
        };
        if let Some(missing) = paths.iter().find(|p| !p.exists()) {
            return Err(Error::FileNotFound(missing.display().to_string()));
        }

        let (announcement, role) = self.probe(code).await?;
        if role != Role::UploadReceiver {
            return Err(Error::IsNotReceiver(code.to_string()));
        }

        let compressed = archive::needs_archive(paths, compress);
        let blob: Option<ArchiveBlob> = if compressed {
            Some(archive::compress_async(paths.to_vec()).await?)
        } else {
            None
        };

        let (upload_path, file_name) = match &blob {
            Some(blob) => (blob.path().to_path_buf(), blob.suggested_name().to_string()),
            None => {
                let path = tokio::fs::canonicalize(first).await?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .ok_or_else(|| {
                        Error::InvalidInput(format!("'{}' has no file name", first.display()))
                    })?;
                (path, name)
            }
        };

        let result = self
            .upload(&announcement, &upload_path, &file_name, compressed)
            .await;
        drop(blob);

        match &result {
            Ok(status) => {
                self.progress.send_modify(|p| p.state = TransferState::Completed);
                tracing::info!(code = %code, file = %file_name, status, "Upload finished");
            }
            Err(e) => {
                self.progress.send_modify(|p| p.state = TransferState::Failed);
                tracing::warn!(code = %code, file = %file_name, "Upload failed: {e}");
            }
        }
        result
    }

    async fn upload(
        &self,
        announcement: &Announcement,
        path: &Path,
        file_name: &str,
        compressed: bool,
    ) -> Result<u16> {
        let size = tokio::fs::metadata(path).await?.len();
        let file = tokio::fs::File::open(path).await?;

        self.progress
            .send_replace(TransferProgress::start(file_name, size));

        let progress = Arc::clone(&self.progress);
        let stream = ReaderStream::with_capacity(file, self.config.chunk_size.max(1)).inspect(
            move |chunk| {
                if let Ok(bytes) = chunk {
                    let n = bytes.len() as u64;
                    progress.send_modify(|p| p.bytes_transferred += n);
                }
            },
        );

        let part = reqwest::multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), size)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new().part(protocol::UPLOAD_FIELD, part);

        let response = self
            .http
            .post(format!("{}{}", announcement.base_url(), protocol::UPLOAD_PATH))
            .header(protocol::headers::COMPRESS, protocol::bool_header(compressed))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Receiver rejected upload: {}", message.trim());
        }
        Ok(status.as_u16())
    }

    async fn download(&self, announcement: &Announcement) -> Result<PathBuf> {
        let response = self
            .http
            .get(format!("{}{}", announcement.base_url(), protocol::DOWNLOAD_PATH))
            .send()
            .await?
            .error_for_status()?;

        let descriptor = TransferDescriptor::from_headers(response.headers())?;
        let name = naming::sanitize_file_name(&descriptor.file_name)?;

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let destination = naming::resolve(&self.config.output_dir, &name);
        let mut output = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .await?;

        self.progress
            .send_replace(TransferProgress::start(&name, descriptor.file_size));

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        let copied: Result<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                output.write_all(&chunk).await?;
                written += chunk.len() as u64;
                self.progress.send_modify(|p| p.bytes_transferred = written);
            }
            output.flush().await?;
            Ok(())
        }
        .await;
        drop(output);

        let outcome = copied.and_then(|()| {
            if written == descriptor.file_size {
                Ok(())
            } else {
                Err(Error::SizeMismatch {
                    file: name.clone(),
                    expected: descriptor.file_size,
                    actual: written,
                })
            }
        });
        if let Err(e) = outcome {
            if let Err(remove_err) = tokio::fs::remove_file(&destination).await {
                tracing::debug!(path = %destination.display(), "Failed to remove partial download: {remove_err}");
            }
            return Err(e);
        }

        tracing::info!(
            file = %name,
            path = %destination.display(),
            size = written,
            "Download complete"
        );

        if descriptor.compressed
            && self.config.decompress
            && archive::is_archive_async(destination.clone()).await
        {
            self.progress.send_modify(|p| p.state = TransferState::Extracting);
            match archive::decompress_async(destination.clone()).await {
                Ok(dir) => {
                    if let Err(e) = tokio::fs::remove_file(&destination).await {
                        tracing::warn!(path = %destination.display(), "Failed to remove archive: {e}");
                    }
                    tracing::info!(dir = %dir.display(), "Decompressed download");
                    self.progress.send_modify(|p| p.state = TransferState::Completed);
                    return Ok(dir);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %destination.display(),
                        "Failed to decompress download, keeping archive: {e}"
                    );
                }
            }
        }

        self.progress.send_modify(|p| p.state = TransferState::Completed);
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticDirectory;

    #[test]
    fn test_progress_percentage() {
        let mut progress = TransferProgress::start("a.bin", 200);
        assert_eq!(progress.state, TransferState::Transferring);
        assert!(progress.percentage().abs() < f64::EPSILON);

        progress.bytes_transferred = 50;
        assert!((progress.percentage() - 25.0).abs() < f64::EPSILON);

        assert!((TransferProgress::default().percentage() - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let client = ContentClient::new(StaticDirectory::new(), ClientConfig::default()).unwrap();
        let code = SessionCode::parse("nobody").unwrap();

        assert!(matches!(client.receive(&code).await, Err(Error::CodeNotFound(c)) if c == "nobody"));
        assert!(matches!(client.inspect(&code).await, Err(Error::CodeNotFound(_))));
    }

    #[tokio::test]
    async fn test_send_validates_paths_first() {
        let client = ContentClient::new(StaticDirectory::new(), ClientConfig::default()).unwrap();
        let code = SessionCode::parse("demo").unwrap();

        assert!(matches!(client.send(&code, &[], false).await, Err(Error::InvalidInput(_))));
        assert!(matches!(
            client
                .send(&code, &[PathBuf::from("/definitely/not/here")], false)
                .await,
            Err(Error::FileNotFound(_))
        ));
    }
}
