//! HTTP protocol vocabulary shared by the server and the client.
//!
//! ## Routes
//!
//! | Method | Path | Role |
//! |--------|------|------|
//! | GET | `/lanshare` | any (capability probe) |
//! | GET | `/` | any (landing page) |
//! | GET | `/text` | Text Sender |
//! | GET, HEAD | `/download` | File Sender |
//! | POST | `/upload` | Upload Receiver |
//!
//! ## Transfer metadata
//!
//! File metadata travels in headers, not in the body, so the receiving side
//! knows the final name and size before the first byte arrives:
//!
//! ```text
//! lanshare-file-name: report.pdf
//! lanshare-file-size: 1048576
//! lanshare-compress: false
//! ```
//!
//! On uploads, `lanshare-compress` carries the sender's compression intent.

use axum::http::{header, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Capability probe route.
pub const PROBE_PATH: &str = "/lanshare";
/// Landing page route.
pub const INDEX_PATH: &str = "/";
/// Text fetch route.
pub const TEXT_PATH: &str = "/text";
/// File download route.
pub const DOWNLOAD_PATH: &str = "/download";
/// File upload route.
pub const UPLOAD_PATH: &str = "/upload";

/// Multipart field name used by uploads.
pub const UPLOAD_FIELD: &str = "field0";

/// Header names for transfer metadata.
pub mod headers {
    /// Final file name
    pub const FILE_NAME: &str = "lanshare-file-name";
    /// File size in bytes
    pub const FILE_SIZE: &str = "lanshare-file-size";
    /// Whether the body is an archive (download) or should be treated as one (upload)
    pub const COMPRESS: &str = "lanshare-compress";
}

/// The single capability a session offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Serves a piece of text
    TextSender,
    /// Serves one file (possibly an archive)
    FileSender,
    /// Accepts uploads
    UploadReceiver,
}

impl Role {
    /// The label returned by the capability probe.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TextSender => "Text Sender",
            Self::FileSender => "File Sender",
            Self::UploadReceiver => "Upload Receiver",
        }
    }

    /// Parse a probe label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Text Sender" => Some(Self::TextSender),
            "File Sender" => Some(Self::FileSender),
            "Upload Receiver" => Some(Self::UploadReceiver),
            _ => None,
        }
    }

    /// Whether peers can pull content from this role.
    #[must_use]
    pub const fn is_sender(self) -> bool {
        matches!(self, Self::TextSender | Self::FileSender)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Metadata describing a file transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDescriptor {
    /// Name the receiver should save the file under
    pub file_name: String,
    /// Exact number of bytes in the body
    pub file_size: u64,
    /// Whether the body is an archive produced for this transfer
    pub compressed: bool,
}

impl TransferDescriptor {
    /// Write the descriptor into response headers.
    ///
    /// Sets the LanShare metadata headers plus `Content-Length` and
    /// `Content-Disposition` for browsers.
    ///
    /// # Errors
    ///
    /// Returns an error if the file name cannot be carried in a header.
    pub fn write_headers(&self, map: &mut HeaderMap) -> Result<()> {
        let name = HeaderValue::from_bytes(self.file_name.as_bytes())
            .map_err(|e| Error::ProtocolError(format!("file name not usable in header: {e}")))?;
        let disposition = HeaderValue::from_bytes(
            format!(
                "attachment; filename=\"{}\"",
                self.file_name.replace(['"', '\\'], "_")
            )
            .as_bytes(),
        )
        .map_err(|e| Error::ProtocolError(format!("file name not usable in header: {e}")))?;

        map.insert(headers::FILE_NAME, name);
        map.insert(headers::FILE_SIZE, HeaderValue::from(self.file_size));
        map.insert(headers::COMPRESS, bool_header(self.compressed));
        map.insert(header::CONTENT_LENGTH, HeaderValue::from(self.file_size));
        map.insert(header::CONTENT_DISPOSITION, disposition);
        map.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        Ok(())
    }

    /// Read a descriptor from response headers.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the name or size header is missing or malformed.
    pub fn from_headers(map: &HeaderMap) -> Result<Self> {
        let file_name = map
            .get(headers::FILE_NAME)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::ProtocolError(format!("missing {} header", headers::FILE_NAME)))?;

        let file_size = map
            .get(headers::FILE_SIZE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                Error::ProtocolError(format!("missing or invalid {} header", headers::FILE_SIZE))
            })?;

        Ok(Self {
            file_name,
            file_size,
            compressed: compress_flag(map).unwrap_or(false),
        })
    }
}

/// Header value for a boolean flag.
#[must_use]
pub fn bool_header(value: bool) -> HeaderValue {
    HeaderValue::from_static(if value { "true" } else { "false" })
}

/// Read the `lanshare-compress` flag, if present and well-formed.
#[must_use]
pub fn compress_flag(map: &HeaderMap) -> Option<bool> {
    let value = map.get(headers::COMPRESS)?.to_str().ok()?.trim();
    if value.eq_ignore_ascii_case("true") || value == "1" {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") || value == "0" {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_labels() {
        for role in [Role::TextSender, Role::FileSender, Role::UploadReceiver] {
            assert_eq!(Role::from_label(role.label()), Some(role));
        }
        assert_eq!(Role::from_label("Upload Receiver\n"), Some(Role::UploadReceiver));
        assert_eq!(Role::from_label("Something Else"), None);
    }

    #[test]
    fn test_role_is_sender() {
        assert!(Role::TextSender.is_sender());
        assert!(Role::FileSender.is_sender());
        assert!(!Role::UploadReceiver.is_sender());
    }

    #[test]
    fn test_descriptor_headers() {
        let descriptor = TransferDescriptor {
            file_name: "résumé \"final\".pdf".to_string(),
            file_size: 1_048_576,
            compressed: true,
        };

        let mut map = HeaderMap::new();
        descriptor.write_headers(&mut map).unwrap();

        assert_eq!(map.get(header::CONTENT_LENGTH).unwrap(), "1048576");
        assert_eq!(map.get(headers::COMPRESS).unwrap(), "true");
        assert_eq!(TransferDescriptor::from_headers(&map).unwrap(), descriptor);
    }

    #[test]
    fn test_descriptor_missing_headers() {
        let mut map = HeaderMap::new();
        assert!(TransferDescriptor::from_headers(&map).is_err());

        map.insert(headers::FILE_NAME, HeaderValue::from_static("a.txt"));
        map.insert(headers::FILE_SIZE, HeaderValue::from_static("not-a-number"));
        assert!(matches!(
            TransferDescriptor::from_headers(&map),
            Err(Error::ProtocolError(_))
        ));

        map.insert(headers::FILE_SIZE, HeaderValue::from_static("3"));
        let descriptor = TransferDescriptor::from_headers(&map).unwrap();
        assert!(!descriptor.compressed);
    }

    #[test]
    fn test_compress_flag_parsing() {
        let mut map = HeaderMap::new();
        assert_eq!(compress_flag(&map), None);

        map.insert(headers::COMPRESS, HeaderValue::from_static("True"));
        assert_eq!(compress_flag(&map), Some(true));

        map.insert(headers::COMPRESS, HeaderValue::from_static("false"));
        assert_eq!(compress_flag(&map), Some(false));

        map.insert(headers::COMPRESS, HeaderValue::from_static("maybe"));
        assert_eq!(compress_flag(&map), None);
    }

    #[test]
    fn test_descriptor_serde() {
        let descriptor = TransferDescriptor {
            file_name: "a.txt".to_string(),
            file_size: 3,
            compressed: false,
        };
        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("\"file_name\":\"a.txt\""));
    }
}
