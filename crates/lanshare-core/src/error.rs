//! Error types for LanShare.
//!
//! This module provides a unified error type for all LanShare operations.
//! The first five variants form the session taxonomy: each one carries the
//! offending code (or the reason the input was rejected) and is terminal for
//! the operation that raised it. None of them are retried internally.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for LanShare operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for LanShare.
#[derive(Error, Debug)]
pub enum Error {
    /// A session with this code is already announced (E001)
    #[error("code '{0}' already exists on the network")]
    CodeExists(String),

    /// No session answered for this code (E002)
    #[error("code '{0}' not found on network")]
    CodeNotFound(String),

    /// The session answers but is an upload receiver (E003)
    #[error("session '{0}' is not a text or file sender")]
    IsNotSender(String),

    /// The session answers but is a sender (E004)
    #[error("session '{0}' is not an upload receiver")]
    IsNotReceiver(String),

    /// Empty or absent content given to an operation (E005)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Code does not form a valid session name
    #[error("invalid code format: {0}")]
    InvalidCodeFormat(String),

    /// File not found
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The capability probe returned something other than a known role
    #[error("session '{code}' answered with an unknown role: {label}")]
    UnexpectedRole {
        /// The probed code
        code: String,
        /// The label the server returned
        label: String,
    },

    /// Invalid or missing transfer metadata
    #[error("invalid protocol message: {0}")]
    ProtocolError(String),

    /// Transferred byte count disagrees with the declared file size
    #[error("size mismatch for '{file}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// The file being transferred
        file: String,
        /// Size declared in the transfer metadata
        expected: u64,
        /// Bytes actually transferred
        actual: u64,
    },

    /// Archive creation or extraction failed
    #[error("archive error: {0}")]
    Archive(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// mDNS daemon or registration failure
    #[error("discovery error: {0}")]
    Discovery(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            other => Self::Archive(other.to_string()),
        }
    }
}

impl Error {
    /// Returns the error code associated with this error, if any.
    ///
    /// Error codes follow the pattern EXXX where XXX is a 3-digit number.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::CodeExists(_) => Some("E001"),
            Self::CodeNotFound(_) => Some("E002"),
            Self::IsNotSender(_) => Some("E003"),
            Self::IsNotReceiver(_) => Some("E004"),
            Self::InvalidInput(_) => Some("E005"),
            _ => None,
        }
    }

    /// Returns whether this error belongs to the session taxonomy.
    #[must_use]
    pub const fn is_session_error(&self) -> bool {
        self.code().is_some()
    }

    /// Returns a helpful suggestion for resolving the error, if applicable.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::CodeExists(_) => Some("Pick a different code; another host is using this one."),
            Self::CodeNotFound(_) => Some(
                "Check the code and that both hosts are on the same network.\n\
                 Multicast DNS (UDP 5353) must not be blocked by a firewall.",
            ),
            Self::IsNotSender(_) => {
                Some("This code accepts uploads. Use 'lanshare send' to push files to it.")
            }
            Self::IsNotReceiver(_) => {
                Some("This code is sharing content. Use 'lanshare receive' to fetch it.")
            }
            _ => None,
        }
    }
}
