//! # LanShare Core Library
//!
//! `lanshare-core` provides the core functionality for LanShare: sharing
//! text and files between two hosts on the same local network using a short,
//! human-chosen code.
//!
//! ## Features
//!
//! - **Code-based discovery**: Sessions are announced over mDNS as `<code>.local`
//! - **Capability probe**: A peer learns what a session offers before transferring
//! - **Streaming transfers**: Files stream over HTTP in fixed-size chunks
//! - **Collision-safe naming**: Received content never overwrites existing files
//! - **Bounded uploads**: A receiver tracks at most N concurrent uploads
//!
//! ## Modules
//!
//! - [`archive`] - Zip archive creation and extraction
//! - [`client`] - Discovery, role probe and transfers (peer side)
//! - [`code`] - Session code validation
//! - [`config`] - Configuration management
//! - [`discovery`] - mDNS registration and lookup of sessions
//! - [`error`] - Error types
//! - [`naming`] - Collision-safe destination naming
//! - [`progress`] - Bounded pool of upload progress slots
//! - [`protocol`] - Roles, routes and transfer metadata headers
//! - [`qr`] - QR rendering of session URLs
//! - [`server`] - Role-parameterised HTTP server
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanshare_core::client::{ClientConfig, ContentClient, Received};
//! use lanshare_core::code::SessionCode;
//! use lanshare_core::discovery::ServiceRegistry;
//!
//! let registry = ServiceRegistry::new()?;
//! let client = ContentClient::new(registry, ClientConfig::default())?;
//!
//! match client.receive(&SessionCode::parse("demo")?).await? {
//!     Received::Text(text) => println!("{text}"),
//!     Received::File(path) => println!("saved to {}", path.display()),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod archive;
pub mod client;
pub mod code;
pub mod config;
pub mod discovery;
pub mod error;
pub mod naming;
pub mod progress;
pub mod protocol;
pub mod qr;
pub mod server;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version advertised in the mDNS TXT record
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default HTTP port for a session server
pub const DEFAULT_PORT: u16 = 52530;

/// Chunk size for streaming file bodies (8 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Number of concurrent upload progress slots on a receiver
pub const DEFAULT_PROGRESS_SLOTS: usize = 5;

/// Default bound on a discovery lookup in seconds
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 3;

/// Default bound on the "code already in use" check during registration
pub const DEFAULT_REGISTRATION_CHECK_SECS: u64 = 1;
