//! CLI command definitions and handlers.

use std::net::SocketAddrV4;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;

use lanshare_core::code::SessionCode;
use lanshare_core::config::Config;
use lanshare_core::discovery::{Announcement, ServiceRegistry, SessionLookup, StaticDirectory};

pub mod completions;
pub mod config;
pub mod host;
pub mod inspect;
pub mod receive;
pub mod send;
pub mod share;

/// Load configuration with graceful fallback to defaults.
///
/// A missing file yields defaults; a broken one is reported and ignored.
pub fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring configuration: {e}");
        Config::default()
    })
}

/// Parse a session code, naming it in the error.
pub fn parse_code(code: &str) -> Result<SessionCode> {
    SessionCode::parse(code).with_context(|| format!("Invalid code '{code}'"))
}

/// Create an mDNS registry with the configured timeouts.
pub fn registry(config: &Config) -> Result<ServiceRegistry> {
    ServiceRegistry::with_timeouts(
        config.network.lookup_timeout,
        config.network.registration_check_timeout,
    )
    .context("Failed to start mDNS")
}

/// How a peer command finds a session.
pub enum Directory {
    /// Browse the network
    Mdns(ServiceRegistry),
    /// A session at a known address
    Fixed(StaticDirectory),
}

impl Directory {
    /// Use `addr` for `code` when given, mDNS otherwise.
    pub fn resolve(code: &SessionCode, addr: Option<SocketAddrV4>, config: &Config) -> Result<Self> {
        match addr {
            Some(addr) => Ok(Self::Fixed(StaticDirectory::new().with(code.clone(), addr))),
            None => registry(config).map(Self::Mdns),
        }
    }
}

impl SessionLookup for Directory {
    async fn lookup(&self, code: &SessionCode) -> lanshare_core::Result<Option<Announcement>> {
        match self {
            Self::Mdns(registry) => registry.lookup(code).await,
            Self::Fixed(directory) => directory.lookup(code).await,
        }
    }
}

/// Resolves when the user presses Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// LanShare - share text and files on the local network with a short code
#[derive(Parser)]
#[command(name = "lanshare")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Detailed logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Share text or files under a code
    Share(ShareArgs),

    /// Receive what a code is sharing
    Receive(ReceiveArgs),

    /// Accept uploads under a code
    Host(HostArgs),

    /// Upload files to a host
    Send(SendArgs),

    /// Show what a code is sharing without downloading it
    Inspect(InspectArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the share command
#[derive(Parser)]
pub struct ShareArgs {
    /// Code to announce
    pub code: String,

    /// Files and folders to share
    #[arg(required_unless_present = "text", conflicts_with = "text")]
    pub paths: Vec<PathBuf>,

    /// Share this text instead of files
    #[arg(short, long)]
    pub text: Option<String>,

    /// Always send as a zip archive
    #[arg(long)]
    pub compress: bool,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the receive command
#[derive(Parser)]
pub struct ReceiveArgs {
    /// Code to receive from
    pub code: String,

    /// Output directory for received files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep received archives as zip files
    #[arg(long)]
    pub no_decompress: bool,

    /// Connect to this address instead of browsing for the code
    #[arg(long, value_name = "IP:PORT")]
    pub addr: Option<SocketAddrV4>,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the host command
#[derive(Parser)]
pub struct HostArgs {
    /// Code to announce
    pub code: String,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory uploads are written to
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep uploaded archives as zip files
    #[arg(long)]
    pub no_decompress: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the send command
#[derive(Parser)]
pub struct SendArgs {
    /// Code of the receiving host
    pub code: String,

    /// Files and folders to send
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Always send as a zip archive
    #[arg(long)]
    pub compress: bool,

    /// Connect to this address instead of browsing for the code
    #[arg(long, value_name = "IP:PORT")]
    pub addr: Option<SocketAddrV4>,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the inspect command
#[derive(Parser)]
pub struct InspectArgs {
    /// Code to inspect
    pub code: String,

    /// Connect to this address instead of browsing for the code
    #[arg(long, value_name = "IP:PORT")]
    pub addr: Option<SocketAddrV4>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Clone, Copy)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
