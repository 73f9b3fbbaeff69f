//! LanShare CLI - share text and files on the local network
//!
//! A sender announces a short code over mDNS; anyone on the same network
//! can use the code to fetch the content, or to upload files to a host.
//!
//! ## Quick Start
//!
//! ```bash
//! # Share a file under the code "demo"
//! lanshare share demo ./report.pdf
//!
//! # Receive it on another machine
//! lanshare receive demo
//! ```

#![allow(clippy::doc_markdown)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        ui::print_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        match cli.command {
            Command::Share(args) => commands::share::run(args).await,
            Command::Receive(args) => commands::receive::run(args).await,
            Command::Host(args) => commands::host::run(args).await,
            Command::Send(args) => commands::send::run(args).await,
            Command::Inspect(args) => commands::inspect::run(args).await,
            Command::Config(args) => commands::config::run(args.action),
            Command::Completions(args) => {
                commands::completions::run(args.shell);
                Ok(())
            }
        }
    })
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "info,lanshare=debug,lanshare_core=debug"
    } else {
        "warn,lanshare=info,lanshare_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
