//! Host command implementation.

use std::net::SocketAddrV4;
use std::sync::Arc;

use anyhow::{Context, Result};

use lanshare_core::server::{Content, ContentServer, ServerConfig};

use super::HostArgs;
use crate::ui::{self, SessionBox};

/// Run the host command.
pub async fn run(args: HostArgs) -> Result<()> {
    let config = super::load_config();
    let code = super::parse_code(&args.code)?;

    let mut server_config = ServerConfig::from_config(&config);
    if let Some(port) = args.port {
        server_config.bind = SocketAddrV4::new(*server_config.bind.ip(), port);
    }
    if let Some(output) = args.output {
        server_config.output_dir = output;
    }
    if args.no_decompress {
        server_config.decompress = false;
    }
    let output_dir = server_config.output_dir.clone();

    let mut server = ContentServer::bind(Content::Inbox, server_config)
        .await
        .with_context(|| format!("Failed to start server for '{code}'"))?;

    let registry = Arc::new(super::registry(&config)?);
    let session = server
        .register(Arc::clone(&registry), &code)
        .await
        .with_context(|| format!("Failed to announce '{code}'"))?;

    let display = if args.quiet {
        None
    } else {
        ui::print_header();
        println!("  Accepting uploads into {}", output_dir.display());
        println!();
        SessionBox::new(code.as_str(), &session.url(), session.role.label())
            .with_qr(config.ui.show_qr)
            .display();
        println!();
        println!("  Press Ctrl-C to stop.");
        Some(tokio::spawn(ui::display_uploads(server.progress())))
    };

    let result = server.serve(super::shutdown_signal()).await;

    if let Some(display) = display {
        display.abort();
        println!();
        println!("  Stopped hosting '{code}'.");
    }

    result.with_context(|| format!("Server for '{code}' failed"))
}
