//! Share command implementation.

use std::net::SocketAddrV4;
use std::sync::Arc;

use anyhow::{Context, Result};

use lanshare_core::naming::format_size;
use lanshare_core::server::{Content, ContentServer, ServerConfig, SharedFile};

use super::ShareArgs;
use crate::ui::{self, SessionBox};

/// Run the share command.
pub async fn run(args: ShareArgs) -> Result<()> {
    let config = super::load_config();
    let code = super::parse_code(&args.code)?;

    let content = match args.text {
        Some(text) => Content::Text(text),
        None => Content::File(
            SharedFile::prepare(&args.paths, args.compress)
                .await
                .context("Failed to prepare files")?,
        ),
    };

    let mut server_config = ServerConfig::from_config(&config);
    if let Some(port) = args.port {
        server_config.bind = SocketAddrV4::new(*server_config.bind.ip(), port);
    }

    let description = describe(&content);
    let mut server = ContentServer::bind(content, server_config)
        .await
        .with_context(|| format!("Failed to start server for '{code}'"))?;

    let registry = Arc::new(super::registry(&config)?);
    let session = server
        .register(Arc::clone(&registry), &code)
        .await
        .with_context(|| format!("Failed to announce '{code}'"))?;

    if args.json {
        let output = serde_json::json!({
            "code": code.as_str(),
            "role": session.role.label(),
            "url": session.url(),
            "content": description,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !args.quiet {
        ui::print_header();
        println!("  Sharing {description}");
        println!();
        SessionBox::new(code.as_str(), &session.url(), session.role.label())
            .with_qr(config.ui.show_qr)
            .display();
        println!();
        println!("  Press Ctrl-C to stop sharing.");
    }

    server
        .serve(super::shutdown_signal())
        .await
        .with_context(|| format!("Server for '{code}' failed"))?;

    if !args.quiet && !args.json {
        println!();
        println!("  Stopped sharing '{code}'.");
    }

    Ok(())
}

fn describe(content: &Content) -> String {
    match content {
        Content::Text(text) => format!("text ({} characters)", text.chars().count()),
        Content::File(file) => format!("{} ({})", file.name(), format_size(file.size())),
        Content::Inbox => "uploads".to_string(),
    }
}
