//! Receive command implementation.

use anyhow::{Context, Result};

use lanshare_core::client::{ClientConfig, ContentClient, Received};

use super::{Directory, ReceiveArgs};
use crate::ui;

/// Run the receive command.
pub async fn run(args: ReceiveArgs) -> Result<()> {
    let config = super::load_config();
    let code = super::parse_code(&args.code)?;

    let mut client_config = ClientConfig::from_config(&config);
    if let Some(output) = args.output {
        client_config.output_dir = output;
    }
    if args.no_decompress {
        client_config.decompress = false;
    }

    let show_progress = !args.quiet && !args.json;
    if show_progress {
        ui::print_header();
        println!("  Searching for code {code}...");
        println!();
    }

    let directory = Directory::resolve(&code, args.addr, &config)?;
    let client = ContentClient::new(directory, client_config)?;

    let display = show_progress.then(|| tokio::spawn(ui::display_progress(client.progress())));
    let result = client.receive(&code).await;

    drop(client);
    if let Some(display) = display {
        let _ = display.await;
    }

    let received = result.with_context(|| format!("Failed to receive from '{code}'"))?;

    if args.json {
        let output = match &received {
            Received::Text(text) => serde_json::json!({
                "code": code.as_str(),
                "type": "text",
                "text": text,
            }),
            Received::File(path) => serde_json::json!({
                "code": code.as_str(),
                "type": "file",
                "path": path.display().to_string(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match received {
        Received::Text(text) if args.quiet => println!("{text}"),
        Received::Text(text) => {
            println!("  Received text:");
            println!();
            println!("{text}");
        }
        Received::File(path) if args.quiet => println!("{}", path.display()),
        Received::File(path) => println!("  Saved to {}", path.display()),
    }

    Ok(())
}
