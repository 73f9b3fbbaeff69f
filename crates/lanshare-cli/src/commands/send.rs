//! Send command implementation.

use anyhow::{bail, Context, Result};

use lanshare_core::client::{ClientConfig, ContentClient};

use super::{Directory, SendArgs};
use crate::ui;

/// Run the send command.
pub async fn run(args: SendArgs) -> Result<()> {
    let config = super::load_config();
    let code = super::parse_code(&args.code)?;

    if !args.quiet {
        ui::print_header();
        println!("  Searching for code {code}...");
        println!();
    }

    let directory = Directory::resolve(&code, args.addr, &config)?;
    let client = ContentClient::new(directory, ClientConfig::from_config(&config))?;

    let display = (!args.quiet).then(|| tokio::spawn(ui::display_progress(client.progress())));
    let result = client.send(&code, &args.paths, args.compress).await;

    drop(client);
    if let Some(display) = display {
        let _ = display.await;
    }

    let status = result.with_context(|| format!("Failed to send to '{code}'"))?;
    if !(200..300).contains(&status) {
        bail!("Host '{code}' rejected the upload (HTTP {status})");
    }

    if !args.quiet {
        println!("  Sent to '{code}'.");
    }
    Ok(())
}
