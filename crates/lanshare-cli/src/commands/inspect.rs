//! Inspect command implementation.

use anyhow::{Context, Result};

use lanshare_core::client::{ClientConfig, ContentClient};
use lanshare_core::naming::format_size;

use super::{Directory, InspectArgs};

/// Run the inspect command.
pub async fn run(args: InspectArgs) -> Result<()> {
    let config = super::load_config();
    let code = super::parse_code(&args.code)?;

    let directory = Directory::resolve(&code, args.addr, &config)?;
    let client = ContentClient::new(directory, ClientConfig::from_config(&config))?;
    let descriptor = client
        .inspect(&code)
        .await
        .with_context(|| format!("Failed to inspect '{code}'"))?;

    if args.json {
        let mut output = serde_json::to_value(&descriptor)?;
        output["code"] = serde_json::json!(code.as_str());
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("  Code:       {code}");
        println!("  File:       {}", descriptor.file_name);
        println!(
            "  Size:       {} ({} bytes)",
            format_size(descriptor.file_size),
            descriptor.file_size
        );
        println!(
            "  Archive:    {}",
            if descriptor.compressed { "yes" } else { "no" }
        );
    }

    Ok(())
}
