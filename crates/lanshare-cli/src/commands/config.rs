//! Config command implementation.

use anyhow::{bail, Context, Result};

use lanshare_core::config::Config;

use super::ConfigAction;

/// Run the config command.
pub fn run(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = super::load_config();
            let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{rendered}");
        }
        ConfigAction::Path => println!("{}", Config::config_path().display()),
        ConfigAction::Init { force } => {
            let path = Config::config_path();
            if path.exists() && !force {
                bail!(
                    "Configuration already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save().context("Failed to write configuration")?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}
