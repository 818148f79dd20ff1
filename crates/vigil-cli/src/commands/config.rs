//! Configuration management.

use anyhow::Result;
use clap::Subcommand;
use vigil_core::EngineConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write a default config file to the user config directory
    Init,
}

/// Handle config commands.
pub fn handle(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = EngineConfig::load()?;
            let path = EngineConfig::config_path()?;
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigAction::Init => {
            let path = EngineConfig::default().save()?;
            println!("Wrote default config to {}", path.display());
            Ok(())
        }
    }
}
