//! Config command.

use crate::config::Settings;

/// Display the effective configuration.
pub fn run_config(settings: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", settings.to_toml()?);
    Ok(())
}
