//! Config command - print the effective settings.

use crate::config::Settings;

pub fn run(settings: &Settings) -> anyhow::Result<()> {
    print!("{}", settings.to_toml()?);
    Ok(())
}
