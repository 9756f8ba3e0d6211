//! Configuration management commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::Config;

const EXAMPLE_CONFIG: &str = include_str!("../../../../mfb.toml.example");

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the resolved configuration (file plus MFB__ overrides)
    Show,
    /// Initialize configuration file
    Init {
        /// Where to write the file
        #[arg(short, long, default_value = "mfb.toml")]
        path: PathBuf,
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

/// `loaded` is the result of loading the configuration at startup; `init`
/// ignores it so a broken file can be replaced.
pub async fn run(cmd: ConfigCommands, loaded: Result<Config>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(&loaded?),
        ConfigCommands::Init { path, force } => init(&path, force),
    }
}

fn show(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    match &config.source {
        Some(path) => println!("Config file: {}\n", path.display()),
        None => println!("No configuration file found. Using defaults.\n"),
    }

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Configuration file created: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mfb.toml");

        init(&path, false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);

        std::fs::write(&path, "# edited").unwrap();
        init(&path, false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited");

        init(&path, true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);
    }

    #[test]
    fn test_default_config_renders_as_toml() {
        let rendered = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(rendered.contains("[experiment]"));
        assert!(rendered.contains("kind = \"mf_ucb\""));
    }
}
