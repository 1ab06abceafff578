use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use wayfarer::WayfarerConfig;

use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Inspect",
        commands: &[
            "wayfarer config show                          # Effective configuration",
            "wayfarer --config prod.toml config show       # A specific file",
        ],
    },
    ExampleGroup {
        title: "Create",
        commands: &[
            "wayfarer config init wayfarer.toml            # Write the defaults",
            "wayfarer config init wayfarer.toml --force    # Overwrite an existing file",
        ],
    },
];

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    #[command(name = "show")]
    Show,

    /// Write a default configuration file
    #[command(name = "init")]
    Init {
        /// Destination path
        path: PathBuf,

        /// Overwrite the file if it already exists
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_config_commands(
    command: ConfigCommands,
    config: &WayfarerConfig,
    output: &OutputManager,
) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let rendered = masked(config).to_toml()?;
            output.raw(&rendered);
            Ok(())
        }
        ConfigCommands::Init { path, force } => init(&path, force, output).await,
    }
}

async fn init(path: &Path, force: bool, output: &OutputManager) -> Result<()> {
    if !force && tokio::fs::try_exists(path).await.unwrap_or(false) {
        output.error(&format!("{} already exists", path.display()));
        output.info("Pass --force to overwrite it.");
        anyhow::bail!("Refusing to overwrite existing config");
    }
    let rendered = WayfarerConfig::default().to_toml()?;
    tokio::fs::write(path, rendered)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    output.success(&format!("Wrote default configuration to {}", path.display()));
    Ok(())
}

/// Hides literal secrets; `${VAR}` references are shown as written.
fn masked(config: &WayfarerConfig) -> WayfarerConfig {
    let mut config = config.clone();
    for secret in [&mut config.auth.access_secret, &mut config.auth.refresh_secret] {
        if !secret.starts_with("${") {
            *secret = "********".to_string();
        }
    }
    config
}
