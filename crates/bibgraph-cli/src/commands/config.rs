//! Config command - View and manage configuration
//!
//! - Show the effective (merged) configuration
//! - Get a single value by dotted key
//! - Show where configuration files live
//! - Write a default configuration file

use std::path::PathBuf;

use anyhow::{Context, Result};
use bibgraph_config::{BibgraphConfig, ConfigLoader};
use clap::Subcommand;
use serde::Serialize;

use super::{load_config, print_info, print_json, resolve_workspace};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Get a specific configuration value
    Get(GetArgs),

    /// Show configuration file paths
    Path(PathArgs),

    /// Write a default configuration file if none exists
    Init(InitArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

/// Arguments for the get command
#[derive(clap::Args, Debug)]
pub struct GetArgs {
    /// Configuration key (e.g., "storage.backend")
    key: String,
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the init command
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Initialize ~/.bibgraph/config.toml instead of the workspace config
    #[arg(long)]
    global: bool,
}

#[derive(Debug, Serialize)]
struct ConfigPaths {
    global: Option<PathBuf>,
    local: PathBuf,
    global_exists: bool,
    local_exists: bool,
}

pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, global),
        ConfigCommand::Get(args) => execute_get(args, global),
        ConfigCommand::Path(args) => execute_path(args, global),
        ConfigCommand::Init(args) => execute_init(args, global),
    }
}

fn execute_show(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let config = load_config(&global, &workspace)?;

    if args.json {
        return print_json(&config);
    }
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to render configuration")?
    );
    Ok(())
}

fn execute_get(args: GetArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let config = load_config(&global, &workspace)?;

    let value = get_config_value(&config, &args.key)
        .with_context(|| format!("Unknown configuration key: {}", args.key))?;
    match value {
        serde_json::Value::String(s) => println!("{}", s),
        other => println!("{}", other),
    }
    Ok(())
}

fn execute_path(args: PathArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&workspace);
    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        local_exists: local_path.exists(),
        global: global_path,
        local: local_path,
    };

    if args.json {
        return print_json(&paths);
    }

    let status = |exists: bool| if exists { "exists" } else { "not found" };
    match paths.global {
        Some(ref gp) => println!("Global: {} ({})", gp.display(), status(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!(
        "Local:  {} ({})",
        paths.local.display(),
        status(paths.local_exists)
    );
    Ok(())
}

fn execute_init(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let path = if args.global {
        loader.init_global()?
    } else {
        let workspace = resolve_workspace(&global)?;
        loader.init_local(&workspace)?
    };

    print_info(&format!("Config: {}", path.display()), global.quiet);
    Ok(())
}

/// Look up a dotted key path in the serialized configuration.
fn get_config_value(config: &BibgraphConfig, key: &str) -> Option<serde_json::Value> {
    let json = serde_json::to_value(config).ok()?;
    key.split('.')
        .try_fold(&json, |current, part| current.get(part))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_value() {
        let config = BibgraphConfig::default();
        assert_eq!(
            get_config_value(&config, "storage.backend"),
            Some(serde_json::json!("sqlite"))
        );
        assert_eq!(
            get_config_value(&config, "logging.level"),
            Some(serde_json::json!("info"))
        );
        assert!(get_config_value(&config, "storage.nope").is_none());
        assert!(get_config_value(&config, "query.default_neighbor_limit").is_none());
    }
}
