//! Add/Drop Conversion CLI
//!
//! Converts scraped course add/drop snapshot CSVs into per-course JSON
//! time-series documents.

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use addrop_pipeline::{discover_snapshots, init_rayon, run_pipeline, Config};

#[derive(Parser)]
#[command(name = "addrop")]
#[command(about = "Convert course add/drop snapshot CSVs into per-course JSON time series", long_about = None)]
struct Cli {
    /// Root data directory containing the snapshot CSV files
    root: Option<PathBuf>,

    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conversion pipeline (default if no command specified)
    Run,

    /// Report the snapshots that would be processed, without writing anything
    Analyze,

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "addrop.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            let root = require_root(cli.root)?;
            run_command(&root, cli.config)?;
        }

        Some(Commands::Analyze) => {
            let root = require_root(cli.root)?;
            analyze_command(&root, cli.config)?;
        }

        Some(Commands::Validate) => {
            validate_command(cli.config)?;
        }

        Some(Commands::GenerateConfig { output }) => {
            generate_config_command(output)?;
        }
    }

    Ok(())
}

fn require_root(root: Option<PathBuf>) -> Result<PathBuf> {
    root.ok_or_else(|| anyhow::anyhow!("Missing path argument: usage: addrop <ROOT> [COMMAND]"))
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::from_file(&path),
        None => Ok(Config::default()),
    }
}

fn run_command(root: &PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    init_rayon(config.processing.rayon_threads)?;

    let summary = run_pipeline(root, &config)?;
    if summary.failures > 0 {
        tracing::warn!("{} files failed; see log output above", summary.failures);
    }

    println!("\nAll done!");
    Ok(())
}

fn analyze_command(root: &PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    let exclude = [
        config.layout.intermediates_dir.as_str(),
        config.layout.products_dir.as_str(),
    ];
    let scan = discover_snapshots(root, config.timezone.utc_offset_hours, &exclude)?;

    println!("\n=== Snapshot Analysis ===");
    println!("Snapshots found: {}", scan.snapshots.len());
    println!("Excluded (unparseable name): {}", scan.skipped.len());

    if let Some((first_ms, last_ms)) = scan.time_range_ms() {
        let offset = FixedOffset::east_opt(config.timezone.utc_offset_hours * 3600)
            .ok_or_else(|| anyhow::anyhow!("invalid UTC offset"))?;
        println!(
            "Time range: {} .. {}",
            format_instant(first_ms, offset),
            format_instant(last_ms, offset)
        );
    }

    for path in &scan.skipped {
        println!("  excluded: {}", path.display());
    }
    println!("=========================\n");

    Ok(())
}

fn format_instant(ms: i64, offset: FixedOffset) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(instant) => instant.with_timezone(&offset).to_rfc3339(),
        None => format!("{ms} ms"),
    }
}

fn validate_command(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;
    println!("Configuration is valid");
    Ok(())
}

fn generate_config_command(output: PathBuf) -> Result<()> {
    // Generate a commented YAML config
    let yaml = r#"# Add/Drop Conversion Pipeline Configuration

# === LAYOUT: Working directories created under the root data directory ===
# Both trees are deleted and regenerated on every run.
layout:
  intermediates_dir: "intermediates"
  products_dir: "products"

# === PROCESSING ===
processing:
  # Reduce course files in parallel (each course is independent)
  parallel_reduce: true

  # Rayon thread pool size (null = num CPUs)
  # rayon_threads: 8

# === TIMEZONE ===
# Snapshot file names carry wall-clock timestamps with no offset.
# The scraper ran in Hong Kong (UTC+8).
timezone:
  utc_offset_hours: 8
"#;

    std::fs::write(&output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_root_only() {
        // No subcommand - should default to Run
        let cli = Cli::try_parse_from(["addrop", "data"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.root.unwrap(), PathBuf::from("data"));
    }

    #[test]
    fn test_cli_parse_with_subcommand() {
        let cli = Cli::try_parse_from(["addrop", "data", "analyze"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Analyze)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::try_parse_from(["addrop", "data", "-c", "other.yaml"]).unwrap();
        assert_eq!(cli.config.unwrap(), PathBuf::from("other.yaml"));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let cli = Cli::try_parse_from(["addrop"]).unwrap();
        assert!(require_root(cli.root).is_err());
    }

    #[test]
    fn test_sample_config_parses() {
        let yaml = r#"
layout:
  intermediates_dir: "intermediates"
  products_dir: "products"
processing:
  parallel_reduce: true
timezone:
  utc_offset_hours: 8
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.validate().is_ok());
    }
}
