//! CLI Entry Point for autosweep
//!
//! Run a recipe against a device:
//! ```bash
//! autosweep run recipe.json --serial SN-001 --part R-10
//! ```
//!
//! Write a starter recipe:
//! ```bash
//! autosweep new-recipe recipe.json
//! ```

use anyhow::{Context, Result};
use autosweep::config::{AppConfig, DEFAULT_CONFIG_FILE};
use autosweep::metadata::DUTInfoBuilder;
use autosweep::registry::TestRegistry;
use autosweep::{logging, Recipe, TestExec};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autosweep")]
#[command(about = "Test automation for hardware characterization", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every test of a recipe against one device
    Run {
        /// Path to the recipe JSON file
        recipe: PathBuf,

        /// Device serial number
        #[arg(long)]
        serial: String,

        /// Device part number
        #[arg(long, default_value = "")]
        part: String,

        /// Override the output directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override the virtual acquisition delay in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Write a starter recipe using the virtual test
    NewRecipe {
        /// Where to write the recipe
        path: PathBuf,
    },

    /// List registered test names
    ListTests,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Run {
            recipe,
            serial,
            part,
            output,
            delay_ms,
        } => {
            if let Some(output) = output {
                config.storage.output_dir = output;
            }
            if let Some(delay_ms) = delay_ms {
                config.execution.acquire_delay_ms = delay_ms;
            }
            run_recipe(&config, recipe, &serial, &part).await
        }
        Commands::NewRecipe { path } => new_recipe(path),
        Commands::ListTests => {
            for name in TestRegistry::with_builtin().names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

async fn run_recipe(config: &AppConfig, recipe_path: PathBuf, serial: &str, part: &str) -> Result<()> {
    let recipe = Recipe::from_json(&recipe_path)
        .with_context(|| format!("Failed to read recipe {}", recipe_path.display()))?;
    let dut = DUTInfoBuilder::new()
        .serial_number(serial)
        .part_number(part)
        .build();

    let exec = TestExec::from_config(config);
    let summary = exec.run(&recipe, &dut).await.context("Run failed")?;

    println!("Run {} complete", summary.run_id);
    println!("   Tests:   {}", summary.tests_run);
    println!("   Specs:   {}", summary.spec_count);
    println!("   Results: {}", summary.results_path.display());
    println!("   Report:  {}", summary.report_path.display());
    Ok(())
}

fn new_recipe(path: PathBuf) -> Result<()> {
    let mut map = serde_json::Map::new();
    map.insert("name".to_string(), json!("Virtual IV characterization"));
    map.insert("tests".to_string(), json!([["virtual", "IV sweep"]]));
    let recipe = Recipe::from_dict(map);
    recipe
        .to_json(&path)
        .with_context(|| format!("Failed to write recipe {}", path.display()))?;
    println!("Recipe written to {}", path.display());
    Ok(())
}
