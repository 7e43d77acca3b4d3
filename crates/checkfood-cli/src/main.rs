//! CheckFood CLI - food recognition and calorie lookup from the terminal

use anyhow::{Context as _, Result};
use checkfood_core::RecognitionConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::lookup::LookupCommand;
use commands::recognize::RecognizeCommand;

#[derive(Parser)]
#[command(
    name = "checkfood",
    version,
    about = "Recognize foods in a meal photo and report their calories",
    after_help = "EXAMPLES:\n  \
                  checkfood recognize lunch.jpg\n  \
                  checkfood recognize --top-k 1 --timeout-ms 5000 lunch.jpg\n  \
                  checkfood lookup 쌀밥\n  \
                  checkfood --config checkfood.yaml status\n\n\
                  Paths can also be set with CHECKFOOD_MODEL_DIR, CHECKFOOD_CONFIG_DIR\n\
                  and CHECKFOOD_NUTRITION_PATH."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize the foods in a photo and print the JSON response
    Recognize(RecognizeCommand),

    /// Look up the calories of a food in the nutrition table
    Lookup(LookupCommand),

    /// Show model backend, label and nutrition table status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = RecognitionConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Recognize(cmd) => cmd.execute(config).await,
        Commands::Lookup(cmd) => cmd.execute(&config),
        Commands::Status => commands::status::print_status(&config),
    }
}
