mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};

use pkgboot_core::{config::DEFAULT_CONFIG_FILE, AppConfig, RunMode};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pkgboot")]
#[command(about = "Bootstrap and inspect an Expeditious game tree")]
struct Cli {
    /// Configuration file layered under PKGBOOT_* environment variables
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Run as a headless dedicated server
    #[arg(long, global = true)]
    dedicated: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the manifest every loaded package would execute
    Plan,
    /// Dry-run the full bootstrap against a recording host
    Boot {
        /// Write the boot report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Scan package content into the registry and print it
    Scan,
    /// Resolve a datablock with its base chain applied
    Datablock {
        /// Script declaring the datablock and its bases
        file: PathBuf,
        /// Datablock name
        name: String,
    },
    /// Print modules in load order
    Modules,
    /// Rescan content whenever it changes on disk
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    let mut config = AppConfig::load_from(&cli.config)?;
    if cli.dedicated {
        config.run_mode = RunMode::Dedicated;
    }

    match cli.command {
        Commands::Plan => commands::plan(config),
        Commands::Boot { report } => commands::boot(config, report),
        Commands::Scan => commands::scan(config),
        Commands::Datablock { file, name } => commands::datablock(&file, &name),
        Commands::Modules => commands::modules(config),
        Commands::Watch => commands::watch(config).await,
    }
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("pkgboot.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries command output
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
