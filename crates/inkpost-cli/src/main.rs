mod commands;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use inkpost_config::{AppConfig, ConfigLoader};
use tracing::info;

#[derive(Parser)]
#[command(name = "inkpost", version, about = "Schema migrations and seed data for the inkpost blog")]
struct Cli {
    /// YAML or TOML config file.
    #[arg(long, env = "INKPOST_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config and INKPOST_DATABASE).
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply, revert or inspect schema migrations.
    Migrate {
        #[arg(long, value_enum, default_value_t = MigrateAction::Up)]
        action: MigrateAction,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Insert or remove sample users and posts.
    Seed {
        #[arg(long, value_enum, default_value_t = SeedAction::Seed)]
        action: SeedAction,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MigrateAction {
    /// Apply all pending migrations.
    Up,
    /// Revert the most recently applied migration.
    Down,
    /// Show applied and pending migrations.
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SeedAction {
    Seed,
    Clear,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path.clone());
    }
    let mut config = loader.load().context("failed to load configuration")?;
    if let Some(path) = cli.database {
        config.database.path = path;
    }
    if cli.log_json {
        config.log.json = true;
    }

    logging::init(&config.log);
    info!("{}", config_source(cli.config.as_deref(), &config));

    let store = commands::open_store(&config.database.path)?;
    match cli.command {
        Command::Migrate { action, json } => commands::migrate(&store, action, json),
        Command::Seed { action } => commands::seed(&store, action, &config),
    }
}

/// One-line summary of where the effective configuration came from.
fn config_source(file: Option<&Path>, config: &AppConfig) -> String {
    let origin = match file {
        Some(path) => format!("config loaded from {}", path.display()),
        None => "no config file, using defaults and environment".to_string(),
    };
    format!(
        "{origin} (env {}, database {})",
        config.app_env,
        config.database.path.display()
    )
}
