//! `pinot`: the command-line front end (spec §6 "CLI surface"). Thin glue
//! over the library: parses arguments, loads configuration, dispatches to a
//! subcommand and maps its outcome to a process exit code.

mod args;
mod commands;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use pinot::config::PinotConfig;

use args::{Cli, Commands};

/// Builds the configuration used for a single CLI invocation: the user's
/// saved config if one exists at the default location, with `--backend`
/// applied on top. The index directory itself always comes from the
/// subcommand's own `db` argument, never from this config.
fn config_for(backend: &str, _db: &Path) -> PinotConfig {
    let default_path = PinotConfig::default().config_dir.join("config.toml");
    let mut config = PinotConfig::load(&default_path).unwrap_or_default();
    config.default_backend = backend.to_string();
    config
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Index(args) => commands::index::run(args).await,
        Commands::Search(args) => commands::search::run(args),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("pinot: {e}");
            ExitCode::FAILURE
        }
    }
}
