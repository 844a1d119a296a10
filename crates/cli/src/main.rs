//! `cadre` -- CLI entrypoint.

mod config;
mod serve;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::config::ServeConfig;

#[derive(Parser)]
#[command(name = "cadre", about = "Multi-tenant business-process engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP JSON API server.
    Serve {
        /// Path to the serve config (TOML).
        #[arg(long, default_value = "cadre.toml")]
        config: PathBuf,
        /// Override the configured listen port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate a serve config and print what it declares.
    CheckConfig {
        /// Path to the serve config (TOML).
        #[arg(long, default_value = "cadre.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { config, port } => {
            let loaded = match ServeConfig::load(&config) {
                Ok(c) => c,
                Err(err) => {
                    tracing::error!(%err, path = %config.display(), "failed to load config");
                    return ExitCode::FAILURE;
                }
            };
            let port = port.unwrap_or(loaded.port);
            if let Err(err) = serve::start_server(loaded, port).await {
                tracing::error!(%err, "server exited with error");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Commands::CheckConfig { config } => match ServeConfig::load(&config) {
            Ok(loaded) => {
                println!(
                    "ok: port {}, {} principal(s), {} organization(s)",
                    loaded.port,
                    loaded.principals.len(),
                    loaded.organization_count()
                );
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("invalid config {}: {}", config.display(), err);
                ExitCode::FAILURE
            }
        },
    }
}
