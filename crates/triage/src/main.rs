//! Triage - classify reports, plan a response, dispatch actions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod handlers;

use commands::{init_command, profiles_command, run_command, status_command, RunOptions};

/// Triage - report routing on local models
#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "◆ Classify reports, plan a response, dispatch actions")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config
    Init,
    /// Show backend and profile status
    Status,
    /// List configured profiles
    Profiles,
    /// Triage one report
    Run {
        /// Profile to use (defaults to the configured one)
        #[arg(short, long)]
        profile: Option<String>,
        /// Report text
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,
        /// Read the report from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Per-call backend timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            if let Err(e) = init_command().await {
                error!("Init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Status => {
            if let Err(e) = status_command().await {
                error!("Status failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Profiles => {
            if let Err(e) = profiles_command().await {
                error!("Profiles failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Run {
            profile,
            text,
            file,
            json,
            timeout,
        } => {
            let options = RunOptions {
                profile,
                text,
                file,
                json,
                timeout,
            };
            if let Err(e) = run_command(options).await {
                error!("Run failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}
