// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TeleCoder — a background coding-agent service.
//!
//! Binary entry point: loads configuration and runs the server.

mod serve;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// TeleCoder — a background coding-agent service.
#[derive(Parser, Debug)]
#[command(name = "telecoder", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the TeleCoder server.
    Serve {
        /// Path to a TOML config file (overrides the default lookup).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the registered coding agents.
    Agents,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config = match load(config) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("error: loading configuration: {e}");
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Commands::Agents => {
            for name in telecoder_agent::registry().names() {
                println!("{name}");
            }
            ExitCode::SUCCESS
        }
    }
}

fn load(
    path: Option<PathBuf>,
) -> Result<telecoder_config::TelecoderConfig, telecoder_config::ConfigError> {
    match path {
        Some(path) => telecoder_config::load_config_from_path(&path),
        None => telecoder_config::load_config(),
    }
}
