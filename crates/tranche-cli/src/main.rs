//! tranchectl - Tranche Gate operator harness
//!
//! - `check-config`: load, validate and print the gate configuration
//! - `run`: replay a JSON script of operations against in-memory
//!   collaborators and print each outcome plus the audit log

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tranche_gate::GateConfig;

mod script;

use script::{load_script, Harness};

/// Tranche Gate CLI
#[derive(Parser)]
#[command(name = "tranchectl")]
#[command(about = "Tranche Gate operator harness", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level
    #[arg(long, env = "TRANCHE_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "TRANCHE_LOG_JSON", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate configuration, then print it
    CheckConfig {
        /// Configuration file path
        #[arg(short, long, env = "TRANCHE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Replay a scripted sequence of operations
    Run {
        /// JSON script: an array of steps tagged by `op`
        #[arg(short, long)]
        script: PathBuf,

        /// Configuration file path
        #[arg(short, long, env = "TRANCHE_CONFIG")]
        config: Option<PathBuf>,

        /// Stop at the first rejected step
        #[arg(long)]
        fail_fast: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON results.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::CheckConfig { config } => {
            let config = GateConfig::load(config.as_deref()).context("invalid configuration")?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Run {
            script,
            config,
            fail_fast,
        } => {
            let config = GateConfig::load(config.as_deref()).context("invalid configuration")?;
            let steps = load_script(&script)?;
            let harness = Harness::new(config).context("building gate")?;

            tracing::info!(steps = steps.len(), script = %script.display(), "Replaying script");

            let mut rejected = 0usize;
            for (index, step) in steps.iter().enumerate() {
                let outcome = harness.run(index, step);
                println!("{}", serde_json::to_string(&outcome)?);
                if !outcome.is_ok() {
                    rejected += 1;
                    if fail_fast {
                        tracing::warn!(step = index, op = step.name(), "Stopping at first rejection");
                        break;
                    }
                }
            }

            for record in harness.gate().records() {
                println!("{}", serde_json::to_string(&record)?);
            }

            tracing::info!(rejected, "Replay finished");
            if fail_fast && rejected > 0 {
                anyhow::bail!("script stopped after a rejected step");
            }
        }
    }

    Ok(())
}
