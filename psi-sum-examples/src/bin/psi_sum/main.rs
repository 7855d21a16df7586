//! Config-driven PSI-Sum runner.
//!
//! Run the reference dataset:
//! ```bash
//! cargo run --bin psi_sum -- demo
//! ```
//!
//! Write a config file, edit it, and run it:
//! ```bash
//! cargo run --bin psi_sum -- init-config --output psi_sum.toml
//! cargo run --bin psi_sum -- run --config psi_sum.toml --json
//! ```

mod config;

use clap::{Parser, Subcommand};
use config::RunConfig;
use psi_sum_protocol::{ProtocolCoordinator, PsiSumOutput};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "psi_sum")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a two-party private set intersection with sum", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the protocol over the datasets in a config file
    Run {
        /// Path to the TOML config file
        #[arg(long)]
        config: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the protocol over the built-in reference dataset
    Demo {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a commented default config file
    InitConfig {
        /// Output path (prints to stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Printable summary of a run; the sum is rendered in decimal.
#[derive(Serialize)]
struct Report {
    receiver_identifiers: usize,
    sender_records: usize,
    intersection_size: usize,
    intersection_sum: String,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { config, json } => {
            let config = RunConfig::load(&config)?;
            run(&config, json)
        }
        Commands::Demo { json } => run(&RunConfig::demo(), json),
        Commands::InitConfig { output, force } => init_config(output, force),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(config: &RunConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(&config.logging.level);

    let identifiers = config.receiver_identifiers();
    let records = config.sender_records();
    let receiver_identifiers = identifiers.len();
    let sender_records = records.len();
    tracing::info!(receiver_identifiers, sender_records, "starting protocol run");

    let coordinator = ProtocolCoordinator::new(config.protocol.clone())?;
    let output = coordinator.run_datasets(identifiers, records)?;

    let report = report(receiver_identifiers, sender_records, &output);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Receiver identifiers: {}", report.receiver_identifiers);
        println!("Sender records:       {}", report.sender_records);
        println!("Intersection size:    {}", report.intersection_size);
        println!("Intersection sum:     {}", report.intersection_sum);
    }
    Ok(())
}

fn report(receiver_identifiers: usize, sender_records: usize, output: &PsiSumOutput) -> Report {
    Report {
        receiver_identifiers,
        sender_records,
        intersection_size: output.intersection_size,
        intersection_sum: output.intersection_sum.to_str_radix(10),
    }
}

fn init_config(output: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let contents = RunConfig::generate_default_toml();
    match output {
        None => print!("{}", contents),
        Some(path) => {
            if path.exists() && !force {
                return Err(format!(
                    "Config file '{}' already exists (use --force to overwrite)",
                    path.display()
                )
                .into());
            }
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .map_err(|e| format!("Failed to create config directory: {}", e))?;
                }
            }
            fs::write(&path, contents)
                .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
