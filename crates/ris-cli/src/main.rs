//! RIS Lab command-line interface.
//!
//! Run experiments from YAML, JSON, or TOML configuration files:
//! ```sh
//! ris-cli run experiment.yaml --mode pattern
//! ris-cli run experiment.yaml --mode link --output runs/link
//! ris-cli validate experiment.yaml reference.csv
//! ris-cli hash experiment.yaml
//! ```

mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use runner::RunMode;

#[derive(Parser)]
#[command(name = "ris-cli")]
#[command(about = "RIS Lab: phase-profile synthesis and pattern validation for reconfigurable surfaces")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a phase profile and evaluate its pattern or link gain.
    Run {
        /// Path to the experiment configuration file.
        config: PathBuf,
        /// Receive sweep or single-angle link evaluation.
        #[arg(short, long, value_enum, default_value = "pattern")]
        mode: RunMode,
        /// Output directory (overrides `output.base_dir`/`output.run_id`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare the simulated pattern against a reference pattern file.
    Validate {
        /// Path to the experiment configuration file.
        config: PathBuf,
        /// Reference pattern (.csv, .npz, or .mat).
        reference: PathBuf,
        /// Output directory (overrides `output.base_dir`/`output.run_id`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the SHA-256 hash of the resolved configuration.
    Hash {
        /// Path to the experiment configuration file.
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, mode, output } => {
            println!("RIS Lab");
            println!("=======");
            println!("Configuration: {}", config.display());
            let out_dir = runner::run(&config, mode, output.as_deref())?;
            println!("Run complete: {}", out_dir.display());
            Ok(())
        }
        Commands::Validate { config, reference, output } => {
            println!("RIS Lab validation");
            println!("==================");
            println!("Configuration: {}", config.display());
            println!("Reference:     {}", reference.display());
            let (out_dir, passed) = runner::validate(&config, &reference, output.as_deref())?;
            println!("Validation {}: {}", if passed { "PASSED" } else { "FAILED" }, out_dir.display());
            Ok(())
        }
        Commands::Hash { config } => {
            let resolved = ris_core::load_config(&config)?;
            println!("{}", ris_core::config_hash(&resolved)?);
            Ok(())
        }
    }
}
