//! Block-Engine CLI Application
//!
//! Runs a local block production engine and offers key and config helpers.

use block_engine::cli::{self, RunOptions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "block-engine")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A single-process block production and validation engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key pair, or show the address of an existing private key
    Keygen {
        /// Hex-encoded private key
        #[arg(short, long)]
        private_key: Option<String>,
    },

    /// Run the engine against generated transactions
    Run {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Block interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Maximum transactions per block
        #[arg(long)]
        max_block_txs: Option<usize>,

        /// Number of demo transactions to submit
        #[arg(short, long, default_value = "50")]
        transactions: usize,

        /// How long to run before stopping
        #[arg(short, long, default_value = "5")]
        duration_secs: u64,

        /// Produce blocks even when the pool is empty
        #[arg(long)]
        produce_empty: bool,

        /// Print the final chain as JSON
        #[arg(long)]
        dump: bool,
    },

    /// Print the default configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { private_key } => {
            cli::cmd_keygen(private_key.as_deref())?;
        }

        Commands::Run {
            config,
            interval_ms,
            max_block_txs,
            transactions,
            duration_secs,
            produce_empty,
            dump,
        } => {
            let options = RunOptions {
                config,
                interval_ms,
                max_block_txs,
                transactions,
                duration_secs,
                produce_empty,
                dump,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_run(&options))?;
        }

        Commands::Config => {
            cli::cmd_config()?;
        }
    }

    Ok(())
}
