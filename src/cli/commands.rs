//! CLI commands for the engine
//!
//! Implements all command handlers for the CLI interface.

use crate::consensus::{ChainState, ConsensusEngine, EngineConfig, EngineError};
use crate::core::Transaction;
use crate::crypto::KeyPair;
use crate::mining::EmptyBlockPolicy;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Flags accepted by `run`
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub interval_ms: Option<u64>,
    pub max_block_txs: Option<usize>,
    pub transactions: usize,
    pub duration_secs: u64,
    pub produce_empty: bool,
    pub dump: bool,
}

impl RunOptions {
    /// Load the config file, if any, and apply flag overrides on top
    pub fn engine_config(&self) -> CliResult<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };

        if let Some(interval) = self.interval_ms {
            config.block_interval_ms = interval;
        }
        if let Some(max) = self.max_block_txs {
            config.max_block_transactions = max;
        }
        if self.produce_empty {
            config.empty_blocks = EmptyBlockPolicy::Produce;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Print a key pair and its address
pub fn cmd_keygen(private_key: Option<&str>) -> CliResult<()> {
    let keypair = match private_key {
        Some(hex_key) => KeyPair::from_private_key_hex(hex_key)?,
        None => KeyPair::generate(),
    };

    println!("🔐 Key pair");
    println!("   📍 Address: {}", keypair.address());
    println!("   🔑 Public Key: {}", keypair.public_key_hex());
    println!("   🗝️  Private Key: {}", keypair.private_key_hex());
    println!("\n   ⚠️  Keep the private key secret!");

    Ok(())
}

/// Print the default configuration
pub fn cmd_config() -> CliResult<()> {
    println!("{}", EngineConfig::default().to_json()?);
    Ok(())
}

/// Run an engine against generated demo traffic
pub async fn cmd_run(options: &RunOptions) -> CliResult<()> {
    let config = options.engine_config()?;
    let state = Arc::new(ChainState::new(&config));
    let mut engine = ConsensusEngine::new(state.clone(), &config)?;

    println!("🚀 Starting engine");
    println!("   ├─ Block interval: {}ms", config.block_interval_ms);
    println!("   ├─ Max transactions per block: {}", config.max_block_transactions);
    println!("   ├─ Empty blocks: {:?}", config.empty_blocks);
    println!("   └─ Duration: {}s", options.duration_secs);

    let mut blocks = state.subscribe();
    let reporter = tokio::spawn(async move {
        loop {
            match blocks.recv().await {
                Ok(block) => println!(
                    "   🧱 Block {}... ({} transactions)",
                    &block.hash[..16],
                    block.tx_count()
                ),
                Err(RecvError::Lagged(missed)) => log::warn!("Missed {} block notices", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    engine.start()?;

    let submitter = tokio::spawn(submit_demo_traffic(state.clone(), options.transactions));

    tokio::time::sleep(Duration::from_secs(options.duration_secs)).await;
    submitter.abort();

    match engine.stop(config.stop_timeout()).await {
        Ok(()) => {}
        Err(EngineError::StopTimeout(timeout)) => {
            println!("⚠️  Engine did not stop within {:?}", timeout);
        }
        Err(e) => return Err(e.into()),
    }
    reporter.abort();

    print_summary(&state).await;

    if options.dump {
        println!("{}", serde_json::to_string_pretty(&state.get_chain().await)?);
    }

    Ok(())
}

/// Submit `count` signed transfers between a handful of generated wallets
async fn submit_demo_traffic(state: Arc<ChainState>, count: usize) {
    let wallets: Vec<KeyPair> = (0..4).map(|_| KeyPair::generate()).collect();

    for i in 0..count {
        let (sender, recipient, amount) = {
            let mut rng = rand::thread_rng();
            let from = rng.gen_range(0..wallets.len());
            let to = (from + rng.gen_range(1..wallets.len())) % wallets.len();
            (&wallets[from], &wallets[to], rng.gen_range(1..=100u64))
        };

        let id = format!("tx-{:06}", i);
        let tx = match Transaction::signed(id, recipient.address(), amount, sender) {
            Ok(tx) => tx,
            Err(e) => {
                log::error!("Failed to sign demo transaction: {}", e);
                continue;
            }
        };

        if let Err(e) = state.submit_transaction(tx).await {
            log::warn!("Transaction rejected: {}", e);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn print_summary(state: &ChainState) {
    let chain = state.chain_stats().await;
    let pool = state.mempool_stats().await;

    println!("\n⛓️  Chain");
    println!("   ├─ Height: {}", chain.height);
    println!("   ├─ Total blocks: {}", chain.total_blocks);
    println!("   ├─ Total transactions: {}", chain.total_transactions);
    println!("   └─ Head: {}", chain.latest_hash);

    println!("\n📋 Mempool");
    println!("   ├─ Pending: {}", pool.tx_count);
    println!("   └─ Pending amount: {}", pool.total_amount);
}
