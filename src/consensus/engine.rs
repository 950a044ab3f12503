//! Consensus loop
//!
//! A background task that periodically assembles a block from the pool,
//! validates it, and either appends it to the chain or returns its
//! transactions to the pool. A failed cycle never ends the loop.

use crate::consensus::config::{ConfigError, EngineConfig};
use crate::consensus::state::ChainState;
use crate::core::{ChainError, ValidationError};
use crate::mining::BlockAssembler;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine is already running")]
    AlreadyRunning,
    #[error("Engine is not running")]
    NotRunning,
    #[error("Consensus loop did not stop within {0:?}")]
    StopTimeout(Duration),
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Lifecycle of the consensus loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    /// Cancellation requested, waiting for the current cycle
    Stopping,
}

/// What a single production cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A block was appended and published
    Committed { hash: String, tx_count: usize },
    /// Nothing to do
    Skipped,
    /// The candidate was discarded and its transactions returned to the pool
    RolledBack { restored: usize },
    /// Cancellation interrupted the cycle; nothing was appended
    Cancelled,
}

/// Transaction ids of the candidate a worker is currently settling
type CandidateSlot = Arc<Mutex<Vec<String>>>;

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    candidate: CandidateSlot,
}

/// Drives block production on top of a shared [`ChainState`]
pub struct ConsensusEngine {
    state: Arc<ChainState>,
    assembler: BlockAssembler,
    block_interval: Duration,
    status: watch::Sender<EngineState>,
    worker: Option<Worker>,
}

impl ConsensusEngine {
    /// Create a stopped engine
    pub fn new(state: Arc<ChainState>, config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let (status, _) = watch::channel(EngineState::Stopped);
        Ok(Self {
            state,
            assembler: BlockAssembler::new(config.max_block_transactions, config.empty_blocks),
            block_interval: config.block_interval(),
            status,
            worker: None,
        })
    }

    pub fn chain_state(&self) -> &Arc<ChainState> {
        &self.state
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        *self.status.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.status.subscribe()
    }

    /// Spawn the consensus loop. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.worker.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let candidate = CandidateSlot::default();
        let handle = tokio::spawn(run_loop(
            self.state.clone(),
            self.assembler.clone(),
            self.block_interval,
            cancel.clone(),
            candidate.clone(),
        ));

        self.worker = Some(Worker {
            cancel,
            handle,
            candidate,
        });
        self.status.send_replace(EngineState::Running);
        info!(
            "Consensus loop started (interval {:?}, max {} txs per block)",
            self.block_interval, self.assembler.max_transactions
        );
        Ok(())
    }

    /// Cancel the loop and wait up to `timeout` for the current cycle.
    ///
    /// On timeout the task is aborted, the transactions of the candidate it
    /// was working on go back to the pool, and [`EngineError::StopTimeout`]
    /// is returned. The engine is `Stopped` either way.
    pub async fn stop(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let Some(Worker {
            cancel,
            mut handle,
            candidate,
        }) = self.worker.take()
        else {
            return Err(EngineError::NotRunning);
        };

        self.status.send_replace(EngineState::Stopping);
        cancel.cancel();

        let result = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Consensus loop failed: {}", e);
                let ids = std::mem::take(&mut *candidate.lock().await);
                self.state.recover_candidate(&ids).await;
                Ok(())
            }
            Err(_) => {
                handle.abort();
                let _ = handle.await;
                let ids = std::mem::take(&mut *candidate.lock().await);
                let restored = self.state.recover_candidate(&ids).await;
                warn!(
                    "Consensus loop aborted after {:?}, {} transactions returned to the pool",
                    timeout, restored
                );
                Err(EngineError::StopTimeout(timeout))
            }
        };

        self.status.send_replace(EngineState::Stopped);
        info!("Consensus loop stopped");
        result
    }

    /// Run one production cycle on the caller's task
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleOutcome, EngineError> {
        cycle(&self.state, &self.assembler, cancel, None).await
    }
}

impl Drop for ConsensusEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for ConsensusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusEngine")
            .field("state", &self.state())
            .field("assembler", &self.assembler)
            .field("block_interval", &self.block_interval)
            .finish_non_exhaustive()
    }
}

async fn run_loop(
    state: Arc<ChainState>,
    assembler: BlockAssembler,
    period: Duration,
    cancel: CancellationToken,
    candidate: CandidateSlot,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            _ = state.pool_ready() => debug!("Pool threshold reached"),
        }

        let outcome = cycle(&state, &assembler, &cancel, Some(&candidate)).await;
        candidate.lock().await.clear();
        match outcome {
            Ok(CycleOutcome::Cancelled) => break,
            Ok(outcome) => debug!("Cycle finished: {:?}", outcome),
            Err(e) => error!("Cycle failed: {}", e),
        }
    }
}

/// Assemble, validate, and commit or roll back one candidate block
pub async fn run_cycle(
    state: &ChainState,
    assembler: &BlockAssembler,
    cancel: &CancellationToken,
) -> Result<CycleOutcome, EngineError> {
    cycle(state, assembler, cancel, None).await
}

async fn cycle(
    state: &ChainState,
    assembler: &BlockAssembler,
    cancel: &CancellationToken,
    candidate: Option<&CandidateSlot>,
) -> Result<CycleOutcome, EngineError> {
    if cancel.is_cancelled() {
        return Ok(CycleOutcome::Cancelled);
    }

    let Some((block, _)) = state.assemble(assembler).await? else {
        return Ok(CycleOutcome::Skipped);
    };
    // No await between draining and recording, so an abort cannot lose ids
    if let Some(mut ids) = candidate.and_then(|slot| slot.try_lock().ok()) {
        *ids = block.transaction_ids();
    }

    let validator = state.validator().clone();
    let candidate = block.clone();
    let token = cancel.clone();
    let verdict =
        tokio::task::spawn_blocking(move || validator.verify_block_cancellable(&candidate, &token))
            .await;

    match verdict {
        Ok(Ok(())) => {}
        Ok(Err(ValidationError::Cancelled)) => {
            let restored = state.rollback_block(&block).await;
            info!("Cycle cancelled, {} transactions returned to the pool", restored);
            return Ok(CycleOutcome::Cancelled);
        }
        Ok(Err(e)) => {
            warn!("Discarding block {}: {}", block.hash, e);
            let restored = state.rollback_block(&block).await;
            if let ValidationError::InvalidTransaction { id, .. } = &e {
                state.evict_transaction(id).await;
                return Ok(CycleOutcome::RolledBack {
                    restored: restored.saturating_sub(1),
                });
            }
            return Ok(CycleOutcome::RolledBack { restored });
        }
        Err(e) => {
            error!("Validation task failed: {}", e);
            let restored = state.rollback_block(&block).await;
            return Ok(CycleOutcome::RolledBack { restored });
        }
    }

    let hash = block.hash.clone();
    let tx_count = block.tx_count();
    match state.commit_block(block.clone()).await {
        Ok(()) => Ok(CycleOutcome::Committed { hash, tx_count }),
        Err(e) => {
            warn!("Could not append block {}: {}", hash, e);
            let restored = state.rollback_block(&block).await;
            if let ChainError::DuplicateTransaction(id) = &e {
                state.evict_transaction(id).await;
                return Ok(CycleOutcome::RolledBack {
                    restored: restored.saturating_sub(1),
                });
            }
            Ok(CycleOutcome::RolledBack { restored })
        }
    }
}
