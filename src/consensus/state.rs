//! Shared engine state
//!
//! The chain and the transaction pool behind async locks, plus the validator
//! and the block broadcaster. One `ChainState` is shared via `Arc` between the
//! consensus loop and any number of callers.
//!
//! Lock order is always chain, then pool.

use crate::consensus::broadcast::BlockBroadcaster;
use crate::consensus::config::EngineConfig;
use crate::core::{Block, Chain, ChainError, ChainStats, Transaction, Validator};
use crate::mining::{AssemblyStats, BlockAssembler, Mempool, MempoolError, MempoolStats};
use log::{debug, info, warn};
use tokio::sync::{broadcast, Notify, RwLock};

/// Chain, pool, and the services around them
#[derive(Debug)]
pub struct ChainState {
    chain: RwLock<Chain>,
    pool: RwLock<Mempool>,
    validator: Validator,
    broadcaster: BlockBroadcaster,
    pool_ready: Notify,
    pool_threshold: Option<usize>,
}

impl ChainState {
    /// Fresh state holding only the genesis block
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_validator(config, Validator::default())
    }

    /// Fresh state using a custom validator
    pub fn with_validator(config: &EngineConfig, validator: Validator) -> Self {
        Self::from_chain(Chain::new(), config, validator)
    }

    /// Wrap an existing chain
    pub fn from_chain(chain: Chain, config: &EngineConfig, validator: Validator) -> Self {
        Self {
            chain: RwLock::new(chain),
            pool: RwLock::new(Mempool::with_capacity(config.pool_capacity)),
            validator,
            broadcaster: BlockBroadcaster::new(config.broadcast_capacity),
            pool_ready: Notify::new(),
            pool_threshold: config.pool_threshold,
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Validate a transaction and add it to the pool.
    ///
    /// Ids already pending, in flight, or confirmed are rejected, so a
    /// transaction ends up in at most one block. Signatures are checked
    /// before any lock is taken.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<(), MempoolError> {
        self.validator.verify_transaction(&tx)?;

        let chain = self.chain.read().await;
        if chain.contains_transaction(&tx.id) {
            return Err(MempoolError::AlreadyConfirmed(tx.id));
        }

        let mut pool = self.pool.write().await;
        let id = tx.id.clone();
        pool.insert(tx)?;
        let pending = pool.len();
        drop(pool);
        drop(chain);

        debug!("Accepted transaction {} ({} pending)", id, pending);

        if self.pool_threshold.is_some_and(|t| pending >= t) {
            self.pool_ready.notify_one();
        }
        Ok(())
    }

    /// Snapshot of every block, genesis first
    pub async fn get_chain(&self) -> Vec<Block> {
        self.chain.read().await.blocks()
    }

    /// Current head block
    pub async fn get_head(&self) -> Result<Block, ChainError> {
        self.chain.read().await.head().cloned()
    }

    /// Number of pending transactions
    pub async fn get_pool_size(&self) -> usize {
        self.pool.read().await.len()
    }

    pub async fn get_block(&self, index: u64) -> Option<Block> {
        self.chain.read().await.get_block(index).cloned()
    }

    /// Find a confirmed transaction and the height of its block
    pub async fn find_transaction(&self, id: &str) -> Option<(u64, Transaction)> {
        self.chain
            .read()
            .await
            .find_transaction(id)
            .map(|(height, tx)| (height, tx.clone()))
    }

    pub async fn chain_stats(&self) -> ChainStats {
        self.chain.read().await.stats()
    }

    pub async fn mempool_stats(&self) -> MempoolStats {
        self.pool.read().await.stats()
    }

    /// Receive every block appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Block> {
        self.broadcaster.subscribe()
    }

    /// Validate and append a block produced elsewhere.
    ///
    /// Pool entries carried by the block, pending or in flight, are dropped.
    pub async fn append_block(&self, block: Block) -> Result<(), ChainError> {
        self.validator.verify_block(&block)?;

        let mut chain = self.chain.write().await;
        let mut pool = self.pool.write().await;
        let ids = block.transaction_ids();
        chain.append(block.clone())?;
        pool.remove_transactions(&ids);
        drop(pool);
        drop(chain);

        info!("Appended external block {}", block.hash);
        self.broadcaster.publish(block);
        Ok(())
    }

    /// Assemble a candidate on top of the current head. Its transactions are
    /// in flight until [`ChainState::commit_block`] or
    /// [`ChainState::rollback_block`].
    ///
    /// Pending entries that are already confirmed are dropped first.
    pub(crate) async fn assemble(
        &self,
        assembler: &BlockAssembler,
    ) -> Result<Option<(Block, AssemblyStats)>, ChainError> {
        let chain = self.chain.read().await;
        let head = chain.head()?;
        let mut pool = self.pool.write().await;
        let purged = pool.purge(|id| chain.contains_transaction(id));
        if purged > 0 {
            warn!("Dropped {} already confirmed transactions from the pool", purged);
        }
        Ok(assembler.assemble(&mut pool, head))
    }

    /// Append an already validated candidate and settle its transactions.
    /// On failure the transactions stay in flight.
    pub(crate) async fn commit_block(&self, block: Block) -> Result<(), ChainError> {
        let mut chain = self.chain.write().await;
        let mut pool = self.pool.write().await;
        let ids = block.transaction_ids();
        chain.append(block.clone())?;
        pool.commit(&ids);
        let height = chain.len() - 1;
        drop(pool);
        drop(chain);

        info!(
            "Committed block #{} {} ({} transactions)",
            height,
            block.hash,
            ids.len()
        );
        self.broadcaster.publish(block);
        Ok(())
    }

    /// Return a discarded candidate's transactions to the pool
    pub(crate) async fn rollback_block(&self, block: &Block) -> usize {
        let restored = self.pool.write().await.rollback(&block.transaction_ids());
        if restored > 0 {
            debug!("Rolled back {} transactions", restored);
        }
        restored
    }

    /// Settle the candidate of an interrupted cycle: ids that made it into
    /// the chain are forgotten, the rest go back to the pool
    pub(crate) async fn recover_candidate(&self, ids: &[String]) -> usize {
        let chain = self.chain.read().await;
        let mut pool = self.pool.write().await;
        let (confirmed, open): (Vec<String>, Vec<String>) = ids
            .iter()
            .cloned()
            .partition(|id| chain.contains_transaction(id));
        pool.commit(&confirmed);
        let restored = pool.rollback(&open);
        if restored > 0 {
            warn!("Recovered {} in-flight transactions", restored);
        }
        restored
    }

    /// Drop a pending transaction that can never be included
    pub(crate) async fn evict_transaction(&self, id: &str) -> Option<Transaction> {
        let evicted = self.pool.write().await.remove_transaction(id);
        if evicted.is_some() {
            warn!("Evicted transaction {}", id);
        }
        evicted
    }

    /// Resolves once the pool threshold is reached
    pub(crate) async fn pool_ready(&self) {
        self.pool_ready.notified().await
    }
}
