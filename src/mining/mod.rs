//! Transaction pooling and block assembly

pub mod assembler;
pub mod mempool;

pub use assembler::{AssemblyStats, BlockAssembler, EmptyBlockPolicy, DEFAULT_MAX_BLOCK_TXS};
pub use mempool::{Mempool, MempoolEntry, MempoolError, MempoolStats, DEFAULT_MEMPOOL_SIZE};
