//! Consensus layer
//!
//! - Configuration (engine parameters)
//! - Shared chain state (chain + pool behind async locks)
//! - Block broadcasting
//! - The consensus loop itself

pub mod broadcast;
pub mod config;
pub mod engine;
pub mod state;

pub use broadcast::{BlockBroadcaster, DEFAULT_BROADCAST_CAPACITY};
pub use config::{ConfigError, EngineConfig};
pub use engine::{run_cycle, ConsensusEngine, CycleOutcome, EngineError, EngineState};
pub use state::ChainState;
