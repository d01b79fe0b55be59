//! Hash Chain Core
//!
//! Blocks, per-entity chains and the bounded proof-of-work search that
//! seals every block.

pub mod block;
pub mod blockchain;
pub mod export;
pub mod pow;

pub use block::{Block, ROOT_SENTINEL};
pub use blockchain::{Blockchain, ChainFault, FaultKind};
pub use export::ChainExport;
pub use pow::{CancelFlag, MiningBudget, MiningOutcome, DEFAULT_DIFFICULTY};
