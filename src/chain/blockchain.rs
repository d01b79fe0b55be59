//! Entity Chain
//!
//! An ordered, append-only sequence of mined blocks belonging to one
//! entity, with linkage and proof-of-work verification.

use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::chain::block::Block;
use crate::chain::pow::{self, MiningBudget};
use crate::error::{LedgerError, Result};

/// Append-only chain of blocks for a single entity
#[derive(Debug, Clone)]
pub struct Blockchain {
    name: String,
    difficulty: usize,
    blocks: Vec<Block>,
}

/// Why a chain failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Stored hash differs from the recomputed one.
    HashMismatch,
    /// `prev_hash` does not reference the preceding block.
    BrokenLink,
    /// Hash lacks the required leading zeros.
    InsufficientWork,
}

/// First failing block found by `Blockchain::verify`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainFault {
    pub index: u64,
    pub kind: FaultKind,
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            FaultKind::HashMismatch => "invalid hash",
            FaultKind::BrokenLink => "invalid previous hash",
            FaultKind::InsufficientWork => "invalid proof of work",
        };
        write!(f, "{} at block {}", what, self.index)
    }
}

impl Blockchain {
    /// Create an empty chain; call `create_genesis` before appending
    pub fn new(name: impl Into<String>, difficulty: usize) -> Self {
        Self {
            name: name.into(),
            difficulty,
            blocks: Vec::new(),
        }
    }

    /// Rebuild a chain from persisted records without mining or checking them
    pub fn from_records(name: impl Into<String>, difficulty: usize, records: Vec<Block>) -> Self {
        Self {
            name: name.into(),
            difficulty,
            blocks: records,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn genesis(&self) -> Option<&Block> {
        self.blocks.first()
    }

    /// Mine block 0 linked to `parent_hash` and make it the sole element
    pub fn create_genesis(
        &mut self,
        parent_hash: &str,
        transactions: Value,
        budget: &MiningBudget,
    ) -> Result<&Block> {
        if !self.blocks.is_empty() {
            return Err(LedgerError::ChainAlreadyInitialized(self.name.clone()));
        }

        let mut genesis = Block::new(0, transactions, parent_hash.to_string());
        genesis.mine(self.difficulty, budget)?;
        debug!("Genesis of {} mined: {}", self.name, genesis.hash);

        self.blocks.push(genesis);
        self.latest()
    }

    /// Mine a new block on top of the current tip and append it
    pub fn add_block(&mut self, transactions: Value, budget: &MiningBudget) -> Result<&Block> {
        let prev_hash = self.latest()?.hash.clone();
        let mut block = Block::new(self.blocks.len() as u64, transactions, prev_hash);
        block.mine(self.difficulty, budget)?;

        self.blocks.push(block);
        self.latest()
    }

    pub fn latest(&self) -> Result<&Block> {
        self.blocks
            .last()
            .ok_or_else(|| LedgerError::EmptyChain(self.name.clone()))
    }

    /// Whole-chain check over blocks `1..len`.
    ///
    /// The genesis block is not re-verified here, so a chain holding only
    /// a genesis block is always valid. `verify_genesis` covers block 0.
    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }

    /// Same checks as `is_valid`, reporting the first failing block
    pub fn verify(&self) -> std::result::Result<(), ChainFault> {
        for pair in self.blocks.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);

            let fault = if !current.verify_hash() {
                Some(FaultKind::HashMismatch)
            } else if current.prev_hash != previous.hash {
                Some(FaultKind::BrokenLink)
            } else if !current.meets_difficulty(self.difficulty) {
                Some(FaultKind::InsufficientWork)
            } else {
                None
            };

            if let Some(kind) = fault {
                let fault = ChainFault {
                    index: current.index,
                    kind,
                };
                debug!("Chain {}: {}", self.name, fault);
                return Err(fault);
            }
        }

        Ok(())
    }

    /// Hash and proof-of-work check of block 0 alone
    pub fn verify_genesis(&self) -> std::result::Result<(), ChainFault> {
        let Some(genesis) = self.genesis() else {
            return Ok(());
        };

        if !genesis.verify_hash() {
            return Err(ChainFault {
                index: genesis.index,
                kind: FaultKind::HashMismatch,
            });
        }
        if !pow::meets_difficulty(&genesis.hash, self.difficulty) {
            return Err(ChainFault {
                index: genesis.index,
                kind: FaultKind::InsufficientWork,
            });
        }
        Ok(())
    }

    /// Indices of every block whose stored hash does not recompute
    pub fn tampered_blocks(&self) -> Vec<u64> {
        self.blocks
            .iter()
            .filter(|block| !block.verify_hash())
            .map(|block| block.index)
            .collect()
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.blocks.iter().any(|block| block.hash == hash)
    }

    /// Blocks whose payload carries the given `type` tag
    pub fn blocks_of_type<'a>(&'a self, tx_type: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks
            .iter()
            .filter(move |block| block.transaction_type() == Some(tx_type))
    }

    /// Ordered block records suitable for persisting
    pub fn export_data(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    pub fn into_records(self) -> Vec<Block> {
        self.blocks
    }
}
