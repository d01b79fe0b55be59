use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{Block, Blockchain};
use crate::registry::entity::{EntityKind, EntityStatus};

/// Persisted state of one ledger entity and its chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub parent_id: Option<String>,
    /// Parent's latest hash captured when this entity's genesis was mined.
    pub parent_hash: Option<String>,
    /// Fixed when the genesis block is mined.
    pub difficulty: usize,
    pub status: EntityStatus,
    pub chain: Vec<Block>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn new(
        id: String,
        kind: EntityKind,
        name: String,
        parent_id: Option<String>,
        parent_hash: Option<String>,
        difficulty: usize,
        chain: Vec<Block>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            name,
            parent_id,
            parent_hash,
            difficulty,
            status: EntityStatus::Active,
            chain,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn chain_name(&self) -> String {
        self.kind.chain_name(&self.id)
    }

    pub fn chain_length(&self) -> usize {
        self.chain.len()
    }

    pub fn genesis(&self) -> Option<&Block> {
        self.chain.first()
    }

    pub fn is_deleted(&self) -> bool {
        self.status == EntityStatus::Deleted
    }

    /// Chain handle at the difficulty this entity was created with
    pub fn into_chain(self) -> Blockchain {
        let name = self.chain_name();
        Blockchain::from_records(name, self.difficulty, self.chain)
    }
}
