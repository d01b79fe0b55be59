//! Record Store Contract
//!
//! The persistence collaborator behind the chain service and the
//! validation reporter. Implementations hold each entity's chain as an
//! ordered array of block records.

use async_trait::async_trait;

use crate::chain::Block;
use crate::database::models::EntityRecord;
use crate::error::Result;
use crate::registry::entity::{EntityKind, EntityStatus};

#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Persist a newly created entity together with its genesis chain.
    async fn insert_entity(&self, entity: &EntityRecord) -> Result<()>;

    async fn get_entity(&self, id: &str) -> Result<Option<EntityRecord>>;

    /// Ordered block records of an entity, or `NotFound`.
    async fn get_chain(&self, id: &str) -> Result<Vec<Block>>;

    /// Replace an entity's chain if it still has `expected_length` blocks.
    ///
    /// A length mismatch means another writer got there first and yields
    /// `ConcurrentModification`; nothing is written in that case.
    async fn put_chain(
        &self,
        id: &str,
        expected_length: usize,
        chain: &[Block],
        status: EntityStatus,
    ) -> Result<()>;

    /// Direct children of `parent_id`, oldest first.
    async fn children(&self, parent_id: &str) -> Result<Vec<EntityRecord>>;

    /// Every entity of `kind`, oldest first.
    async fn list(&self, kind: EntityKind) -> Result<Vec<EntityRecord>>;
}
