//! Chain Service
//!
//! Creates root and child chains, appends event blocks and rebuilds
//! chains from the record store. Mining runs on the blocking pool under
//! the configured budget; appends are serialized per entity.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chain::{Block, Blockchain, CancelFlag, MiningBudget, ROOT_SENTINEL};
use crate::database::models::EntityRecord;
use crate::database::ChainStore;
use crate::error::{LedgerError, Result};
use crate::registry::entity::{
    genesis_transaction, AttendanceEntry, AttendanceRecord, AttendanceStatus, EntityKind,
    EventKind,
};
use crate::registry::locks::EntityLocks;

#[derive(Debug, Clone)]
pub struct ChainService<S: ChainStore> {
    store: S,
    difficulty: usize,
    budget: MiningBudget,
    locks: Arc<EntityLocks>,
}

impl<S: ChainStore> ChainService<S> {
    pub fn new(store: S, difficulty: usize, budget: MiningBudget) -> Self {
        Self {
            store,
            difficulty,
            budget,
            locks: Arc::new(EntityLocks::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Flag that aborts in-flight and future mining until reset
    pub fn cancel_flag(&self) -> CancelFlag {
        self.budget.cancel.clone()
    }

    pub fn cancel_mining(&self) {
        warn!("Mining cancellation requested");
        self.budget.cancel.cancel();
    }

    /// Rebuild a chain handle from a persisted entity without re-mining.
    ///
    /// The chain keeps the difficulty stored with the entity; the service's
    /// own difficulty only applies to chains it creates.
    pub fn reconstruct_chain(&self, record: EntityRecord) -> Blockchain {
        if record.difficulty != self.difficulty {
            debug!(
                "{} was mined at difficulty {}, service creates at {}",
                record.chain_name(),
                record.difficulty,
                self.difficulty
            );
        }
        record.into_chain()
    }

    /// Create a department chain whose genesis links to the root sentinel
    pub async fn create_root_chain(
        &self,
        entity_id: &str,
        name: &str,
        payload: Value,
    ) -> Result<Blockchain> {
        let record = self
            .create_entity(entity_id, EntityKind::Department, name, payload, None)
            .await?;
        Ok(self.reconstruct_chain(record))
    }

    /// Create a chain whose genesis links to the parent's latest hash
    pub async fn create_child_chain(
        &self,
        entity_id: &str,
        name: &str,
        payload: Value,
        parent_entity_id: &str,
        parent_kind: EntityKind,
    ) -> Result<Blockchain> {
        let record = self
            .create_entity_under(entity_id, name, payload, parent_entity_id, parent_kind)
            .await?;
        Ok(self.reconstruct_chain(record))
    }

    /// Append an event block to an entity's own chain
    pub async fn append_event(&self, entity_id: &str, kind: EventKind, payload: Value) -> Result<Block> {
        let _guard = self.locks.acquire(entity_id).await;

        let entity = self
            .store
            .get_entity(entity_id)
            .await?
            .ok_or_else(|| LedgerError::entity_not_found(entity_id))?;

        if entity.is_deleted() {
            return Err(LedgerError::EntityDeleted(entity_id.to_string()));
        }

        let transactions = kind.transaction(entity.kind, payload)?;
        let expected_length = entity.chain_length();
        let chain = self.reconstruct_chain(entity);

        let (chain, block) = self.mine_next(chain, transactions).await?;
        self.store
            .put_chain(entity_id, expected_length, chain.blocks(), kind.resulting_status())
            .await?;

        info!(
            "Appended {} block #{} to {} ({})",
            kind,
            block.index,
            chain.name(),
            block.hash
        );
        Ok(block)
    }

    pub async fn create_department(&self, name: &str, payload: Value) -> Result<EntityRecord> {
        let id = Uuid::new_v4().to_string();
        self.create_entity(&id, EntityKind::Department, name, payload, None)
            .await
    }

    pub async fn create_class(
        &self,
        department_id: &str,
        name: &str,
        payload: Value,
    ) -> Result<EntityRecord> {
        let id = Uuid::new_v4().to_string();
        self.create_entity_under(&id, name, payload, department_id, EntityKind::Department)
            .await
    }

    pub async fn create_student(
        &self,
        class_id: &str,
        name: &str,
        payload: Value,
    ) -> Result<EntityRecord> {
        let id = Uuid::new_v4().to_string();
        self.create_entity_under(&id, name, payload, class_id, EntityKind::Class)
            .await
    }

    /// Append an attendance block, stamping it with the student's place in the hierarchy
    pub async fn record_attendance(
        &self,
        student_id: &str,
        status: AttendanceStatus,
        date: Option<String>,
    ) -> Result<Block> {
        let student = self.load_entity(student_id, EntityKind::Student).await?;

        let department_id = match &student.parent_id {
            Some(class_id) => self
                .store
                .get_entity(class_id)
                .await?
                .and_then(|class| class.parent_id),
            None => None,
        };

        let roll_number = student
            .genesis()
            .and_then(|genesis| genesis.transactions.get("student"))
            .and_then(|profile| profile.get("roll_number"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let record = AttendanceRecord {
            status,
            date: date.unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string()),
            student_name: student.name,
            roll_number,
            class_id: student.parent_id,
            department_id,
        };

        self.append_event(student_id, EventKind::Attendance, serde_json::to_value(&record)?)
            .await
    }

    pub async fn update_entity(&self, entity_id: &str, data: Value) -> Result<Block> {
        self.append_event(entity_id, EventKind::Update, data).await
    }

    /// Soft delete: appends the terminal block and closes the chain
    pub async fn delete_entity(&self, entity_id: &str) -> Result<Block> {
        self.append_event(entity_id, EventKind::Delete, json!({})).await
    }

    /// Load and reconstruct the chain of any entity
    pub async fn load_chain(&self, entity_id: &str) -> Result<Blockchain> {
        let entity = self
            .store
            .get_entity(entity_id)
            .await?
            .ok_or_else(|| LedgerError::entity_not_found(entity_id))?;
        Ok(self.reconstruct_chain(entity))
    }

    /// Attendance blocks of a student chain, oldest first
    pub async fn attendance_history(&self, student_id: &str) -> Result<Vec<AttendanceEntry>> {
        let student = self.load_entity(student_id, EntityKind::Student).await?;
        let chain = self.reconstruct_chain(student);

        let history = chain
            .blocks_of_type("attendance")
            .map(|block| {
                let attendance = block.transactions.get("attendance");
                AttendanceEntry {
                    block_index: block.index,
                    timestamp: block.timestamp.clone(),
                    status: attendance
                        .and_then(|a| a.get("status"))
                        .and_then(|s| serde_json::from_value(s.clone()).ok()),
                    date: attendance
                        .and_then(|a| a.get("date"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    hash: block.hash.clone(),
                    prev_hash: block.prev_hash.clone(),
                    nonce: block.nonce,
                }
            })
            .collect();

        Ok(history)
    }

    async fn create_entity_under(
        &self,
        entity_id: &str,
        name: &str,
        payload: Value,
        parent_entity_id: &str,
        parent_kind: EntityKind,
    ) -> Result<EntityRecord> {
        let kind = parent_kind.child_kind().ok_or_else(|| {
            LedgerError::InvalidEvent(format!("{} chains cannot have children", parent_kind))
        })?;

        let parent = match self.load_entity(parent_entity_id, parent_kind).await {
            Err(LedgerError::NotFound(_)) => {
                return Err(LedgerError::parent_not_found(parent_entity_id))
            }
            other => other?,
        };
        if parent.is_deleted() {
            return Err(LedgerError::EntityDeleted(parent_entity_id.to_string()));
        }

        self.create_entity(entity_id, kind, name, payload, Some(parent))
            .await
    }

    async fn create_entity(
        &self,
        entity_id: &str,
        kind: EntityKind,
        name: &str,
        payload: Value,
        parent: Option<EntityRecord>,
    ) -> Result<EntityRecord> {
        let (parent_id, parent_hash, parent_chain) = match parent {
            Some(parent) => {
                let parent_id = parent.id.clone();
                let parent_chain = self.reconstruct_chain(parent);
                let captured = parent_chain.latest()?.hash.clone();
                (
                    Some(parent_id),
                    Some(captured),
                    Some(parent_chain.name().to_string()),
                )
            }
            None => (None, None, None),
        };

        let transactions = genesis_transaction(kind, payload, parent_chain);
        let link = parent_hash.clone().unwrap_or_else(|| ROOT_SENTINEL.to_string());
        let chain = self
            .mine_genesis(kind.chain_name(entity_id), link, transactions)
            .await?;
        let genesis_hash = chain.latest()?.hash.clone();

        let record = EntityRecord::new(
            entity_id.to_string(),
            kind,
            name.to_string(),
            parent_id,
            parent_hash,
            self.difficulty,
            chain.into_records(),
        );
        self.store.insert_entity(&record).await?;

        info!(
            "Created {} chain for {} '{}' (genesis {})",
            record.chain_name(),
            kind,
            record.name,
            genesis_hash
        );
        Ok(record)
    }

    async fn load_entity(&self, entity_id: &str, kind: EntityKind) -> Result<EntityRecord> {
        match self.store.get_entity(entity_id).await? {
            Some(entity) if entity.kind == kind => Ok(entity),
            Some(entity) => {
                debug!("{} is a {}, not a {}", entity_id, entity.kind, kind);
                Err(LedgerError::NotFound(format!("{} {}", kind, entity_id)))
            }
            None => Err(LedgerError::entity_not_found(entity_id)),
        }
    }

    async fn mine_genesis(
        &self,
        name: String,
        parent_hash: String,
        transactions: Value,
    ) -> Result<Blockchain> {
        let difficulty = self.difficulty;
        let budget = self.budget.clone();

        tokio::task::spawn_blocking(move || {
            let mut chain = Blockchain::new(name, difficulty);
            chain.create_genesis(&parent_hash, transactions, &budget)?;
            Ok(chain)
        })
        .await
        .map_err(|e| LedgerError::WorkerFailed(e.to_string()))?
    }

    async fn mine_next(&self, mut chain: Blockchain, transactions: Value) -> Result<(Blockchain, Block)> {
        let budget = self.budget.clone();

        tokio::task::spawn_blocking(move || {
            let block = chain.add_block(transactions, &budget)?.clone();
            Ok((chain, block))
        })
        .await
        .map_err(|e| LedgerError::WorkerFailed(e.to_string()))?
    }
}
