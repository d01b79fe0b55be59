pub mod models;
pub mod queries;
pub mod schema;
pub mod store;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};

use crate::chain::Block;
use crate::error::{LedgerError, Result};
use crate::registry::entity::{EntityKind, EntityStatus};
use models::EntityRecord;
use queries::Queries;

pub use store::ChainStore;

/// SQLite-backed record store
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let database = Database { pool };
        database.run_migrations().await?;
        info!("Ledger database ready at {}", database_url);
        Ok(database)
    }

    /// Private in-memory database, used by tests and dry runs.
    ///
    /// Each SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let database = Database { pool };
        database.run_migrations().await?;
        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(schema::ENTITIES_SCHEMA)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ChainStore for Database {
    async fn insert_entity(&self, entity: &EntityRecord) -> Result<()> {
        let chain = serde_json::to_string(&entity.chain)?;

        sqlx::query(
            r#"
            INSERT INTO entities
            (id, kind, name, parent_id, parent_hash, difficulty, status, chain, chain_length, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entity.id)
        .bind(entity.kind.as_str())
        .bind(&entity.name)
        .bind(&entity.parent_id)
        .bind(&entity.parent_hash)
        .bind(entity.difficulty as i64)
        .bind(entity.status.as_str())
        .bind(chain)
        .bind(entity.chain.len() as i64)
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            LedgerError::StorageError(format!("Failed to insert {} {}: {}", entity.kind, entity.id, e))
        })?;

        debug!("Inserted {} {} ({} blocks)", entity.kind, entity.id, entity.chain.len());
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Option<EntityRecord>> {
        Queries::get_entity(&self.pool, id).await
    }

    async fn get_chain(&self, id: &str) -> Result<Vec<Block>> {
        match Queries::get_entity(&self.pool, id).await? {
            Some(entity) => Ok(entity.chain),
            None => Err(LedgerError::entity_not_found(id)),
        }
    }

    async fn put_chain(
        &self,
        id: &str,
        expected_length: usize,
        chain: &[Block],
        status: EntityStatus,
    ) -> Result<()> {
        let encoded = serde_json::to_string(chain)?;

        let result = sqlx::query(
            r#"
            UPDATE entities
            SET chain = ?, chain_length = ?, status = ?, updated_at = ?
            WHERE id = ? AND chain_length = ?
            "#,
        )
        .bind(encoded)
        .bind(chain.len() as i64)
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(expected_length as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match Queries::get_chain_length(&self.pool, id).await? {
                Some(found) => Err(LedgerError::ConcurrentModification {
                    entity_id: id.to_string(),
                    expected: expected_length,
                    found,
                }),
                None => Err(LedgerError::entity_not_found(id)),
            };
        }

        debug!("Persisted chain of {} ({} blocks)", id, chain.len());
        Ok(())
    }

    async fn children(&self, parent_id: &str) -> Result<Vec<EntityRecord>> {
        Queries::get_children(&self.pool, parent_id).await
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        Queries::list_by_kind(&self.pool, kind).await
    }
}
