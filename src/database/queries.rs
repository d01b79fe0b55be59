use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::database::models::EntityRecord;
use crate::error::Result;
use crate::registry::entity::EntityKind;

const ENTITY_COLUMNS: &str = r#"
    id, kind, name, parent_id, parent_hash, difficulty, status, chain, created_at, updated_at
"#;

pub struct Queries;

impl Queries {
    pub async fn get_entity(pool: &SqlitePool, id: &str) -> Result<Option<EntityRecord>> {
        let sql = format!("SELECT {} FROM entities WHERE id = ?", ENTITY_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;

        row.as_ref().map(entity_from_row).transpose()
    }

    pub async fn get_chain_length(pool: &SqlitePool, id: &str) -> Result<Option<usize>> {
        let row = sqlx::query("SELECT chain_length FROM entities WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => {
                let length: i64 = row.try_get("chain_length")?;
                Ok(Some(length as usize))
            }
            None => Ok(None),
        }
    }

    pub async fn get_children(pool: &SqlitePool, parent_id: &str) -> Result<Vec<EntityRecord>> {
        let sql = format!(
            "SELECT {} FROM entities WHERE parent_id = ? ORDER BY created_at, rowid",
            ENTITY_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(parent_id).fetch_all(pool).await?;

        rows.iter().map(entity_from_row).collect()
    }

    pub async fn list_by_kind(pool: &SqlitePool, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        let sql = format!(
            "SELECT {} FROM entities WHERE kind = ? ORDER BY created_at, rowid",
            ENTITY_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(kind.as_str()).fetch_all(pool).await?;

        rows.iter().map(entity_from_row).collect()
    }
}

fn entity_from_row(row: &SqliteRow) -> Result<EntityRecord> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let chain: String = row.try_get("chain")?;
    let difficulty: i64 = row.try_get("difficulty")?;

    Ok(EntityRecord {
        id: row.try_get("id")?,
        kind: kind.parse()?,
        name: row.try_get("name")?,
        parent_id: row.try_get("parent_id")?,
        parent_hash: row.try_get("parent_hash")?,
        difficulty: difficulty as usize,
        status: status.parse()?,
        chain: serde_json::from_str(&chain)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
