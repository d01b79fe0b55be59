use thiserror::Error;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageError(format!("Database error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Chain {0} has no blocks")]
    EmptyChain(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Mining gave up after {attempts} attempts ({elapsed_ms} ms)")]
    MiningTimeout { attempts: u64, elapsed_ms: u64 },

    #[error("Mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },

    #[error("Invalid difficulty: {0} (a SHA-256 hex digest has 64 digits)")]
    InvalidDifficulty(usize),

    #[error("Chain of {entity_id} changed underneath the writer: expected length {expected}, found {found}")]
    ConcurrentModification {
        entity_id: String,
        expected: usize,
        found: usize,
    },

    #[error("Entity {0} is deleted; its chain is closed")]
    EntityDeleted(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Chain {0} already has a genesis block")]
    ChainAlreadyInitialized(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Mining worker failed: {0}")]
    WorkerFailed(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub fn entity_not_found(id: &str) -> Self {
        Self::NotFound(format!("no persisted chain for entity {}", id))
    }

    pub fn parent_not_found(id: &str) -> Self {
        Self::NotFound(format!("no persisted chain for parent entity {}", id))
    }

    /// True for the outcomes of a bounded mining run.
    pub fn is_mining_abort(&self) -> bool {
        matches!(
            self,
            Self::MiningTimeout { .. } | Self::MiningCancelled { .. }
        )
    }
}
