//! Per-entity write exclusion
//!
//! Appends to one entity's chain are a load, mine, persist cycle. Holding
//! the entity's lock across the whole cycle keeps two writers in this
//! process from mining on the same tip. An entry lives only while some
//! writer holds or waits for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Debug, Default)]
pub struct EntityLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Exclusive access to one entity, released on drop
#[derive(Debug)]
pub struct EntityGuard {
    entity_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Mutex<LockMap>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `entity_id`
    pub async fn acquire(&self, entity_id: &str) -> EntityGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(entity_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        EntityGuard {
            entity_id: entity_id.to_string(),
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    /// Entities currently held or awaited
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        // Release first so the guard's own handle no longer counts.
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(&self.entity_id) {
            // Clones only happen under the map lock, so 1 means nobody waits.
            if Arc::strong_count(lock) == 1 {
                locks.remove(&self.entity_id);
            }
        }
    }
}
