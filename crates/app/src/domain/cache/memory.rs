//! In-memory cart cache.

use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use crate::domain::{
    cache::{CacheEntry, CacheError, CartCache},
    carts::models::Owner,
};

/// Process-local cache honouring entry TTLs.
#[derive(Debug, Default)]
pub struct MemoryCartCache {
    entries: Mutex<FxHashMap<Owner, CacheEntry>>,
}

impl MemoryCartCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartCache for MemoryCartCache {
    async fn get(&self, owner: &Owner) -> Result<Option<CacheEntry>, CacheError> {
        let mut entries = self.entries.lock().await;

        match entries.get(owner) {
            Some(entry) if entry.is_fresh(Timestamp::now()) => Ok(Some(entry.clone())),
            Some(_) => {
                entries.remove(owner);

                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, owner: &Owner, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries
            .lock()
            .await
            .insert(owner.clone(), entry.clone());

        Ok(())
    }

    async fn invalidate(&self, owner: &Owner) -> Result<(), CacheError> {
        self.entries.lock().await.remove(owner);

        Ok(())
    }
}
