//! In-memory repository for tests and embedded hosts.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CandidateFilter, KnowledgeRepository};
use crate::error::{StoreError, StoreResult};
use crate::model::{ItemStatus, ProcessKnowledgeItem};

/// Map-backed repository with the same versioning discipline as the SQLite
/// implementation.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    items: RwLock<HashMap<String, ProcessKnowledgeItem>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository with items, preserving their ids.
    pub async fn seed(&self, items: Vec<ProcessKnowledgeItem>) {
        let mut map = self.items.write().await;
        for item in items {
            map.insert(item.id.clone(), item);
        }
    }

    /// Number of stored items, any status.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether the repository holds no items.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl KnowledgeRepository for MemoryRepository {
    async fn get(&self, id: &str) -> StoreResult<Option<ProcessKnowledgeItem>> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> StoreResult<Vec<ProcessKnowledgeItem>> {
        let map = self.items.read().await;
        let mut items: Vec<ProcessKnowledgeItem> = map
            .values()
            .filter(|item| match item.status {
                ItemStatus::Archived => false,
                ItemStatus::Deprecated => filter.include_deprecated,
                _ => true,
            })
            .cloned()
            .collect();
        // Deterministic order for callers that iterate.
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn save(&self, item: &ProcessKnowledgeItem) -> StoreResult<()> {
        self.items
            .write()
            .await
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn save_versioned(&self, item: &ProcessKnowledgeItem) -> StoreResult<()> {
        let mut map = self.items.write().await;
        match map.get(&item.id) {
            None => Err(StoreError::ItemNotFound {
                item_id: item.id.clone(),
            }),
            Some(stored) if stored.version != item.version => Err(StoreError::Conflict {
                item_id: item.id.clone(),
            }),
            Some(_) => {
                let mut updated = item.clone();
                updated.version += 1;
                map.insert(item.id.clone(), updated);
                Ok(())
            }
        }
    }
}
