//! Session-scoped read-through cache over the candidate population.
//!
//! Ranking reads from this cache; refinements write straight to the
//! repository, so a refinement is not guaranteed visible to same-session
//! ranking until the cache is invalidated. That staleness is a documented
//! contract, and the invalidation hook makes a forced refresh explicit
//! rather than tied to process lifetime.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{CandidateFilter, KnowledgeRepository};
use crate::model::ProcessKnowledgeItem;

#[derive(Debug, Default)]
struct CacheState {
    items: Option<Vec<ProcessKnowledgeItem>>,
    loaded_at: Option<DateTime<Utc>>,
}

/// Read-through cache of rankable candidates.
#[derive(Debug, Default)]
pub struct ItemCache {
    state: RwLock<CacheState>,
}

impl ItemCache {
    /// Create an empty cache; the first read populates it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached candidate snapshot, loading it from the repository
    /// on first use.
    ///
    /// A repository failure resolves to an empty snapshot (fail open): the
    /// caller's action must never be blocked by this subsystem. The failed
    /// load is not cached, so the next call retries.
    pub async fn get_or_load(&self, repo: &dyn KnowledgeRepository) -> Vec<ProcessKnowledgeItem> {
        {
            let state = self.state.read().await;
            if let Some(items) = &state.items {
                return items.clone();
            }
        }

        match repo.list_candidates(&CandidateFilter::rankable()).await {
            Ok(items) => {
                let mut state = self.state.write().await;
                debug!(count = items.len(), "Loaded candidate population into session cache");
                state.items = Some(items.clone());
                state.loaded_at = Some(Utc::now());
                items
            }
            Err(e) => {
                warn!(error = %e, "Candidate load failed, treating as empty population");
                Vec::new()
            }
        }
    }

    /// Drop the cached snapshot; the next read reloads from the repository.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.items = None;
        state.loaded_at = None;
        debug!("Session cache invalidated");
    }

    /// When the current snapshot was loaded, if one exists.
    pub async fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.loaded_at
    }
}
