//! Knowledge repository boundary.
//!
//! The engine consumes this narrow interface; everything about durable
//! formats, backups, and graph storage lives outside the crate. Two
//! implementations ship here: a SQLite repository for durable hosts and an
//! in-memory repository for tests and embedded use.

mod cache;
mod memory;
mod sqlite;

pub use cache::ItemCache;
pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::ProcessKnowledgeItem;

/// Filter for candidate listing. Archived items are always excluded.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateFilter {
    /// Include deprecated items (audit and lifecycle paths need them;
    /// ranking never does).
    pub include_deprecated: bool,
}

impl CandidateFilter {
    /// Rankable items only: active and needs_validation.
    pub fn rankable() -> Self {
        Self {
            include_deprecated: false,
        }
    }

    /// Everything except archived.
    pub fn with_deprecated() -> Self {
        Self {
            include_deprecated: true,
        }
    }
}

/// Persistence seam for the knowledge item population.
///
/// Writers require per-item atomicity: [`save_versioned`] must only apply
/// when the caller's loaded version is still current, so interleaved
/// refinements cannot silently drop counter increments or confidence
/// multiplications.
///
/// [`save_versioned`]: KnowledgeRepository::save_versioned
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Fetch one item by id.
    async fn get(&self, id: &str) -> StoreResult<Option<ProcessKnowledgeItem>>;

    /// List candidate items per the filter. Never returns archived items.
    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> StoreResult<Vec<ProcessKnowledgeItem>>;

    /// Insert a new item or overwrite unconditionally.
    async fn save(&self, item: &ProcessKnowledgeItem) -> StoreResult<()>;

    /// Compare-and-swap update: applies only if the stored version equals
    /// `item.version`, bumping the stored version by one. Fails with
    /// [`StoreError::Conflict`](crate::error::StoreError::Conflict) when a
    /// concurrent writer got there first.
    async fn save_versioned(&self, item: &ProcessKnowledgeItem) -> StoreResult<()>;
}
