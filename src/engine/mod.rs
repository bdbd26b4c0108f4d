//! The procedural memory engine facade.
//!
//! Wires the ranking path (cache → trigger matching → weighted ranking) and
//! the learning path (outcome classification → confidence refinement →
//! lifecycle transition → persistence) behind one object the host calls.
//!
//! ```text
//! QueryContext ──▶ rank() ──────────────▶ guidance (top-K)
//!
//! interaction ──▶ detect_outcomes() ──▶ record_outcome() per item
//!                                           │
//!                               refine ▶ lifecycle ▶ save (CAS + retry)
//! ```
//!
//! The ranking path never raises and never blocks on a failing repository;
//! the learning path serializes per-item updates through versioned saves so
//! concurrent refinements cannot silently lose counter increments.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::calibration::{self, CalibrationReport};
use crate::config::EngineConfig;
use crate::detector::{self, OutcomeClassifier, PatternClassifier, SurfacedItem};
use crate::error::{EngineError, EngineResult, StoreError};
use crate::lifecycle::LifecycleManager;
use crate::matching::QueryContext;
use crate::model::{ItemStatus, OutcomeKind, ProcessKnowledgeItem};
use crate::ranking::{Ranker, RelevanceResult};
use crate::store::{CandidateFilter, ItemCache, KnowledgeRepository};

/// Counters describing what the engine has done so far.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Ranking queries served.
    pub rank_calls: u64,
    /// Results returned across all ranking queries.
    pub items_surfaced: u64,
    /// Outcome refinements applied.
    pub refinements: u64,
    /// Items deprecated automatically by the lifecycle rules.
    pub auto_deprecations: u64,
    /// When the last refinement was applied.
    pub last_refined_at: Option<DateTime<Utc>>,
}

/// Procedural memory engine.
pub struct ProceduralMemory {
    repo: Arc<dyn KnowledgeRepository>,
    cache: ItemCache,
    ranker: Ranker,
    lifecycle: LifecycleManager,
    classifier: Box<dyn OutcomeClassifier>,
    max_update_retries: u32,
    stats: RwLock<EngineStats>,
}

impl ProceduralMemory {
    /// Create an engine over a repository.
    pub fn new(repo: Arc<dyn KnowledgeRepository>, config: EngineConfig) -> Self {
        Self {
            repo,
            cache: ItemCache::new(),
            ranker: Ranker::new(config.ranking.clone()),
            lifecycle: LifecycleManager::new(config.deprecation.clone()),
            classifier: Box::new(PatternClassifier::new()),
            max_update_retries: config.refinement.max_update_retries,
            stats: RwLock::new(EngineStats::default()),
        }
    }

    /// Swap the outcome classifier for a custom implementation.
    pub fn with_classifier(mut self, classifier: Box<dyn OutcomeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    // ========================================================================
    // Ranking path
    // ========================================================================

    /// Rank the candidate population against an action context.
    ///
    /// Synchronous with respect to the caller's action: reads only the
    /// session cache, never raises, and returns an empty list both when
    /// nothing is relevant and when the repository is unreachable.
    pub async fn rank(&self, context: &QueryContext) -> Vec<RelevanceResult> {
        let candidates = self.cache.get_or_load(self.repo.as_ref()).await;
        let results = self.ranker.rank(context, &candidates);

        {
            let mut stats = self.stats.write().await;
            stats.rank_calls += 1;
            stats.items_surfaced += results.len() as u64;
        }

        // Injection bookkeeping is best-effort and must never block the
        // caller; a conflict or outage here just loses one counter bump.
        for result in &results {
            if let Err(e) = self
                .update_item(&result.item_id, |item| {
                    item.note_surfaced();
                    Ok(true)
                })
                .await
            {
                debug!(item_id = %result.item_id, error = %e, "Surfacing bookkeeping skipped");
            }
        }

        results
    }

    /// Snapshot the ranked items for later outcome detection.
    pub async fn rank_and_track(
        &self,
        context: &QueryContext,
    ) -> (Vec<RelevanceResult>, Vec<SurfacedItem>) {
        let results = self.rank(context).await;
        let mut surfaced = Vec::with_capacity(results.len());
        for result in &results {
            match self.repo.get(&result.item_id).await {
                Ok(Some(item)) => surfaced.push(SurfacedItem::from(&item)),
                Ok(None) => {}
                Err(e) => {
                    debug!(item_id = %result.item_id, error = %e, "Skipping surfaced snapshot")
                }
            }
        }
        (results, surfaced)
    }

    // ========================================================================
    // Learning path
    // ========================================================================

    /// Persist a new item built by the extraction path.
    pub async fn learn(&self, item: ProcessKnowledgeItem) -> EngineResult<String> {
        item.validate()?;
        let id = item.id.clone();
        self.repo.save(&item).await?;
        self.cache.invalidate().await;
        info!(
            item_id = %id,
            confidence = item.confidence,
            status = %item.status,
            source = %item.source,
            "Learned new item"
        );
        Ok(id)
    }

    /// Apply one classified outcome to an item.
    ///
    /// Refines confidence, updates counters and history, and runs the
    /// automatic deprecation check, all inside a versioned save with bounded
    /// retry. Repository faults degrade to a logged no-op: nothing is
    /// corrupted and the caller is never blocked.
    pub async fn record_outcome(&self, item_id: &str, outcome: OutcomeKind) -> EngineResult<()> {
        let lifecycle = self.lifecycle.clone();
        let mut auto_deprecated = false;
        let updated = self
            .update_item(item_id, |item| {
                if item.status.is_terminal() {
                    return Ok(false);
                }
                let application = lifecycle.apply_outcome(item, outcome);
                auto_deprecated = application.transitioned_to == Some(ItemStatus::Deprecated);
                debug!(
                    item_id = %item.id,
                    outcome = %application.outcome,
                    previous = application.previous_confidence,
                    refined = application.new_confidence,
                    "Refined confidence"
                );
                Ok(true)
            })
            .await;

        match updated {
            Ok(Some(_)) => {
                let mut stats = self.stats.write().await;
                stats.refinements += 1;
                stats.last_refined_at = Some(Utc::now());
                if auto_deprecated {
                    stats.auto_deprecations += 1;
                }
                Ok(())
            }
            Ok(None) => Ok(()),
            // Fail closed: the refinement becomes a no-op rather than a
            // propagated failure or a partial write.
            Err(e) => {
                warn!(item_id = %item_id, outcome = %outcome, error = %e, "Refinement skipped");
                Ok(())
            }
        }
    }

    /// Classify every surfaced item against the interaction text that
    /// followed it, then record each outcome.
    pub async fn detect_outcomes(
        &self,
        surfaced: &[SurfacedItem],
        interaction: &str,
    ) -> HashMap<String, OutcomeKind> {
        let outcomes = detector::detect_outcomes(self.classifier.as_ref(), surfaced, interaction);
        for (item_id, outcome) in &outcomes {
            // record_outcome isolates its own faults; one bad item must not
            // stop the rest of the batch.
            let _ = self.record_outcome(item_id, *outcome).await;
        }
        outcomes
    }

    // ========================================================================
    // Human lifecycle actions
    // ========================================================================

    /// Explicit validation; promotes to active once confidence clears the
    /// item's activation threshold.
    pub async fn validate(&self, item_id: &str) -> EngineResult<ItemStatus> {
        let lifecycle = self.lifecycle.clone();
        let updated = self
            .update_item(item_id, |item| {
                lifecycle.validate(item)?;
                Ok(true)
            })
            .await?;
        self.cache.invalidate().await;
        match updated {
            Some(item) => Ok(item.status),
            None => Err(EngineError::Internal {
                message: format!("validate produced no update for {}", item_id),
            }),
        }
    }

    /// Explicit contradiction with a reason; a second contradiction
    /// deprecates the item automatically.
    pub async fn contradict(&self, item_id: &str, reason: &str) -> EngineResult<()> {
        let lifecycle = self.lifecycle.clone();
        let reason = reason.to_string();
        self.update_item(item_id, |item| {
            lifecycle.contradict(item, &reason)?;
            Ok(true)
        })
        .await?;
        self.cache.invalidate().await;
        Ok(())
    }

    /// Explicit deprecation with a required reason.
    pub async fn deprecate(&self, item_id: &str, reason: &str) -> EngineResult<()> {
        let lifecycle = self.lifecycle.clone();
        let reason = reason.to_string();
        self.update_item(item_id, |item| {
            lifecycle.deprecate(item, &reason)?;
            Ok(true)
        })
        .await?;
        self.cache.invalidate().await;
        Ok(())
    }

    /// Archive an item; terminal and idempotent.
    pub async fn archive(&self, item_id: &str) -> EngineResult<()> {
        let lifecycle = self.lifecycle.clone();
        self.update_item(item_id, |item| {
            if item.status == ItemStatus::Archived {
                return Ok(false);
            }
            lifecycle.archive(item);
            Ok(true)
        })
        .await?;
        self.cache.invalidate().await;
        Ok(())
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Build a calibration report over the current rankable population.
    ///
    /// Runs against the repository directly, independent of the session
    /// cache; an unreachable repository yields a report over an empty
    /// population rather than an error.
    pub async fn calibration_report(&self) -> CalibrationReport {
        let items = match self.repo.list_candidates(&CandidateFilter::rankable()).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Calibration falling back to empty population");
                Vec::new()
            }
        };
        calibration::calibration_report(&items)
    }

    /// Invalidate the session cache; the next ranking call reloads.
    pub async fn refresh(&self) {
        self.cache.invalidate().await;
    }

    /// Engine counters.
    pub async fn stats(&self) -> EngineStats {
        self.stats.read().await.clone()
    }

    // ========================================================================
    // Internal Methods
    // ========================================================================

    /// Read-modify-write one item with compare-and-swap retry.
    ///
    /// The closure may refuse the update by returning `Ok(false)` (e.g. the
    /// item is archived) and may surface lifecycle errors, which propagate
    /// unchanged. Returns the saved item on success, `None` when refused.
    async fn update_item<F>(
        &self,
        item_id: &str,
        mut mutate: F,
    ) -> EngineResult<Option<ProcessKnowledgeItem>>
    where
        F: FnMut(&mut ProcessKnowledgeItem) -> EngineResult<bool>,
    {
        let attempts = self.max_update_retries.max(1);
        for attempt in 0..attempts {
            let mut item = self
                .repo
                .get(item_id)
                .await?
                .ok_or_else(|| StoreError::ItemNotFound {
                    item_id: item_id.to_string(),
                })?;

            if !mutate(&mut item)? {
                return Ok(None);
            }

            match self.repo.save_versioned(&item).await {
                Ok(()) => return Ok(Some(item)),
                Err(StoreError::Conflict { .. }) => {
                    debug!(
                        item_id = %item_id,
                        attempt = attempt + 1,
                        "Lost update race, retrying against fresh state"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Conflict {
            item_id: item_id.to_string(),
        }
        .into())
    }
}
