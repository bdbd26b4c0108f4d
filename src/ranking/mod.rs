//! Relevance ranking: trigger scores weighted by priority and confidence,
//! thresholded, deterministically ordered, and bounded to top-K.
//!
//! The ranking path is pure and synchronous; it performs no I/O and never
//! propagates an error to its caller. A malformed candidate is skipped and
//! logged, an oversized population is truncated to the configured scan cap,
//! and nothing here can block the action the caller is about to take.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RankingConfig;
use crate::matching::{self, QueryContext, TriggerScores};
use crate::model::ProcessKnowledgeItem;

/// Weight of the tool-name component in base relevance.
pub const WEIGHT_TOOL: f64 = 0.40;
/// Weight of the file-glob component in base relevance.
pub const WEIGHT_FILE: f64 = 0.40;
/// Weight of the action-keyword component in base relevance.
pub const WEIGHT_KEYWORD: f64 = 0.10;
/// Weight of the context-keyword component in base relevance.
pub const WEIGHT_CONTEXT: f64 = 0.10;

/// One ranked result; ephemeral, produced per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceResult {
    /// Id of the matched item.
    pub item_id: String,
    /// Label snapshot for display without a second lookup.
    pub label: String,
    /// Component trigger scores.
    pub scores: TriggerScores,
    /// Fixed-weight linear combination of the component scores.
    pub base_relevance: f64,
    /// Priority multiplier applied on top of base relevance.
    pub priority_multiplier: f64,
    /// Item confidence at scoring time, applied as a multiplier.
    pub confidence_weight: f64,
    /// `base_relevance * priority_multiplier * confidence_weight`.
    pub final_score: f64,
}

/// Relevance ranker over an in-memory candidate snapshot.
#[derive(Debug, Clone)]
pub struct Ranker {
    config: RankingConfig,
}

impl Ranker {
    /// Create a ranker with the given configuration.
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Rank candidates against a context.
    ///
    /// Returns at most `top_k` results, all at or above the score threshold,
    /// ordered by final score with deterministic tie-breaking (confidence,
    /// then priority, then earliest creation).
    pub fn rank(
        &self,
        context: &QueryContext,
        candidates: &[ProcessKnowledgeItem],
    ) -> Vec<RelevanceResult> {
        let scanned = if candidates.len() > self.config.max_candidates {
            warn!(
                total = candidates.len(),
                cap = self.config.max_candidates,
                "Candidate population exceeds scan cap, narrowing scope"
            );
            &candidates[..self.config.max_candidates]
        } else {
            candidates
        };

        let mut scored: Vec<(&ProcessKnowledgeItem, RelevanceResult)> = Vec::new();
        for item in scanned {
            if !item.status.is_rankable() {
                continue;
            }
            if let Err(e) = item.validate() {
                warn!(item_id = %item.id, error = %e, "Skipping malformed candidate");
                continue;
            }
            let result = score_item(context, item);
            if result.final_score >= self.config.threshold {
                scored.push((item, result));
            }
        }

        scored.sort_by(|(a, ra), (b, rb)| compare_results(ra, rb, a, b));
        scored.truncate(self.config.top_k);

        debug!(
            scanned = scanned.len(),
            returned = scored.len(),
            threshold = self.config.threshold,
            "Ranked candidates"
        );

        scored.into_iter().map(|(_, result)| result).collect()
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(RankingConfig::default())
    }
}

/// Score a single rankable item against a context.
pub fn score_item(context: &QueryContext, item: &ProcessKnowledgeItem) -> RelevanceResult {
    let scores = matching::match_item(&item.triggers, context);
    let base_relevance = WEIGHT_TOOL * scores.tool
        + WEIGHT_FILE * scores.file
        + WEIGHT_KEYWORD * scores.keyword
        + WEIGHT_CONTEXT * scores.context;
    let priority_multiplier = item.priority.multiplier();
    let confidence_weight = item.confidence;
    let final_score = base_relevance * priority_multiplier * confidence_weight;

    RelevanceResult {
        item_id: item.id.clone(),
        label: item.label.clone(),
        scores,
        base_relevance,
        priority_multiplier,
        confidence_weight,
        final_score,
    }
}

fn compare_results(
    a: &RelevanceResult,
    b: &RelevanceResult,
    item_a: &ProcessKnowledgeItem,
    item_b: &ProcessKnowledgeItem,
) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| b.confidence_weight.total_cmp(&a.confidence_weight))
        .then_with(|| item_b.priority.cmp(&item_a.priority))
        .then_with(|| item_a.created_at.cmp(&item_b.created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ItemStatus, KnowledgeSource, Priority, ProcessPayload, TriggerConditions,
    };

    fn item(label: &str, priority: Priority, confidence: f64) -> ProcessKnowledgeItem {
        let mut item = ProcessKnowledgeItem::new(
            label,
            ProcessPayload::Pattern {
                situation: "editing a manifest".to_string(),
                action: "bump the version".to_string(),
                rationale: "releases need distinct versions".to_string(),
            },
            KnowledgeSource::UserCorrection,
            priority,
        );
        item.confidence = confidence;
        item.status = ItemStatus::Active;
        item
    }

    fn matching_triggers() -> TriggerConditions {
        TriggerConditions::new()
            .with_tools(vec!["Write".to_string()])
            .with_file_patterns(vec!["**/plugin.json".to_string()])
    }

    fn context() -> QueryContext {
        QueryContext::new()
            .with_tool("Write")
            .with_file_path("/x/plugin.json")
    }

    #[test]
    fn test_neutral_item_scores_half_base() {
        let item = item("neutral", Priority::Medium, 0.90);
        let result = score_item(&context(), &item);
        assert!((result.base_relevance - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_final_score_composition() {
        let item = item("exact", Priority::Critical, 0.90).with_triggers(matching_triggers());
        let result = score_item(&context(), &item);
        // tool 1.0, file 1.0, keywords neutral 0.5 each
        assert!((result.base_relevance - 0.90).abs() < 1e-12);
        assert_eq!(result.priority_multiplier, 2.0);
        assert!((result.final_score - 0.90 * 2.0 * 0.90).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_filters_low_scores() {
        let ranker = Ranker::default();
        let weak = item("weak", Priority::Low, 0.90).with_triggers(matching_triggers());
        let results = ranker.rank(&context(), &[weak]);
        // base 0.90 * 0.5 * 0.90 = 0.405 < 0.7
        assert!(results.is_empty());
    }

    #[test]
    fn test_top_k_bound() {
        let ranker = Ranker::default();
        let candidates: Vec<_> = (0..10)
            .map(|i| {
                item(&format!("item-{}", i), Priority::Critical, 0.95)
                    .with_triggers(matching_triggers())
            })
            .collect();
        let results = ranker.rank(&context(), &candidates);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_excluded_statuses_never_surface() {
        let ranker = Ranker::default();
        let mut deprecated =
            item("deprecated", Priority::Critical, 0.95).with_triggers(matching_triggers());
        deprecated.status = ItemStatus::Deprecated;
        let mut archived =
            item("archived", Priority::Critical, 0.95).with_triggers(matching_triggers());
        archived.status = ItemStatus::Archived;

        let results = ranker.rank(&context(), &[deprecated, archived]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_needs_validation_items_are_rankable() {
        let ranker = Ranker::default();
        let mut pending =
            item("pending", Priority::Critical, 0.95).with_triggers(matching_triggers());
        pending.status = ItemStatus::NeedsValidation;
        let results = ranker.rank(&context(), &[pending]);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_tie_break_prefers_higher_confidence() {
        // Power-of-two confidences make the tie exact in floating point:
        // base * 0.5 (Low) * 0.5 == base * 1.0 (Medium) * 0.25.
        let mut config = RankingConfig::default();
        config.threshold = 0.2;
        let ranker = Ranker::new(config);

        let confident = item("confident", Priority::Low, 0.5).with_triggers(matching_triggers());
        let boosted = item("boosted", Priority::Medium, 0.25).with_triggers(matching_triggers());
        let results = ranker.rank(&context(), &[boosted, confident]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].final_score, results[1].final_score);
        assert_eq!(results[0].label, "confident");
    }

    #[test]
    fn test_tie_break_falls_back_to_creation_order() {
        let ranker = Ranker::default();
        let older = item("older", Priority::Critical, 0.95).with_triggers(matching_triggers());
        let mut newer = item("newer", Priority::Critical, 0.95).with_triggers(matching_triggers());
        newer.created_at = older.created_at + chrono::Duration::seconds(5);
        let results = ranker.rank(&context(), &[newer, older]);
        assert_eq!(results[0].label, "older");
    }

    #[test]
    fn test_malformed_candidate_is_skipped_not_fatal() {
        let ranker = Ranker::default();
        let mut broken = item("broken", Priority::Critical, 0.95).with_triggers(matching_triggers());
        broken.label = String::new();
        let good = item("good", Priority::Critical, 0.95).with_triggers(matching_triggers());
        let results = ranker.rank(&context(), &[broken, good]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].label, "good");
    }

    #[test]
    fn test_scan_cap_narrows_population() {
        let mut config = RankingConfig::default();
        config.max_candidates = 5;
        let ranker = Ranker::new(config);
        let candidates: Vec<_> = (0..50)
            .map(|i| {
                item(&format!("item-{}", i), Priority::Critical, 0.95)
                    .with_triggers(matching_triggers())
            })
            .collect();
        // Still returns results, just from the capped prefix.
        let results = ranker.rank(&context(), &candidates);
        assert_eq!(results.len(), 3);
    }
}
