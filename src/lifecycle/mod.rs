//! Lifecycle management: the state machine driving an item between
//! needs_validation, active, deprecated, and archived.
//!
//! Automatic deprecation runs after every confidence refinement. Deprecated
//! is escapable only through an explicit human `validate` override; archived
//! is terminal and exempt from all further checks.

use chrono::Utc;
use tracing::{debug, info};

use crate::config::DeprecationConfig;
use crate::confidence;
use crate::error::{EngineError, EngineResult, ItemError};
use crate::model::{DeprecationInfo, ItemStatus, OutcomeKind, ProcessKnowledgeItem};

/// Summary of one outcome application, for logging and stats.
#[derive(Debug, Clone)]
pub struct OutcomeApplication {
    /// The outcome that was applied.
    pub outcome: OutcomeKind,
    /// Confidence before refinement.
    pub previous_confidence: f64,
    /// Confidence after refinement.
    pub new_confidence: f64,
    /// Status change triggered by this outcome, if any.
    pub transitioned_to: Option<ItemStatus>,
}

/// Owns status transitions and the automatic deprecation rules.
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    config: DeprecationConfig,
}

impl LifecycleManager {
    /// Create a lifecycle manager with the given thresholds.
    pub fn new(config: DeprecationConfig) -> Self {
        Self { config }
    }

    /// Apply one classified outcome to an item: counters, history,
    /// confidence refinement, and the automatic deprecation check.
    ///
    /// Archived items are inert; applying an outcome to one is a no-op.
    pub fn apply_outcome(
        &self,
        item: &mut ProcessKnowledgeItem,
        outcome: OutcomeKind,
    ) -> OutcomeApplication {
        let previous_confidence = item.confidence;

        if item.status.is_terminal() {
            debug!(item_id = %item.id, "Ignoring outcome for archived item");
            return OutcomeApplication {
                outcome,
                previous_confidence,
                new_confidence: previous_confidence,
                transitioned_to: None,
            };
        }

        item.note_outcome(outcome);
        item.confidence = confidence::refine(item.confidence, outcome);

        let transitioned_to = self.check_auto_deprecation(item);

        OutcomeApplication {
            outcome,
            previous_confidence,
            new_confidence: item.confidence,
            transitioned_to,
        }
    }

    /// Evaluate the automatic deprecation rules, transitioning the item when
    /// one fires. Returns the new status when a transition happened.
    ///
    /// Only active and needs_validation items are eligible; deprecated items
    /// keep their original deprecation record and archived items are exempt
    /// entirely.
    pub fn check_auto_deprecation(&self, item: &mut ProcessKnowledgeItem) -> Option<ItemStatus> {
        if !item.status.is_rankable() {
            return None;
        }

        let reason = if item.confidence < self.config.confidence_floor {
            Some(format!(
                "confidence {:.2} fell below {:.2}",
                item.confidence, self.config.confidence_floor
            ))
        } else if item.failure_count >= self.config.failure_threshold && item.success_count == 0 {
            Some(format!(
                "{} failures with no recorded successes",
                item.failure_count
            ))
        } else if item.contradiction_count >= self.config.contradiction_threshold {
            Some(format!("contradicted {} times", item.contradiction_count))
        } else {
            None
        };

        let reason = reason?;
        info!(item_id = %item.id, reason = %reason, "Automatically deprecating item");
        self.mark_deprecated(item, reason, true);
        Some(ItemStatus::Deprecated)
    }

    /// Explicit human validation.
    ///
    /// Records a confirmation outcome and promotes the item to `active` once
    /// refined confidence clears the activation threshold for its priority.
    /// On a deprecated item this is the explicit override that can bring it
    /// back; a below-threshold override lands in `needs_validation` instead.
    pub fn validate(&self, item: &mut ProcessKnowledgeItem) -> EngineResult<OutcomeApplication> {
        if item.status.is_terminal() {
            return Err(EngineError::InvalidTransition {
                from: item.status.to_string(),
                action: "validate".to_string(),
            });
        }

        let previous_confidence = item.confidence;
        let was_deprecated = item.status == ItemStatus::Deprecated;
        item.note_outcome(OutcomeKind::Confirmation);
        item.confidence = confidence::refine(item.confidence, OutcomeKind::Confirmation);

        let new_status = if item.confidence >= item.priority.activation_threshold() {
            ItemStatus::Active
        } else {
            ItemStatus::NeedsValidation
        };
        let transitioned = new_status != item.status;
        item.status = new_status;
        if was_deprecated {
            // Human override clears the deprecation record.
            item.deprecation = None;
        }

        info!(
            item_id = %item.id,
            confidence = item.confidence,
            status = %item.status,
            "Item validated"
        );

        Ok(OutcomeApplication {
            outcome: OutcomeKind::Confirmation,
            previous_confidence,
            new_confidence: item.confidence,
            transitioned_to: transitioned.then_some(new_status),
        })
    }

    /// Explicit human contradiction.
    ///
    /// Records a contradiction outcome; the automatic deprecation rules run
    /// afterwards, so a second contradiction deprecates the item regardless
    /// of its confidence at that moment.
    pub fn contradict(
        &self,
        item: &mut ProcessKnowledgeItem,
        reason: &str,
    ) -> EngineResult<OutcomeApplication> {
        if item.status.is_terminal() {
            return Err(EngineError::InvalidTransition {
                from: item.status.to_string(),
                action: "contradict".to_string(),
            });
        }

        info!(item_id = %item.id, reason = %reason, "Item contradicted by user");
        Ok(self.apply_outcome(item, OutcomeKind::Contradiction))
    }

    /// Explicit human deprecation with a required reason.
    pub fn deprecate(&self, item: &mut ProcessKnowledgeItem, reason: &str) -> EngineResult<()> {
        if item.status.is_terminal() || item.status == ItemStatus::Deprecated {
            return Err(EngineError::InvalidTransition {
                from: item.status.to_string(),
                action: "deprecate".to_string(),
            });
        }
        if reason.trim().is_empty() {
            return Err(ItemError::EmptyReason.into());
        }

        info!(item_id = %item.id, reason = %reason, "Item deprecated by user");
        self.mark_deprecated(item, reason.to_string(), false);
        Ok(())
    }

    /// Archive an item. Terminal and idempotent; allowed from any state.
    pub fn archive(&self, item: &mut ProcessKnowledgeItem) {
        if item.status == ItemStatus::Archived {
            return;
        }
        info!(item_id = %item.id, from = %item.status, "Item archived");
        item.status = ItemStatus::Archived;
        item.updated_at = Utc::now();
    }

    fn mark_deprecated(&self, item: &mut ProcessKnowledgeItem, reason: String, automatic: bool) {
        item.status = ItemStatus::Deprecated;
        item.deprecation = Some(DeprecationInfo {
            at: Utc::now(),
            reason,
            automatic,
        });
        item.updated_at = Utc::now();
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new(DeprecationConfig::default())
    }
}
