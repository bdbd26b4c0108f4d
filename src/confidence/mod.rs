//! Confidence calculation: the initial-confidence heuristic and the
//! outcome-driven refinement rule.
//!
//! Two refinement modes are supported:
//! - [`refine`]: apply one outcome's multiplicative factor to the current
//!   confidence
//! - [`replay`]: recompute confidence from the bounded outcome history with
//!   exponential recency decay
//!
//! Both clamp into [0.10, 0.99] and agree when only one outcome exists.

use crate::model::{clamp_confidence, ItemStatus, KnowledgeSource, OutcomeKind, Priority};

/// Lowest confidence an item can be created with.
pub const CREATION_FLOOR: f64 = 0.50;

/// Highest confidence an item can be created with; the wider refinement
/// ceiling applies only after outcomes arrive.
pub const CREATION_CEILING: f64 = 0.95;

/// Per-repetition bonus for repeated-mistake items, beyond the first.
const REPETITION_BONUS: f64 = 0.05;

/// Cap on the total repetition contribution.
const REPETITION_CAP: f64 = 0.15;

/// Multiplicative boost for CRITICAL-priority items at creation.
const CRITICAL_BOOST: f64 = 1.05;

/// Recency decay base for weighted replay; the i-th most recent outcome
/// contributes with weight 0.9^i.
const REPLAY_DECAY: f64 = 0.9;

/// Compute an item's confidence at creation time.
///
/// Driven by the evidence source, with a repetition bonus for
/// repeated-mistake items and a capped boost for CRITICAL priority.
pub fn initial_confidence(source: KnowledgeSource, priority: Priority, repetitions: u32) -> f64 {
    let mut value = source.base_confidence();

    if source == KnowledgeSource::RepeatedMistake && repetitions > 1 {
        let bonus = (f64::from(repetitions - 1) * REPETITION_BONUS).min(REPETITION_CAP);
        value += bonus;
    }

    if priority == Priority::Critical {
        value = (value * CRITICAL_BOOST).min(CREATION_CEILING);
    }

    value.clamp(CREATION_FLOOR, CREATION_CEILING)
}

/// Derive the lifecycle status a freshly created item starts in.
pub fn derive_status(confidence: f64, priority: Priority) -> ItemStatus {
    if confidence >= 0.80 {
        ItemStatus::Active
    } else if confidence >= priority.activation_threshold() {
        ItemStatus::Active
    } else if confidence >= 0.50 {
        ItemStatus::NeedsValidation
    } else {
        // Too weak to be useful; inert from the start.
        ItemStatus::Archived
    }
}

/// Initial confidence and status in one step.
pub fn initial_assessment(
    source: KnowledgeSource,
    priority: Priority,
    repetitions: u32,
) -> (f64, ItemStatus) {
    let confidence = initial_confidence(source, priority, repetitions);
    let status = derive_status(confidence, priority);
    (confidence, status)
}

/// Refine confidence from a single outcome.
pub fn refine(confidence: f64, outcome: OutcomeKind) -> f64 {
    clamp_confidence(confidence * outcome.factor())
}

/// Recompute confidence by replaying the bounded outcome history.
///
/// `history` is newest first, as stored on the item; the i-th most recent
/// outcome's factor is damped toward 1.0 by 0.9^i before applying. With a
/// single entry this reduces exactly to [`refine`].
pub fn replay(base: f64, history: &[OutcomeKind]) -> f64 {
    let mut value = base;
    for (i, outcome) in history.iter().enumerate() {
        let weight = REPLAY_DECAY.powi(i as i32);
        let factor = 1.0 + (outcome.factor() - 1.0) * weight;
        value = clamp_confidence(value * factor);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_confidence_table() {
        assert_eq!(
            initial_confidence(KnowledgeSource::UserCorrection, Priority::Medium, 1),
            0.95
        );
        assert_eq!(
            initial_confidence(KnowledgeSource::ExplicitDeclaration, Priority::Medium, 1),
            0.90
        );
        assert_eq!(
            initial_confidence(KnowledgeSource::RepeatedMistake, Priority::Medium, 1),
            0.75
        );
        assert_eq!(
            initial_confidence(KnowledgeSource::Inferred, Priority::Medium, 1),
            0.65
        );
        assert_eq!(
            initial_confidence(KnowledgeSource::Suggestion, Priority::Medium, 1),
            0.50
        );
    }

    #[test]
    fn test_repetition_bonus_and_cap() {
        let two = initial_confidence(KnowledgeSource::RepeatedMistake, Priority::Medium, 2);
        assert!((two - 0.80).abs() < 1e-9);
        let four = initial_confidence(KnowledgeSource::RepeatedMistake, Priority::Medium, 4);
        assert!((four - 0.90).abs() < 1e-9);
        // Capped at +0.15 no matter how many repetitions.
        let ten = initial_confidence(KnowledgeSource::RepeatedMistake, Priority::Medium, 10);
        assert!((ten - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_repetitions_only_apply_to_repeated_mistake() {
        let inferred = initial_confidence(KnowledgeSource::Inferred, Priority::Medium, 5);
        assert_eq!(inferred, 0.65);
    }

    #[test]
    fn test_critical_boost_is_capped() {
        // 0.65 * 1.05 = 0.6825
        let boosted = initial_confidence(KnowledgeSource::Inferred, Priority::Critical, 1);
        assert!((boosted - 0.6825).abs() < 1e-9);
        // 0.95 * 1.05 would exceed the ceiling; capped at 0.95.
        let capped = initial_confidence(KnowledgeSource::UserCorrection, Priority::Critical, 1);
        assert_eq!(capped, 0.95);
    }

    #[test]
    fn test_creation_clamp() {
        let low = initial_confidence(KnowledgeSource::Suggestion, Priority::Low, 1);
        assert!(low >= CREATION_FLOOR);
        let high = initial_confidence(KnowledgeSource::UserCorrection, Priority::Critical, 1);
        assert!(high <= CREATION_CEILING);
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(derive_status(0.85, Priority::Low), ItemStatus::Active);
        assert_eq!(derive_status(0.72, Priority::High), ItemStatus::Active);
        assert_eq!(derive_status(0.72, Priority::Critical), ItemStatus::Active);
        assert_eq!(
            derive_status(0.72, Priority::Medium),
            ItemStatus::NeedsValidation
        );
        assert_eq!(
            derive_status(0.55, Priority::High),
            ItemStatus::NeedsValidation
        );
        assert_eq!(derive_status(0.40, Priority::Critical), ItemStatus::Archived);
    }

    #[test]
    fn test_refine_factors() {
        assert!((refine(0.50, OutcomeKind::Success) - 0.575).abs() < 1e-9);
        assert!((refine(0.50, OutcomeKind::Confirmation) - 0.55).abs() < 1e-9);
        assert!((refine(0.50, OutcomeKind::Failure) - 0.30).abs() < 1e-9);
        assert!((refine(0.50, OutcomeKind::Contradiction) - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_refine_clamps_both_ends() {
        assert_eq!(refine(0.98, OutcomeKind::Success), 0.99);
        assert_eq!(refine(0.12, OutcomeKind::Contradiction), 0.10);
    }

    #[test]
    fn test_penalty_outweighs_reward() {
        // One failure moves confidence further down than one success moves
        // it up, for any mid-range starting point.
        for c in [0.20, 0.50, 0.70, 0.90] {
            let up = refine(c, OutcomeKind::Success) - c;
            let down = c - refine(c, OutcomeKind::Failure);
            assert!(down > up, "asymmetry violated at {}", c);
        }
    }

    #[test]
    fn test_replay_agrees_with_refine_for_single_outcome() {
        for outcome in [
            OutcomeKind::Success,
            OutcomeKind::Failure,
            OutcomeKind::Confirmation,
            OutcomeKind::Contradiction,
        ] {
            let base = 0.70;
            assert!((replay(base, &[outcome]) - refine(base, outcome)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_replay_decays_older_outcomes() {
        // A failure in the most recent slot hurts more than the same
        // failure pushed one slot back by a success.
        let recent_failure = replay(0.70, &[OutcomeKind::Failure, OutcomeKind::Success]);
        let older_failure = replay(0.70, &[OutcomeKind::Success, OutcomeKind::Failure]);
        assert!(older_failure > recent_failure);
    }

    #[test]
    fn test_replay_stays_clamped() {
        let all_failures = vec![OutcomeKind::Contradiction; 10];
        assert_eq!(replay(0.95, &all_failures), 0.10);
        let all_successes = vec![OutcomeKind::Success; 10];
        assert_eq!(replay(0.95, &all_successes), 0.99);
    }
}
