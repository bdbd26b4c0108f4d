//! Outcome detection: classify what happened to each surfaced item once the
//! interaction window that followed it is available.
//!
//! Classification is best-effort pattern matching, not semantic
//! understanding; the asymmetric confidence update downstream is the
//! safeguard against its imprecision. The classifier sits behind a trait so
//! the regex implementation can be swapped for a stronger one without
//! touching confidence or lifecycle logic.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{OutcomeKind, ProcessKnowledgeItem};

/// Snapshot of an item at the moment it was surfaced.
///
/// Carries just enough for classification; the full item is not needed once
/// the window closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfacedItem {
    /// Id of the surfaced item.
    pub item_id: String,
    /// Label at surfacing time.
    pub label: String,
    /// Markers whose reappearance signals the guarded-against mistake.
    #[serde(default)]
    pub mistake_markers: Vec<String>,
}

impl From<&ProcessKnowledgeItem> for SurfacedItem {
    fn from(item: &ProcessKnowledgeItem) -> Self {
        Self {
            item_id: item.id.clone(),
            label: item.label.clone(),
            mistake_markers: item.payload.mistake_markers(),
        }
    }
}

/// Strategy interface for outcome classification.
pub trait OutcomeClassifier: Send + Sync {
    /// Classify one surfaced item against the interaction text that
    /// followed it. Must always produce a label; ambiguity resolves to
    /// [`OutcomeKind::Success`], never an error.
    fn classify(&self, item: &SurfacedItem, interaction: &str) -> OutcomeKind;
}

/// Classify every surfaced item in one pass.
pub fn detect_outcomes(
    classifier: &dyn OutcomeClassifier,
    surfaced: &[SurfacedItem],
    interaction: &str,
) -> HashMap<String, OutcomeKind> {
    surfaced
        .iter()
        .map(|item| (item.item_id.clone(), classifier.classify(item, interaction)))
        .collect()
}

// ============================================================================
// Pattern Classifier
// ============================================================================

/// Default regex-based classifier.
///
/// Precedence: contradiction, then confirmation, then failure, then the
/// success default. Explicit signals referencing the item id outrank the
/// generic phrase patterns only in the sense that either form is accepted.
#[derive(Debug, Clone, Default)]
pub struct PatternClassifier;

fn contradiction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(that'?s wrong|that is wrong|that'?s incorrect|that is incorrect|actually,? it should|no,? that'?s not|not right|bad advice)\b",
        )
        .expect("contradiction pattern is valid")
    })
}

fn confirmation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(that'?s correct|that is correct|that'?s right|that is right|good catch|exactly right|confirmed)\b",
        )
        .expect("confirmation pattern is valid")
    })
}

fn mistake_context_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(error|failed|failure|broke|broken|again|regression|crash(ed)?|mistake)\b")
            .expect("mistake context pattern is valid")
    })
}

fn reject_action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\breject(ed|ing)?\b").expect("reject pattern is valid")
    })
}

fn validate_action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(validate[ds]?|approve[ds]?|accept(ed|s)?)\b")
            .expect("validate pattern is valid")
    })
}

impl PatternClassifier {
    /// Create the default classifier.
    pub fn new() -> Self {
        Self
    }

    fn references_item(item: &SurfacedItem, interaction: &str) -> bool {
        interaction.contains(&item.item_id)
    }

    fn mistake_recurred(item: &SurfacedItem, interaction: &str) -> bool {
        if !mistake_context_re().is_match(interaction) {
            return false;
        }
        let lower = interaction.to_lowercase();
        item.mistake_markers
            .iter()
            .any(|marker| !marker.trim().is_empty() && lower.contains(&marker.to_lowercase()))
    }
}

impl OutcomeClassifier for PatternClassifier {
    fn classify(&self, item: &SurfacedItem, interaction: &str) -> OutcomeKind {
        let referenced = Self::references_item(item, interaction);

        // Rejection signals are checked first: distrust must win over an
        // acceptance phrase appearing in the same window.
        if contradiction_re().is_match(interaction)
            || (referenced && reject_action_re().is_match(interaction))
        {
            return OutcomeKind::Contradiction;
        }

        if confirmation_re().is_match(interaction)
            || (referenced && validate_action_re().is_match(interaction))
        {
            return OutcomeKind::Confirmation;
        }

        if Self::mistake_recurred(item, interaction) {
            return OutcomeKind::Failure;
        }

        // Absence of recurrence is weak positive evidence.
        OutcomeKind::Success
    }
}
