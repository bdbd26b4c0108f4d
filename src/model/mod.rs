//! Core types for procedural knowledge items.
//!
//! This module defines the unit of procedural knowledge and its satellite
//! types:
//! - [`ProcessKnowledgeItem`]: the stored record, with trust, lifecycle, and
//!   outcome bookkeeping
//! - [`ProcessPayload`]: the typed body matching the item's declared
//!   [`ProcessType`]
//! - [`TriggerConditions`]: the matchable attributes that make an item a
//!   candidate for an action context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::confidence;
use crate::error::ItemError;

/// Lowest confidence any item may hold after refinement.
pub const CONFIDENCE_FLOOR: f64 = 0.10;

/// Highest confidence any item may hold; certainty is never reachable.
pub const CONFIDENCE_CEILING: f64 = 0.99;

/// Number of outcome labels retained per item, newest first.
pub const OUTCOME_HISTORY_LIMIT: usize = 10;

/// Clamp a confidence value into the permitted range.
pub fn clamp_confidence(value: f64) -> f64 {
    value.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING)
}

// ============================================================================
// Classification Enums
// ============================================================================

/// Kind of procedural knowledge an item carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    /// An ordered list of steps to follow.
    Checklist,
    /// A situation/action/rationale triple.
    Pattern,
    /// A risk with detection and mitigation guidance.
    Warning,
    /// A constraint that must hold, with validation guidance.
    Requirement,
}

impl ProcessType {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::Checklist => "checklist",
            ProcessType::Pattern => "pattern",
            ProcessType::Warning => "warning",
            ProcessType::Requirement => "requirement",
        }
    }
}

impl std::fmt::Display for ProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProcessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checklist" => Ok(ProcessType::Checklist),
            "pattern" => Ok(ProcessType::Pattern),
            "warning" => Ok(ProcessType::Warning),
            "requirement" => Ok(ProcessType::Requirement),
            _ => Err(format!("Unknown process type: {}", s)),
        }
    }
}

/// Priority level of a knowledge item.
///
/// Ordered so that `Critical` compares highest; the discriminant doubles as
/// the tie-break rank during relevance sorting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Surface aggressively; user-corrected lessons usually live here.
    Critical = 3,
    High = 2,
    Medium = 1,
    /// Needs near-total relevance to surface at all.
    Low = 0,
}

impl Priority {
    /// Scalar applied to base relevance during ranking.
    pub fn multiplier(&self) -> f64 {
        match self {
            Priority::Critical => 2.0,
            Priority::High => 1.5,
            Priority::Medium => 1.0,
            Priority::Low => 0.5,
        }
    }

    /// Confidence an item of this priority needs to hold `active` status.
    pub fn activation_threshold(&self) -> f64 {
        match self {
            Priority::Critical | Priority::High => 0.70,
            Priority::Medium | Priority::Low => 0.80,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CRITICAL" => Ok(Priority::Critical),
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Lifecycle status of a knowledge item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Created from weak evidence; surfaced but awaiting human validation.
    NeedsValidation,
    /// Trusted; surfaced normally.
    Active,
    /// Proven unreliable; removed from ranking, escapable only by explicit
    /// human override.
    Deprecated,
    /// Terminal and inert; retained for audit, never surfaced again.
    Archived,
}

impl ItemStatus {
    /// Whether items in this status participate in relevance ranking.
    pub fn is_rankable(&self) -> bool {
        matches!(self, ItemStatus::Active | ItemStatus::NeedsValidation)
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Archived)
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::NeedsValidation => "needs_validation",
            ItemStatus::Active => "active",
            ItemStatus::Deprecated => "deprecated",
            ItemStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "needs_validation" => Ok(ItemStatus::NeedsValidation),
            "active" => Ok(ItemStatus::Active),
            "deprecated" => Ok(ItemStatus::Deprecated),
            "archived" => Ok(ItemStatus::Archived),
            _ => Err(format!("Unknown item status: {}", s)),
        }
    }
}

/// Evidence source an item was learned from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSource {
    /// The user explicitly corrected a mistake.
    UserCorrection,
    /// The same mistake was observed more than once.
    RepeatedMistake,
    /// The user stated the rule outright.
    ExplicitDeclaration,
    /// Derived from indirect signals.
    Inferred,
    /// Proposed by the system itself.
    Suggestion,
}

impl KnowledgeSource {
    /// Base confidence granted to an item from this source at creation.
    pub fn base_confidence(&self) -> f64 {
        match self {
            KnowledgeSource::UserCorrection => 0.95,
            KnowledgeSource::ExplicitDeclaration => 0.90,
            KnowledgeSource::RepeatedMistake => 0.75,
            KnowledgeSource::Inferred => 0.65,
            KnowledgeSource::Suggestion => 0.50,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeSource::UserCorrection => "user_correction",
            KnowledgeSource::RepeatedMistake => "repeated_mistake",
            KnowledgeSource::ExplicitDeclaration => "explicit_declaration",
            KnowledgeSource::Inferred => "inferred",
            KnowledgeSource::Suggestion => "suggestion",
        }
    }
}

impl std::fmt::Display for KnowledgeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for KnowledgeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user_correction" => Ok(KnowledgeSource::UserCorrection),
            "repeated_mistake" => Ok(KnowledgeSource::RepeatedMistake),
            "explicit_declaration" => Ok(KnowledgeSource::ExplicitDeclaration),
            "inferred" => Ok(KnowledgeSource::Inferred),
            "suggestion" => Ok(KnowledgeSource::Suggestion),
            _ => Err(format!("Unknown knowledge source: {}", s)),
        }
    }
}

/// Classified consequence of having surfaced an item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The item was surfaced and the mistake did not recur (weak positive).
    Success,
    /// The mistake the item guards against happened anyway.
    Failure,
    /// The user explicitly accepted the guidance.
    Confirmation,
    /// The user explicitly rejected the guidance.
    Contradiction,
}

impl OutcomeKind {
    /// Multiplicative confidence factor for this outcome.
    ///
    /// Penalties are deliberately stronger than rewards so the engine
    /// distrusts an item faster than it trusts one.
    pub fn factor(&self) -> f64 {
        match self {
            OutcomeKind::Success => 1.15,
            OutcomeKind::Confirmation => 1.10,
            OutcomeKind::Failure => 0.60,
            OutcomeKind::Contradiction => 0.40,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Failure => "failure",
            OutcomeKind::Confirmation => "confirmation",
            OutcomeKind::Contradiction => "contradiction",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OutcomeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(OutcomeKind::Success),
            "failure" => Ok(OutcomeKind::Failure),
            "confirmation" => Ok(OutcomeKind::Confirmation),
            "contradiction" => Ok(OutcomeKind::Contradiction),
            _ => Err(format!("Unknown outcome kind: {}", s)),
        }
    }
}

// ============================================================================
// Payloads and Trigger Conditions
// ============================================================================

/// Typed body of a knowledge item; exactly one variant per item, matching
/// its declared [`ProcessType`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessPayload {
    /// Ordered steps to follow.
    Checklist {
        /// Steps in execution order.
        steps: Vec<String>,
    },
    /// A reusable situation/action pairing.
    Pattern {
        /// When the pattern applies.
        situation: String,
        /// What to do.
        action: String,
        /// Why it works.
        rationale: String,
    },
    /// A risk to avoid.
    Warning {
        /// What can go wrong.
        risk: String,
        /// How bad it is.
        severity: String,
        /// How to spot it happening.
        detection: String,
        /// How to avoid or recover.
        mitigation: String,
    },
    /// A constraint that must hold.
    Requirement {
        /// The constraint itself.
        constraint: String,
        /// Why it exists.
        rationale: String,
        /// How to check it holds.
        validation: String,
    },
}

impl ProcessPayload {
    /// The process type this payload belongs to.
    pub fn process_type(&self) -> ProcessType {
        match self {
            ProcessPayload::Checklist { .. } => ProcessType::Checklist,
            ProcessPayload::Pattern { .. } => ProcessType::Pattern,
            ProcessPayload::Warning { .. } => ProcessType::Warning,
            ProcessPayload::Requirement { .. } => ProcessType::Requirement,
        }
    }

    /// Text markers that indicate the guarded-against mistake recurred.
    ///
    /// Used by the outcome detector's failure check; empty for payloads with
    /// no recurrence signal of their own.
    pub fn mistake_markers(&self) -> Vec<String> {
        match self {
            ProcessPayload::Warning { detection, .. } => vec![detection.clone()],
            ProcessPayload::Requirement { constraint, .. } => vec![constraint.clone()],
            _ => Vec::new(),
        }
    }
}

/// Matchable attributes deciding when an item is a candidate for a context.
///
/// Every set is optional: an empty set declares no constraint and scores the
/// neutral midpoint, which is distinct from a declared-but-unmet constraint
/// scoring zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TriggerConditions {
    /// Tool names this item applies to.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Shell-glob patterns (recursive `**` supported) over target file paths.
    #[serde(default)]
    pub file_patterns: Vec<String>,
    /// Keywords expected in the recent message window.
    #[serde(default)]
    pub action_keywords: Vec<String>,
    /// Broader context keywords expected in the window.
    #[serde(default)]
    pub context_keywords: Vec<String>,
    /// Workflows this item originated from.
    #[serde(default)]
    pub workflows: Vec<String>,
}

impl TriggerConditions {
    /// Create empty (fully neutral) trigger conditions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set tool names.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Set file glob patterns.
    pub fn with_file_patterns(mut self, patterns: Vec<String>) -> Self {
        self.file_patterns = patterns;
        self
    }

    /// Set action keywords.
    pub fn with_action_keywords(mut self, keywords: Vec<String>) -> Self {
        self.action_keywords = keywords;
        self
    }

    /// Set context keywords.
    pub fn with_context_keywords(mut self, keywords: Vec<String>) -> Self {
        self.context_keywords = keywords;
        self
    }

    /// Set originating workflows.
    pub fn with_workflows(mut self, workflows: Vec<String>) -> Self {
        self.workflows = workflows;
        self
    }
}

/// Why and when an item was deprecated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeprecationInfo {
    /// When the deprecation happened.
    pub at: DateTime<Utc>,
    /// Human-supplied or generated explanation.
    pub reason: String,
    /// True when the lifecycle manager deprecated the item on its own.
    pub automatic: bool,
}

// ============================================================================
// ProcessKnowledgeItem
// ============================================================================

/// The unit of procedural knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessKnowledgeItem {
    /// Unique identifier; immutable once created.
    pub id: String,
    /// Short human-readable name.
    pub label: String,
    /// Longer description of what the item teaches.
    pub description: String,
    /// Declared kind of knowledge; must match the payload variant.
    pub process_type: ProcessType,
    /// Typed body.
    pub payload: ProcessPayload,
    /// Priority classification.
    pub priority: Priority,
    /// Calibrated trust score, always within [0.10, 0.99].
    pub confidence: f64,
    /// Lifecycle status.
    pub status: ItemStatus,
    /// Trigger conditions for relevance matching.
    pub triggers: TriggerConditions,
    /// Evidence source category.
    pub source: KnowledgeSource,
    /// Free-text evidence supporting the item.
    pub evidence: String,
    /// Who or what created the item.
    pub created_by: String,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item was last updated.
    pub updated_at: DateTime<Utc>,
    /// Times the item's guidance worked out.
    pub success_count: u32,
    /// Times the guarded-against mistake recurred anyway.
    pub failure_count: u32,
    /// Times the user explicitly accepted the guidance.
    pub confirmation_count: u32,
    /// Times the user explicitly rejected the guidance.
    pub contradiction_count: u32,
    /// Most recent outcomes, newest first, at most
    /// [`OUTCOME_HISTORY_LIMIT`] entries.
    pub outcome_history: Vec<OutcomeKind>,
    /// How many times the item has been surfaced.
    pub times_surfaced: u32,
    /// When the item was last surfaced.
    pub last_surfaced_at: Option<DateTime<Utc>>,
    /// Set once the item is deprecated.
    pub deprecation: Option<DeprecationInfo>,
    /// Optimistic-concurrency counter bumped on every persisted update.
    pub version: i64,
}

impl ProcessKnowledgeItem {
    /// Create a new item.
    ///
    /// Initial confidence and status are derived from the evidence source
    /// and priority; use [`with_repetitions`](Self::with_repetitions) before
    /// persisting a repeated-mistake item so the repetition bonus applies.
    pub fn new(
        label: impl Into<String>,
        payload: ProcessPayload,
        source: KnowledgeSource,
        priority: Priority,
    ) -> Self {
        let now = Utc::now();
        let (confidence, status) = confidence::initial_assessment(source, priority, 1);
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            description: String::new(),
            process_type: payload.process_type(),
            payload,
            priority,
            confidence,
            status,
            triggers: TriggerConditions::default(),
            source,
            evidence: String::new(),
            created_by: "system".to_string(),
            created_at: now,
            updated_at: now,
            success_count: 0,
            failure_count: 0,
            confirmation_count: 0,
            contradiction_count: 0,
            outcome_history: Vec::new(),
            times_surfaced: 0,
            last_surfaced_at: None,
            deprecation: None,
            version: 0,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the trigger conditions.
    pub fn with_triggers(mut self, triggers: TriggerConditions) -> Self {
        self.triggers = triggers;
        self
    }

    /// Set the free-text evidence.
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    /// Set the creator.
    pub fn with_creator(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Record how often the underlying mistake was observed and re-derive
    /// initial confidence and status accordingly.
    ///
    /// Only meaningful for freshly created items; repetitions beyond the
    /// first add +0.05 each, capped at +0.15 total.
    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        let (confidence, status) =
            confidence::initial_assessment(self.source, self.priority, repetitions);
        self.confidence = confidence;
        self.status = status;
        self
    }

    /// Check internal consistency; raised only at construction or load time.
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.label.trim().is_empty() {
            return Err(ItemError::EmptyLabel);
        }
        if self.payload.process_type() != self.process_type {
            return Err(ItemError::PayloadMismatch {
                declared: self.process_type.to_string(),
                actual: self.payload.process_type().to_string(),
            });
        }
        Ok(())
    }

    /// Record one classified outcome: bump the matching counter and push the
    /// label onto the bounded history ring.
    ///
    /// Confidence refinement and lifecycle checks are owned by the
    /// confidence and lifecycle modules; this only maintains the counters.
    pub fn note_outcome(&mut self, outcome: OutcomeKind) {
        match outcome {
            OutcomeKind::Success => self.success_count += 1,
            OutcomeKind::Failure => self.failure_count += 1,
            OutcomeKind::Confirmation => self.confirmation_count += 1,
            OutcomeKind::Contradiction => self.contradiction_count += 1,
        }
        self.outcome_history.insert(0, outcome);
        self.outcome_history.truncate(OUTCOME_HISTORY_LIMIT);
        self.updated_at = Utc::now();
    }

    /// Record that the item was surfaced to the host.
    pub fn note_surfaced(&mut self) {
        self.times_surfaced += 1;
        self.last_surfaced_at = Some(Utc::now());
    }

    /// Total outcomes with a definite success/failure signal.
    pub fn graded_outcomes(&self) -> u32 {
        self.success_count + self.failure_count
    }
}
