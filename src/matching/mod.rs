//! Trigger matching: per-item component scores against an action context.
//!
//! Each score lands in [0.0, 1.0]. An empty trigger set scores the neutral
//! midpoint (no constraint declared), which is deliberately distinct from a
//! declared constraint that the context fails to meet (0.0). Malformed or
//! absent input never raises; it resolves through the same neutral rules.

pub mod glob;

use serde::{Deserialize, Serialize};

use crate::model::TriggerConditions;

/// Score granted when a trigger set declares no constraint.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// The action context a ranking query runs against.
///
/// Supplied by the host-side conversation observer; every field is optional
/// and already extracted from the transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryContext {
    /// Name of the tool about to run.
    pub tool: Option<String>,
    /// Target file path of the action, if any.
    pub file_path: Option<String>,
    /// Recent message window, most recent last.
    #[serde(default)]
    pub recent_messages: Vec<String>,
    /// Active workflow name, if any.
    pub workflow: Option<String>,
}

impl QueryContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tool name.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Set the target file path.
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Set the recent message window.
    pub fn with_recent_messages(mut self, messages: Vec<String>) -> Self {
        self.recent_messages = messages;
        self
    }

    /// Set the active workflow name.
    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }

    fn message_window_lowercase(&self) -> String {
        self.recent_messages.join("\n").to_lowercase()
    }
}

/// Component match scores for one item against one context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerScores {
    /// Tool-name membership score.
    pub tool: f64,
    /// File glob score.
    pub file: f64,
    /// Action-keyword overlap fraction.
    pub keyword: f64,
    /// Context-keyword overlap fraction.
    pub context: f64,
}

/// Compute the four component scores for an item's triggers.
pub fn match_item(triggers: &TriggerConditions, context: &QueryContext) -> TriggerScores {
    let window = context.message_window_lowercase();
    TriggerScores {
        tool: tool_score(&triggers.tools, context.tool.as_deref()),
        file: file_score(&triggers.file_patterns, context.file_path.as_deref()),
        keyword: keyword_score(&triggers.action_keywords, &window),
        context: keyword_score(&triggers.context_keywords, &window),
    }
}

fn tool_score(tools: &[String], tool: Option<&str>) -> f64 {
    if tools.is_empty() {
        return NEUTRAL_SCORE;
    }
    match tool {
        Some(t) if tools.iter().any(|candidate| candidate == t) => 1.0,
        _ => 0.0,
    }
}

fn file_score(patterns: &[String], path: Option<&str>) -> f64 {
    if patterns.is_empty() {
        return NEUTRAL_SCORE;
    }
    match path {
        Some(p) if patterns.iter().any(|pattern| glob::glob_match(pattern, p)) => 1.0,
        _ => 0.0,
    }
}

/// Fraction of keywords found as case-insensitive substrings in the window.
fn keyword_score(keywords: &[String], window_lowercase: &str) -> f64 {
    if keywords.is_empty() {
        return NEUTRAL_SCORE;
    }
    let matched = keywords
        .iter()
        .filter(|kw| {
            let kw = kw.to_lowercase();
            !kw.is_empty() && window_lowercase.contains(&kw)
        })
        .count();
    matched as f64 / keywords.len() as f64
}
