//! # Procedural Memory Engine
//!
//! Learns procedural knowledge ("how to do X") from an ongoing interaction
//! stream, stores it with a calibrated confidence score, and retrieves the
//! most relevant items to guide an upcoming action before it is taken.
//!
//! ## Features
//!
//! - **Trigger Matching**: tool, file-glob, and keyword scores with explicit
//!   neutral defaults for undeclared constraints
//! - **Relevance Ranking**: priority- and confidence-weighted scoring with a
//!   fixed threshold, deterministic tie-breaking, and a top-K bound
//! - **Confidence Calibration**: source-driven initial confidence and an
//!   asymmetric multiplicative refinement rule that distrusts faster than it
//!   trusts
//! - **Outcome Detection**: pluggable best-effort classification of what
//!   happened after an item was surfaced
//! - **Lifecycle Management**: needs_validation → active → deprecated →
//!   archived, with automatic deprecation of unreliable items
//! - **Calibration Monitoring**: per-band observed-vs-stated accuracy report
//!
//! ## Architecture
//!
//! ```text
//! Host ──▶ rank(QueryContext) ──▶ session cache ──▶ ranked guidance
//!                                      ▲
//!                              KnowledgeRepository (SQLite / in-memory)
//!                                      ▼
//! Host ──▶ detect_outcomes() ──▶ refine ──▶ lifecycle ──▶ persisted item
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use procedural_memory::{EngineConfig, ProceduralMemory, QueryContext};
//! use procedural_memory::store::SqliteRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::from_env()?;
//!     let repo = Arc::new(SqliteRepository::new(&config.database).await?);
//!     let engine = ProceduralMemory::new(repo, config);
//!
//!     let context = QueryContext::new()
//!         .with_tool("Write")
//!         .with_file_path("/x/plugin.json");
//!     for guidance in engine.rank(&context).await {
//!         println!("{} ({:.2})", guidance.label, guidance.final_score);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Calibration monitoring over the item population.
pub mod calibration;
/// Configuration management for the engine.
pub mod config;
/// Confidence calculation and refinement.
pub mod confidence;
/// Outcome detection and the classifier strategy interface.
pub mod detector;
/// The engine facade tying ranking and learning together.
pub mod engine;
/// Error types and result aliases.
pub mod error;
/// Lifecycle state machine and deprecation rules.
pub mod lifecycle;
/// Tracing initialization for embedding hosts.
pub mod logging;
/// Trigger matching against action contexts.
pub mod matching;
/// Core knowledge item types.
pub mod model;
/// Relevance ranking.
pub mod ranking;
/// Knowledge repository trait and implementations.
pub mod store;

pub use calibration::{BandReport, CalibrationReport, ConfidenceBand};
pub use config::EngineConfig;
pub use detector::{OutcomeClassifier, PatternClassifier, SurfacedItem};
pub use engine::{EngineStats, ProceduralMemory};
pub use error::{EngineError, EngineResult, ItemError, StoreError, StoreResult};
pub use lifecycle::LifecycleManager;
pub use matching::{QueryContext, TriggerScores};
pub use model::{
    ItemStatus, KnowledgeSource, OutcomeKind, Priority, ProcessKnowledgeItem, ProcessPayload,
    ProcessType, TriggerConditions,
};
pub use ranking::{Ranker, RelevanceResult};
pub use store::{CandidateFilter, ItemCache, KnowledgeRepository, MemoryRepository, SqliteRepository};
