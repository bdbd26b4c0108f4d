//! End-to-end engine tests over the in-memory repository: the full
//! rank → detect → refine loop, fail-open behavior, cache staleness, and
//! the human lifecycle actions.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use procedural_memory::{
    EngineConfig, EngineError, ItemStatus, KnowledgeRepository, KnowledgeSource, MemoryRepository,
    OutcomeKind, Priority, ProceduralMemory, ProcessKnowledgeItem, ProcessPayload, QueryContext,
    SurfacedItem, TriggerConditions,
};

fn plugin_item() -> ProcessKnowledgeItem {
    ProcessKnowledgeItem::new(
        "bump plugin version",
        ProcessPayload::Warning {
            risk: "stale version shipped".to_string(),
            severity: "high".to_string(),
            detection: "plugin.json unchanged".to_string(),
            mitigation: "bump the version field".to_string(),
        },
        KnowledgeSource::UserCorrection,
        Priority::Critical,
    )
    .with_triggers(
        TriggerConditions::new()
            .with_tools(vec!["Write".to_string(), "Edit".to_string()])
            .with_file_patterns(vec!["**/plugin.json".to_string()])
            .with_action_keywords(vec!["version bump".to_string()]),
    )
    .with_evidence("user corrected a forgotten bump on 2024-11-02")
}

fn write_context() -> QueryContext {
    QueryContext::new()
        .with_tool("Write")
        .with_file_path("/x/plugin.json")
        .with_recent_messages(vec!["doing the version bump now".to_string()])
}

async fn engine() -> (ProceduralMemory, Arc<MemoryRepository>) {
    let repo = Arc::new(MemoryRepository::new());
    let engine = ProceduralMemory::new(repo.clone(), EngineConfig::default());
    (engine, repo)
}

#[tokio::test]
async fn learn_then_rank_surfaces_the_item() {
    let (engine, _repo) = engine().await;
    let id = engine.learn(plugin_item()).await.unwrap();

    let results = engine.rank(&write_context()).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item_id, id);
    assert!(results[0].final_score >= 0.7);
}

#[tokio::test]
async fn empty_repository_ranks_to_empty_list() {
    let (engine, _repo) = engine().await;
    let results = engine.rank(&write_context()).await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn full_loop_detects_and_records_confirmation() {
    let (engine, repo) = engine().await;
    let id = engine.learn(plugin_item()).await.unwrap();

    let (results, surfaced) = engine.rank_and_track(&write_context()).await;
    assert_eq!(results.len(), 1);
    assert_eq!(surfaced.len(), 1);

    let outcomes = engine
        .detect_outcomes(&surfaced, "good catch, bumped before shipping")
        .await;
    assert_eq!(outcomes[&id], OutcomeKind::Confirmation);

    let stored = repo.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.confirmation_count, 1);
    // 0.95 * 1.10 clamps at the ceiling.
    assert!((stored.confidence - 0.99).abs() < 1e-9);
    assert_eq!(stored.outcome_history, vec![OutcomeKind::Confirmation]);
}

#[tokio::test]
async fn repeated_failures_deprecate_through_the_engine() {
    let (engine, repo) = engine().await;
    let mut item = plugin_item();
    item.confidence = 0.70;
    let id = engine.learn(item).await.unwrap();

    for _ in 0..3 {
        engine.record_outcome(&id, OutcomeKind::Failure).await.unwrap();
    }

    let stored = repo.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, ItemStatus::Deprecated);
    assert!(stored.deprecation.as_ref().unwrap().automatic);
    assert_eq!(stored.failure_count, 3);

    // The deprecated item no longer surfaces once the session refreshes.
    engine.refresh().await;
    assert!(engine.rank(&write_context()).await.is_empty());

    let stats = engine.stats().await;
    assert_eq!(stats.refinements, 3);
    assert_eq!(stats.auto_deprecations, 1);
}

#[tokio::test]
async fn session_cache_is_stale_until_refreshed() {
    let (engine, repo) = engine().await;
    let id = engine.learn(plugin_item()).await.unwrap();

    // Populate the session cache.
    assert_eq!(engine.rank(&write_context()).await.len(), 1);

    // An out-of-band write (e.g. another process deprecating the item) is
    // not visible to the cached snapshot.
    let mut stored = repo.get(&id).await.unwrap().unwrap();
    stored.status = ItemStatus::Deprecated;
    repo.save(&stored).await.unwrap();
    assert_eq!(engine.rank(&write_context()).await.len(), 1);

    // Forced refresh sees it.
    engine.refresh().await;
    assert!(engine.rank(&write_context()).await.is_empty());
}

#[tokio::test]
async fn detect_outcomes_continues_past_unknown_items() {
    let (engine, _repo) = engine().await;
    let id = engine.learn(plugin_item()).await.unwrap();
    let (_, mut surfaced) = engine.rank_and_track(&write_context()).await;
    surfaced.push(SurfacedItem {
        item_id: "vanished".to_string(),
        label: "gone".to_string(),
        mistake_markers: vec![],
    });

    let outcomes = engine.detect_outcomes(&surfaced, "all done").await;
    // Both classified; the unknown item's recording is a silent no-op.
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[&id], OutcomeKind::Success);
}

#[tokio::test]
async fn validate_promotes_and_contradict_twice_deprecates() {
    let (engine, repo) = engine().await;
    let mut item = plugin_item();
    item.confidence = 0.72;
    item.status = ItemStatus::NeedsValidation;
    let id = engine.learn(item).await.unwrap();

    let status = engine.validate(&id).await.unwrap();
    assert_eq!(status, ItemStatus::Active);

    engine.contradict(&id, "not our convention").await.unwrap();
    engine.contradict(&id, "still not").await.unwrap();

    let stored = repo.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, ItemStatus::Deprecated);
    assert_eq!(stored.contradiction_count, 2);
}

#[tokio::test]
async fn explicit_deprecate_requires_reason_and_marks_manual() {
    let (engine, repo) = engine().await;
    let id = engine.learn(plugin_item()).await.unwrap();

    assert!(engine.deprecate(&id, "   ").await.is_err());
    engine.deprecate(&id, "workflow retired").await.unwrap();

    let stored = repo.get(&id).await.unwrap().unwrap();
    let info = stored.deprecation.as_ref().unwrap();
    assert!(!info.automatic);
    assert_eq!(info.reason, "workflow retired");
}

#[tokio::test]
async fn archive_is_terminal_via_engine() {
    let (engine, repo) = engine().await;
    let id = engine.learn(plugin_item()).await.unwrap();

    engine.archive(&id).await.unwrap();
    engine.archive(&id).await.unwrap(); // idempotent

    let err = engine.validate(&id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    // Outcomes against an archived item change nothing.
    engine.record_outcome(&id, OutcomeKind::Failure).await.unwrap();
    let stored = repo.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.failure_count, 0);
    assert_eq!(stored.status, ItemStatus::Archived);
}

#[tokio::test]
async fn lifecycle_actions_on_missing_items_error() {
    let (engine, _repo) = engine().await;
    assert!(engine.validate("missing").await.is_err());
    assert!(engine.deprecate("missing", "reason").await.is_err());
}

#[tokio::test]
async fn calibration_report_reflects_population() {
    let (engine, _repo) = engine().await;
    let mut well_calibrated = plugin_item();
    well_calibrated.confidence = 0.85;
    well_calibrated.success_count = 17;
    well_calibrated.failure_count = 3;
    engine.learn(well_calibrated).await.unwrap();

    let mut overconfident = plugin_item();
    overconfident.confidence = 0.95;
    overconfident.success_count = 5;
    overconfident.failure_count = 5;
    engine.learn(overconfident).await.unwrap();

    let report = engine.calibration_report().await;
    assert_eq!(report.total_items, 2);
    assert_eq!(report.flagged().len(), 1);
    assert!((report.flagged()[0].band.lower - 0.90).abs() < 1e-9);
}

#[tokio::test]
async fn concurrent_refinements_lose_no_outcomes() {
    let repo = Arc::new(MemoryRepository::new());
    // With eight writers racing on one item, each may lose several CAS
    // rounds before winning one; give the retry loop enough headroom that
    // no increment is dropped.
    let mut config = EngineConfig::default();
    config.refinement.max_update_retries = 16;
    let engine = ProceduralMemory::new(repo.clone(), config);
    let id = engine.learn(plugin_item()).await.unwrap();
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        let id = id.clone();
        let outcome = if i % 2 == 0 {
            OutcomeKind::Success
        } else {
            OutcomeKind::Confirmation
        };
        handles.push(tokio::spawn(async move {
            engine.record_outcome(&id, outcome).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stored = repo.get(&id).await.unwrap().unwrap();
    // Every counter increment survived the interleaving.
    assert_eq!(stored.success_count + stored.confirmation_count, 8);
    assert_eq!(stored.outcome_history.len(), 8);
}
