//! SQLite-backed knowledge repository.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use super::{CandidateFilter, KnowledgeRepository};
use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};
use crate::model::{
    clamp_confidence, DeprecationInfo, ItemStatus, KnowledgeSource, OutcomeKind, Priority,
    ProcessKnowledgeItem, ProcessPayload, ProcessType, TriggerConditions,
};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const ITEM_COLUMNS: &str = "id, label, description, process_type, payload, priority, confidence, \
     status, triggers, source, evidence, created_by, created_at, updated_at, \
     success_count, failure_count, confirmation_count, contradiction_count, \
     outcome_history, times_surfaced, last_surfaced_at, deprecation, version";

/// SQLite repository implementation
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Create a new SQLite repository, running migrations on connect
    pub async fn new(config: &DatabaseConfig) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StoreError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let repository = Self { pool };
        repository.run_migrations().await?;

        Ok(repository)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl KnowledgeRepository for SqliteRepository {
    async fn get(&self, id: &str) -> StoreResult<Option<ProcessKnowledgeItem>> {
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "SELECT {} FROM items WHERE id = ?",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProcessKnowledgeItem::try_from).transpose()
    }

    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> StoreResult<Vec<ProcessKnowledgeItem>> {
        let query = if filter.include_deprecated {
            format!(
                "SELECT {} FROM items WHERE status != 'archived' ORDER BY created_at ASC, id ASC",
                ITEM_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM items WHERE status IN ('active', 'needs_validation') \
                 ORDER BY created_at ASC, id ASC",
                ITEM_COLUMNS
            )
        };

        let rows: Vec<ItemRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match ProcessKnowledgeItem::try_from(row) {
                Ok(item) => items.push(item),
                // One corrupt row must not take the population down.
                Err(e) => warn!(item_id = %id, error = %e, "Skipping unreadable item row"),
            }
        }
        Ok(items)
    }

    async fn save(&self, item: &ProcessKnowledgeItem) -> StoreResult<()> {
        let encoded = EncodedItem::try_from(item)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO items (
                id, label, description, process_type, payload, priority, confidence,
                status, triggers, source, evidence, created_by, created_at, updated_at,
                success_count, failure_count, confirmation_count, contradiction_count,
                outcome_history, times_surfaced, last_surfaced_at, deprecation, version
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.label)
        .bind(&item.description)
        .bind(item.process_type.as_str())
        .bind(&encoded.payload)
        .bind(item.priority.as_str())
        .bind(item.confidence)
        .bind(item.status.as_str())
        .bind(&encoded.triggers)
        .bind(item.source.as_str())
        .bind(&item.evidence)
        .bind(&item.created_by)
        .bind(item.created_at.to_rfc3339())
        .bind(item.updated_at.to_rfc3339())
        .bind(item.success_count)
        .bind(item.failure_count)
        .bind(item.confirmation_count)
        .bind(item.contradiction_count)
        .bind(&encoded.outcome_history)
        .bind(item.times_surfaced)
        .bind(item.last_surfaced_at.map(|t| t.to_rfc3339()))
        .bind(&encoded.deprecation)
        .bind(item.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_versioned(&self, item: &ProcessKnowledgeItem) -> StoreResult<()> {
        let encoded = EncodedItem::try_from(item)?;
        let result = sqlx::query(
            r#"
            UPDATE items
            SET label = ?, description = ?, process_type = ?, payload = ?, priority = ?,
                confidence = ?, status = ?, triggers = ?, source = ?, evidence = ?,
                created_by = ?, updated_at = ?, success_count = ?, failure_count = ?,
                confirmation_count = ?, contradiction_count = ?, outcome_history = ?,
                times_surfaced = ?, last_surfaced_at = ?, deprecation = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(&item.label)
        .bind(&item.description)
        .bind(item.process_type.as_str())
        .bind(&encoded.payload)
        .bind(item.priority.as_str())
        .bind(item.confidence)
        .bind(item.status.as_str())
        .bind(&encoded.triggers)
        .bind(item.source.as_str())
        .bind(&item.evidence)
        .bind(&item.created_by)
        .bind(item.updated_at.to_rfc3339())
        .bind(item.success_count)
        .bind(item.failure_count)
        .bind(item.confirmation_count)
        .bind(item.contradiction_count)
        .bind(&encoded.outcome_history)
        .bind(item.times_surfaced)
        .bind(item.last_surfaced_at.map(|t| t.to_rfc3339()))
        .bind(&encoded.deprecation)
        .bind(&item.id)
        .bind(item.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Disambiguate a lost race from a missing item.
            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM items WHERE id = ?")
                .bind(&item.id)
                .fetch_optional(&self.pool)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::Conflict {
                    item_id: item.id.clone(),
                },
                None => StoreError::ItemNotFound {
                    item_id: item.id.clone(),
                },
            });
        }

        Ok(())
    }
}

// ============================================================================
// Row Conversion
// ============================================================================

/// JSON-encoded columns prepared once per write.
struct EncodedItem {
    payload: String,
    triggers: String,
    outcome_history: String,
    deprecation: Option<String>,
}

impl TryFrom<&ProcessKnowledgeItem> for EncodedItem {
    type Error = StoreError;

    fn try_from(item: &ProcessKnowledgeItem) -> Result<Self, Self::Error> {
        Ok(Self {
            payload: serde_json::to_string(&item.payload).map_err(json_error)?,
            triggers: serde_json::to_string(&item.triggers).map_err(json_error)?,
            outcome_history: serde_json::to_string(&item.outcome_history).map_err(json_error)?,
            deprecation: item
                .deprecation
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(json_error)?,
        })
    }
}

fn json_error(e: serde_json::Error) -> StoreError {
    StoreError::Query {
        message: format!("JSON encoding failed: {}", e),
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    label: String,
    description: String,
    process_type: String,
    payload: String,
    priority: String,
    confidence: f64,
    status: String,
    triggers: String,
    source: String,
    evidence: String,
    created_by: String,
    created_at: String,
    updated_at: String,
    success_count: u32,
    failure_count: u32,
    confirmation_count: u32,
    contradiction_count: u32,
    outcome_history: String,
    times_surfaced: u32,
    last_surfaced_at: Option<String>,
    deprecation: Option<String>,
    version: i64,
}

impl TryFrom<ItemRow> for ProcessKnowledgeItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let process_type = ProcessType::from_str(&row.process_type).map_err(parse_error)?;
        let payload: ProcessPayload = serde_json::from_str(&row.payload).map_err(json_error)?;
        let priority = Priority::from_str(&row.priority).map_err(parse_error)?;
        let status = ItemStatus::from_str(&row.status).map_err(parse_error)?;
        let triggers: TriggerConditions =
            serde_json::from_str(&row.triggers).map_err(json_error)?;
        let source = KnowledgeSource::from_str(&row.source).map_err(parse_error)?;
        let outcome_history: Vec<OutcomeKind> =
            serde_json::from_str(&row.outcome_history).map_err(json_error)?;
        let deprecation: Option<DeprecationInfo> = row
            .deprecation
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(json_error)?;

        // Out-of-range trust on load is clamped with a warning, not rejected.
        let confidence = if (0.10..=0.99).contains(&row.confidence) {
            row.confidence
        } else {
            let clamped = clamp_confidence(row.confidence);
            warn!(
                item_id = %row.id,
                stored = row.confidence,
                clamped = clamped,
                "Clamping out-of-range confidence loaded from store"
            );
            clamped
        };

        let item = ProcessKnowledgeItem {
            id: row.id,
            label: row.label,
            description: row.description,
            process_type,
            payload,
            priority,
            confidence,
            status,
            triggers,
            source,
            evidence: row.evidence,
            created_by: row.created_by,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            success_count: row.success_count,
            failure_count: row.failure_count,
            confirmation_count: row.confirmation_count,
            contradiction_count: row.contradiction_count,
            outcome_history,
            times_surfaced: row.times_surfaced,
            last_surfaced_at: row
                .last_surfaced_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            deprecation,
            version: row.version,
        };

        item.validate().map_err(|e| StoreError::Query {
            message: format!("Stored item {} is inconsistent: {}", item.id, e),
        })?;

        Ok(item)
    }
}

fn parse_error(message: String) -> StoreError {
    StoreError::Query { message }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Query {
            message: format!("Invalid timestamp '{}': {}", raw, e),
        })
}
