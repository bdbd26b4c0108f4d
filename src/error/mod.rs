use thiserror::Error;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Item error: {0}")]
    Item(#[from] ItemError),

    #[error("Invalid lifecycle transition: cannot {action} an item in state {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Knowledge repository errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    #[error("Concurrent update conflict on item: {item_id}")]
    Conflict { item_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Item construction and validation errors.
///
/// These are programmer-error-class violations; they surface only while
/// building or loading an item, never while scoring one.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Payload mismatch: item declares {declared} but carries a {actual} payload")]
    PayloadMismatch { declared: String, actual: String },

    #[error("Item label must not be empty")]
    EmptyLabel,

    #[error("Deprecation reason must not be empty")]
    EmptyReason,
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for repository operations
pub type StoreResult<T> = Result<T, StoreError>;
