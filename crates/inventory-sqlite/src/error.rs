use inventory_core::EngineError;

/// Failures inside the SQLite layer. Domain errors raised mid-transaction
/// pass through unchanged; everything else becomes
/// [`EngineError::Persistence`] at the store trait boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt record json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt column {column}: {value}")]
    Column { column: &'static str, value: String },

    #[error("database lock poisoned")]
    Poisoned,
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Engine(inner) => inner,
            other => EngineError::Persistence(other.to_string()),
        }
    }
}
