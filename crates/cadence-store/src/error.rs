use thiserror::Error;

/// Errors from the SQLite-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Repeat options or job payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] figment::Error),
}

/// Store failures cross the engine boundary as transport errors.
impl From<StoreError> for cadence_repeat::RepeatError {
    fn from(err: StoreError) -> Self {
        cadence_repeat::RepeatError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
