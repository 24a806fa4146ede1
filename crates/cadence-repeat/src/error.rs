use thiserror::Error;

/// Errors that can occur within the repeat scheduling engine.
#[derive(Debug, Error)]
pub enum RepeatError {
    /// Both `pattern` and `every` are set on the same repeat definition.
    #[error("Both pattern and every are defined for this repeatable job")]
    ConflictingSchedule,

    /// `every` must be a positive number of milliseconds.
    #[error("Invalid repeat interval: {0} ms")]
    InvalidEvery(i64),

    /// A registry member string could not be decoded back into a repeat key.
    #[error("Invalid repeat key: {0}")]
    InvalidKey(String),

    /// Underlying registry store failure (connectivity, I/O, timeout).
    #[error("Registry store error: {0}")]
    Store(String),

    /// The job-creation collaborator rejected or failed the request.
    #[error("Job creation error: {0}")]
    JobCreation(String),

    /// Repeat options could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RepeatError>;
