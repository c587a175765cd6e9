use thiserror::Error;

/// Failures surfaced by the Nexus registry.
///
/// Reads of the persisted collection never produce an error; only writes,
/// validation and configuration loading do.
#[derive(Debug, Error)]
pub enum NexusError {
    #[error("service `{0}` not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not allocate a unique service id after {0} attempts")]
    IdExhausted(usize),
}

impl NexusError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, NexusError>;
