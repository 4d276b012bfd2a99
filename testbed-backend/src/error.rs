use thiserror::Error;

use testbed_cache::CacheError;
use testbed_config::ConfigError;
use testbed_job_queue::JobQueueError;
use testbed_store::StoreError;

/// Top-level error shared by the managers and the server context.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("cache error: {0}")]
    Cache(CacheError),
    #[error("job queue error: {0}")]
    JobQueue(#[from] JobQueueError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<CacheError> for ServerError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(uuid) => Self::NotFound(format!("result {uuid}")),
            CacheError::Store(e) => Self::Store(e),
            other => Self::Cache(other),
        }
    }
}

impl ServerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True for caller mistakes, including malformed store keys.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Store(e) => e.is_validation(),
            _ => false,
        }
    }
}
