use testbed_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no such result: {0}")]
    NotFound(Uuid),

    #[error("failed to materialize result {uuid}: {message}")]
    Materialize { uuid: Uuid, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    pub fn materialize(uuid: Uuid, message: impl Into<String>) -> Self {
        Self::Materialize {
            uuid,
            message: message.into(),
        }
    }
}
