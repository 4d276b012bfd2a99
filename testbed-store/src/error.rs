use thiserror::Error;

/// Errors raised by the persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
    #[error("unable to parse value for key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("file/directory creation error: {0}")]
    FileCreation(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// True for errors caused by malformed namespaces, keys or prefixes.
    #[inline]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidNamespace(_) | Self::InvalidKey(_) | Self::InvalidPrefix(_)
        )
    }

    /// True when a stored record could not be deserialized.
    #[inline]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
