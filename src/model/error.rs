use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by an [`ObjectStore`](crate::adapters::ObjectStore) primitive.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced by [`Provider`](crate::Provider) and [`Context`](crate::Context).
///
/// A missing key is never an error: reads resolve to `None` and deletes
/// succeed.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The key prefix is unset or unusable. The provider has to be rebuilt
    /// with a valid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A write was attempted through a read-only context. Raised before any
    /// store call is made.
    #[error("write operation `{operation}` on read-only context")]
    Permission { operation: &'static str },

    #[error("failed to read `{key}`: {source}")]
    StoreRead {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to write `{key}`: {source}")]
    StoreWrite {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to delete `{key}`: {source}")]
    StoreDelete {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl ProviderError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProviderError::Configuration(_))
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, ProviderError::Permission { .. })
    }

    pub fn is_store_read(&self) -> bool {
        matches!(self, ProviderError::StoreRead { .. })
    }

    pub fn is_store_write(&self) -> bool {
        matches!(self, ProviderError::StoreWrite { .. })
    }

    pub fn is_store_delete(&self) -> bool {
        matches!(self, ProviderError::StoreDelete { .. })
    }

    pub(crate) fn read(key: &str, source: impl Into<BoxError>) -> Self {
        ProviderError::StoreRead {
            key: key.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn write(key: &str, source: impl Into<BoxError>) -> Self {
        ProviderError::StoreWrite {
            key: key.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn delete(key: &str, source: impl Into<BoxError>) -> Self {
        ProviderError::StoreDelete {
            key: key.to_string(),
            source: source.into(),
        }
    }
}
