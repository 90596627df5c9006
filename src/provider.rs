use tracing::{error, info, instrument};

use crate::{
    adapters::ObjectStore,
    context::{Context, Mode},
    model::error::ProviderError,
    util::key,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub bucket: String,
    /// Namespace every key is written under. Checked by [`Provider::open`].
    pub key_prefix: Option<String>,
}

impl ProviderConfig {
    pub fn new(bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key_prefix: Some(key_prefix.into()),
        }
    }
}

/// Store client plus the bucket it operates on. Owned by a [`Provider`] and
/// borrowed by every [`Context`] it hands out.
pub struct Connection<S> {
    pub(crate) client: S,
    pub(crate) bucket: String,
}

pub struct Provider<S> {
    connection: Connection<S>,
    key_prefix: String,
}

impl<S: ObjectStore> Provider<S> {
    pub fn new(client: S, config: ProviderConfig) -> Self {
        Self {
            connection: Connection {
                client,
                bucket: config.bucket,
            },
            key_prefix: config.key_prefix.unwrap_or_default(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.connection.bucket
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn store(&self) -> &S {
        &self.connection.client
    }

    /// Checks the configuration and probes the namespace.
    ///
    /// Returns `true` when nothing is stored under the key prefix yet. The
    /// probe lists at most one key, so its cost does not depend on how much
    /// the namespace holds.
    #[instrument(skip(self), fields(bucket = %self.connection.bucket, key_prefix = %self.key_prefix))]
    pub async fn open(&self) -> Result<bool, ProviderError> {
        info!("called");

        let prefix = key::namespace_prefix(&self.key_prefix).map_err(|err| {
            error!(error_message=%err, error_group="configuration");
            err
        })?;

        let page = self
            .connection
            .client
            .store_list_objects(&self.connection.bucket, &prefix, None, Some(1))
            .await
            .map_err(|err| {
                error!(error_message=%err, error_group="list_objects");
                ProviderError::read(&prefix, err)
            })?;

        let first_access = page.keys.is_empty();
        info!(first_access, "opened");

        Ok(first_access)
    }

    pub fn read_only_context(&self) -> Context<'_, S> {
        Context::new(&self.connection, &self.key_prefix, Mode::ReadOnly)
    }

    pub fn read_write_context(&self) -> Context<'_, S> {
        Context::new(&self.connection, &self.key_prefix, Mode::ReadWrite)
    }
}
