use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, instrument};

use crate::{
    adapters::ObjectStore,
    model::{
        error::{ProviderError, StoreError},
        store::{CONTENT_TYPE_JSON, CONTENT_TYPE_OCTET_STREAM},
        value::Value,
    },
    provider::Connection,
    util::key,
};

/// Largest key set a single `DeleteObjects` call accepts.
pub const MAX_DELETE_BATCH: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    ReadOnly,
    ReadWrite,
}

/// View over one namespace of a [`Provider`](crate::Provider)'s connection.
///
/// Keys given to a context are logical keys; they are stored as
/// `<namespace>/<key>`. Read-only contexts reject writes before touching the
/// store.
pub struct Context<'p, S> {
    connection: &'p Connection<S>,
    namespace: &'p str,
    mode: Mode,
}

impl<S> Clone for Context<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Context<'_, S> {}

impl<'p, S: ObjectStore> Context<'p, S> {
    pub(crate) fn new(connection: &'p Connection<S>, namespace: &'p str, mode: Mode) -> Self {
        Self {
            connection,
            namespace,
            mode,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == Mode::ReadOnly
    }

    pub fn namespace(&self) -> &str {
        self.namespace
    }

    fn ensure_writable(&self, operation: &'static str) -> Result<(), ProviderError> {
        if self.is_read_only() {
            error!(operation, error_group = "permission", "write on read-only context");
            return Err(ProviderError::Permission { operation });
        }

        Ok(())
    }

    async fn write(
        &self,
        store_key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ProviderError> {
        debug!(store_key, content_length = body.len(), content_type, "put_object");

        self.connection
            .client
            .store_put_object(&self.connection.bucket, store_key, body, content_type)
            .await
            .map_err(|err| {
                error!(error_message=%err, error_group="put_object");
                ProviderError::write(store_key, err)
            })
    }

    async fn read(&self, store_key: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        self.connection
            .client
            .store_get_object(&self.connection.bucket, store_key)
            .await
            .map_err(|err| {
                error!(error_message=%err, error_group="get_object");
                ProviderError::read(store_key, err)
            })
    }

    #[instrument(skip(self, value), fields(namespace = self.namespace))]
    pub async fn put(&self, key: &str, value: &Value) -> Result<(), ProviderError> {
        self.ensure_writable("put")?;
        let store_key = key::compose_key(self.namespace, key)?;

        let body = value
            .encode()
            .map_err(|err| ProviderError::write(&store_key, err))?;

        self.write(&store_key, body, CONTENT_TYPE_JSON).await
    }

    pub async fn put_json<T>(&self, key: &str, value: &T) -> Result<(), ProviderError>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_writable("put")?;
        let store_key = key::compose_key(self.namespace, key)?;

        let json = serde_json::to_value(value).map_err(|err| {
            error!(error_message=%err, error_group="serialize");
            ProviderError::write(&store_key, err)
        })?;

        self.put(key, &Value::Json(json)).await
    }

    /// Stores `bytes` untouched as `application/octet-stream`. Read them back
    /// with [`Context::get_buffer`].
    #[instrument(skip(self, bytes), fields(namespace = self.namespace))]
    pub async fn put_buffer(&self, key: &str, bytes: &[u8]) -> Result<(), ProviderError> {
        self.ensure_writable("put_buffer")?;
        let store_key = key::compose_key(self.namespace, key)?;

        self.write(&store_key, bytes.to_vec(), CONTENT_TYPE_OCTET_STREAM)
            .await
    }

    /// Returns `None` if nothing is stored under `key`.
    #[instrument(skip(self), fields(namespace = self.namespace))]
    pub async fn get(&self, key: &str) -> Result<Option<Value>, ProviderError> {
        let store_key = key::compose_key(self.namespace, key)?;

        let Some(body) = self.read(&store_key).await? else {
            debug!(%store_key, "not found");
            return Ok(None);
        };

        Value::decode(&body).map(Some).map_err(|err| {
            error!(error_message=%err, error_group="decode");
            ProviderError::read(&store_key, err)
        })
    }

    /// Binary payloads are not JSON and fail with `StoreRead`; use
    /// [`Context::get`] for keys that may hold either.
    pub async fn get_json<T>(&self, key: &str) -> Result<Option<T>, ProviderError>
    where
        T: DeserializeOwned,
    {
        let store_key = key::compose_key(self.namespace, key)?;

        let json = match self.get(key).await? {
            None => return Ok(None),
            Some(Value::Json(json)) => json,
            Some(Value::Binary(_)) => {
                error!(%store_key, error_group = "deserialize", "binary payload");
                return Err(ProviderError::read(
                    &store_key,
                    StoreError::new("binary payload cannot be read as JSON"),
                ));
            }
        };

        serde_json::from_value(json).map(Some).map_err(|err| {
            error!(error_message=%err, error_group="deserialize");
            ProviderError::read(&store_key, err)
        })
    }

    #[instrument(skip(self), fields(namespace = self.namespace))]
    pub async fn get_buffer(&self, key: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        let store_key = key::compose_key(self.namespace, key)?;

        self.read(&store_key).await
    }

    /// Deleting a key that does not exist succeeds.
    #[instrument(skip(self), fields(namespace = self.namespace))]
    pub async fn delete(&self, key: &str) -> Result<(), ProviderError> {
        self.ensure_writable("delete")?;
        let store_key = key::compose_key(self.namespace, key)?;

        self.connection
            .client
            .store_delete_object(&self.connection.bucket, &store_key)
            .await
            .map_err(|err| {
                error!(error_message=%err, error_group="delete_object");
                ProviderError::delete(&store_key, err)
            })
    }

    /// Removes every key of the namespace.
    ///
    /// The whole namespace is listed before the first delete is issued.
    /// There is no cross-object atomicity: a failing batch leaves the
    /// namespace partially cleared, and writes racing with `clear` may
    /// survive it.
    #[instrument(skip(self), fields(namespace = self.namespace))]
    pub async fn clear(&self) -> Result<(), ProviderError> {
        self.ensure_writable("clear")?;
        let prefix = key::namespace_prefix(self.namespace)?;

        let pending = self.list_all(&prefix).await.map_err(|err| {
            error!(error_message=%err, error_group="list_objects");
            ProviderError::delete(&prefix, err)
        })?;

        if pending.is_empty() {
            debug!(%prefix, "nothing to clear");
            return Ok(());
        }

        debug!(%prefix, keys = pending.len(), "clearing");

        for batch in pending.chunks(MAX_DELETE_BATCH) {
            self.connection
                .client
                .store_delete_objects(&self.connection.bucket, batch)
                .await
                .map_err(|err| {
                    error!(error_message=%err, error_group="delete_objects");
                    ProviderError::delete(&prefix, err)
                })?;
        }

        Ok(())
    }

    async fn list_all(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .connection
                .client
                .store_list_objects(&self.connection.bucket, prefix, marker.as_deref(), None)
                .await?;

            keys.extend(page.keys);

            if !page.is_truncated {
                return Ok(keys);
            }

            marker = match page.next_marker.or_else(|| keys.last().cloned()) {
                Some(next) if marker.as_deref() != Some(next.as_str()) => Some(next),
                _ => {
                    return Err(StoreError::new(format!(
                        "listing of {} is truncated without a usable continuation marker",
                        prefix
                    )))
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::{
        adapters::mock::{MemoryStore, Operation},
        provider::{Provider, ProviderConfig},
    };

    const BUCKET: &str = "bucket";

    fn provider(store: MemoryStore) -> Provider<MemoryStore> {
        Provider::new(store, ProviderConfig::new(BUCKET, "ns"))
    }

    #[tokio::test]
    async fn test_put_get_binary() {
        let provider = provider(MemoryStore::new());
        assert!(provider.open().await.unwrap());
        let context = provider.read_write_context();

        context.put("key", &Value::Binary(vec![5, 2, 5])).await.unwrap();

        let result = context.get("key").await.unwrap();
        assert_eq!(result, Some(Value::Binary(vec![5, 2, 5])));
    }

    #[tokio::test]
    async fn test_put_writes_json_under_namespace() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();

        context
            .put("node", &json!({"id": "root", "mode": 16877}).into())
            .await
            .unwrap();

        let object = provider.store().object(BUCKET, "ns/node").unwrap();
        assert_eq!(object.content_type, CONTENT_TYPE_JSON);
        assert_eq!(object.content_length, object.body.len());
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&object.body).unwrap(),
            json!({"id": "root", "mode": 16877})
        );
        assert_eq!(provider.store().keys(BUCKET), vec!["ns/node"]);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();

        context.put("key", &json!("first").into()).await.unwrap();
        context.put("key", &Value::Binary(vec![1])).await.unwrap();

        assert_eq!(context.get("key").await.unwrap(), Some(Value::Binary(vec![1])));
    }

    #[tokio::test]
    async fn test_typed_json_helpers() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Node {
            id: String,
            size: u64,
        }

        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();
        let node = Node {
            id: "a".to_string(),
            size: 42,
        };

        context.put_json("node", &node).await.unwrap();

        assert_eq!(context.get_json::<Node>("node").await.unwrap(), Some(node));
        assert_eq!(context.get_json::<Node>("missing").await.unwrap(), None);
        assert!(context
            .get_json::<u64>("node")
            .await
            .unwrap_err()
            .is_store_read());
    }

    #[tokio::test]
    async fn test_get_json_rejects_binary() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();
        context.put("blob", &Value::Binary(vec![5, 2, 5])).await.unwrap();

        let err = context.get_json::<Vec<u8>>("blob").await.unwrap_err();
        assert!(matches!(err, ProviderError::StoreRead { ref key, .. } if key == "ns/blob"));
    }

    #[tokio::test]
    async fn test_put_json_errors_use_store_key() {
        struct Unserializable;

        impl Serialize for Unserializable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("unserializable"))
            }
        }

        let provider = provider(MemoryStore::new());

        let err = provider
            .read_write_context()
            .put_json("key", &Unserializable)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::StoreWrite { ref key, .. } if key == "ns/key"));
        assert_eq!(provider.store().mutations(), 0);
    }

    #[tokio::test]
    async fn test_tagged_json_round_trips() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();

        for value in [
            json!({"isBinary": true, "name": "x"}),
            json!({"isBinary": true, "bytes": [1, 2], "extra": 7}),
        ] {
            context.put("key", &value.clone().into()).await.unwrap();
            assert_eq!(context.get("key").await.unwrap(), Some(Value::Json(value)));
        }
    }

    #[tokio::test]
    async fn test_json_shaped_like_binary_is_not_written() {
        let provider = provider(MemoryStore::new());

        let err = provider
            .read_write_context()
            .put("key", &json!({"isBinary": true, "bytes": [1, 2]}).into())
            .await
            .unwrap_err();
        assert!(err.is_store_write());
        assert_eq!(provider.store().mutations(), 0);
    }

    #[tokio::test]
    async fn test_buffer_round_trip() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();
        let bytes: Vec<u8> = (0..=255).collect();

        context.put_buffer("raw", &bytes).await.unwrap();

        let object = provider.store().object(BUCKET, "ns/raw").unwrap();
        assert_eq!(object.content_type, CONTENT_TYPE_OCTET_STREAM);
        assert_eq!(object.content_length, 256);
        assert_eq!(context.get_buffer("raw").await.unwrap(), Some(bytes));
        assert_eq!(context.get_buffer("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let provider = provider(MemoryStore::new());

        assert_eq!(provider.read_only_context().get("missing").await.unwrap(), None);
        assert_eq!(provider.read_write_context().get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_corrupt_payload_fails() {
        let provider = provider(MemoryStore::new());
        provider.store().insert_raw(BUCKET, "ns/corrupt", b"\x00not json");

        let err = provider.read_only_context().get("corrupt").await.unwrap_err();
        assert!(err.is_store_read());
    }

    #[tokio::test]
    async fn test_store_failures_are_typed() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();
        context.put("key", &json!(1).into()).await.unwrap();

        provider.store().fail_on(Operation::Put);
        provider.store().fail_on(Operation::Get);
        provider.store().fail_on(Operation::Delete);

        assert!(context.put("key", &json!(2).into()).await.unwrap_err().is_store_write());
        assert!(context.get("key").await.unwrap_err().is_store_read());
        assert!(context.delete("key").await.unwrap_err().is_store_delete());
    }

    #[tokio::test]
    async fn test_delete() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();

        context.put("key", &json!("value").into()).await.unwrap();
        context.delete("key").await.unwrap();

        assert_eq!(context.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_missing_key_succeeds() {
        let provider = provider(MemoryStore::new());

        provider.read_write_context().delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_clear() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();

        context.put("key1", &Value::Binary(vec![5, 2, 5])).await.unwrap();
        context.put("key2", &Value::Binary(vec![10, 20, 50])).await.unwrap();
        context.clear().await.unwrap();

        assert_eq!(context.get("key1").await.unwrap(), None);
        assert_eq!(context.get("key2").await.unwrap(), None);
        assert!(provider.open().await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_across_pages() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();
        for i in 0..1500 {
            provider
                .store()
                .insert_raw(BUCKET, &format!("ns/{:04}", i), b"{}");
        }

        context.clear().await.unwrap();

        assert_eq!(provider.store().calls(Operation::List), 2);
        assert_eq!(provider.store().calls(Operation::DeleteBatch), 2);
        for i in 0..1500 {
            assert_eq!(context.get(&format!("{:04}", i)).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_clear_lists_everything_before_deleting() {
        let provider = provider(MemoryStore::with_page_size(10));
        let context = provider.read_write_context();
        for i in 0..25 {
            provider
                .store()
                .insert_raw(BUCKET, &format!("ns/{:02}", i), b"{}");
        }
        provider.store().fail_after(Operation::List, 2);

        let err = context.clear().await.unwrap_err();

        assert!(err.is_store_delete());
        assert_eq!(provider.store().calls(Operation::DeleteBatch), 0);
        assert_eq!(provider.store().keys(BUCKET).len(), 25);
    }

    #[tokio::test]
    async fn test_clear_fails_on_listing_without_marker() {
        let provider = provider(MemoryStore::new());
        provider.store().insert_raw(BUCKET, "ns/key", b"{}");
        provider.store().stall_listing();

        let err = provider.read_write_context().clear().await.unwrap_err();

        assert!(err.is_store_delete());
        assert_eq!(provider.store().calls(Operation::List), 1);
        assert_eq!(provider.store().calls(Operation::DeleteBatch), 0);
        assert_eq!(provider.store().keys(BUCKET), vec!["ns/key"]);
    }

    #[tokio::test]
    async fn test_clear_empty_namespace_does_not_mutate() {
        let provider = provider(MemoryStore::new());

        provider.read_write_context().clear().await.unwrap();

        assert_eq!(provider.store().calls(Operation::List), 1);
        assert_eq!(provider.store().mutations(), 0);
    }

    #[tokio::test]
    async fn test_clear_keeps_sibling_namespaces() {
        let provider = provider(MemoryStore::new());
        provider.store().insert_raw(BUCKET, "ns/key", b"{}");
        provider.store().insert_raw(BUCKET, "ns2/key", b"{}");
        provider.store().insert_raw(BUCKET, "nsfile", b"{}");

        provider.read_write_context().clear().await.unwrap();

        assert_eq!(provider.store().keys(BUCKET), vec!["ns2/key", "nsfile"]);
    }

    #[tokio::test]
    async fn test_clear_batch_failure() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();
        context.put("key", &json!(1).into()).await.unwrap();
        provider.store().fail_on(Operation::DeleteBatch);

        assert!(context.clear().await.unwrap_err().is_store_delete());
        assert_eq!(provider.store().keys(BUCKET), vec!["ns/key"]);
    }

    #[tokio::test]
    async fn test_read_only_context_rejects_writes() {
        let provider = provider(MemoryStore::new());
        provider.store().insert_raw(BUCKET, "ns/key", br#"{"isBinary":true,"bytes":[1]}"#);
        let context = provider.read_only_context();
        assert!(context.is_read_only());

        let errors = vec![
            context.put("key1", &Value::Binary(vec![5, 2, 5])).await.unwrap_err(),
            context.put_json("key1", &json!(1)).await.unwrap_err(),
            context.put_buffer("key1", &[1]).await.unwrap_err(),
            context.delete("key").await.unwrap_err(),
            context.clear().await.unwrap_err(),
        ];

        assert!(errors.iter().all(ProviderError::is_permission));
        assert_eq!(provider.store().mutations(), 0);
        assert_eq!(provider.store().calls(Operation::List), 0);
        assert_eq!(context.get("key").await.unwrap(), Some(Value::Binary(vec![1])));
    }

    #[tokio::test]
    async fn test_concurrent_puts() {
        let provider = provider(MemoryStore::new());
        let context = provider.read_write_context();

        let puts = (0..16).map(|i| async move {
            context
                .put(&format!("key{}", i), &Value::Binary(vec![i as u8]))
                .await
        });
        for result in futures::future::join_all(puts).await {
            result.unwrap();
        }

        for i in 0..16 {
            assert_eq!(
                context.get(&format!("key{}", i)).await.unwrap(),
                Some(Value::Binary(vec![i as u8]))
            );
        }
    }
}
