use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};

use crate::model;

pub mod gcs;
pub mod mock;
pub mod s3;

/// The primitives a [`Context`](crate::Context) needs from an object store.
///
/// Missing keys are not errors: `store_get_object` yields `None` and the
/// delete primitives succeed.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn store_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), model::error::StoreError>;

    async fn store_get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, model::error::StoreError>;

    async fn store_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        max_keys: Option<i32>,
    ) -> Result<model::store::ObjectPage, model::error::StoreError>;

    async fn store_delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<(), model::error::StoreError>;

    async fn store_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<(), model::error::StoreError>;
}

/// Deletes `keys` one request at a time, keeping at most `concurrency`
/// requests in flight. For stores without a multi-object delete.
pub async fn delete_each<S>(
    store: &S,
    bucket: &str,
    keys: &[String],
    concurrency: usize,
) -> Result<(), model::error::StoreError>
where
    S: ObjectStore + ?Sized,
{
    let deletes: Vec<_> = keys
        .iter()
        .map(|key| store.store_delete_object(bucket, key))
        .collect();
    futures::stream::iter(deletes)
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await
}
