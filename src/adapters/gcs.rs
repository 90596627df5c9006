use async_trait::async_trait;
use google_cloud_storage::http::{
    objects::{
        delete::DeleteObjectRequest,
        download::Range,
        get::GetObjectRequest,
        list::ListObjectsRequest,
        upload::{Media, UploadObjectRequest, UploadType},
    },
    Error,
};

use crate::{
    adapters::{self, ObjectStore},
    model,
};

/// Single deletes kept in flight while emulating a batch delete.
const DELETE_CONCURRENCY: usize = 32;

fn is_not_found(err: &Error) -> bool {
    matches!(err, Error::Response(res) if res.code == 404)
}

#[async_trait]
impl ObjectStore for google_cloud_storage::client::Client {
    async fn store_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), model::error::StoreError> {
        let req = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };

        let mut media = Media::new(key.to_string());
        media.content_type = content_type.to_string().into();
        media.content_length = Some(body.len() as u64);

        self.upload_object(&req, body, &UploadType::Simple(media))
            .await
            .map_err(|err| {
                model::error::StoreError::new(format!("failed to put_object at: {}, {}", key, err))
            })?;

        Ok(())
    }

    async fn store_get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, model::error::StoreError> {
        let req = GetObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        match self.download_object(&req, &Range::default()).await {
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(model::error::StoreError::new(format!(
                "failed to download_object: {}, {}",
                key, err
            ))),
            Ok(bytes) => Ok(Some(bytes)),
        }
    }

    async fn store_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        max_keys: Option<i32>,
    ) -> Result<model::store::ObjectPage, model::error::StoreError> {
        let req = ListObjectsRequest {
            bucket: bucket.to_string(),
            prefix: Some(prefix.to_string()),
            page_token: marker.map(|m| m.to_string()),
            max_results: max_keys,
            ..Default::default()
        };

        let lo = self.list_objects(&req).await.map_err(|err| {
            model::error::StoreError::new(format!(
                "failed to list_objects at: {}, {}",
                prefix, err
            ))
        })?;

        let keys = lo
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|obj| obj.name)
            .collect();

        // GCS hands out opaque page tokens rather than key markers.
        Ok(model::store::ObjectPage {
            keys,
            is_truncated: lo.next_page_token.is_some(),
            next_marker: lo.next_page_token,
        })
    }

    async fn store_delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<(), model::error::StoreError> {
        let req = DeleteObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        match self.delete_object(&req).await {
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(model::error::StoreError::new(format!(
                "failed to delete_object: {}, {}",
                key, err
            ))),
            Ok(()) => Ok(()),
        }
    }

    async fn store_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<(), model::error::StoreError> {
        // The JSON API has no multi-object delete.
        adapters::delete_each(self, bucket, keys, DELETE_CONCURRENCY).await
    }
}
