use async_trait::async_trait;
use aws_sdk_s3::{
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{Delete, ObjectIdentifier},
};

use crate::{adapters, model};

#[async_trait]
impl adapters::ObjectStore for aws_sdk_s3::Client {
    async fn store_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), model::error::StoreError> {
        let content_length = body.len() as i64;
        let req = self
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(content_length)
            .content_type(content_type)
            .body(ByteStream::from(body));

        req.send().await.map_err(|err| {
            model::error::StoreError::new(format!(
                "failed to put_object at: {}, {}",
                key,
                DisplayErrorContext(&err)
            ))
        })?;

        Ok(())
    }

    async fn store_get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, model::error::StoreError> {
        let req = self.get_object().bucket(bucket).key(key);

        let o = match req.send().await {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_no_such_key() {
                        return Ok(None);
                    }
                }

                return Err(model::error::StoreError::new(format!(
                    "failed to get_object: {}, {}",
                    key,
                    DisplayErrorContext(&err)
                )));
            }
            Ok(o) => o,
        };

        let bytes = o.body.collect().await.map_err(|err| {
            model::error::StoreError::new(format!("failed to collect body: {}, {}", key, err))
        })?;

        Ok(Some(bytes.into_bytes().to_vec()))
    }

    async fn store_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        max_keys: Option<i32>,
    ) -> Result<model::store::ObjectPage, model::error::StoreError> {
        let mut req = self.list_objects_v2().bucket(bucket).prefix(prefix);

        if let Some(marker) = marker {
            req = req.start_after(marker);
        }
        if let Some(max_keys) = max_keys {
            req = req.max_keys(max_keys);
        }

        let lo = req.send().await.map_err(|err| {
            model::error::StoreError::new(format!(
                "failed to list_objects at: {}, {}",
                prefix,
                DisplayErrorContext(&err)
            ))
        })?;

        let keys: Vec<String> = lo
            .contents()
            .iter()
            .filter_map(|o| o.key())
            .map(|key| key.to_string())
            .collect();

        // Resume after the last key of this page.
        let is_truncated = lo.is_truncated().unwrap_or(false);
        let next_marker = if is_truncated {
            keys.last().cloned()
        } else {
            None
        };

        Ok(model::store::ObjectPage {
            keys,
            is_truncated,
            next_marker,
        })
    }

    async fn store_delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<(), model::error::StoreError> {
        let req = self.delete_object().bucket(bucket).key(key);

        req.send().await.map_err(|err| {
            model::error::StoreError::new(format!(
                "failed to delete_object: {}, {}",
                key,
                DisplayErrorContext(&err)
            ))
        })?;

        Ok(())
    }

    async fn store_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<(), model::error::StoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                model::error::StoreError::new(format!("failed to build delete request, {}", err))
            })?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|err| {
                model::error::StoreError::new(format!("failed to build delete request, {}", err))
            })?;

        let req = self.delete_objects().bucket(bucket).delete(delete);

        let out = req.send().await.map_err(|err| {
            model::error::StoreError::new(format!(
                "failed to delete_objects: {} keys, {}",
                keys.len(),
                DisplayErrorContext(&err)
            ))
        })?;

        // Quiet mode only reports the keys that could not be removed.
        if let Some(failed) = out.errors().first() {
            return Err(model::error::StoreError::new(format!(
                "failed to delete_objects: {} of {} keys, first: {}, {}",
                out.errors().len(),
                keys.len(),
                failed.key().unwrap_or(""),
                failed.message().unwrap_or("unknown error")
            )));
        }

        Ok(())
    }
}
