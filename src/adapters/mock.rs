//! In-memory [`ObjectStore`] with S3-like listing semantics.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;

use crate::{adapters::ObjectStore, context::MAX_DELETE_BATCH, model};

/// S3 caps `ListObjectsV2` pages at 1000 keys.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Put,
    Get,
    List,
    Delete,
    DeleteBatch,
}

impl Operation {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::Put | Operation::Delete | Operation::DeleteBatch
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub content_length: usize,
}

pub struct MemoryStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    page_size: usize,
    calls: Mutex<HashMap<Operation, usize>>,
    // Operation -> number of calls after which it starts failing.
    failures: Mutex<HashMap<Operation, usize>>,
    stalled: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            stalled: AtomicBool::new(false),
        }
    }

    /// Makes every following call of `operation` fail.
    pub fn fail_on(&self, operation: Operation) {
        self.fail_after(operation, 0);
    }

    /// Lets `successes` more calls of `operation` through, then fails the rest.
    pub fn fail_after(&self, operation: Operation, successes: usize) {
        let threshold = self.calls(operation) + successes;
        lock(&self.failures).insert(operation, threshold);
    }

    /// Makes listings report more pages while returning no keys and no marker.
    pub fn stall_listing(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self, operation: Operation) {
        lock(&self.failures).remove(&operation);
    }

    pub fn calls(&self, operation: Operation) -> usize {
        lock(&self.calls).get(&operation).copied().unwrap_or(0)
    }

    pub fn mutations(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|(operation, _)| operation.is_mutation())
            .map(|(_, count)| count)
            .sum()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        lock(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Stores `body` as-is, bypassing call accounting.
    pub fn insert_raw(&self, bucket: &str, key: &str, body: &[u8]) {
        lock(&self.objects).insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.to_vec(),
                content_type: model::store::CONTENT_TYPE_OCTET_STREAM.to_string(),
                content_length: body.len(),
            },
        );
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        lock(&self.objects)
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key.clone())
            .collect()
    }

    fn record(&self, operation: Operation, target: &str) -> Result<(), model::error::StoreError> {
        let previous = {
            let mut calls = lock(&self.calls);
            let count = calls.entry(operation).or_insert(0);
            *count += 1;
            *count - 1
        };

        match lock(&self.failures).get(&operation) {
            Some(threshold) if previous >= *threshold => Err(model::error::StoreError::new(
                format!("injected {:?} failure at: {}", operation, target),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn store_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), model::error::StoreError> {
        self.record(Operation::Put, key)?;

        let content_length = body.len();
        lock(&self.objects).insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                content_length,
            },
        );

        Ok(())
    }

    async fn store_get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, model::error::StoreError> {
        self.record(Operation::Get, key)?;

        Ok(self.object(bucket, key).map(|o| o.body))
    }

    async fn store_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        max_keys: Option<i32>,
    ) -> Result<model::store::ObjectPage, model::error::StoreError> {
        self.record(Operation::List, prefix)?;

        if self.stalled.load(Ordering::SeqCst) {
            return Ok(model::store::ObjectPage {
                keys: Vec::new(),
                is_truncated: true,
                next_marker: None,
            });
        }

        let limit = max_keys
            .map(|n| n.max(0) as usize)
            .unwrap_or(self.page_size)
            .min(self.page_size);

        let objects = lock(&self.objects);
        let mut matching = objects
            .range((bucket.to_string(), prefix.to_string())..)
            .map(|((b, key), _)| (b, key))
            .take_while(|(b, key)| *b == bucket && key.starts_with(prefix))
            .map(|(_, key)| key)
            .filter(|key| marker.map_or(true, |m| key.as_str() > m));

        let keys: Vec<String> = matching.by_ref().take(limit).cloned().collect();
        let is_truncated = matching.next().is_some();
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
        self.record(Operation::Delete, key)?;

        lock(&self.objects).remove(&(bucket.to_string(), key.to_string()));

        Ok(())
    }

    async fn store_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<(), model::error::StoreError> {
        self.record(Operation::DeleteBatch, bucket)?;

        if keys.len() > MAX_DELETE_BATCH {
            return Err(model::error::StoreError::new(format!(
                "failed to delete_objects: {} keys exceeds the limit of {}",
                keys.len(),
                MAX_DELETE_BATCH
            )));
        }

        let mut objects = lock(&self.objects);
        for key in keys {
            objects.remove(&(bucket.to_string(), key.clone()));
        }

        Ok(())
    }
}
