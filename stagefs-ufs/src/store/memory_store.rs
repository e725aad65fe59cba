// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::store::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use log::trace;
use stagefs_common::error::FsError;
use stagefs_common::state::{ListPage, ObjectMetadata, ObjectSummary};
use stagefs_common::{err_box, FsResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: i64,
    user_metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Faults {
    // fetch_page calls with an index >= this value fail.
    fail_fetch_from: Option<usize>,
    fail_metadata: HashSet<String>,
    fail_deletes: bool,
    metadata_latency: Option<Duration>,
}

/// An ordered in-memory object store. Used for local runs and as the test fixture:
/// it counts calls and can be told to fail.
pub struct MemoryObjectStore {
    root: String,
    page_size: usize,
    reversed_pages: bool,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    faults: RwLock<Faults>,
    fetch_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
            reversed_pages: false,
            objects: RwLock::new(BTreeMap::new()),
            faults: RwLock::new(Faults::default()),
            fetch_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Returns the objects of every page in descending order, like a store that
    /// does not sort within a page.
    pub fn with_reversed_pages(mut self, reversed: bool) -> Self {
        self.reversed_pages = reversed;
        self
    }

    pub async fn put(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.put_with(key, data, HashMap::new(), chrono::Utc::now().timestamp_millis())
            .await
    }

    pub async fn put_with(
        &self,
        key: impl Into<String>,
        data: impl Into<Bytes>,
        user_metadata: HashMap<String, String>,
        last_modified: i64,
    ) {
        let object = StoredObject {
            data: data.into(),
            last_modified,
            user_metadata,
        };
        self.objects.write().await.insert(key.into(), object);
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn data(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|x| x.data.clone())
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// The first `pages` fetches from now on succeed, every later one fails.
    pub async fn fail_fetch_after(&self, pages: usize) {
        self.faults.write().await.fail_fetch_from = Some(self.fetch_calls() + pages);
    }

    pub async fn fail_metadata(&self, key: impl Into<String>) {
        self.faults.write().await.fail_metadata.insert(key.into());
    }

    pub async fn fail_deletes(&self, fail: bool) {
        self.faults.write().await.fail_deletes = fail;
    }

    pub async fn set_metadata_latency(&self, latency: Duration) {
        self.faults.write().await.metadata_latency = Some(latency);
    }

    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn root(&self) -> &str {
        &self.root
    }

    async fn fetch_page(&self, prefix: &str, token: Option<&str>) -> FsResult<ListPage> {
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(from) = self.faults.read().await.fail_fetch_from {
            if call >= from {
                return Err(FsError::list_failed(prefix, "injected page fetch failure"));
            }
        }

        let objects = self.objects.read().await;
        let lower = match token {
            Some(t) => Bound::Excluded(t.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut page: Vec<ObjectSummary> = objects
            .range((lower, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(self.page_size + 1)
            .map(|(k, v)| ObjectSummary::new(k.as_str(), v.data.len() as i64, v.last_modified))
            .collect();

        let next_token = if page.len() > self.page_size {
            page.truncate(self.page_size);
            page.last().map(|x| x.key.clone())
        } else {
            None
        };

        if self.reversed_pages {
            page.reverse();
        }

        trace!(
            "fetch page of '{}' after {:?}: {} objects, next {:?}",
            prefix,
            token,
            page.len(),
            next_token
        );
        Ok(ListPage::new(page, next_token))
    }

    async fn get_metadata(&self, key: &str) -> FsResult<Option<ObjectMetadata>> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let (latency, fail) = {
            let faults = self.faults.read().await;
            (faults.metadata_latency, faults.fail_metadata.contains(key))
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if fail {
            return err_box!("injected metadata failure for {}", key);
        }

        let res = self.objects.read().await.get(key).map(|v| ObjectMetadata {
            size: v.data.len() as i64,
            last_modified: v.last_modified,
            user_metadata: v.user_metadata.clone(),
        });
        Ok(res)
    }

    async fn delete_objects(&self, keys: &[String]) -> FsResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().await.fail_deletes {
            return err_box!("injected delete failure for {} keys", keys.len());
        }

        let mut objects = self.objects.write().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        user_metadata: HashMap<String, String>,
    ) -> FsResult<()> {
        self.put_with(key, data, user_metadata, chrono::Utc::now().timestamp_millis())
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryObjectStore;
    use crate::store::{page_stream, ObjectStore};
    use futures::TryStreamExt;

    #[tokio::test]
    async fn pages_in_order() {
        let store = MemoryObjectStore::new("bucket").with_page_size(2);
        for key in ["a/3", "a/1", "b/1", "a/2", "a/4", "a/5"] {
            store.put(key, "x").await;
        }

        let first = store.fetch_page("a/", None).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("a/2"));

        let pages: Vec<_> = page_stream(&store, "a/").try_collect().await.unwrap();
        let keys: Vec<String> = pages
            .iter()
            .flat_map(|p| p.objects.iter().map(|o| o.key.clone()))
            .collect();
        assert_eq!(keys, vec!["a/1", "a/2", "a/3", "a/4", "a/5"]);
        assert_eq!(pages.len(), 3);
        assert!(pages[2].is_last());
    }

    #[tokio::test]
    async fn injected_faults() {
        let store = MemoryObjectStore::new("bucket").with_page_size(1);
        store.put("k1", "x").await;
        store.put("k2", "y").await;

        store.fail_fetch_after(1).await;
        let res: Result<Vec<_>, _> = page_stream(&store, "").try_collect().await;
        assert!(res.is_err());
        assert_eq!(store.fetch_calls(), 2);

        store.fail_metadata("k1").await;
        assert!(store.get_metadata("k1").await.is_err());
        assert!(store.get_metadata("k2").await.unwrap().is_some());
        assert!(store.get_metadata("k3").await.unwrap().is_none());

        store.fail_deletes(true).await;
        assert!(store.delete_objects(&["k1".to_string()]).await.is_err());
        store.clear_faults().await;
        store.delete_objects(&["k1".to_string()]).await.unwrap();
        assert!(!store.contains("k1").await);
    }
}
