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
use futures::TryStreamExt;
use log::{debug, warn};
use opendal::services::*;
use opendal::{
    layers::{LoggingLayer, RetryLayer, TimeoutLayer},
    Entry, ErrorKind, Lister, Operator,
};
use stagefs_common::conf::StoreConf;
use stagefs_common::error::FsError;
use stagefs_common::fs::Path;
use stagefs_common::state::{ListPage, ObjectMetadata, ObjectSummary};
use stagefs_common::{err_box, FsResult};
use std::collections::HashMap;
use tokio::sync::Mutex;

// An open lister positioned right after `last_key`.
struct Continuation {
    prefix: String,
    last_key: String,
    lister: Lister,
}

/// Object store backed by an OpenDAL operator.
///
/// Backends without `start_after` support are paged through one lister kept open
/// across pages; a page that cannot reuse it reopens the listing and skips up to
/// its token.
pub struct OpendalObjectStore {
    operator: Operator,
    scheme: String,
    bucket_or_container: String,
    page_size: usize,
    start_after: bool,
    continuation: Mutex<Option<Continuation>>,
}

impl OpendalObjectStore {
    fn add_stability_layers(base_op: Operator, conf: &StoreConf) -> Operator {
        base_op
            .layer(LoggingLayer::default())
            .layer(TimeoutLayer::new().with_io_timeout(conf.io_timeout))
            .layer(
                RetryLayer::new()
                    .with_min_delay(conf.retry_interval)
                    .with_max_delay(conf.retry_max_delay)
                    .with_max_times(conf.retry_times as usize)
                    .with_factor(2.0)
                    .with_jitter(),
            )
    }

    /// Builds the operator for the scheme of `path`; the authority is the bucket.
    /// `conf` must have been initialized.
    pub fn new(path: &Path, conf: &StoreConf, page_size: usize) -> FsResult<Self> {
        let scheme = path
            .scheme()
            .ok_or_else(|| FsError::invalid_path(path.full_path(), "Missing scheme"))?;

        let bucket_or_container = path
            .authority()
            .ok_or_else(|| {
                FsError::invalid_path(path.full_path(), "URI missing bucket/container name")
            })?
            .to_string();

        let props = &conf.properties;
        let base_op = match scheme {
            "s3" | "s3a" => {
                let mut builder = S3::default().bucket(&bucket_or_container);

                if let Some(endpoint) = props.get("s3.endpoint_url") {
                    builder = builder.endpoint(endpoint);
                }
                if let Some(region) = props.get("s3.region_name") {
                    builder = builder.region(region);
                }
                if let Some(access_key) = props.get("s3.credentials.access") {
                    builder = builder.access_key_id(access_key);
                }
                if let Some(secret_key) = props.get("s3.credentials.secret") {
                    builder = builder.secret_access_key(secret_key);
                }

                Operator::new(builder)
                    .map_err(|e| FsError::common(format!("Failed to create S3 operator: {}", e)))?
                    .finish()
            }

            "cos" => {
                let mut builder = Cos::default().bucket(&bucket_or_container);

                if let Some(endpoint) = props.get("cos.endpoint_url") {
                    builder = builder.endpoint(endpoint);
                }
                if let Some(access_key) = props.get("cos.credentials.access") {
                    builder = builder.secret_id(access_key);
                }
                if let Some(secret_key) = props.get("cos.credentials.secret") {
                    builder = builder.secret_key(secret_key);
                }

                Operator::new(builder)
                    .map_err(|e| FsError::common(format!("Failed to create COS operator: {}", e)))?
                    .finish()
            }

            "gcs" | "gs" => {
                let mut builder = Gcs::default().bucket(&bucket_or_container);

                if let Some(service_account) = props.get("gcs.service_account") {
                    builder = builder.credential(service_account);
                }
                if let Some(endpoint) = props.get("gcs.endpoint_url") {
                    builder = builder.endpoint(endpoint);
                }

                Operator::new(builder)
                    .map_err(|e| FsError::common(format!("Failed to create GCS operator: {}", e)))?
                    .finish()
            }

            "azblob" => {
                let mut builder = Azblob::default().container(&bucket_or_container);

                if let Some(account_name) = props.get("azure.account_name") {
                    builder = builder.account_name(account_name);
                }
                if let Some(account_key) = props.get("azure.account_key") {
                    builder = builder.account_key(account_key);
                }
                if let Some(endpoint) = props.get("azure.endpoint_url") {
                    builder = builder.endpoint(endpoint);
                }

                Operator::new(builder)
                    .map_err(|e| {
                        FsError::common(format!("Failed to create Azure operator: {}", e))
                    })?
                    .finish()
            }

            _ => {
                return Err(FsError::unsupported(format!(
                    "Unsupported scheme: {}",
                    scheme
                )));
            }
        };

        let operator = Self::add_stability_layers(base_op, conf);
        Ok(Self::from_operator(operator, scheme, bucket_or_container, page_size))
    }

    /// Wraps an already configured operator.
    pub fn from_operator(
        operator: Operator,
        scheme: impl Into<String>,
        bucket_or_container: impl Into<String>,
        page_size: usize,
    ) -> Self {
        let start_after = operator.info().full_capability().list_with_start_after;
        let store = Self {
            operator,
            scheme: scheme.into(),
            bucket_or_container: bucket_or_container.into(),
            page_size: page_size.max(1),
            start_after,
            continuation: Mutex::new(None),
        };

        debug!(
            "created object store {}://{}, page size {}, start_after {}",
            store.scheme, store.bucket_or_container, store.page_size, start_after
        );
        store
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    fn read_summary(entry: &Entry) -> ObjectSummary {
        let metadata = entry.metadata();
        let mtime = metadata
            .last_modified()
            .map(|t| t.into_inner().as_millisecond())
            .unwrap_or(0);

        ObjectSummary::new(entry.path(), metadata.content_length() as i64, mtime)
    }

    // The lister for the page after `token`, and the key up to which its entries
    // must be skipped when the backend could not start after it.
    async fn open_lister<'t>(
        &self,
        prefix: &str,
        token: Option<&'t str>,
    ) -> FsResult<(Lister, Option<&'t str>)> {
        let mut skip_to = None;
        if let Some(token) = token {
            if !self.start_after {
                let mut slot = self.continuation.lock().await;
                match slot.take() {
                    Some(c) if c.prefix == prefix && c.last_key == token => {
                        return Ok((c.lister, None));
                    }
                    other => *slot = other,
                }
                skip_to = Some(token);
            }
        }

        let mut lister = self.operator.lister_with(prefix).recursive(true);
        if let Some(token) = token {
            if self.start_after {
                lister = lister.start_after(token);
            }
        }
        let lister = lister
            .await
            .map_err(|e| FsError::list_failed(prefix, e))?;
        Ok((lister, skip_to))
    }

    async fn delete_object(&self, key: &str) -> FsResult<()> {
        match self.operator.delete(key).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => err_box!("Failed to delete {}: {}", key, e),
        }
    }
}

#[async_trait]
impl ObjectStore for OpendalObjectStore {
    fn root(&self) -> &str {
        &self.bucket_or_container
    }

    async fn fetch_page(&self, prefix: &str, token: Option<&str>) -> FsResult<ListPage> {
        let (mut lister, skip_to) = self.open_lister(prefix, token).await?;

        let mut objects = Vec::with_capacity(self.page_size);
        let mut exhausted = false;
        while objects.len() < self.page_size {
            match lister
                .try_next()
                .await
                .map_err(|e| FsError::list_failed(prefix, e))?
            {
                // The listed prefix itself when it is a directory.
                Some(entry) if entry.path() == prefix && entry.metadata().is_dir() => (),
                Some(entry) if skip_to.is_some_and(|t| entry.path() <= t) => (),
                Some(entry) => objects.push(Self::read_summary(&entry)),
                None => {
                    exhausted = true;
                    break;
                }
            }
        }

        let next_token = if exhausted {
            None
        } else {
            objects.last().map(|x: &ObjectSummary| x.key.clone())
        };

        if !self.start_after {
            if let Some(last_key) = &next_token {
                *self.continuation.lock().await = Some(Continuation {
                    prefix: prefix.to_string(),
                    last_key: last_key.clone(),
                    lister,
                });
            }
        }
        Ok(ListPage::new(objects, next_token))
    }

    async fn get_metadata(&self, key: &str) -> FsResult<Option<ObjectMetadata>> {
        match self.operator.stat(key).await {
            Ok(m) => Ok(Some(ObjectMetadata {
                size: m.content_length() as i64,
                last_modified: m
                    .last_modified()
                    .map(|t| t.into_inner().as_millisecond())
                    .unwrap_or(0),
                user_metadata: m.user_metadata().cloned().unwrap_or_default(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => err_box!("failed to stat {}: {}", key, e),
        }
    }

    async fn delete_objects(&self, keys: &[String]) -> FsResult<()> {
        let mut failed = 0;
        let mut last_err = None;
        for key in keys {
            if let Err(e) = self.delete_object(key).await {
                warn!("{}", e);
                failed += 1;
                last_err = Some(e);
            }
        }

        match last_err {
            None => Ok(()),
            Some(e) => err_box!("{} of {} deletes failed, last error: {}", failed, keys.len(), e),
        }
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        user_metadata: HashMap<String, String>,
    ) -> FsResult<()> {
        let mut write = self.operator.write_with(key, data);
        if !user_metadata.is_empty() {
            write = write.user_metadata(user_metadata);
        }

        match write.await {
            Ok(_) => Ok(()),
            Err(e) => err_box!("Failed to write {}: {}", key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OpendalObjectStore;
    use crate::store::{page_stream, ObjectStore};
    use bytes::Bytes;
    use futures::TryStreamExt;
    use opendal::services::Memory;
    use opendal::Operator;
    use stagefs_common::conf::StoreConf;
    use stagefs_common::error::FsError;
    use stagefs_common::fs::Path;

    fn conf() -> StoreConf {
        let mut conf = StoreConf::default();
        conf.init().unwrap();
        conf
    }

    #[test]
    fn unsupported_scheme() {
        let path = Path::from_str("swift2d://a.service/data").unwrap();
        let res = OpendalObjectStore::new(&path, &conf(), 100);
        assert!(matches!(res, Err(FsError::Unsupported(_))));
    }

    #[test]
    fn relative_path_rejected() {
        let path = Path::from_str("data/part-0").unwrap();
        let res = OpendalObjectStore::new(&path, &conf(), 100);
        assert!(matches!(res, Err(FsError::InvalidPath { .. })));
    }

    async fn memory_store(keys: &[&str], page_size: usize) -> OpendalObjectStore {
        let operator = Operator::new(Memory::default()).unwrap().finish();
        for key in keys {
            operator.write(key, Bytes::from_static(b"x")).await.unwrap();
        }
        OpendalObjectStore::from_operator(operator, "memory", "mem", page_size)
    }

    fn page_keys(page: &stagefs_common::state::ListPage) -> Vec<&str> {
        page.objects.iter().map(|x| x.key.as_str()).collect()
    }

    #[tokio::test]
    async fn pages_without_start_after() {
        let store = memory_store(&["d/a", "d/b", "d/c", "d/d", "d/e"], 2).await;
        assert!(!store.operator().info().full_capability().list_with_start_after);

        let pages: Vec<_> = page_stream(&store, "d/").try_collect().await.unwrap();
        let keys: Vec<Vec<&str>> = pages.iter().map(page_keys).collect();
        assert_eq!(keys, vec![vec!["d/a", "d/b"], vec!["d/c", "d/d"], vec!["d/e"]]);
        assert_eq!(pages[2].next_token, None);
    }

    #[tokio::test]
    async fn stale_token_reopens_and_skips() {
        let store = memory_store(&["d/a", "d/b", "d/c"], 2).await;

        let first = store.fetch_page("d/", None).await.unwrap();
        assert_eq!(first.next_token.as_deref(), Some("d/b"));

        // A token that does not match the open lister.
        let page = store.fetch_page("d/", Some("d/a")).await.unwrap();
        assert_eq!(page_keys(&page), vec!["d/b", "d/c"]);

        let page = store.fetch_page("d/", Some("d/b")).await.unwrap();
        assert_eq!(page_keys(&page), vec!["d/c"]);
        assert_eq!(page.next_token, None);
    }
}
