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

use crate::resolver::TempPathResolver;
use crate::store::ObjectStore;
use log::warn;
use moka::future::Cache;
use stagefs_common::conf::{CacheConf, StagingConf};
use stagefs_common::error::FsError;
use stagefs_common::{PATH_SEPARATOR, SUCCESS_MARKER};

/// What is known about the success marker of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    /// The marker is definitely absent.
    Failed,
    /// The marker lookup failed; nothing is known.
    Unknown,
}

/// Per-client memo of two facts about logical outputs: whether a staged commit
/// produced them, and whether their job wrote a success marker.
///
/// Concurrent first lookups of one key share a single store request. Only
/// definitive answers are kept; a failed lookup is retried the next time the key
/// is asked for.
pub struct OriginStatusCache {
    origin: Cache<String, bool>,
    status: Cache<String, bool>,
    marker_key: String,
    marker_value: String,
}

impl OriginStatusCache {
    pub fn new(conf: &CacheConf, staging: &StagingConf) -> Self {
        Self {
            origin: Cache::builder().max_capacity(conf.origin_capacity).build(),
            status: Cache::builder().max_capacity(conf.status_capacity).build(),
            marker_key: staging.origin_metadata_key.clone(),
            marker_value: staging.origin_metadata_value.clone(),
        }
    }

    pub fn marker(&self) -> (&str, &str) {
        (&self.marker_key, &self.marker_value)
    }

    pub async fn was_staged_output(&self, name: &str, store: &dyn ObjectStore) -> bool {
        let lookup = async {
            let metadata = store.get_metadata(name).await?;
            let staged = metadata
                .map(|m| m.user_value(&self.marker_key) == Some(self.marker_value.as_str()))
                .unwrap_or(false);
            Ok::<_, FsError>(staged)
        };

        match self.origin.try_get_with(name.to_string(), lookup).await {
            Ok(v) => v,
            Err(e) => {
                warn!("origin lookup of {} failed, treated as not staged: {}", name, e);
                false
            }
        }
    }

    /// Status of the job owning `name`, read from `<job dir>/_SUCCESS`, the job dir
    /// being the unified name of `name`.
    pub async fn job_status(&self, name: &str, store: &dyn ObjectStore) -> JobStatus {
        let job_dir = TempPathResolver::unified_name(name);
        let marker = if job_dir.is_empty() {
            SUCCESS_MARKER.to_string()
        } else {
            format!("{}{}{}", job_dir, PATH_SEPARATOR, SUCCESS_MARKER)
        };

        let lookup = async {
            let metadata = store.get_metadata(&marker).await?;
            Ok::<_, FsError>(metadata.is_some())
        };

        match self.status.try_get_with(job_dir.clone(), lookup).await {
            Ok(true) => JobStatus::Succeeded,
            Ok(false) => JobStatus::Failed,
            Err(e) => {
                warn!("status lookup of job {} failed: {}", job_dir, e);
                JobStatus::Unknown
            }
        }
    }

    /// True only when the success marker is known to exist.
    pub async fn is_job_successful(&self, name: &str, store: &dyn ObjectStore) -> bool {
        self.job_status(name, store).await == JobStatus::Succeeded
    }

    pub fn invalidate_all(&self) {
        self.origin.invalidate_all();
        self.status.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::{JobStatus, OriginStatusCache};
    use crate::store::MemoryObjectStore;
    use stagefs_common::conf::{CacheConf, StagingConf};
    use std::collections::HashMap;
    use std::time::Duration;

    fn cache() -> OriginStatusCache {
        OriginStatusCache::new(&CacheConf::default(), &StagingConf::default())
    }

    #[tokio::test]
    async fn concurrent_lookups_coalesce() {
        let store = MemoryObjectStore::new("bucket");
        let meta = HashMap::from([("data-origin".to_string(), "stocator".to_string())]);
        store.put_with("out/data.json", "", meta, 1).await;
        store.set_metadata_latency(Duration::from_millis(50)).await;

        let cache = cache();
        let lookups = (0..8).map(|_| cache.was_staged_output("out/data.json", &store));
        let res = futures::future::join_all(lookups).await;

        assert!(res.into_iter().all(|x| x));
        assert_eq!(store.metadata_calls(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let store = MemoryObjectStore::new("bucket");
        store.put("out/_SUCCESS", "").await;
        store.fail_metadata("out/_SUCCESS").await;

        let cache = cache();
        let name = "out/part-0-attempt_20180405072427_0001_m_000000_0.json";
        assert_eq!(cache.job_status(name, &store).await, JobStatus::Unknown);
        assert!(!cache.is_job_successful(name, &store).await);

        store.clear_faults().await;
        assert!(cache.is_job_successful(name, &store).await);
        assert!(cache.is_job_successful("out/_SUCCESS", &store).await);
        assert_eq!(store.metadata_calls(), 3);

        cache.invalidate_all();
        assert!(cache.is_job_successful(name, &store).await);
        assert_eq!(store.metadata_calls(), 4);
    }

    #[tokio::test]
    async fn missing_marker_is_definitive() {
        let store = MemoryObjectStore::new("bucket");
        let cache = cache();
        let name = "out/part-0-attempt_20180405072427_0001_m_000000_0.json";

        assert_eq!(cache.job_status(name, &store).await, JobStatus::Failed);
        assert_eq!(cache.job_status(name, &store).await, JobStatus::Failed);
        assert_eq!(store.metadata_calls(), 1);
    }
}
