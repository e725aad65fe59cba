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

use crate::conf::LogConf;
use crate::error::FsError;
use crate::state::CollisionPolicy;
use crate::utils::DurationUnit;
use crate::FsResult;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Client configuration, usually loaded from a TOML file.
///
/// ```toml
/// [staging]
/// temp_identifiers = ["_temporary/st_ID/_temporary/attempt_ID/"]
///
/// [list]
/// collision_policy = "latest_modified"
/// auto_delete_orphans = true
///
/// [store]
/// retry_interval = "200ms"
/// properties = { "s3.endpoint_url" = "http://127.0.0.1:9000" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConf {
    pub staging: StagingConf,
    pub list: ListConf,
    pub cache: CacheConf,
    pub store: StoreConf,
    pub log: LogConf,
}

impl StageConf {
    pub fn from_file(path: impl AsRef<std::path::Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let conf = Self::from_toml(&content)?;
        info!("loaded configuration from {}", path.display());
        Ok(conf)
    }

    pub fn from_toml(content: &str) -> FsResult<Self> {
        let mut conf: StageConf = toml::from_str(content)?;
        conf.init()?;
        Ok(conf)
    }

    /// Resolves duration strings and validates values. Must be called on
    /// hand-built configurations before use; `from_toml` does it already.
    pub fn init(&mut self) -> FsResult<()> {
        self.staging.check()?;
        self.list.check()?;
        self.cache.check()?;
        self.store.init()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConf {
    // Staging layouts in priority order. `*_ID` / `<jobAttempt>` mark the job attempt
    // slot, `attempt_ID` / `<taskAttempt>` the task attempt slot.
    pub temp_identifiers: Vec<String>,

    // Append the task attempt id to committed file names.
    pub embed_attempt_in_name: bool,

    // User metadata attribute written on every staged output.
    pub origin_metadata_key: String,
    pub origin_metadata_value: String,
}

impl StagingConf {
    pub const DEFAULT_TEMP_IDENTIFIER: &'static str = "_temporary/st_ID/_temporary/attempt_ID/";

    fn check(&self) -> FsResult<()> {
        if self.temp_identifiers.is_empty() {
            return Err(FsError::invalid_conf(
                "staging.temp_identifiers must not be empty",
            ));
        }
        if self.origin_metadata_key.is_empty() {
            return Err(FsError::invalid_conf(
                "staging.origin_metadata_key must not be empty",
            ));
        }
        Ok(())
    }
}

impl Default for StagingConf {
    fn default() -> Self {
        Self {
            temp_identifiers: vec![Self::DEFAULT_TEMP_IDENTIFIER.to_string()],
            embed_attempt_in_name: true,
            origin_metadata_key: "data-origin".to_string(),
            origin_metadata_value: "stocator".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConf {
    pub collision_policy: CollisionPolicy,

    // Delete objects of failed jobs found while listing.
    pub auto_delete_orphans: bool,

    // The store returns keys in lexicographic order across pages. When false the
    // whole listing is fetched and sorted before it is reconciled.
    pub ordered_pages: bool,

    pub page_size: usize,
}

impl ListConf {
    fn check(&self) -> FsResult<()> {
        if self.page_size == 0 {
            return Err(FsError::invalid_conf("list.page_size must be positive"));
        }
        Ok(())
    }
}

impl Default for ListConf {
    fn default() -> Self {
        Self {
            collision_policy: CollisionPolicy::LargerSize,
            auto_delete_orphans: false,
            ordered_pages: true,
            page_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConf {
    // Maximum number of "written by a staged commit" facts kept per client.
    pub origin_capacity: u64,

    // Maximum number of job success facts kept per client.
    pub status_capacity: u64,
}

impl CacheConf {
    fn check(&self) -> FsResult<()> {
        if self.origin_capacity == 0 || self.status_capacity == 0 {
            return Err(FsError::invalid_conf("cache capacities must be positive"));
        }
        Ok(())
    }
}

impl Default for CacheConf {
    fn default() -> Self {
        Self {
            origin_capacity: 100_000,
            status_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConf {
    // Backend specific keys, e.g. s3.endpoint_url, s3.credentials.access.
    pub properties: HashMap<String, String>,

    pub retry_times: u32,

    #[serde(skip)]
    pub retry_interval: Duration,
    #[serde(alias = "retry_interval")]
    pub retry_interval_str: String,

    #[serde(skip)]
    pub retry_max_delay: Duration,
    #[serde(alias = "retry_max_delay")]
    pub retry_max_delay_str: String,

    #[serde(skip)]
    pub io_timeout: Duration,
    #[serde(alias = "io_timeout")]
    pub io_timeout_str: String,
}

impl StoreConf {
    pub fn init(&mut self) -> FsResult<()> {
        self.retry_interval = DurationUnit::from_str(&self.retry_interval_str)?.as_duration();
        self.retry_max_delay = DurationUnit::from_str(&self.retry_max_delay_str)?.as_duration();
        self.io_timeout = DurationUnit::from_str(&self.io_timeout_str)?.as_duration();

        if self.retry_max_delay < self.retry_interval {
            return Err(FsError::invalid_conf(format!(
                "store.retry_max_delay {} is shorter than store.retry_interval {}",
                self.retry_max_delay_str, self.retry_interval_str
            )));
        }
        Ok(())
    }
}

impl Default for StoreConf {
    fn default() -> Self {
        Self {
            properties: HashMap::new(),
            retry_times: 3,

            retry_interval: Default::default(),
            retry_interval_str: "100ms".to_string(),

            retry_max_delay: Default::default(),
            retry_max_delay_str: "10s".to_string(),

            io_timeout: Default::default(),
            io_timeout_str: "60s".to_string(),
        }
    }
}
