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

use std::collections::HashMap;

/// One entry of a raw store listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    // Milliseconds since the epoch, 0 when the store did not report it.
    pub last_modified: i64,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>, size: i64, last_modified: i64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified,
        }
    }

    /// Zero-length objects and keys ending in `/` stand for directories.
    pub fn is_dir_marker(&self) -> bool {
        self.size == 0 || self.key.ends_with('/')
    }
}

/// Result of a metadata (HEAD) lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: i64,
    pub last_modified: i64,
    pub user_metadata: HashMap<String, String>,
}

impl ObjectMetadata {
    pub fn user_value(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).map(|x| x.as_str())
    }
}

/// One page of a paginated listing, ordered by key.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    pub next_token: Option<String>,
}

impl ListPage {
    pub fn new(objects: Vec<ObjectSummary>, next_token: Option<String>) -> Self {
        Self {
            objects,
            next_token,
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.objects.windows(2).all(|w| w[0].key <= w[1].key)
    }

    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }
}
