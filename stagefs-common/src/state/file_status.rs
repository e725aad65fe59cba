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

use serde::{Deserialize, Serialize};

/// A reconciled, user-facing entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileStatus {
    pub path: String,
    pub name: String,
    // Flat key of the physical object backing this entry.
    pub key: String,
    pub is_dir: bool,
    pub len: i64,
    pub mtime: i64,
}

impl FileStatus {
    pub fn dir(path: impl Into<String>, name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            key: key.into(),
            is_dir: true,
            ..Default::default()
        }
    }
}
