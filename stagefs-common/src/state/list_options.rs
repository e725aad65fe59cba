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

/// How two attempts at the same logical output are resolved during listing.
///
/// Neither policy is a correctness guarantee: a complete but smaller output can
/// lose to a larger partial one under `LargerSize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    LargerSize,
    LatestModified,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    pub include_all_objects: bool,
    pub prefix_based: bool,
    pub collision_policy: CollisionPolicy,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_all_objects(mut self, include: bool) -> Self {
        self.include_all_objects = include;
        self
    }

    pub fn prefix_based(mut self, prefix_based: bool) -> Self {
        self.prefix_based = prefix_based;
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }
}
