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

//! Staged-commit file-system semantics on top of a flat object store.
//!
//! Compute tasks write under `<dataset>/_temporary/<job attempt>/_temporary/<task attempt>/...`.
//! Instead of renaming on commit, [TempPathResolver] maps every staging path straight to
//! its final key with the task attempt embedded in the file name, and [ListingReconciler]
//! rebuilds a consistent directory view from whatever attempts ended up in the store.

mod attempt;
mod cleaner;
mod listing;
mod origin_cache;
mod resolver;
mod staged_fs;
mod staging;

pub mod store;

pub use self::attempt::{TaskAttemptId, TaskType};
pub use self::cleaner::OrphanCleaner;
pub use self::listing::{ListingReconciler, ListingResult};
pub use self::origin_cache::{JobStatus, OriginStatusCache};
pub use self::resolver::TempPathResolver;
pub use self::staged_fs::StagedFileSystem;
pub use self::staging::{SegmentMatcher, StagingMatch, StagingPattern};

pub const HADOOP_TEMPORARY: &str = "_temporary";

pub const HADOOP_ATTEMPT: &str = "attempt_";
