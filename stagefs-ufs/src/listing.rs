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

use crate::origin_cache::{JobStatus, OriginStatusCache};
use crate::resolver::TempPathResolver;
use crate::store::ObjectStore;
use futures::{Stream, TryStreamExt};
use log::{debug, trace, warn};
use stagefs_common::error::FsError;
use stagefs_common::fs::Path;
use stagefs_common::state::{
    CollisionPolicy, FileStatus, ListOptions, ListPage, ObjectSummary,
};
use stagefs_common::{FsResult, PATH_SEPARATOR};

#[derive(Debug, Clone, Default)]
pub struct ListingResult {
    pub entries: Vec<FileStatus>,
    // Keys written by jobs known to have no success marker.
    pub orphans: Vec<String>,
}

/// Turns raw object pages into the logical listing of a directory.
///
/// One pass with a single object of lookback: objects of failed jobs are
/// dropped, retried attempts of the same output collapse into one survivor.
pub struct ListingReconciler<'a> {
    store: &'a dyn ObjectStore,
    cache: &'a OriginStatusCache,
    resolver: &'a TempPathResolver,
    ordered_pages: bool,
}

struct ReconcileState {
    previous: Option<ObjectSummary>,
    result: ListingResult,
}

impl<'a> ListingReconciler<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        cache: &'a OriginStatusCache,
        resolver: &'a TempPathResolver,
    ) -> Self {
        Self {
            store,
            cache,
            resolver,
            ordered_pages: true,
        }
    }

    /// With `false` every page is fetched and the whole listing sorted first.
    pub fn ordered_pages(mut self, ordered: bool) -> Self {
        self.ordered_pages = ordered;
        self
    }

    pub async fn reconcile<S>(
        &self,
        mut pages: S,
        scope: &str,
        options: &ListOptions,
    ) -> FsResult<ListingResult>
    where
        S: Stream<Item = FsResult<ListPage>> + Unpin,
    {
        let scope = scope.trim_end_matches(PATH_SEPARATOR);
        let mut state = ReconcileState {
            previous: None,
            result: ListingResult::default(),
        };

        if !self.ordered_pages {
            let mut all = vec![];
            while let Some(page) = Self::next_page(&mut pages, scope).await? {
                all.extend(page.objects);
            }
            all.sort_by(|a, b| a.key.cmp(&b.key));
            for current in all {
                self.step(&mut state, current, scope, options).await;
            }
        } else {
            let mut last_key: Option<String> = None;
            while let Some(page) = Self::next_page(&mut pages, scope).await? {
                let objects = Self::check_page(page, scope, last_key.as_deref())?;
                if let Some(last) = objects.last() {
                    last_key = Some(last.key.clone());
                }
                for current in objects {
                    self.step(&mut state, current, scope, options).await;
                }
            }
        }

        if let Some(previous) = state.previous.take() {
            self.emit(&mut state.result, previous, options);
        }

        debug!(
            "listed '{}': {} entries, {} orphans",
            scope,
            state.result.entries.len(),
            state.result.orphans.len()
        );
        Ok(state.result)
    }

    async fn next_page<S>(pages: &mut S, scope: &str) -> FsResult<Option<ListPage>>
    where
        S: Stream<Item = FsResult<ListPage>> + Unpin,
    {
        pages.try_next().await.map_err(|e| match e {
            FsError::ListFailed { .. } => e,
            other => FsError::list_failed(scope, other),
        })
    }

    // Sorts an unordered page and rejects a page that starts before the previous one ended.
    fn check_page(
        page: ListPage,
        scope: &str,
        last_key: Option<&str>,
    ) -> FsResult<Vec<ObjectSummary>> {
        let sorted = page.is_sorted();
        let mut objects = page.objects;
        if !sorted {
            warn!(
                "page of '{}' with {} objects is out of order, sorting it",
                scope,
                objects.len()
            );
            objects.sort_by(|a, b| a.key.cmp(&b.key));
        }

        if let (Some(last), Some(first)) = (last_key, objects.first()) {
            if first.key.as_str() < last {
                return Err(FsError::list_order(scope, last, first.key.as_str()));
            }
        }
        Ok(objects)
    }

    async fn step(
        &self,
        state: &mut ReconcileState,
        current: ObjectSummary,
        scope: &str,
        options: &ListOptions,
    ) {
        let unified = TempPathResolver::unified_name(&current.key);

        if !options.prefix_based && !Path::has_prefix(&unified, scope) {
            trace!("{} is outside of '{}'", current.key, scope);
            return;
        }

        if !options.include_all_objects && self.cache.was_staged_output(&unified, self.store).await
        {
            match self.cache.job_status(&current.key, self.store).await {
                JobStatus::Succeeded => (),
                JobStatus::Failed => {
                    debug!("{} belongs to an unsuccessful job", current.key);
                    state.result.orphans.push(current.key);
                    return;
                }
                // Hidden for now, but never handed out for deletion.
                JobStatus::Unknown => {
                    debug!("status of the job owning {} is unknown, skipped", current.key);
                    return;
                }
            }

            if let Some(previous) = state.previous.take() {
                let invariant = TempPathResolver::task_invariant_name(&current.key);
                if TempPathResolver::task_invariant_name(&previous.key) == invariant {
                    let survivor = Self::choose(previous, current, options.collision_policy);
                    debug!("attempts of {} collide, keeping {}", invariant, survivor.key);
                    state.previous = Some(survivor);
                    return;
                }
                state.previous = Some(previous);
            }
        }

        if let Some(previous) = state.previous.take() {
            self.emit(&mut state.result, previous, options);
        }
        state.previous = Some(current);
    }

    // Ties keep the object seen first.
    fn choose(
        previous: ObjectSummary,
        current: ObjectSummary,
        policy: CollisionPolicy,
    ) -> ObjectSummary {
        let take_current = match policy {
            CollisionPolicy::LargerSize => current.size > previous.size,
            CollisionPolicy::LatestModified => {
                current.last_modified > previous.last_modified
                    || (current.last_modified == previous.last_modified
                        && current.size > previous.size)
            }
        };

        if take_current {
            current
        } else {
            previous
        }
    }

    fn emit(&self, result: &mut ListingResult, object: ObjectSummary, options: &ListOptions) {
        if object.size <= 0 && !options.include_all_objects {
            trace!("skip empty object {}", object.key);
            return;
        }

        let path = self.resolver.logical_path_for_key(&object.key);
        result.entries.push(FileStatus {
            path: path.full_path().to_string(),
            name: path.name().to_string(),
            is_dir: object.is_dir_marker(),
            len: object.size,
            mtime: object.last_modified,
            key: object.key,
        });
    }
}
