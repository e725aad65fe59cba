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

use crate::cleaner::OrphanCleaner;
use crate::listing::ListingReconciler;
use crate::origin_cache::OriginStatusCache;
use crate::resolver::TempPathResolver;
use crate::store::{page_stream, ObjectStore, OpendalObjectStore};
use bytes::Bytes;
use futures::TryStreamExt;
use log::{debug, info};
use stagefs_common::conf::StageConf;
use stagefs_common::error::FsError;
use stagefs_common::fs::Path;
use stagefs_common::state::{FileStatus, ListOptions};
use stagefs_common::{err_box, err_ext, FsResult, FOLDER_SUFFIX};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A file-system view over one bucket that understands the temp-directory
/// commit protocol: staged files go straight to their final key, and listings
/// hide what failed or superseded attempts left behind.
pub struct StagedFileSystem {
    mount: Path,
    store: Arc<dyn ObjectStore>,
    resolver: TempPathResolver,
    cache: OriginStatusCache,
    cleaner: OrphanCleaner,
    conf: StageConf,
    working_dir: RwLock<Path>,
}

impl StagedFileSystem {
    /// Connects to the bucket named by `mount`, e.g. `s3://bucket`. Logging is
    /// left to the host, see `Logger::init`.
    pub fn new(mount: &Path, mut conf: StageConf) -> FsResult<Self> {
        conf.init()?;

        let store = OpendalObjectStore::new(mount, &conf.store, conf.list.page_size)?;
        Self::with_store(mount, Arc::new(store), conf)
    }

    pub fn with_store(mount: &Path, store: Arc<dyn ObjectStore>, conf: StageConf) -> FsResult<Self> {
        if mount.root_uri().is_none() {
            return Err(FsError::invalid_path(
                mount.full_path(),
                "mount must be scheme://authority",
            ));
        }

        let root = mount.with_segments(Vec::<String>::new());
        let resolver = TempPathResolver::with_conf(&root, store.root(), &conf.staging)?;
        let cache = OriginStatusCache::new(&conf.cache, &conf.staging);
        let cleaner = OrphanCleaner::new(store.clone());

        info!(
            "staged file system on {}, patterns [{}], embed attempt {}",
            root,
            resolver
                .patterns()
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            conf.staging.embed_attempt_in_name
        );

        Ok(Self {
            working_dir: RwLock::new(root.clone()),
            mount: root,
            store,
            resolver,
            cache,
            cleaner,
            conf,
        })
    }

    pub fn mount(&self) -> &Path {
        &self.mount
    }

    pub fn conf(&self) -> &StageConf {
        &self.conf
    }

    pub fn resolver(&self) -> &TempPathResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn cleaner(&self) -> &OrphanCleaner {
        &self.cleaner
    }

    pub fn working_directory(&self) -> Path {
        self.working_dir
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_working_directory(&self, path: &Path) -> FsResult<()> {
        let path = self.resolve(path)?;
        debug!("working directory set to {}", path);
        *self.working_dir.write().unwrap_or_else(|e| e.into_inner()) = path;
        Ok(())
    }

    /// Qualifies `path` against the mount and the working directory.
    pub fn resolve(&self, path: &Path) -> FsResult<Path> {
        if path.root_uri().is_some() {
            if !path.same_mount(&self.mount) {
                return Err(FsError::invalid_path(
                    path.full_path(),
                    format!("not under mount {}", self.mount),
                ));
            }
            Ok(path.clone())
        } else if path.is_absolute() {
            Ok(self.mount.with_segments(path.segments()))
        } else {
            Ok(self.working_directory().join(path.path()))
        }
    }

    pub async fn list(
        &self,
        path: &Path,
        include_all_objects: bool,
        prefix_based: bool,
    ) -> FsResult<Vec<FileStatus>> {
        let path = self.resolve(path)?;
        let scope = path.key();
        let prefix = if scope.is_empty() || prefix_based {
            scope.clone()
        } else {
            format!("{}{}", scope, FOLDER_SUFFIX)
        };

        let options = ListOptions::new()
            .include_all_objects(include_all_objects)
            .prefix_based(prefix_based)
            .collision_policy(self.conf.list.collision_policy);

        let reconciler = ListingReconciler::new(self.store.as_ref(), &self.cache, &self.resolver)
            .ordered_pages(self.conf.list.ordered_pages);
        let pages = page_stream(self.store.as_ref(), &prefix);
        let result = reconciler.reconcile(pages, &scope, &options).await?;

        if !result.orphans.is_empty() {
            if self.conf.list.auto_delete_orphans {
                info!(
                    "scheduling deletion of {} objects of failed jobs under {}",
                    result.orphans.len(),
                    path
                );
                self.cleaner.submit(result.orphans);
            } else {
                debug!(
                    "{} objects of failed jobs under {} left in place",
                    result.orphans.len(),
                    path
                );
            }
        }

        Ok(result.entries)
    }

    pub async fn get_status(&self, path: &Path) -> FsResult<FileStatus> {
        let path = self.resolve(path)?;
        if path.is_root() {
            return Ok(FileStatus::dir(path.full_path(), "", ""));
        }
        if self.resolver.contains_staging_marker(&path) {
            return err_ext!(FsError::file_not_found(path.full_path()));
        }

        let key = path.key();
        if let Some(m) = self.store.get_metadata(&key).await? {
            return Ok(FileStatus {
                path: path.full_path().to_string(),
                name: path.name().to_string(),
                key,
                is_dir: m.size == 0,
                len: m.size,
                mtime: m.last_modified,
            });
        }

        let dir_key = format!("{}{}", key, FOLDER_SUFFIX);
        if let Some(m) = self.store.get_metadata(&dir_key).await? {
            let mut status = FileStatus::dir(path.full_path(), path.name(), dir_key);
            status.mtime = m.last_modified;
            return Ok(status);
        }

        let page = self.store.fetch_page(&dir_key, None).await?;
        if !page.objects.is_empty() {
            return Ok(FileStatus::dir(path.full_path(), path.name(), dir_key));
        }

        err_ext!(FsError::file_not_found(path.full_path()))
    }

    pub async fn exists(&self, path: &Path) -> FsResult<bool> {
        match self.get_status(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Writes `data` and returns the path it is visible under. A file inside a task
    /// attempt directory lands directly on its committed key.
    pub async fn create(&self, path: &Path, data: Bytes) -> FsResult<Path> {
        let path = self.resolve(path)?;

        if self.resolver.is_temporary(&path) {
            if !self.resolver.is_staged_file(&path) {
                return Err(FsError::invalid_path(
                    path.full_path(),
                    "is a staging directory",
                ));
            }

            let key = self
                .resolver
                .object_key(&path, self.conf.staging.embed_attempt_in_name);
            debug!("staged file {} written as {}", path, key);
            self.store.put_object(&key, data, self.origin_marker()).await?;
            return Ok(self.resolver.logical_path_for_key(&key));
        }

        let key = path.key();
        if key.is_empty() {
            return Err(FsError::invalid_path(path.full_path(), "cannot write the mount root"));
        }
        self.store.put_object(&key, data, HashMap::new()).await?;
        Ok(path)
    }

    pub async fn mkdirs(&self, path: &Path) -> FsResult<bool> {
        let path = self.resolve(path)?;
        if path.is_root() {
            return Ok(true);
        }

        if self.resolver.contains_staging_marker(&path) {
            // The dataset directory is materialized as one marked empty object.
            let key = self.resolver.base_directory(&path).key();
            if key.is_empty() || self.store.get_metadata(&key).await?.is_some() {
                return Ok(true);
            }

            debug!("create dataset marker {} for {}", key, path);
            self.store
                .put_object(&key, Bytes::new(), self.origin_marker())
                .await?;
            return Ok(true);
        }

        let key = format!("{}{}", path.key(), FOLDER_SUFFIX);
        self.store.put_object(&key, Bytes::new(), HashMap::new()).await?;
        Ok(true)
    }

    pub async fn delete(&self, path: &Path, recursive: bool) -> FsResult<bool> {
        let path = self.resolve(path)?;
        if path.is_root() {
            return Err(FsError::unsupported(format!("delete of mount root {}", path)));
        }
        if self.resolver.contains_staging_marker(&path) {
            // Staging directories never exist in the store.
            return Ok(true);
        }

        let key = path.key();
        let dir_key = format!("{}{}", key, FOLDER_SUFFIX);
        let children: Vec<String> = page_stream(self.store.as_ref(), &dir_key)
            .map_ok(|page| page.objects.into_iter().map(|x| x.key).collect::<Vec<_>>())
            .try_concat()
            .await?;

        let has_entries = children.iter().any(|k| *k != dir_key);
        if has_entries && !recursive {
            return err_box!("{} is a non-empty directory", path);
        }

        let mut keys = children;
        if self.store.get_metadata(&key).await?.is_some() {
            keys.push(key);
        }
        if keys.is_empty() {
            return Ok(false);
        }

        debug!("delete {} objects of {}", keys.len(), path);
        self.store.delete_objects(&keys).await?;
        self.cache.invalidate_all();
        Ok(true)
    }

    /// Committing a staged output is a no-op: its files are already on their final keys.
    pub async fn rename(&self, src: &Path, dst: &Path) -> FsResult<bool> {
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;

        if self.resolver.is_temporary(&src) {
            debug!("rename {} to {} is a committed staging path", src, dst);
            return Ok(true);
        }

        Err(FsError::unsupported(format!("rename {} to {}", src, dst)))
    }

    /// Waits for pending orphan deletions and drops cached facts.
    pub async fn close(&self) {
        self.cleaner.shutdown().await;
        self.cache.invalidate_all();
        info!("staged file system on {} closed", self.mount);
    }

    fn origin_marker(&self) -> HashMap<String, String> {
        let (k, v) = self.cache.marker();
        HashMap::from([(k.to_string(), v.to_string())])
    }
}
