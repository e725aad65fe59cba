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
use log::{debug, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Deletes objects of failed jobs in the background.
///
/// Deletion failures are logged and counted, never returned to the caller
/// that found the orphans.
pub struct OrphanCleaner {
    store: Arc<dyn ObjectStore>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    deleted: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl OrphanCleaner {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(vec![]),
            deleted: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn submit(&self, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }

        let handle = match Handle::try_current() {
            Ok(v) => v,
            Err(e) => {
                warn!("no runtime to delete {} orphan objects: {}", keys.len(), e);
                return;
            }
        };

        let store = self.store.clone();
        let deleted = self.deleted.clone();
        let failed = self.failed.clone();
        let task = handle.spawn(async move {
            debug!("deleting {} orphan objects, first {}", keys.len(), keys[0]);
            match store.delete_objects(&keys).await {
                Ok(_) => {
                    deleted.fetch_add(keys.len(), Ordering::SeqCst);
                }
                Err(e) => {
                    failed.fetch_add(keys.len(), Ordering::SeqCst);
                    warn!("failed to delete {} orphan objects: {}", keys.len(), e);
                }
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(task);
    }

    /// Waits for every submitted deletion, including ones submitted meanwhile.
    pub async fn wait_idle(&self) {
        loop {
            let tasks: Vec<JoinHandle<()>> = {
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                pending.drain(..).collect()
            };
            if tasks.is_empty() {
                break;
            }

            for task in tasks {
                if let Err(e) = task.await {
                    warn!("orphan deletion task failed: {}", e);
                }
            }
        }
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub async fn shutdown(&self) {
        self.wait_idle().await;
        info!(
            "orphan cleaner stopped, {} deleted, {} failed",
            self.deleted_count(),
            self.failed_count()
        );
    }
}
