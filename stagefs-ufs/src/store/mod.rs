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

//! The object store seam: a flat key space that can be paged in key order.

mod memory_store;
mod opendal_store;

pub use self::memory_store::MemoryObjectStore;
pub use self::opendal_store::OpendalObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use stagefs_common::error::FsError;
use stagefs_common::state::{ListPage, ObjectMetadata};
use stagefs_common::FsResult;
use std::collections::HashMap;

pub type PageStream<'a> = BoxStream<'a, FsResult<ListPage>>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket or container name.
    fn root(&self) -> &str;

    /// One page of objects under `prefix`, keys in lexicographic order.
    /// `token` is the `next_token` of the previous page.
    async fn fetch_page(&self, prefix: &str, token: Option<&str>) -> FsResult<ListPage>;

    /// `None` when the key does not exist.
    async fn get_metadata(&self, key: &str) -> FsResult<Option<ObjectMetadata>>;

    /// Deletes every key it can. Missing keys are not an error.
    async fn delete_objects(&self, keys: &[String]) -> FsResult<()>;

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        user_metadata: HashMap<String, String>,
    ) -> FsResult<()>;
}

/// Pages of `prefix` fetched lazily: the next page is requested only after the
/// previous one was consumed. A failed fetch ends the stream, and so does a
/// `next_token` that does not move past the token of the request.
pub fn page_stream<'a>(store: &'a dyn ObjectStore, prefix: &'a str) -> PageStream<'a> {
    stream::try_unfold(Some(None::<String>), move |state| async move {
        let token = match state {
            Some(token) => token,
            None => return Ok::<_, FsError>(None),
        };

        let page = store.fetch_page(prefix, token.as_deref()).await?;
        if let (Some(previous), Some(next)) = (&token, &page.next_token) {
            if next <= previous {
                return Err(FsError::list_failed(
                    prefix,
                    format!("page token '{}' does not advance past '{}'", next, previous),
                ));
            }
        }

        let next = page.next_token.clone().map(Some);
        Ok(Some((page, next)))
    })
    .boxed()
}
