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

use futures::stream;
use stagefs_common::conf::{CacheConf, StagingConf};
use stagefs_common::error::FsError;
use stagefs_common::fs::Path;
use stagefs_common::state::{CollisionPolicy, ListOptions, ListPage, ObjectSummary};
use stagefs_common::FsResult;
use stagefs_ufs::store::MemoryObjectStore;
use stagefs_ufs::{ListingReconciler, ListingResult, OriginStatusCache, TempPathResolver};
use std::collections::HashMap;

const A0: &str = "attempt_20180405072427_0001_m_000000_0";
const A1: &str = "attempt_20180405072427_0001_m_000000_1";

struct Fixture {
    store: MemoryObjectStore,
    cache: OriginStatusCache,
    resolver: TempPathResolver,
}

impl Fixture {
    fn new() -> Self {
        let mount = Path::from_str("s3://bucket").unwrap();
        Self {
            store: MemoryObjectStore::new("bucket"),
            cache: OriginStatusCache::new(&CacheConf::default(), &StagingConf::default()),
            resolver: TempPathResolver::with_conf(&mount, "bucket", &StagingConf::default())
                .unwrap(),
        }
    }

    // The marker object a staged job leaves at its output directory.
    async fn staged_dataset(&self, dir: &str, successful: bool) {
        let marker = HashMap::from([("data-origin".to_string(), "stocator".to_string())]);
        self.store.put_with(dir, "", marker, 1).await;
        if successful {
            self.store.put(format!("{}/_SUCCESS", dir), "").await;
        }
    }

    async fn list(
        &self,
        pages: Vec<FsResult<ListPage>>,
        scope: &str,
        options: ListOptions,
    ) -> FsResult<ListingResult> {
        ListingReconciler::new(&self.store, &self.cache, &self.resolver)
            .reconcile(stream::iter(pages), scope, &options)
            .await
    }
}

fn page(objects: &[(&str, i64, i64)]) -> FsResult<ListPage> {
    let objects = objects
        .iter()
        .map(|(k, size, mtime)| ObjectSummary::new(*k, *size, *mtime))
        .collect();
    Ok(ListPage::new(objects, None))
}

fn part(dir: &str, attempt: &str) -> String {
    format!("{}/part-00000-e5eede57-4d16-{}.json", dir, attempt)
}

fn keys(result: &ListingResult) -> Vec<&str> {
    result.entries.iter().map(|x| x.key.as_str()).collect()
}

#[tokio::test]
async fn test_speculative_attempt_collapses_to_larger() -> FsResult<()> {
    let fx = Fixture::new();
    fx.staged_dataset("out/data.json", true).await;

    let a0 = part("out/data.json", A0);
    let a1 = part("out/data.json", A1);
    let pages = vec![page(&[
        ("out/data.json", 0, 1),
        ("out/data.json/_SUCCESS", 0, 5),
        (a0.as_str(), 0, 3),
        (a1.as_str(), 512, 4),
    ])];

    let res = fx.list(pages, "out/data.json", ListOptions::new()).await?;
    assert_eq!(keys(&res), vec![a1.as_str()]);
    assert_eq!(res.entries[0].len, 512);
    assert!(!res.entries[0].is_dir);
    assert_eq!(
        res.entries[0].path,
        format!("s3://bucket/{}", a1)
    );
    assert!(res.orphans.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_collision_policies_in_both_orders() -> FsResult<()> {
    let fx = Fixture::new();
    fx.staged_dataset("out/data.json", true).await;
    let a0 = part("out/data.json", A0);
    let a1 = part("out/data.json", A1);

    // (size, mtime) of attempt 0 and attempt 1.
    let layouts = [((100, 20), (200, 10)), ((200, 10), (100, 20))];

    for ((s0, m0), (s1, m1)) in layouts {
        let objects = [(a0.as_str(), s0, m0), (a1.as_str(), s1, m1)];

        let larger = fx
            .list(vec![page(&objects)], "out", ListOptions::new())
            .await?;
        assert_eq!(larger.entries.len(), 1);
        assert_eq!(larger.entries[0].len, 200);

        let latest = fx
            .list(
                vec![page(&objects)],
                "out",
                ListOptions::new().collision_policy(CollisionPolicy::LatestModified),
            )
            .await?;
        assert_eq!(latest.entries.len(), 1);
        assert_eq!(latest.entries[0].mtime, 20);
        assert_eq!(latest.entries[0].len, 100);
    }

    let tie = [(a0.as_str(), 100, 5), (a1.as_str(), 100, 5)];
    let res = fx.list(vec![page(&tie)], "out", ListOptions::new()).await?;
    assert_eq!(keys(&res), vec![a0.as_str()]);
    Ok(())
}

#[tokio::test]
async fn test_failed_job_objects_are_orphans() -> FsResult<()> {
    let fx = Fixture::new();
    fx.staged_dataset("out/good.json", true).await;
    fx.staged_dataset("out/bad.json", false).await;

    let bad = part("out/bad.json", A0);
    let good = part("out/good.json", A0);
    let objects = [
        ("out/bad.json", 0, 1),
        (bad.as_str(), 10, 1),
        ("out/good.json", 0, 1),
        ("out/good.json/_SUCCESS", 0, 1),
        (good.as_str(), 20, 1),
    ];

    let res = fx.list(vec![page(&objects)], "out", ListOptions::new()).await?;
    assert_eq!(keys(&res), vec![good.as_str()]);
    assert_eq!(res.orphans, vec!["out/bad.json".to_string(), bad.clone()]);

    // The first object of a listing goes through the same checks.
    let res = fx
        .list(vec![page(&objects[1..2])], "out/bad.json", ListOptions::new())
        .await?;
    assert!(res.entries.is_empty());
    assert_eq!(res.orphans, vec![bad.clone()]);

    let all = fx
        .list(
            vec![page(&objects)],
            "out",
            ListOptions::new().include_all_objects(true),
        )
        .await?;
    assert_eq!(all.entries.len(), 5);
    assert!(all.orphans.is_empty());
    assert!(all.entries[0].is_dir);
    assert_eq!(all.entries[0].name, "bad.json");
    Ok(())
}

#[tokio::test]
async fn test_unknown_job_status_is_hidden_but_not_orphaned() -> FsResult<()> {
    let fx = Fixture::new();
    fx.staged_dataset("out/good.json", true).await;
    fx.store.fail_metadata("out/good.json/_SUCCESS").await;

    let good = part("out/good.json", A0);
    let objects = [
        ("out/good.json", 0, 1),
        ("out/good.json/_SUCCESS", 0, 1),
        (good.as_str(), 20, 1),
    ];

    let res = fx.list(vec![page(&objects)], "out", ListOptions::new()).await?;
    assert!(res.entries.is_empty());
    assert!(res.orphans.is_empty());

    fx.store.clear_faults().await;
    let res = fx.list(vec![page(&objects)], "out", ListOptions::new()).await?;
    assert_eq!(keys(&res), vec![good.as_str()]);
    Ok(())
}

#[tokio::test]
async fn test_plain_objects_are_not_deduplicated() -> FsResult<()> {
    let fx = Fixture::new();
    let k0 = format!("logs/app-{}.txt", A0);
    let k1 = format!("logs/app-{}.txt", A1);

    let res = fx
        .list(
            vec![page(&[(k0.as_str(), 3, 1), (k1.as_str(), 4, 1), ("logs/empty", 0, 1)])],
            "logs",
            ListOptions::new(),
        )
        .await?;
    assert_eq!(keys(&res), vec![k0.as_str(), k1.as_str()]);
    Ok(())
}

#[tokio::test]
async fn test_scope_filter() -> FsResult<()> {
    let fx = Fixture::new();
    let objects = [("out/y", 5, 1), ("outer/x", 5, 1)];

    let res = fx.list(vec![page(&objects)], "out", ListOptions::new()).await?;
    assert_eq!(keys(&res), vec!["out/y"]);

    let res = fx.list(vec![page(&objects)], "out/", ListOptions::new()).await?;
    assert_eq!(keys(&res), vec!["out/y"]);

    let res = fx
        .list(vec![page(&objects)], "out", ListOptions::new().prefix_based(true))
        .await?;
    assert_eq!(keys(&res), vec!["out/y", "outer/x"]);

    let res = fx.list(vec![page(&objects)], "", ListOptions::new()).await?;
    assert_eq!(res.entries.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unsorted_page_is_sorted() -> FsResult<()> {
    let fx = Fixture::new();
    fx.staged_dataset("out/data.json", true).await;
    let a0 = part("out/data.json", A0);
    let a1 = part("out/data.json", A1);

    let res = fx
        .list(
            vec![page(&[(a1.as_str(), 1, 1), ("out/z", 7, 1), (a0.as_str(), 9, 1)])],
            "out",
            ListOptions::new(),
        )
        .await?;
    assert_eq!(keys(&res), vec![a0.as_str(), "out/z"]);
    Ok(())
}

#[tokio::test]
async fn test_cross_page_order_violation() {
    let fx = Fixture::new();
    let pages = vec![page(&[("out/b", 1, 1)]), page(&[("out/a", 1, 1)])];

    let res = fx.list(pages, "out", ListOptions::new()).await;
    match res {
        Err(FsError::ListOrder { previous, key, .. }) => {
            assert_eq!(previous, "out/b");
            assert_eq!(key, "out/a");
        }
        other => panic!("expected an ordering error, got {:?}", other),
    }

    let pages = vec![page(&[("out/b", 1, 1)]), page(&[("out/a", 1, 1)])];
    let res = ListingReconciler::new(&fx.store, &fx.cache, &fx.resolver)
        .ordered_pages(false)
        .reconcile(stream::iter(pages), "out", &ListOptions::new())
        .await
        .unwrap();
    assert_eq!(keys(&res), vec!["out/a", "out/b"]);
}

#[tokio::test]
async fn test_page_failure_fails_listing() {
    let fx = Fixture::new();

    let pages = vec![
        page(&[("out/a", 1, 1)]),
        Err(FsError::list_failed("out/", "connection reset")),
    ];
    let res = fx.list(pages, "out", ListOptions::new()).await;
    assert!(matches!(res, Err(FsError::ListFailed { .. })));

    let pages = vec![page(&[("out/a", 1, 1)]), Err(FsError::common("timeout"))];
    let res = fx.list(pages, "out", ListOptions::new()).await;
    match res {
        Err(FsError::ListFailed { prefix, reason }) => {
            assert_eq!(prefix, "out");
            assert_eq!(reason, "timeout");
        }
        other => panic!("expected a list failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unavailable_origin_lookup_is_not_staged() -> FsResult<()> {
    let fx = Fixture::new();
    fx.staged_dataset("out/data.json", true).await;
    fx.store.fail_metadata("out/data.json").await;

    let a0 = part("out/data.json", A0);
    let a1 = part("out/data.json", A1);
    let objects = [(a0.as_str(), 1, 1), (a1.as_str(), 2, 1)];

    let res = fx.list(vec![page(&objects)], "out", ListOptions::new()).await?;
    assert_eq!(res.entries.len(), 2);

    fx.store.clear_faults().await;
    let res = fx.list(vec![page(&objects)], "out", ListOptions::new()).await?;
    assert_eq!(keys(&res), vec![a1.as_str()]);
    Ok(())
}
