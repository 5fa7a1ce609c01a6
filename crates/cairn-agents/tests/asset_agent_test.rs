// Copyright 2025 eraflo
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

mod common;

use anyhow::Result;
use cairn_agents::AgentConfig;
use cairn_core::{
    asset::{AssetKey, AssetKind, Label},
    catalog::Catalog,
    platform::Platform,
    progress::{no_progress, LabelProgress},
    provider::InvalidationScope,
    CancellationToken, LoadError,
};
use common::{game_catalog, harness, harness_with, recorder, sprite, FakeProvider, Sprite};
use std::time::Duration;

fn keys(prefix: &str, count: usize) -> Vec<AssetKey> {
    (1..=count)
        .map(|i| AssetKey::new(format!("{prefix}/{i}")))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn concurrent_async_loads_fetch_once() -> Result<()> {
    let h = harness_with(
        game_catalog(),
        FakeProvider::with_delay(Duration::from_millis(40)),
        AgentConfig::default(),
    );

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let agent = h.agent.clone();
            tokio::spawn(async move {
                agent
                    .load_async::<Sprite>(&AssetKey::new("a/1"), &CancellationToken::new())
                    .await
            })
        })
        .collect();
    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await??);
    }

    assert_eq!(h.provider.fetch_count(), 1);
    assert!(handles.iter().all(|handle| handle.ptr_eq(&handles[0])));
    assert_eq!(h.agent.cached_count(), 1);
    Ok(())
}

#[tokio::test]
async fn preloading_twice_fetches_once() -> Result<()> {
    let h = harness();
    let token = CancellationToken::new();

    let (progress, first_seen) = recorder();
    let report = h.agent.ensure_preloaded(progress, &token).await?;
    assert_eq!(report.total, 5);
    assert!(h.agent.is_preloaded());
    assert_eq!(first_seen.lock().last().map(|p| p.completed), Some(5));
    assert_eq!(h.provider.fetch_count(), 5);

    let (progress, second_seen) = recorder();
    let report = h.agent.ensure_preloaded(progress, &token).await?;
    assert!(report.already_loaded);
    assert_eq!(*second_seen.lock(), vec![LabelProgress::idle()]);
    assert_eq!(h.provider.fetch_count(), 5);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn concurrent_first_preloads_share_one_pass() -> Result<()> {
    let h = harness_with(
        game_catalog(),
        FakeProvider::with_delay(Duration::from_millis(25)),
        AgentConfig::default(),
    );

    let spawn_preload = || {
        let agent = h.agent.clone();
        tokio::spawn(async move {
            agent
                .ensure_preloaded(no_progress(), &CancellationToken::new())
                .await
        })
    };
    let (first, second) = (spawn_preload(), spawn_preload());
    let (first, second) = (first.await??, second.await??);

    assert!(first.is_complete() && second.is_complete());
    assert!(first.already_loaded != second.already_loaded);
    assert_eq!(h.provider.fetch_count(), 5);
    assert!(h.agent.is_preloaded());
    Ok(())
}

#[tokio::test]
async fn unload_all_except_label_partitions_the_cache() -> Result<()> {
    let h = harness();
    let token = CancellationToken::new();
    for label in ["A", "B"] {
        h.agent
            .load_label(&Label::new(label), &AssetKind::ANY, no_progress(), &token)
            .await?;
    }
    assert_eq!(h.agent.cached_count(), 5);

    assert!(
        h.agent
            .unload_all_except_label(&Label::new("A"), &token)
            .await
    );

    for key in keys("a", 3) {
        assert!(h.agent.is_cached(&key), "{key} should stay resident");
    }
    for key in keys("b", 2) {
        assert!(!h.agent.is_cached(&key), "{key} should be evicted");
    }
    assert!(h.agent.is_label_loaded(&Label::new("A")));
    assert!(!h.agent.is_label_loaded(&Label::new("B")));
    assert_eq!(h.provider.live_handles(), 3);
    assert_eq!(
        h.provider.last_scope(),
        Some(InvalidationScope::Retain(keys("a", 3).into_iter().collect()))
    );
    assert_eq!(h.agent.metrics().counter_value("assets", "evicted"), Some(2));
    Ok(())
}

#[tokio::test]
async fn unload_all_resets_everything() -> Result<()> {
    let h = harness();
    let token = CancellationToken::new();
    h.agent.ensure_preloaded(no_progress(), &token).await?;
    h.agent
        .load_label(&Label::new("B"), &AssetKind::ANY, no_progress(), &token)
        .await?;
    h.agent
        .load_async::<Sprite>(&AssetKey::new("a/1"), &token)
        .await?;
    let resident = || h.agent.metrics().gauge_value("assets", "resident");
    assert_eq!(resident(), Some(8.0));

    assert!(h.agent.unload_all(&token).await);

    assert_eq!(resident(), Some(0.0));
    assert_eq!(h.agent.cached_count(), 0);
    assert_eq!(h.provider.live_handles(), 0);
    for label in ["Preload", "A", "B"] {
        assert!(!h.agent.is_label_loaded(&Label::new(label)));
    }
    assert!(!h.agent.is_preloaded());

    // Preloading again really loads again.
    h.agent.ensure_preloaded(no_progress(), &token).await?;
    assert_eq!(h.provider.fetch_count(), 13);
    assert_eq!(resident(), Some(5.0));
    Ok(())
}

#[tokio::test]
async fn unload_all_on_an_empty_cache_succeeds() {
    let h = harness();
    assert!(h.agent.unload_all(&CancellationToken::new()).await);
}

#[tokio::test]
async fn refused_invalidation_leaves_the_cache_untouched() -> Result<()> {
    let h = harness();
    let token = CancellationToken::new();
    h.agent.ensure_preloaded(no_progress(), &token).await?;
    h.provider.refuse_invalidation(true);

    assert!(!h.agent.unload_all(&token).await);
    assert!(
        !h.agent
            .unload_all_except_label(&Label::new("A"), &token)
            .await
    );

    assert_eq!(h.agent.cached_count(), 5);
    assert_eq!(h.provider.live_handles(), 5);
    assert!(h.agent.is_label_loaded(&Label::new("Preload")));
    assert!(h.agent.is_preloaded());
    Ok(())
}

#[tokio::test]
async fn cancelled_eviction_does_nothing() -> Result<()> {
    let h = harness();
    let token = CancellationToken::new();
    h.agent
        .load_async::<Sprite>(&AssetKey::new("a/1"), &token)
        .await?;

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(!h.agent.unload_all(&cancelled).await);
    assert_eq!(h.agent.cached_count(), 1);
    assert!(h.provider.last_scope().is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn eviction_during_a_label_load_keeps_the_label_unloaded() -> Result<()> {
    let h = harness_with(
        game_catalog(),
        FakeProvider::with_delay(Duration::from_millis(100)),
        AgentConfig::default(),
    );
    let agent = h.agent.clone();
    let load = tokio::spawn(async move {
        agent
            .load_label(
                &Label::new("A"),
                &AssetKind::ANY,
                no_progress(),
                &CancellationToken::new(),
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(h.agent.unload_all(&CancellationToken::new()).await);
    assert_eq!(h.agent.cached_count(), 0);

    let outcome = load.await?;
    assert_eq!(outcome.err(), Some(LoadError::Cancelled));
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(!h.agent.is_label_loaded(&Label::new("A")));
    assert_eq!(h.agent.cached_count(), 0);
    assert_eq!(h.provider.live_handles(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn eviction_retires_single_fetches_in_flight() -> Result<()> {
    let h = harness_with(
        game_catalog(),
        FakeProvider::with_delay(Duration::from_millis(100)),
        AgentConfig::default(),
    );
    let agent = h.agent.clone();
    let early = tokio::spawn(async move {
        agent
            .load_async::<Sprite>(&AssetKey::new("a/1"), &CancellationToken::new())
            .await
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(h.agent.unload_all(&CancellationToken::new()).await);
    assert_eq!(early.await?.err(), Some(LoadError::Cancelled));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.agent.cached_count(), 0);
    assert_eq!(h.provider.live_handles(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn catalog_swap_during_a_fetch_serves_the_new_binding() -> Result<()> {
    let mut old = sprite("a/1", &["A"]);
    old.internal_id = "v1".to_string();
    let mut new = sprite("a/1", &["A"]);
    new.internal_id = "v2".to_string();
    let h = harness_with(
        Catalog::new("1.0", vec![old]),
        FakeProvider::with_delay(Duration::from_millis(100)),
        catalog_config(),
    );
    h.fetcher.publish(
        "https://cdn.test/content/2.0/Android/catalog_2.0.bin",
        Catalog::new("2.0", vec![new]).to_bytes()?,
    );

    let agent = h.agent.clone();
    let early = tokio::spawn(async move {
        agent
            .load_async::<Sprite>(&AssetKey::new("a/1"), &CancellationToken::new())
            .await
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(h.agent.load_catalog("2.0", &CancellationToken::new()).await);

    let again = h
        .agent
        .load_async::<Sprite>(&AssetKey::new("a/1"), &CancellationToken::new())
        .await?;
    assert_eq!(again.source, "v2");
    assert_eq!(early.await?.err(), Some(LoadError::Cancelled));

    tokio::time::sleep(Duration::from_millis(500)).await;
    let resident = h
        .agent
        .load_async::<Sprite>(&AssetKey::new("a/1"), &CancellationToken::new())
        .await?;
    assert_eq!(resident.source, "v2");
    assert_eq!(h.agent.cached_count(), 1);
    assert_eq!(h.provider.live_handles(), 1);
    Ok(())
}

fn catalog_config() -> AgentConfig {
    AgentConfig {
        catalog_base_url: "https://cdn.test/content".to_string(),
        platform: Some(Platform::Android),
        ..AgentConfig::default()
    }
}

#[tokio::test]
async fn catalog_swap_installs_and_clears_the_cache() -> Result<()> {
    let h = harness_with(game_catalog(), FakeProvider::new(), catalog_config());
    let token = CancellationToken::new();
    h.agent.ensure_preloaded(no_progress(), &token).await?;

    let next = Catalog::new("2.0", vec![sprite("event/banner", &["Event"])]);
    h.fetcher.publish(
        "https://cdn.test/content/2.0/Android/catalog_2.0.bin",
        next.to_bytes()?,
    );

    assert!(h.agent.load_catalog("2.0", &token).await);
    assert_eq!(h.agent.cached_count(), 0);
    assert!(!h.agent.is_preloaded());
    assert_eq!(h.agent.label_item_count(&Label::new("Event"), &token).await?, 1);
    assert_eq!(
        h.agent.label_item_count(&Label::new("Preload"), &token).await?,
        0
    );
    h.agent
        .load_async::<Sprite>(&AssetKey::new("event/banner"), &token)
        .await?;
    Ok(())
}

#[tokio::test]
async fn failed_catalog_fetch_or_decode_changes_nothing() -> Result<()> {
    let h = harness_with(game_catalog(), FakeProvider::new(), catalog_config());
    let token = CancellationToken::new();
    h.agent
        .load_async::<Sprite>(&AssetKey::new("a/1"), &token)
        .await?;

    assert!(!h.agent.load_catalog("9.9", &token).await);
    h.fetcher.publish(
        "https://cdn.test/content/3.0/Android/catalog_3.0.bin",
        vec![0xde, 0xad],
    );
    assert!(!h.agent.load_catalog("3.0", &token).await);

    assert_eq!(h.agent.cached_count(), 1);
    assert_eq!(h.agent.label_item_count(&Label::new("A"), &token).await?, 3);
    assert_eq!(h.fetcher.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn label_item_count_does_not_load() -> Result<()> {
    let h = harness();
    let token = CancellationToken::new();
    assert_eq!(h.agent.label_item_count(&Label::new("Preload"), &token).await?, 5);
    assert_eq!(h.agent.label_item_count(&Label::new("Missing"), &token).await?, 0);
    assert_eq!(h.provider.fetch_count(), 0);
    Ok(())
}

#[tokio::test]
async fn blocking_load_refuses_to_run_inside_a_runtime() {
    let h = harness();
    let err = h
        .agent
        .load_blocking::<Sprite>(&AssetKey::new("a/1"))
        .unwrap_err();
    assert_eq!(err, LoadError::Blocking(AssetKey::new("a/1")));
    assert_eq!(h.provider.fetch_count(), 0);
}

#[test]
fn blocking_load_outside_a_runtime() -> Result<()> {
    let h = harness();
    let first = h.agent.load_blocking::<Sprite>(&AssetKey::new("b/2"))?;
    let second = h.agent.load_blocking::<Sprite>(&AssetKey::new("b/2"))?;
    assert_eq!(first.name, "b/2");
    assert!(first.ptr_eq(&second));
    assert_eq!(h.provider.fetch_count(), 1);
    Ok(())
}
