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
use cairn_core::{asset::AssetKey, CancellationToken, LoadError};
use common::{fixture, sprite, FakeProvider, Sprite, Table};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn concurrent_loads_share_one_fetch() -> Result<()> {
    let fx = fixture(
        vec![sprite("hero", &[])],
        FakeProvider::with_delay(Duration::from_millis(50)),
    );

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let lane = fx.single.clone();
            tokio::spawn(async move {
                lane.load::<Sprite>(&AssetKey::new("hero"), &CancellationToken::new())
                    .await
            })
        })
        .collect();

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await??);
    }
    assert_eq!(fx.provider.fetch_count(), 1);
    assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
    assert_eq!(handles[0].name, "hero");
    assert_eq!(fx.cache.len(), 1);
    assert_eq!(fx.single.in_flight(), 0);
    Ok(())
}

#[tokio::test]
async fn resident_assets_skip_the_provider() -> Result<()> {
    let fx = fixture(vec![sprite("hero", &[])], FakeProvider::new());
    let token = CancellationToken::new();
    let first = fx.single.load::<Sprite>(&AssetKey::new("hero"), &token).await?;
    let second = fx.single.load::<Sprite>(&AssetKey::new("hero"), &token).await?;

    assert!(first.ptr_eq(&second));
    assert_eq!(fx.provider.fetch_count(), 1);
    assert_eq!(fx.metrics.counter_value("assets", "cache_hits"), Some(1));
    assert_eq!(fx.metrics.counter_value("assets", "fetch_attempts"), Some(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn two_failures_then_success_waits_for_the_backoff() -> Result<()> {
    let fx = fixture(vec![sprite("flaky", &[])], FakeProvider::new());
    fx.provider.fail_times("flaky", 2);

    let started = tokio::time::Instant::now();
    let handle = fx
        .single
        .load::<Sprite>(&AssetKey::new("flaky"), &CancellationToken::new())
        .await?;

    assert_eq!(handle.name, "flaky");
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(fx.provider.fetches_of("flaky"), 3);
    assert_eq!(fx.metrics.counter_value("assets", "fetch_failures"), Some(2));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_and_cache_nothing() {
    let fx = fixture(vec![sprite("broken", &[])], FakeProvider::new());
    fx.provider.break_key("broken");

    let err = fx
        .single
        .load::<Sprite>(&AssetKey::new("broken"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::LoadFailed { attempts: 3, .. }));
    assert_eq!(fx.provider.fetches_of("broken"), 3);
    assert!(fx.cache.is_empty());
    assert_eq!(fx.provider.live_handles(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_key_is_not_found() {
    let fx = fixture(vec![], FakeProvider::new());
    let err = fx
        .single
        .load::<Sprite>(&AssetKey::new("ghost"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::NotFound { .. }));
    assert_eq!(fx.provider.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_backoff_stops_retrying() {
    let fx = fixture(vec![sprite("broken", &[])], FakeProvider::new());
    fx.provider.break_key("broken");
    let token = CancellationToken::new();

    let lane = fx.single.clone();
    let caller_token = token.clone();
    let load = tokio::spawn(async move {
        lane.load::<Sprite>(&AssetKey::new("broken"), &caller_token)
            .await
    });

    // The first attempt fails at once; the retry is due at 100 ms.
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    let err = load.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fx.provider.fetches_of("broken"), 1);
    assert!(fx.cache.is_empty());
    assert_eq!(fx.single.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn one_caller_cancelling_does_not_abort_the_others() -> Result<()> {
    let fx = fixture(
        vec![sprite("slow", &[])],
        FakeProvider::with_delay(Duration::from_millis(200)),
    );
    let impatient = CancellationToken::new();

    let lane = fx.single.clone();
    let impatient_token = impatient.clone();
    let quitter = tokio::spawn(async move {
        lane.load::<Sprite>(&AssetKey::new("slow"), &impatient_token)
            .await
    });
    let lane = fx.single.clone();
    let stayer = tokio::spawn(async move {
        lane.load::<Sprite>(&AssetKey::new("slow"), &CancellationToken::new())
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    impatient.cancel();

    assert!(quitter.await?.unwrap_err().is_cancelled());
    assert_eq!(stayer.await??.name, "slow");
    assert_eq!(fx.provider.fetch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn resident_asset_of_another_type_is_a_mismatch() -> Result<()> {
    let fx = fixture(vec![sprite("hero", &[])], FakeProvider::new());
    let token = CancellationToken::new();
    fx.single.load::<Sprite>(&AssetKey::new("hero"), &token).await?;

    let err = fx
        .single
        .load::<Table>(&AssetKey::new("hero"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::TypeMismatch { .. }));
    Ok(())
}

#[tokio::test]
async fn cancelled_token_never_reaches_the_provider() {
    let fx = fixture(vec![sprite("hero", &[])], FakeProvider::new());
    let token = CancellationToken::new();
    token.cancel();
    let err = fx
        .single
        .load::<Sprite>(&AssetKey::new("hero"), &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(fx.provider.fetch_count(), 0);
}
