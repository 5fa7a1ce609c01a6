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

use anyhow::Result;
use async_trait::async_trait;
use cairn_agents::{AgentConfig, AssetAgent, Collaborators, DisplayObject, DisplayRegistry, Prefab};
use cairn_core::{
    asset::{Asset, AssetKey, AssetKind, ResourceLocation},
    catalog::Catalog,
    provider::CatalogFetcher,
    CancellationToken, ProviderError,
};
use cairn_lanes::{CatalogLocator, DecoderRegistry, PackContentProvider};
use cairn_telemetry::MetricsRegistry;
use std::{error::Error, sync::Arc};
use tempfile::tempdir;

#[derive(Debug, PartialEq)]
struct TestTexture {
    id: u32,
}

impl Asset for TestTexture {
    const KIND: AssetKind = AssetKind::TEXTURE;
}

fn decode_texture(bytes: &[u8]) -> Result<TestTexture, Box<dyn Error + Send + Sync>> {
    let id = u32::from_le_bytes(bytes.try_into()?);
    Ok(TestTexture { id })
}

struct Offline;

#[async_trait]
impl CatalogFetcher for Offline {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        Err(ProviderError::new(format!("offline: {url}")))
    }
}

struct Button {
    label: String,
}

impl DisplayObject for Button {
    fn template(&self) -> &str {
        "button"
    }

    fn teardown(&mut self) {
        self.label.clear();
    }
}

#[tokio::test]
async fn loads_textures_and_prefabs_from_a_pack() -> Result<()> {
    cairn_telemetry::logging::init_test_logging();

    // --- 1. Write a pack holding one texture and one prefab back to back ---
    let dir = tempdir()?;
    let pack_path = dir.path().join("data.pack");

    let texture_bytes = 1234u32.to_le_bytes().to_vec();
    let prefab_bytes = br#"(template: "button", properties: {"label": "Play"})"#.to_vec();
    let mut pack = texture_bytes.clone();
    pack.extend_from_slice(&prefab_bytes);
    std::fs::write(&pack_path, &pack)?;

    let catalog = Catalog::new(
        "1.0",
        vec![
            ResourceLocation::new("ui/logo", AssetKind::TEXTURE)
                .with_label("Preload")
                .with_packed(0, texture_bytes.len() as u64),
            ResourceLocation::new("ui/play_button", AssetKind::PREFAB)
                .with_label("Preload")
                .with_packed(texture_bytes.len() as u64, prefab_bytes.len() as u64),
        ],
    );

    // --- 2. Wire the agent to the pack ---
    let metrics = MetricsRegistry::new();
    let mut decoders = DecoderRegistry::new(&metrics)?;
    decoders.register::<TestTexture>(decode_texture);
    decoders.register::<Prefab>(Prefab::from_ron_bytes);
    let provider = Arc::new(PackContentProvider::new(&pack_path, decoders));

    let displays = DisplayRegistry::new();
    displays.register("button", |prefab: &Prefab| -> Box<dyn DisplayObject> {
        Box::new(Button {
            label: prefab.properties.get("label").cloned().unwrap_or_default(),
        })
    });

    let agent = AssetAgent::init(
        AgentConfig::default(),
        Collaborators {
            locator: Arc::new(CatalogLocator::new(catalog)),
            provider: provider.clone(),
            catalog_fetcher: Arc::new(Offline),
        },
        displays,
        metrics,
    )?;
    let token = CancellationToken::new();

    // --- 3. Load and verify ---
    let report = agent
        .ensure_preloaded(cairn_core::progress::no_progress(), &token)
        .await?;
    assert_eq!((report.total, report.completed), (2, 2));

    let texture = agent
        .load_async::<TestTexture>(&AssetKey::new("ui/logo"), &token)
        .await?;
    assert_eq!(*texture, TestTexture { id: 1234 });
    assert_eq!(provider.live_handles(), 2);
    assert_eq!(agent.metrics().counter_value("assets", "decoded_total"), Some(2));

    let button = agent
        .instantiate(&AssetKey::new("ui/play_button"), &token)
        .await;
    assert_eq!(button.as_ref().map(|b| b.template()), Some("button"));
    assert_eq!(agent.displays().live_instances(), 1);
    agent.destroy(button);
    assert_eq!(agent.displays().live_instances(), 0);

    // A texture is not a prefab.
    assert!(agent
        .instantiate(&AssetKey::new("ui/logo"), &token)
        .await
        .is_none());

    // --- 4. Shutdown hands every handle back ---
    assert!(agent.shutdown().await);
    assert_eq!(provider.live_handles(), 0);
    Ok(())
}
