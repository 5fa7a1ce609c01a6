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

//! Decoders turn raw bytes into typed assets, looked up by [`AssetKind`].

use anyhow::{anyhow, Result};
use cairn_core::asset::{Asset, AssetKind, ErasedAsset};
use cairn_telemetry::{
    metrics::registry::{CounterHandle, HistogramHandle},
    MetricsRegistry, MetricsResult, ScopedMetricTimer,
};
use std::{collections::HashMap, error::Error, marker::PhantomData};

/// A trait for types that can decode a specific kind of asset from a byte slice.
///
/// This is the CPU side of a fetch: the content provider reads the bytes, the
/// decoder parses them. Each decoder is specialized for a single asset type `A`.
pub trait AssetDecoder<A: Asset>: Send + Sync {
    /// Parses `bytes` into an instance of `A`.
    fn decode(&self, bytes: &[u8]) -> Result<A, Box<dyn Error + Send + Sync>>;
}

impl<A, F> AssetDecoder<A> for F
where
    A: Asset,
    F: Fn(&[u8]) -> Result<A, Box<dyn Error + Send + Sync>> + Send + Sync,
{
    fn decode(&self, bytes: &[u8]) -> Result<A, Box<dyn Error + Send + Sync>> {
        self(bytes)
    }
}

trait AnyDecoder: Send + Sync {
    fn decode_any(&self, bytes: &[u8], metrics: &DecoderMetrics) -> Result<ErasedAsset>;
}

struct DecoderWrapper<A: Asset, D: AssetDecoder<A>>(D, PhantomData<fn() -> A>);

impl<A: Asset, D: AssetDecoder<A>> AnyDecoder for DecoderWrapper<A, D> {
    fn decode_any(&self, bytes: &[u8], metrics: &DecoderMetrics) -> Result<ErasedAsset> {
        let _timer = ScopedMetricTimer::new(&metrics.decode_time_ms);
        let asset: A = self.0.decode(bytes).map_err(|e| anyhow!(e.to_string()))?;
        metrics.decoded_total.increment()?;
        Ok(ErasedAsset::new(asset))
    }
}

struct DecoderMetrics {
    decode_time_ms: HistogramHandle,
    decoded_total: CounterHandle,
}

impl DecoderMetrics {
    fn new(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            decode_time_ms: registry.register_histogram(
                "assets",
                "decode_time",
                "Asset decoding time",
                "ms",
                vec![1.0, 5.0, 16.0, 33.0, 100.0, 500.0],
            )?,
            decoded_total: registry.register_counter(
                "assets",
                "decoded_total",
                "Total number of assets decoded",
            )?,
        })
    }
}

/// Maps each [`AssetKind`] to the decoder that produces it.
pub struct DecoderRegistry {
    metrics: DecoderMetrics,
    decoders: HashMap<AssetKind, Box<dyn AnyDecoder>>,
}

impl DecoderRegistry {
    /// Creates an empty registry recording into `metrics_registry`.
    pub fn new(metrics_registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            metrics: DecoderMetrics::new(metrics_registry)?,
            decoders: HashMap::new(),
        })
    }

    /// Registers the decoder for `A` under `A::KIND`, replacing any previous one.
    pub fn register<A: Asset>(&mut self, decoder: impl AssetDecoder<A> + 'static) {
        let wrapped = DecoderWrapper(decoder, PhantomData);
        if self.decoders.insert(A::KIND, Box::new(wrapped)).is_some() {
            log::warn!("Replacing the decoder registered for kind '{}'", A::KIND);
        }
    }

    /// Returns `true` if a decoder is registered for `kind`.
    pub fn supports(&self, kind: &AssetKind) -> bool {
        self.decoders.contains_key(kind)
    }

    /// Decodes `bytes` with the decoder registered for `kind`.
    pub fn decode(&self, kind: &AssetKind, bytes: &[u8]) -> Result<ErasedAsset> {
        let decoder = self
            .decoders
            .get(kind)
            .ok_or_else(|| anyhow!("No decoder registered for asset kind '{}'", kind))?;
        decoder.decode_any(bytes, &self.metrics)
    }
}
