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

//! The metric handles shared by every loading pipeline.

use cairn_telemetry::{
    metrics::registry::{CounterHandle, GaugeHandle, HistogramHandle},
    MetricsRegistry, MetricsResult,
};

/// The namespace every asset metric lives in.
pub const NAMESPACE: &str = "assets";

/// Handles to the `assets:*` metrics.
///
/// Cloning is cheap: every handle points into the same registry storage.
#[derive(Debug, Clone)]
pub struct AssetMetrics {
    /// One per fetch issued to the content provider, retries included.
    pub fetch_attempts: CounterHandle,
    /// One per failed fetch attempt.
    pub fetch_failures: CounterHandle,
    /// One per load answered from the cache.
    pub cache_hits: CounterHandle,
    /// One per asset evicted from the cache.
    pub evicted: CounterHandle,
    /// Wall time of each fetch attempt, in milliseconds.
    pub fetch_time_ms: HistogramHandle,
    /// Assets currently in the cache.
    pub resident: GaugeHandle,
}

impl AssetMetrics {
    /// Registers (or re-binds to) the asset metrics in `registry`.
    pub fn new(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            fetch_attempts: registry.register_counter(
                NAMESPACE,
                "fetch_attempts",
                "Fetches issued to the content provider",
            )?,
            fetch_failures: registry.register_counter(
                NAMESPACE,
                "fetch_failures",
                "Fetch attempts that failed",
            )?,
            cache_hits: registry.register_counter(
                NAMESPACE,
                "cache_hits",
                "Loads answered from the cache",
            )?,
            evicted: registry.register_counter(
                NAMESPACE,
                "evicted",
                "Assets evicted from the cache",
            )?,
            fetch_time_ms: registry.register_histogram(
                NAMESPACE,
                "fetch_time",
                "Time spent in one fetch attempt",
                "ms",
                vec![1.0, 5.0, 16.0, 33.0, 100.0, 500.0, 2000.0],
            )?,
            resident: registry.register_gauge(
                NAMESPACE,
                "resident",
                "Assets currently in the cache",
                "assets",
            )?,
        })
    }

    /// Adds `amount` to `counter`, logging instead of failing.
    pub fn bump(counter: &CounterHandle, amount: u64) {
        if amount == 0 {
            return;
        }
        if let Err(e) = counter.increment_by(amount) {
            log::warn!("Failed to update metric {}: {e}", counter.id());
        }
    }

    /// Records the number of resident assets.
    pub fn set_resident(&self, count: usize) {
        if let Err(e) = self.resident.set(count as f64) {
            log::warn!("Failed to update metric {NAMESPACE}:resident: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_shares_counters() {
        let registry = MetricsRegistry::new();
        let first = AssetMetrics::new(&registry).unwrap();
        let second = AssetMetrics::new(&registry).unwrap();
        AssetMetrics::bump(&first.cache_hits, 2);
        AssetMetrics::bump(&second.cache_hits, 1);
        assert_eq!(registry.counter_value(NAMESPACE, "cache_hits"), Some(3));
        assert_eq!(registry.namespace_metrics(NAMESPACE).len(), 6);

        second.set_resident(4);
        assert_eq!(registry.gauge_value(NAMESPACE, "resident"), Some(4.0));
    }
}
