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

//! Registry for managing metrics.

use super::{Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Storage = Arc<RwLock<HashMap<MetricId, Metric>>>;

fn lock_error() -> MetricsError {
    MetricsError::StorageError("metrics storage lock poisoned".to_string())
}

/// Central in-memory registry for metrics.
///
/// Registration returns a cheap, cloneable handle bound to the metric; updates
/// through the handle take the write lock for the single metric update only.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    storage: Storage,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a counter, or returns a handle to the existing one with the same id.
    pub fn register_counter(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> MetricsResult<CounterHandle> {
        let id = MetricId::new(namespace, name);
        self.put_if_absent(Metric {
            id: id.clone(),
            description: description.into(),
            unit: "count".to_string(),
            value: MetricValue::Counter(0),
        })?;
        Ok(CounterHandle {
            id,
            storage: self.storage.clone(),
        })
    }

    /// Registers a gauge, or returns a handle to the existing one with the same id.
    pub fn register_gauge(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> MetricsResult<GaugeHandle> {
        let id = MetricId::new(namespace, name);
        self.put_if_absent(Metric {
            id: id.clone(),
            description: description.into(),
            unit: unit.into(),
            value: MetricValue::Gauge(0.0),
        })?;
        Ok(GaugeHandle {
            id,
            storage: self.storage.clone(),
        })
    }

    /// Registers a histogram, or returns a handle to the existing one with the same id.
    pub fn register_histogram(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        buckets: Vec<f64>,
    ) -> MetricsResult<HistogramHandle> {
        let id = MetricId::new(namespace, name);
        let bucket_counts = vec![0; buckets.len()];
        self.put_if_absent(Metric {
            id: id.clone(),
            description: description.into(),
            unit: unit.into(),
            value: MetricValue::Histogram {
                bucket_bounds: buckets,
                bucket_counts,
                count: 0,
                sum: 0.0,
            },
        })?;
        Ok(HistogramHandle {
            id,
            storage: self.storage.clone(),
        })
    }

    /// Returns a copy of a metric by id.
    pub fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        let storage = self.storage.read().map_err(|_| lock_error())?;
        storage
            .get(id)
            .cloned()
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))
    }

    /// Returns the value of a counter, or `None` if it is not registered.
    pub fn counter_value(&self, namespace: &str, name: &str) -> Option<u64> {
        self.get_metric(&MetricId::new(namespace, name))
            .ok()
            .and_then(|metric| metric.value.as_counter())
    }

    /// Returns the value of a gauge, or `None` if it is not registered.
    pub fn gauge_value(&self, namespace: &str, name: &str) -> Option<f64> {
        self.get_metric(&MetricId::new(namespace, name))
            .ok()
            .and_then(|metric| metric.value.as_gauge())
    }

    /// Returns a copy of every metric in a namespace.
    pub fn namespace_metrics(&self, namespace: &str) -> Vec<Metric> {
        match self.storage.read() {
            Ok(storage) => storage
                .values()
                .filter(|metric| metric.id.namespace == namespace)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// The number of registered metrics.
    pub fn metric_count(&self) -> usize {
        self.storage.read().map(|s| s.len()).unwrap_or(0)
    }

    fn put_if_absent(&self, metric: Metric) -> MetricsResult<()> {
        let mut storage = self.storage.write().map_err(|_| lock_error())?;
        if let Some(existing) = storage.get(&metric.id) {
            let found = existing.value.metric_type();
            let expected = metric.value.metric_type();
            if found != expected {
                return Err(MetricsError::TypeMismatch { expected, found });
            }
            return Ok(());
        }
        storage.insert(metric.id.clone(), metric);
        Ok(())
    }
}

fn update<R>(
    storage: &Storage,
    id: &MetricId,
    f: impl FnOnce(&mut MetricValue) -> MetricsResult<R>,
) -> MetricsResult<R> {
    let mut storage = storage.write().map_err(|_| lock_error())?;
    let metric = storage
        .get_mut(id)
        .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))?;
    f(&mut metric.value)
}

fn mismatch(expected: MetricType, value: &MetricValue) -> MetricsError {
    MetricsError::TypeMismatch {
        expected,
        found: value.metric_type(),
    }
}

/// Handle for counter operations.
#[derive(Debug, Clone)]
pub struct CounterHandle {
    id: MetricId,
    storage: Storage,
}

impl CounterHandle {
    /// Increments the counter by 1 and returns the new value.
    pub fn increment(&self) -> MetricsResult<u64> {
        self.increment_by(1)
    }

    /// Increments the counter by `amount` and returns the new value.
    pub fn increment_by(&self, amount: u64) -> MetricsResult<u64> {
        update(&self.storage, &self.id, |value| match value {
            MetricValue::Counter(v) => {
                *v += amount;
                Ok(*v)
            }
            other => Err(mismatch(MetricType::Counter, other)),
        })
    }

    /// Returns the current counter value.
    pub fn get(&self) -> MetricsResult<u64> {
        update(&self.storage, &self.id, |value| {
            value
                .as_counter()
                .ok_or_else(|| mismatch(MetricType::Counter, value))
        })
    }

    /// Returns the metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle for gauge operations.
#[derive(Debug, Clone)]
pub struct GaugeHandle {
    id: MetricId,
    storage: Storage,
}

impl GaugeHandle {
    /// Sets the gauge to `value`.
    pub fn set(&self, new_value: f64) -> MetricsResult<()> {
        update(&self.storage, &self.id, |value| match value {
            MetricValue::Gauge(v) => {
                *v = new_value;
                Ok(())
            }
            other => Err(mismatch(MetricType::Gauge, other)),
        })
    }

    /// Returns the current gauge value.
    pub fn get(&self) -> MetricsResult<f64> {
        update(&self.storage, &self.id, |value| {
            value
                .as_gauge()
                .ok_or_else(|| mismatch(MetricType::Gauge, value))
        })
    }
}

/// Handle for histogram operations.
#[derive(Debug, Clone)]
pub struct HistogramHandle {
    id: MetricId,
    storage: Storage,
}

impl HistogramHandle {
    /// Records one sample.
    pub fn observe(&self, sample: f64) -> MetricsResult<()> {
        update(&self.storage, &self.id, |value| match value {
            MetricValue::Histogram {
                bucket_bounds,
                bucket_counts,
                count,
                sum,
            } => {
                if let Some(bucket) = bucket_bounds.iter().position(|bound| sample <= *bound) {
                    bucket_counts[bucket] += 1;
                }
                *count += 1;
                *sum += sample;
                Ok(())
            }
            other => Err(mismatch(MetricType::Histogram, other)),
        })
    }

    /// Returns the metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}
