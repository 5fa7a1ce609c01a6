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

//! # Cairn Lanes
//!
//! The hot-path loading pipelines. A **lane** here is a cheap-to-clone value
//! (every field is an `Arc`) that owns one loading strategy:
//!
//! - [`SingleLoadLane`]: cache-first load of one key, with retry and backoff.
//! - [`LabelLoadLane`]: bulk load of every location tagged with a label.
//!
//! Both deduplicate concurrent callers through an [`InFlightTable`], so that
//! every caller asking for the same key or label awaits one shared task.
//!
//! The crate also ships the default collaborators: [`CatalogLocator`] and
//! [`PackContentProvider`].

#![warn(missing_docs)]

pub mod decoder;
pub mod inflight;
pub mod label;
pub mod locator;
pub mod metrics;
pub mod pack;
pub mod retry;
pub mod single;

pub use decoder::{AssetDecoder, DecoderRegistry};
pub use inflight::{InFlightTable, Joined, TaskContext, Waiter};
pub use label::{LabelLoadLane, ProgressFanout};
pub use locator::CatalogLocator;
pub use metrics::AssetMetrics;
pub use pack::PackContentProvider;
pub use retry::RetryPolicy;
pub use single::SingleLoadLane;
