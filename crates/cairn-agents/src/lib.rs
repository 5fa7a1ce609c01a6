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

//! # Cairn Agents
//!
//! The [`AssetAgent`] is the one entry point the presentation layer talks to.
//! It owns the cache and label registry and drives the lanes:
//!
//! - single-key loads, blocking or async, and prefab instantiation;
//! - label loads and the one-shot preload of the preload label;
//! - eviction of everything, or of everything outside one label;
//! - catalog swaps, which always end with a full eviction.

#![warn(missing_docs)]

pub mod agent;
pub mod catalog;
pub mod config;
pub mod display;
pub mod eviction;
pub mod preload;

pub use agent::{AssetAgent, Collaborators};
pub use config::{AgentConfig, ConfigError};
pub use display::{DisplayFactory, DisplayObject, DisplayRegistry, Prefab};
