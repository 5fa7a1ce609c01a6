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

//! Configuration of the asset agent.

use cairn_core::{asset::Label, platform::Platform};
use cairn_lanes::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// An error raised while reading or validating an [`AgentConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The RON text could not be parsed.
    #[error("failed to parse agent configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// The configuration could not be written as RON.
    #[error("failed to serialize agent configuration: {0}")]
    Serialize(#[from] ron::Error),
    /// A value is out of range.
    #[error("invalid agent configuration: {0}")]
    Invalid(String),
}

/// Tunables of the [`AssetAgent`](crate::AssetAgent).
///
/// Every field has a default, so a RON file only needs the values it changes:
///
/// ```
/// use cairn_agents::AgentConfig;
///
/// let config = AgentConfig::from_ron_str("(max_attempts: 5)").unwrap();
/// assert_eq!(config.max_attempts, 5);
/// assert_eq!(config.preload_label, "Preload");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Fetch attempts per key, including the first.
    pub max_attempts: u32,
    /// Linear backoff step between attempts, in milliseconds.
    pub backoff_step_ms: u64,
    /// The label loaded by `ensure_preloaded`.
    pub preload_label: String,
    /// Root of the remote catalog tree.
    pub catalog_base_url: String,
    /// Overrides the platform detected from the build target.
    pub platform: Option<Platform>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_ms: 100,
            preload_label: "Preload".to_string(),
            catalog_base_url: String::new(),
            platform: None,
        }
    }
}

impl AgentConfig {
    /// Parses and validates a configuration written in RON.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Rejects values the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.preload_label.is_empty() {
            return Err(ConfigError::Invalid(
                "preload_label must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The retry policy described by this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.backoff_step_ms),
        )
    }

    /// The preload label.
    pub fn preload_label(&self) -> Label {
        Label::new(self.preload_label.as_str())
    }

    /// The platform catalogs are fetched for: the override, else the build target.
    pub fn platform(&self) -> Option<Platform> {
        self.platform.or_else(Platform::current)
    }
}
