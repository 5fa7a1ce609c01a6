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

//! Error types shared by every loading pipeline.

use crate::asset::{AssetKey, AssetKind};
use thiserror::Error;

/// A specialized `Result` type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// An error reported by a collaborator (locator, provider or catalog fetcher).
///
/// Collaborators are free to fail however they like; the loaders only need a
/// message for diagnostics, so the error is flattened into a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    /// Creates a new error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The outcome of a load that did not produce an asset.
///
/// Every variant except [`LoadError::Cancelled`] describes a failure the
/// loaders have already retried as far as the retry policy allows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No location of the requested kind exists for the key.
    #[error("no location of kind '{kind}' found for '{key}'")]
    NotFound {
        /// The requested key.
        key: AssetKey,
        /// The requested kind.
        kind: AssetKind,
    },

    /// The fetch completed but did not produce a usable asset.
    #[error("failed to load '{key}' after {attempts} attempt(s): {reason}")]
    LoadFailed {
        /// The requested key.
        key: AssetKey,
        /// How many attempts were made.
        attempts: u32,
        /// The last failure reported.
        reason: String,
    },

    /// A fetch or resolution returned nothing usable.
    #[error("'{key}' resolved to an empty result")]
    EmptyResult {
        /// The requested key.
        key: AssetKey,
    },

    /// The caller cancelled the load. Never retried.
    #[error("load cancelled")]
    Cancelled,

    /// The system is misconfigured for this target.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// A resident asset exists under the key but is of another type.
    #[error("'{key}' is resident but is not of the requested type (kind '{found}')")]
    TypeMismatch {
        /// The requested key.
        key: AssetKey,
        /// The kind of the resident asset.
        found: AssetKind,
    },

    /// A blocking load was attempted from inside an async runtime.
    #[error("blocking load of '{0}' attempted from within an async runtime")]
    Blocking(AssetKey),
}

impl LoadError {
    /// Returns `true` if the load was stopped by its caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }

    /// Returns `true` if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LoadError::NotFound { .. } | LoadError::LoadFailed { .. } | LoadError::EmptyResult { .. }
        )
    }
}
