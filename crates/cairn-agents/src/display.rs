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

//! Prefab instantiation.
//!
//! A [`Prefab`] asset names a display template and carries its properties.
//! The [`DisplayRegistry`] maps template names to factories, filled in once at
//! startup; instantiating a prefab runs its template's factory.

use cairn_core::asset::{Asset, AssetKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    error::Error,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// A loadable description of a display object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefab {
    /// The template whose factory builds the object.
    pub template: String,
    /// Free-form properties handed to the factory.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Asset for Prefab {
    const KIND: AssetKind = AssetKind::PREFAB;
}

impl Prefab {
    /// Decodes a prefab written in RON. Usable as a decoder for `Prefab`.
    pub fn from_ron_bytes(bytes: &[u8]) -> Result<Prefab, Box<dyn Error + Send + Sync>> {
        Ok(ron::de::from_bytes(bytes)?)
    }
}

/// A live object built from a prefab.
pub trait DisplayObject: Send {
    /// The template the object was built from.
    fn template(&self) -> &str;

    /// Detaches the object from whatever presents it. Called once, by `destroy`.
    fn teardown(&mut self);
}

/// Builds a display object from a prefab.
pub type DisplayFactory = Arc<dyn Fn(&Prefab) -> Box<dyn DisplayObject> + Send + Sync>;

/// Counts itself out of the registry's live instances when dropped.
struct Tracked {
    inner: Box<dyn DisplayObject>,
    live: Arc<AtomicUsize>,
}

impl DisplayObject for Tracked {
    fn template(&self) -> &str {
        self.inner.template()
    }

    fn teardown(&mut self) {
        self.inner.teardown();
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// The template name to factory table.
#[derive(Default)]
pub struct DisplayRegistry {
    factories: RwLock<HashMap<String, DisplayFactory>>,
    live: Arc<AtomicUsize>,
}

impl DisplayRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for `template`, replacing any previous one.
    pub fn register(
        &self,
        template: impl Into<String>,
        factory: impl Fn(&Prefab) -> Box<dyn DisplayObject> + Send + Sync + 'static,
    ) {
        let template = template.into();
        if self
            .factories
            .write()
            .insert(template.clone(), Arc::new(factory))
            .is_some()
        {
            log::warn!("Replacing display factory for template '{template}'");
        }
    }

    /// Returns `true` if a factory is registered for `template`.
    pub fn contains(&self, template: &str) -> bool {
        self.factories.read().contains_key(template)
    }

    /// Builds an object for `prefab`, or `None` if its template is unknown.
    pub fn instantiate(&self, prefab: &Prefab) -> Option<Box<dyn DisplayObject>> {
        let factory = self.factories.read().get(&prefab.template).cloned();
        let Some(factory) = factory else {
            log::warn!("No display factory for template '{}'", prefab.template);
            return None;
        };
        let inner = (*factory)(prefab);
        self.live.fetch_add(1, Ordering::AcqRel);
        Some(Box::new(Tracked {
            inner,
            live: self.live.clone(),
        }))
    }

    /// Tears down and drops `object`. Does nothing for `None`.
    pub fn destroy(&self, object: Option<Box<dyn DisplayObject>>) {
        if let Some(mut object) = object {
            log::debug!("Destroying display object '{}'", object.template());
            object.teardown();
        }
    }

    /// The number of instantiated objects not yet dropped.
    pub fn live_instances(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}
