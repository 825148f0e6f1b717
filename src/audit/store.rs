//! The aggregate store assembled for one session.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::plugins::execution::ExecutionStore;
use crate::plugins::metadata::MetadataStore;
use crate::plugins::{lock, Shared, EXECUTION, METADATA};

/// Type-erased view of a plugin store held by the aggregate.
pub trait StoreView: Send + Sync {
    /// Serialize the current contents.
    fn to_json(&self) -> serde_json::Value;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T> StoreView for Mutex<T>
where
    T: serde::Serialize + Send + 'static,
{
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&*lock(self)).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "plugin store is not serializable");
            serde_json::Value::Null
        })
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Cross-plugin record keyed by plugin name.
///
/// Cloning is cheap and every clone observes the same stores.
#[derive(Clone)]
pub struct AuditStore {
    metadata: Shared<MetadataStore>,
    execution: Shared<ExecutionStore>,
    extensions: Vec<(String, Arc<dyn StoreView>)>,
}

impl AuditStore {
    pub(crate) fn new(metadata: Shared<MetadataStore>, execution: Shared<ExecutionStore>) -> Self {
        Self {
            metadata,
            execution,
            extensions: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, name: String, store: Arc<dyn StoreView>) {
        self.extensions.push((name, store));
    }

    pub fn metadata(&self) -> MutexGuard<'_, MetadataStore> {
        lock(&self.metadata)
    }

    pub fn execution(&self) -> MutexGuard<'_, ExecutionStore> {
        lock(&self.execution)
    }

    /// Typed access to an external plugin's store.
    pub fn extension<T: Send + 'static>(&self, name: &str) -> Option<Shared<T>> {
        self.extension_view(name)?
            .clone()
            .into_any()
            .downcast::<Mutex<T>>()
            .ok()
    }

    pub fn extension_view(&self, name: &str) -> Option<&Arc<dyn StoreView>> {
        self.extensions
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, store)| store)
    }

    /// Plugin names in registration order, built-ins first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        [METADATA, EXECUTION]
            .into_iter()
            .chain(self.extensions.iter().map(|(name, _)| name.as_str()))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for AuditStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.extensions.len()))?;
        map.serialize_entry(METADATA, &*self.metadata())?;
        map.serialize_entry(EXECUTION, &*self.execution())?;
        for (name, store) in &self.extensions {
            map.serialize_entry(name, &store.to_json())?;
        }
        map.end()
    }
}

impl std::fmt::Debug for AuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditStore")
            .field("plugins", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
