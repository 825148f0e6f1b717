//! Plugin protocol.
//!
//! A plugin is a factory. For every audited request it creates:
//! - a private store (plain data, serializable)
//! - a facade (mutators closing over that store)
//! - a finish hook, run once when the response lifecycle ends
//!
//! Two plugins are built in ([`metadata`] and [`execution`]); any number of
//! external plugins can be registered under a name. External plugins are
//! type-erased behind [`ExternalPlugin`] so one session can hold facets that
//! know nothing about each other.

pub mod execution;
pub mod metadata;

use serde::Serialize;
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::audit::{AuditStore, StoreView};
use crate::http::{AuditRequest, AuditResponse};

pub use execution::{Execution, ExecutionPlugin, ExecutionStore, ResponseRecord};
pub use metadata::{Change, Metadata, MetadataPlugin, MetadataStore};

/// Key of the built-in metadata plugin.
pub const METADATA: &str = "metadata";
/// Key of the built-in execution plugin.
pub const EXECUTION: &str = "execution";

/// A store shared between a plugin facade and the aggregate.
pub type Shared<T> = Arc<Mutex<T>>;

/// Runs once at completion with the response and the whole aggregate.
pub type FinishHook = Box<dyn FnOnce(&AuditResponse, &AuditStore) + Send>;

pub(crate) fn shared<T>(store: T) -> Shared<T> {
    Arc::new(Mutex::new(store))
}

/// Lock a store. A poisoned lock still holds usable audit data.
pub(crate) fn lock<T>(store: &Mutex<T>) -> MutexGuard<'_, T> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a plugin contributes to one session.
pub struct PluginInstance<F, S> {
    pub facade: F,
    pub store: Shared<S>,
    pub finish: FinishHook,
}

impl<F, S> PluginInstance<F, S> {
    /// An instance whose finish hook does nothing.
    pub fn new(facade: F, store: Shared<S>) -> Self {
        Self {
            facade,
            store,
            finish: Box::new(|_, _| {}),
        }
    }

    pub fn on_finish(
        mut self,
        hook: impl FnOnce(&AuditResponse, &AuditStore) + Send + 'static,
    ) -> Self {
        self.finish = Box::new(hook);
        self
    }
}

/// Factory for per-request plugin instances.
pub trait Plugin: Send + Sync + 'static {
    type Facade: Send + Sync + 'static;
    type Store: Serialize + Send + 'static;

    fn create(&self, request: &AuditRequest) -> PluginInstance<Self::Facade, Self::Store>;
}

/// A plugin instance with its facade and store type-erased.
pub struct ErasedInstance {
    pub facade: Arc<dyn Any + Send + Sync>,
    pub store: Arc<dyn StoreView>,
    pub finish: FinishHook,
}

/// An externally supplied plugin, keyed by name in the session and store.
pub trait ExternalPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, request: &AuditRequest) -> ErasedInstance;
}

/// Registers a typed [`Plugin`] under a name.
pub struct Named<P> {
    name: String,
    plugin: P,
}

impl<P: Plugin> Named<P> {
    pub fn new(name: impl Into<String>, plugin: P) -> Self {
        Self {
            name: name.into(),
            plugin,
        }
    }
}

impl<P: Plugin> ExternalPlugin for Named<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, request: &AuditRequest) -> ErasedInstance {
        let instance = self.plugin.create(request);
        ErasedInstance {
            facade: Arc::new(instance.facade),
            store: instance.store,
            finish: instance.finish,
        }
    }
}
