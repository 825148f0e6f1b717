//! Per-request session: plugin facades plus the live aggregate store.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::AuditStore;
use crate::http::AuditRequest;
use crate::plugins::{
    Execution, ExecutionPlugin, ExternalPlugin, FinishHook, Metadata, MetadataPlugin, Plugin,
};

/// Handle given to request handlers.
///
/// Built-in facades have typed accessors; external facades are looked up
/// by the name they were registered with.
#[derive(Clone)]
pub struct AuditSession {
    metadata: MetadataPlugin,
    execution: ExecutionPlugin,
    plugins: Arc<BTreeMap<String, Arc<dyn Any + Send + Sync>>>,
    store: AuditStore,
}

impl AuditSession {
    /// Instantiate the built-ins, then every external plugin in registration
    /// order. Finish hooks are returned in that same order.
    pub(crate) fn compose(
        request: &AuditRequest,
        externals: &[Arc<dyn ExternalPlugin>],
    ) -> (Self, Vec<FinishHook>) {
        let metadata = Metadata.create(request);
        let execution = Execution.create(request);

        let mut store = AuditStore::new(metadata.store, execution.store);
        let mut plugins = BTreeMap::new();
        let mut hooks = Vec::with_capacity(2 + externals.len());
        hooks.push(metadata.finish);
        hooks.push(execution.finish);

        for plugin in externals {
            let instance = plugin.create(request);
            store.insert(plugin.name().to_string(), instance.store);
            plugins.insert(plugin.name().to_string(), instance.facade);
            hooks.push(instance.finish);
        }

        let session = Self {
            metadata: metadata.facade,
            execution: execution.facade,
            plugins: Arc::new(plugins),
            store,
        };
        (session, hooks)
    }

    pub fn metadata(&self) -> &MetadataPlugin {
        &self.metadata
    }

    pub fn execution(&self) -> &ExecutionPlugin {
        &self.execution
    }

    /// Facade of an external plugin, if registered under `name` with
    /// facade type `F`.
    pub fn plugin<F: Any + Send + Sync>(&self, name: &str) -> Option<Arc<F>> {
        self.plugins.get(name)?.clone().downcast::<F>().ok()
    }

    /// The live aggregate: later facade mutations are visible through it.
    pub fn get_store(&self) -> &AuditStore {
        &self.store
    }
}

impl std::fmt::Debug for AuditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSession")
            .field("store", &self.store)
            .finish()
    }
}
