//! The auditor: session factory, filters and finish subscribers.

use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::filter::{FilterOptions, RequestFilter, ResponseFilter};
use super::{run_isolated, AuditError, AuditSession, AuditStore};
use crate::config::FilterConfig;
use crate::http::{AuditRequest, AuditResponse};
use crate::plugins::{ExternalPlugin, FinishHook, Named, Plugin, EXECUTION, METADATA};

/// Construction options for an [`Auditor`].
#[derive(Clone, Default)]
pub struct AuditorOptions {
    pub filter: FilterOptions,
    pub plugins: Vec<Arc<dyn ExternalPlugin>>,
}

impl AuditorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declarative filters from configuration. Empty lists mean no filter.
    pub fn from_config(config: &FilterConfig) -> Self {
        let mut options = Self::new();
        if !config.methods.is_empty() {
            options.filter.request = Some(RequestFilter::methods(config.methods.iter().cloned()));
        }
        if !config.content_types.is_empty() {
            options.filter.response =
                Some(ResponseFilter::content_types(config.content_types.iter().cloned()));
        }
        options
    }

    pub fn with_request_filter(mut self, filter: RequestFilter) -> Self {
        self.filter.request = Some(filter);
        self
    }

    pub fn with_response_filter(mut self, filter: ResponseFilter) -> Self {
        self.filter.response = Some(filter);
        self
    }

    /// Register an external plugin under `name`.
    pub fn with_plugin<P: Plugin>(self, name: impl Into<String>, plugin: P) -> Self {
        self.with_external(Arc::new(Named::new(name, plugin)))
    }

    pub fn with_external(mut self, plugin: Arc<dyn ExternalPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }
}

/// Handle returned by [`Auditor::on_finish`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type FinishCallback = Arc<dyn Fn(&AuditStore) + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    callback: FinishCallback,
}

struct AuditorInner {
    filter: FilterOptions,
    plugins: Vec<Arc<dyn ExternalPlugin>>,
    subscribers: ArcSwap<Vec<Subscriber>>,
    next_id: AtomicU64,
}

/// Builds audit sessions and delivers finished records to subscribers.
///
/// Cheap to clone; clones share filters, plugins and subscribers.
#[derive(Clone)]
pub struct Auditor {
    inner: Arc<AuditorInner>,
}

impl Auditor {
    /// Validates plugin names: they must be non-empty, distinct, and must not
    /// shadow the built-in `metadata` / `execution` slots.
    pub fn new(options: AuditorOptions) -> Result<Self, AuditError> {
        let mut seen: HashSet<&str> = HashSet::from([METADATA, EXECUTION]);
        for plugin in &options.plugins {
            let name = plugin.name();
            if name.is_empty() {
                return Err(AuditError::EmptyPluginName);
            }
            if !seen.insert(name) {
                return Err(AuditError::DuplicatePlugin(name.to_string()));
            }
        }

        tracing::debug!(
            plugins = options.plugins.len(),
            request_filter = ?options.filter.request,
            response_filter = ?options.filter.response,
            "Auditor configured"
        );

        Ok(Self {
            inner: Arc::new(AuditorInner {
                filter: options.filter,
                plugins: options.plugins,
                subscribers: ArcSwap::from_pointee(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        })
    }

    pub fn is_request_included(&self, request: &AuditRequest) -> bool {
        self.inner.filter.allows_request(request)
    }

    pub fn is_response_included(&self, response: &AuditResponse) -> bool {
        self.inner.filter.allows_response(response)
    }

    /// Create the session for one request.
    ///
    /// The session is always returned so handlers can use it unconditionally.
    /// The [`Completion`] is only returned when the request filter accepts the
    /// request; without it no finish hook runs and nothing is emitted.
    pub fn create_audit_session(&self, request: &AuditRequest) -> (AuditSession, Option<Completion>) {
        let (session, hooks) = AuditSession::compose(request, &self.inner.plugins);

        if !self.is_request_included(request) {
            tracing::trace!(method = %request.method, url = %request.url, "Request excluded from audit");
            return (session, None);
        }

        let completion = Completion {
            auditor: self.clone(),
            store: session.get_store().clone(),
            hooks,
            finished: false,
        };
        (session, Some(completion))
    }

    /// Subscribe to finished records. Callbacks run synchronously, in
    /// subscription order, on the task that completes the response.
    pub fn on_finish(&self, callback: impl Fn(&AuditStore) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber = Subscriber {
            id,
            callback: Arc::new(callback),
        };
        self.inner.subscribers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(subscriber.clone());
            next
        });
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn off_finish(&self, id: SubscriptionId) -> bool {
        let previous = self.inner.subscribers.rcu(|current| {
            current
                .iter()
                .filter(|s| s.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|s| s.id == id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load().len()
    }

    fn emit(&self, store: &AuditStore) {
        let subscribers = self.inner.subscribers.load_full();
        tracing::debug!(subscribers = subscribers.len(), "Emitting audit record");
        for subscriber in subscribers.iter() {
            run_isolated("finish subscriber", || (subscriber.callback)(store));
        }
    }
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("filter", &self.inner.filter)
            .field("plugins", &self.inner.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// The finish pipeline of one audited request. Runs at most once: through
/// [`finish`], or on drop when the response never reached the client.
///
/// A dropped completion finishes against [`AuditResponse::default`] (status 0,
/// no headers), so the hooks and the response filter still see the request.
///
/// [`finish`]: Completion::finish
pub struct Completion {
    auditor: Auditor,
    store: AuditStore,
    hooks: Vec<FinishHook>,
    finished: bool,
}

impl Completion {
    /// Run every finish hook in registration order, then emit the record if
    /// the response filter accepts `response`.
    pub fn finish(mut self, response: &AuditResponse) {
        self.run(response);
    }

    pub fn store(&self) -> &AuditStore {
        &self.store
    }

    fn run(&mut self, response: &AuditResponse) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }

        let store = &self.store;
        for hook in std::mem::take(&mut self.hooks) {
            run_isolated("finish hook", || hook(response, store));
        }

        if self.auditor.is_response_included(response) {
            self.auditor.emit(store);
        } else {
            tracing::trace!(status = response.status_code, "Response excluded from audit");
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("response abandoned before the handler returned");
            self.run(&AuditResponse::default());
        }
    }
}
