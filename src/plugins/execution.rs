//! Execution facts: request snapshot, response snapshot, timing, exception.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{lock, shared, Plugin, PluginInstance, Shared};
use crate::exception::ExceptionData;
use crate::http::{AuditRequest, AuditResponse};

/// Response fields, filled progressively: the body when the stream ends,
/// headers and status at finish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub body: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub status_code: Option<u16>,
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStore {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Frozen at session creation.
    pub request: AuditRequest,
    pub response: ResponseRecord,
    pub exception: Option<ExceptionData>,
}

#[derive(Debug, Clone)]
pub struct ExecutionPlugin {
    store: Shared<ExecutionStore>,
}

impl ExecutionPlugin {
    pub fn set_response_body(&self, body: impl Into<String>) -> &Self {
        lock(&self.store).response.body = Some(body.into());
        self
    }

    /// Record an exception from its raw parts. Replaces any earlier one.
    pub fn set_exception(
        &self,
        name: impl Into<String>,
        message: impl Into<String>,
        stack: Option<&str>,
    ) -> &Self {
        let exception = ExceptionData::capture(name, message, stack);
        tracing::debug!(
            name = %exception.name,
            frames = exception.stack.len(),
            "exception captured"
        );
        lock(&self.store).exception = Some(exception);
        self
    }
}

/// The built-in execution plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct Execution;

impl Plugin for Execution {
    type Facade = ExecutionPlugin;
    type Store = ExecutionStore;

    fn create(&self, request: &AuditRequest) -> PluginInstance<ExecutionPlugin, ExecutionStore> {
        let store = shared(ExecutionStore {
            start_at: Utc::now(),
            finished_at: None,
            request: request.clone(),
            response: ResponseRecord::default(),
            exception: None,
        });

        let frozen = store.clone();
        PluginInstance::new(
            ExecutionPlugin {
                store: store.clone(),
            },
            store,
        )
        .on_finish(move |response: &AuditResponse, _| {
            let mut store = lock(&frozen);
            store.response.headers = Some(response.headers.clone());
            store.response.status_code = Some(response.status_code);
            store.response.status_message = response.status_message.clone();
            store.finished_at = Some(Utc::now());
        })
    }
}
