//! Descriptive facts about the audited operation: actor, action type,
//! touched objects and field-level changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{lock, shared, Plugin, PluginInstance, Shared};
use crate::http::AuditRequest;

/// A single field-level change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub property: String,
    pub from: Value,
    pub to: Value,
}

impl Change {
    pub fn new(property: impl Into<String>, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataStore {
    pub executed_at: DateTime<Utc>,
    pub user: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
    pub objects: Vec<String>,
    pub details: Vec<String>,
    pub changes: Vec<Change>,
}

impl MetadataStore {
    fn new() -> Self {
        Self {
            executed_at: Utc::now(),
            user: None,
            kind: None,
            description: None,
            objects: Vec::new(),
            details: Vec::new(),
            changes: Vec::new(),
        }
    }
}

/// Write-only facade over a [`MetadataStore`]. Every setter returns the
/// facade for chaining.
#[derive(Debug, Clone)]
pub struct MetadataPlugin {
    store: Shared<MetadataStore>,
}

impl MetadataPlugin {
    pub fn set_user(&self, user: impl Into<String>) -> &Self {
        lock(&self.store).user = Some(user.into());
        self
    }

    pub fn set_type(&self, kind: impl Into<String>) -> &Self {
        lock(&self.store).kind = Some(kind.into());
        self
    }

    pub fn set_description(&self, description: impl Into<String>) -> &Self {
        lock(&self.store).description = Some(description.into());
        self
    }

    pub fn add_object(&self, object: impl Into<String>) -> &Self {
        lock(&self.store).objects.push(object.into());
        self
    }

    pub fn add_detail(&self, detail: impl Into<String>) -> &Self {
        lock(&self.store).details.push(detail.into());
        self
    }

    pub fn add_change(&self, change: Change) -> &Self {
        lock(&self.store).changes.push(change);
        self
    }
}

/// The built-in metadata plugin. Its finish hook is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metadata;

impl Plugin for Metadata {
    type Facade = MetadataPlugin;
    type Store = MetadataStore;

    fn create(&self, _request: &AuditRequest) -> PluginInstance<MetadataPlugin, MetadataStore> {
        let store = shared(MetadataStore::new());
        PluginInstance::new(
            MetadataPlugin {
                store: store.clone(),
            },
            store,
        )
    }
}
