//! Demo handlers: an in-memory user directory and a client error report
//! endpoint, annotated through the audit session.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::audit::AuditSession;
use crate::plugins::{lock, Change};

/// Header naming the acting user.
pub const X_USER: &str = "x-user";

type User = Map<String, Value>;

#[derive(Clone, Default)]
pub struct UserDirectory {
    users: Arc<Mutex<BTreeMap<String, User>>>,
}

/// Exception reported by a client application.
#[derive(Debug, Deserialize)]
pub struct ErrorReport {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

pub fn routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users/{id}", get(get_user).put(update_user))
        .route("/errors", post(report_error))
        .with_state(UserDirectory::default())
}

async fn health() -> &'static str {
    "ok"
}

fn actor(headers: &HeaderMap) -> &str {
    headers
        .get(X_USER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("anonymous")
}

async fn get_user(
    session: AuditSession,
    State(directory): State<UserDirectory>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<User>, StatusCode> {
    session
        .metadata()
        .set_user(actor(&headers))
        .set_type("user.read")
        .add_object(format!("user:{id}"));

    let user = lock(&directory.users).get(&id).cloned();
    user.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Merge the given fields into the user, recording one change per field
/// whose value actually changed.
async fn update_user(
    session: AuditSession,
    State(directory): State<UserDirectory>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<User>,
) -> Json<User> {
    let metadata = session.metadata();
    metadata
        .set_user(actor(&headers))
        .set_type("user.update")
        .set_description(format!("update user {id}"))
        .add_object(format!("user:{id}"));

    let mut users = lock(&directory.users);
    let user = users.entry(id).or_default();
    for (field, to) in patch {
        let from = user.get(&field).cloned().unwrap_or(Value::Null);
        if from != to {
            metadata.add_change(Change::new(field.clone(), from, to.clone()));
            user.insert(field, to);
        }
    }
    metadata.add_detail(format!("{} field(s) stored", user.len()));

    Json(user.clone())
}

async fn report_error(
    session: AuditSession,
    headers: HeaderMap,
    Json(report): Json<ErrorReport>,
) -> StatusCode {
    session
        .metadata()
        .set_user(actor(&headers))
        .set_type("client.error")
        .add_detail(report.message.clone());
    session
        .execution()
        .set_exception(report.name, report.message, report.stack.as_deref());

    StatusCode::ACCEPTED
}
