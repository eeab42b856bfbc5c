//! Field resolution - intersects schema policy with the client's selection or payload.
//!
//! Resolution never fails: names that are unknown, not permitted, or absent
//! from the payload are dropped silently so clients cannot probe for fields.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::schema::{Field, Schema};
use crate::selection::Selection;
use crate::types::{Request, PERMISSIONS_FIELD};

/// One entry of an effective field set.
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'s> {
    Field(&'s Field),
    /// The virtual `permissions` field.
    Permissions,
}

impl Resolved<'_> {
    pub fn name(&self) -> &str {
        match self {
            Resolved::Field(field) => field.name(),
            Resolved::Permissions => PERMISSIONS_FIELD,
        }
    }
}

/// Resolve the fields to render for one entity at one nesting level.
///
/// With no selection the result is every readable field; with a selection it
/// is the readable fields the selection names. Declared fields come in
/// declaration order, followed by `permissions` when it is included.
pub fn resolve_readable<'s>(
    schema: &'s Schema,
    request: &Request,
    selection: Option<&Selection>,
) -> Vec<Resolved<'s>> {
    let base = schema.readable_field_names(request);
    let allowed: HashSet<&str> = base.iter().map(String::as_str).collect();
    warn_undeclared(schema, "readable", &base);

    let selected = |name: &str| selection.map_or(true, |s| s.contains(name));

    let mut resolved: Vec<Resolved<'s>> = schema
        .fields()
        .iter()
        .filter(|f| allowed.contains(f.name()) && selected(f.name()))
        .map(Resolved::Field)
        .collect();

    if allowed.contains(PERMISSIONS_FIELD) && selected(PERMISSIONS_FIELD) {
        resolved.push(Resolved::Permissions);
    }

    if let Some(selection) = selection {
        let dropped: Vec<&str> = selection
            .names()
            .filter(|name| !resolved.iter().any(|r| r.name() == *name))
            .collect();
        if !dropped.is_empty() {
            tracing::debug!(schema = schema.name(), ?dropped, "dropping unreadable selected fields");
        }
    }

    resolved
}

/// Resolve the fields to accept from a write payload.
///
/// The result is the writable fields present in `payload`, in declaration
/// order. Methods other than `POST`, `PUT` and `PATCH` accept nothing: a body
/// sent with `GET` or `DELETE` never changes an entity, so nothing in it is
/// treated as written.
pub fn resolve_writable<'s>(
    schema: &'s Schema,
    request: &Request,
    payload: &Map<String, Value>,
) -> Vec<&'s Field> {
    if !request.method().is_write() {
        tracing::debug!(method = %request.method(), schema = schema.name(), "method accepts no fields");
        return Vec::new();
    }

    let base = schema.writable_field_names(request);
    let allowed: HashSet<&str> = base.iter().map(String::as_str).collect();
    warn_undeclared(schema, "writable", &base);

    let resolved: Vec<&Field> = schema
        .fields()
        .iter()
        .filter(|f| allowed.contains(f.name()) && payload.contains_key(f.name()))
        .collect();

    if resolved.len() < payload.len() {
        let dropped: Vec<&str> = payload
            .keys()
            .map(String::as_str)
            .filter(|key| !resolved.iter().any(|f| f.name() == *key))
            .collect();
        tracing::debug!(schema = schema.name(), ?dropped, "dropping unwritable payload keys");
    }

    resolved
}

/// Policy functions may name fields the schema never declared.
fn warn_undeclared(schema: &Schema, policy: &str, names: &[String]) {
    for name in names {
        if name != PERMISSIONS_FIELD && !schema.is_declared(name) {
            tracing::warn!(schema = schema.name(), policy, field = %name, "policy names undeclared field");
        }
    }
}
