//! Accept engine - filters and validates write payloads.

use serde_json::{Map, Value};

use crate::error::{AcceptError, FieldError};
use crate::resolver::resolve_writable;
use crate::schema::{FieldKind, Schema};
use crate::types::{json_type_name, Request};

/// Validate the request body for a write.
///
/// Only writable fields present in the body are kept; everything else is
/// dropped without error. Each kept primitive value is checked by its field's
/// value descriptor, and all failures are reported together. Nested values
/// are kept as sent.
///
/// A missing body, or a non-write method, yields an empty mapping.
///
/// # Errors
///
/// Returns `AcceptError::NotAnObject` if the body is not a JSON object, or
/// `AcceptError::Invalid` with every field error found.
///
/// # Example
///
/// ```
/// use sane_api::{accept, Method, Request, Schema};
/// use serde_json::json;
///
/// let schema = Schema::builder("item")
///     .field("id")
///     .field("name")
///     .writable(["name"])
///     .build()
///     .unwrap();
/// let request = Request::new(Method::Patch).payload(json!({"id": 9, "name": "lamp"}));
///
/// let validated = accept(&schema, &request).unwrap();
/// assert_eq!(serde_json::Value::Object(validated), json!({"name": "lamp"}));
/// ```
pub fn accept(schema: &Schema, request: &Request) -> Result<Map<String, Value>, AcceptError> {
    let payload = match request.body() {
        None => return Ok(Map::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(AcceptError::NotAnObject {
                actual: json_type_name(other).to_string(),
            })
        }
    };

    let mut validated = Map::new();
    let mut errors = Vec::new();

    for field in resolve_writable(schema, request, payload) {
        let name = field.name();
        let Some(raw) = payload.get(name) else {
            continue;
        };

        match field.kind() {
            FieldKind::Primitive(descriptor) => match descriptor.from_input(raw) {
                Ok(value) => {
                    validated.insert(name.to_string(), value);
                }
                Err(field_errors) => {
                    errors.extend(field_errors.into_iter().map(|(path, message)| FieldError {
                        path: format!("/{}{}", escape_pointer(name), path),
                        message,
                    }));
                }
            },
            FieldKind::Nested(_) | FieldKind::NestedMany(_) => {
                validated.insert(name.to_string(), raw.clone());
            }
        }
    }

    if errors.is_empty() {
        tracing::debug!(
            schema = schema.name(),
            method = %request.method(),
            accepted = validated.len(),
            "accepted payload"
        );
        Ok(validated)
    } else {
        Err(AcceptError::Invalid { errors })
    }
}

/// Escape a key for use as a JSON Pointer token (`~` then `/`).
fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
