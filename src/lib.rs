//! Sane API serializers
//!
//! Request-aware rendering and accepting of entities through declarative schemas.
//!
//! A [`Schema`] declares an entity's fields and which of them may be read or
//! written. For reads, a client may narrow the output with a selection string
//! (the `fields` query parameter); for writes, only writable fields present in
//! the payload are accepted. Anything a client names but may not see or write
//! is dropped silently, never reported.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sane_api::{render_request, Request, Schema};
//! use serde_json::json;
//!
//! let child = Arc::new(
//!     Schema::builder("child")
//!         .field("field1")
//!         .field("field2")
//!         .field("field3")
//!         .build()
//!         .unwrap(),
//! );
//! let parent = Schema::builder("parent")
//!     .field("field1")
//!     .nested_many("field2", child)
//!     .build()
//!     .unwrap();
//!
//! let entity = json!({
//!     "field1": 1,
//!     "field2": [
//!         { "field1": 1, "field2": 2, "field3": 3 },
//!         { "field1": 1, "field2": 2, "field3": 3 }
//!     ]
//! });
//!
//! let request = Request::get().fields("field1,field2{field1,field3}");
//! let output = render_request(&parent, &entity, &request).unwrap();
//!
//! assert_eq!(
//!     serde_json::Value::Object(output),
//!     json!({
//!         "field1": 1,
//!         "field2": [
//!             { "field1": 1, "field3": 3 },
//!             { "field1": 1, "field3": 3 }
//!         ]
//!     })
//! );
//! ```
//!
//! # Selection Grammar
//!
//! | Input | Meaning |
//! |-------|---------|
//! | (absent) | every readable field, at every level |
//! | `""` | nothing |
//! | `a,b` | fields `a` and `b` |
//! | `a{x,y}` | field `a`, and only `x` and `y` inside it |
//! | `a{}` | field `a`, rendered as an empty object |
//!
//! # Permissions
//!
//! The virtual `permissions` field, when readable and selected, lists the
//! capabilities (`destroy`, `retrieve`, `update`) the entity grants the
//! acting principal, via [`Capabilities`].

mod accept;
mod entity;
mod error;
mod loader;
mod permissions;
mod render;
mod resolver;
mod schema;
mod selection;
mod types;

pub use accept::accept;
pub use entity::{Entity, WithCapabilities};
pub use error::{
    AcceptError, EntityAccessError, FieldError, LoadError, RenderError, SchemaError,
    SelectionError,
};
pub use loader::{
    is_url, load_json, load_schema, load_schema_auto, load_schema_str, schema_from_value,
    FieldDocument, SchemaDocument,
};
pub use permissions::{synthesize, Capabilities, Grants};
pub use render::{render, render_many, render_request, render_written};
pub use resolver::{resolve_readable, resolve_writable, Resolved};
pub use schema::{Field, FieldKind, FieldPolicy, PolicyFn, Schema, SchemaBuilder, ValueDescriptor};
pub use selection::{Selection, MAX_SELECTION_DEPTH};
pub use types::{Capability, Method, Principal, Request, FIELDS_PARAM, PERMISSIONS_FIELD};

#[cfg(feature = "remote")]
pub use loader::load_json_url;
