//! Render engine - produces the output mapping for read responses.

use serde_json::{Map, Value};

use crate::entity::Entity;
use crate::error::RenderError;
use crate::permissions::synthesize;
use crate::resolver::{resolve_readable, resolve_writable, Resolved};
use crate::schema::{FieldKind, Schema};
use crate::selection::Selection;
use crate::types::Request;

/// Render an entity.
///
/// `selection` of `None` renders every readable field at every level; a
/// selection restricts this level and, through its sub-trees, nested levels.
/// Fields the selection names but the schema does not permit are omitted.
///
/// # Errors
///
/// Returns `RenderError::Entity` if a capability predicate fails while
/// rendering `permissions`.
///
/// # Example
///
/// ```
/// use sane_api::{render, Request, Schema, Selection};
/// use serde_json::json;
///
/// let schema = Schema::builder("item")
///     .field("id")
///     .field("name")
///     .field("secret")
///     .readable(["id", "name"])
///     .build()
///     .unwrap();
/// let entity = json!({"id": 1, "name": "lamp", "secret": "x"});
///
/// let selection = Selection::parse("name,secret").unwrap();
/// let out = render(&schema, &entity, &Request::get(), Some(&selection)).unwrap();
/// assert_eq!(serde_json::Value::Object(out), json!({"name": "lamp"}));
/// ```
pub fn render(
    schema: &Schema,
    entity: &dyn Entity,
    request: &Request,
    selection: Option<&Selection>,
) -> Result<Map<String, Value>, RenderError> {
    render_level(schema, entity, request, selection, "")
}

/// Parse the request's `fields` string, then render.
///
/// # Errors
///
/// Returns `RenderError::Selection` for a malformed selection string, or any
/// error [`render`] returns.
pub fn render_request(
    schema: &Schema,
    entity: &dyn Entity,
    request: &Request,
) -> Result<Map<String, Value>, RenderError> {
    let selection = Selection::parse_opt(request.selection_str())?;
    render(schema, entity, request, selection.as_ref())
}

/// Render a top-level list of entities, preserving order.
pub fn render_many<'e, I>(
    schema: &Schema,
    entities: I,
    request: &Request,
    selection: Option<&Selection>,
) -> Result<Vec<Value>, RenderError>
where
    I: IntoIterator<Item = &'e dyn Entity>,
{
    entities
        .into_iter()
        .enumerate()
        .map(|(i, entity)| {
            render_level(schema, entity, request, selection, &format!("[{}]", i)).map(Value::Object)
        })
        .collect()
}

/// Render the response to a write: only the fields the payload wrote.
///
/// The field set is the writable fields present in the request body; values
/// are read back from `entity`. Nested fields are rendered in full.
pub fn render_written(
    schema: &Schema,
    entity: &dyn Entity,
    request: &Request,
) -> Result<Map<String, Value>, RenderError> {
    let empty = Map::new();
    let payload = request.body().and_then(Value::as_object).unwrap_or(&empty);

    let mut output = Map::new();
    for field in resolve_writable(schema, request, payload) {
        let value = render_field(field.kind(), field.name(), entity, request, None, "")?;
        output.insert(field.name().to_string(), value);
    }
    Ok(output)
}

// --- Internal implementation ---

fn render_level(
    schema: &Schema,
    entity: &dyn Entity,
    request: &Request,
    selection: Option<&Selection>,
    path: &str,
) -> Result<Map<String, Value>, RenderError> {
    let mut output = Map::new();

    for resolved in resolve_readable(schema, request, selection) {
        let name = resolved.name();
        let value = match resolved {
            Resolved::Field(field) => {
                let sub = selection.and_then(|s| s.get(name));
                render_field(field.kind(), name, entity, request, sub, path)?
            }
            Resolved::Permissions => {
                let granted = synthesize(entity, request).map_err(|source| RenderError::Entity {
                    path: child_path(path, name),
                    source,
                })?;
                Value::Array(
                    granted
                        .into_iter()
                        .map(|c| Value::String(c.as_str().to_string()))
                        .collect(),
                )
            }
        };
        output.insert(name.to_string(), value);
    }

    Ok(output)
}

fn render_field(
    kind: &FieldKind,
    name: &str,
    entity: &dyn Entity,
    request: &Request,
    selection: Option<&Selection>,
    path: &str,
) -> Result<Value, RenderError> {
    let value = match kind {
        FieldKind::Primitive(descriptor) => entity
            .value(name)
            .map(|v| descriptor.to_output(&v))
            .unwrap_or(Value::Null),
        FieldKind::Nested(schema) => match entity.nested(name) {
            Some(child) => Value::Object(render_level(
                schema,
                child,
                request,
                selection,
                &child_path(path, name),
            )?),
            None => Value::Null,
        },
        FieldKind::NestedMany(schema) => {
            let children = entity.nested_many(name).unwrap_or_default();
            let mut rendered = Vec::with_capacity(children.len());
            for (i, child) in children.into_iter().enumerate() {
                let item_path = format!("{}[{}]", child_path(path, name), i);
                rendered.push(Value::Object(render_level(
                    schema, child, request, selection, &item_path,
                )?));
            }
            Value::Array(rendered)
        }
    };
    Ok(value)
}

fn child_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::WithCapabilities;
    use crate::error::EntityAccessError;
    use crate::permissions::{Capabilities, Grants};
    use crate::types::{Capability, Method, Principal};
    use serde_json::json;
    use std::sync::Arc;

    fn child_schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder("child")
                .field("field1")
                .field("field2")
                .field("field3")
                .build()
                .unwrap(),
        )
    }

    fn render_value(
        schema: &Schema,
        entity: &dyn Entity,
        request: &Request,
        selection: Option<&str>,
    ) -> Value {
        let selection = selection.map(|s| Selection::parse(s).unwrap());
        Value::Object(render(schema, entity, request, selection.as_ref()).unwrap())
    }

    #[test]
    fn output_follows_declaration_order() {
        let schema = Schema::builder("ordered")
            .field("z")
            .field("a")
            .field("m")
            .build()
            .unwrap();
        let entity = json!({"a": 1, "m": 2, "z": 3});
        let out = render(&schema, &entity, &Request::get(), None).unwrap();
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn missing_attributes_render_null_or_empty() {
        let schema = Schema::builder("sparse")
            .field("a")
            .nested("one", child_schema())
            .nested_many("many", child_schema())
            .build()
            .unwrap();
        let out = render_value(&schema, &json!({}), &Request::get(), None);
        assert_eq!(out, json!({"a": null, "one": null, "many": []}));
    }

    #[test]
    fn leaf_selection_on_nested_renders_all_readable() {
        let schema = Schema::builder("parent")
            .field("field1")
            .nested("field2", child_schema())
            .build()
            .unwrap();
        let entity = json!({"field1": 1, "field2": {"field1": 1, "field2": 2, "field3": 3}});
        let out = render_value(&schema, &entity, &Request::get(), Some("field2"));
        assert_eq!(out, json!({"field2": {"field1": 1, "field2": 2, "field3": 3}}));
    }

    #[test]
    fn empty_nested_selection_renders_empty_object() {
        let schema = Schema::builder("parent")
            .nested("field2", child_schema())
            .build()
            .unwrap();
        let entity = json!({"field2": {"field1": 1}});
        let out = render_value(&schema, &entity, &Request::get(), Some("field2{}"));
        assert_eq!(out, json!({"field2": {}}));
    }

    #[test]
    fn selection_restricts_primitive_subtree_harmlessly() {
        let schema = Schema::builder("flat").field("a").build().unwrap();
        let out = render_value(&schema, &json!({"a": {"x": 1}}), &Request::get(), Some("a{y}"));
        assert_eq!(out, json!({"a": {"x": 1}}));
    }

    #[test]
    fn nested_permissions_error_carries_path() {
        struct Broken;
        impl Capabilities for Broken {
            fn can_retrieve(&self, _: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
                Err(EntityAccessError::predicate(Capability::Retrieve, "boom"))
            }
            fn can_update(&self, _: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
                Ok(false)
            }
            fn can_destroy(&self, _: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
                Ok(false)
            }
        }
        struct Parent {
            child: WithCapabilities<Value, Broken>,
        }
        impl Entity for Parent {
            fn value(&self, _: &str) -> Option<Value> {
                None
            }
            fn nested(&self, name: &str) -> Option<&dyn Entity> {
                (name == "owner").then_some(&self.child as &dyn Entity)
            }
            fn nested_many(&self, _: &str) -> Option<Vec<&dyn Entity>> {
                None
            }
        }

        let owner = Arc::new(
            Schema::builder("owner")
                .field("id")
                .readable(["id", "permissions"])
                .build()
                .unwrap(),
        );
        let schema = Schema::builder("parent").nested("owner", owner).build().unwrap();
        let entity = Parent {
            child: WithCapabilities::new(json!({"id": 7}), Broken),
        };

        let err = render(&schema, &entity, &Request::get(), None).unwrap_err();
        assert!(matches!(err, RenderError::Entity { ref path, .. } if path == "owner.permissions"));

        // Not requesting permissions never touches the predicates.
        let sel = Selection::parse("owner{id}").unwrap();
        let out = render(&schema, &entity, &Request::get(), Some(&sel)).unwrap();
        assert_eq!(Value::Object(out), json!({"owner": {"id": 7}}));
    }

    #[test]
    fn render_request_parses_fields() {
        let schema = Schema::builder("s").field("a").field("b").build().unwrap();
        let entity = json!({"a": 1, "b": 2});
        let out = render_request(&schema, &entity, &Request::get().fields("b")).unwrap();
        assert_eq!(Value::Object(out), json!({"b": 2}));

        let err = render_request(&schema, &entity, &Request::get().fields("a{")).unwrap_err();
        assert!(matches!(err, RenderError::Selection(_)));
    }

    #[test]
    fn render_many_preserves_order() {
        let schema = Schema::builder("s").field("id").field("x").build().unwrap();
        let entities = [json!({"id": 2, "x": 0}), json!({"id": 1, "x": 0})];
        let sel = Selection::parse("id").unwrap();
        let out = render_many(
            &schema,
            entities.iter().map(|e| e as &dyn Entity),
            &Request::get(),
            Some(&sel),
        )
        .unwrap();
        assert_eq!(out, vec![json!({"id": 2}), json!({"id": 1})]);
    }

    #[test]
    fn render_written_echoes_patched_fields() {
        let schema = Schema::builder("a_sane")
            .field("field1")
            .field("field2")
            .field("field3")
            .field("field4")
            .field("field5")
            .readable(["field1", "field2", "field3"])
            .writable(["field2", "field3", "field4"])
            .build()
            .unwrap();
        let entity = json!({"field1": 1, "field2": 2, "field3": 3, "field4": 4, "field5": 5});
        let req = Request::new(Method::Patch).payload(json!({"field3": 3, "field4": 4}));
        let out = render_written(&schema, &entity, &req).unwrap();
        assert_eq!(Value::Object(out), json!({"field3": 3, "field4": 4}));
    }

    #[test]
    fn permissions_rendered_as_names() {
        let schema = Schema::builder("b_sane")
            .field("field1")
            .readable(["field1", "permissions"])
            .build()
            .unwrap();
        let entity = WithCapabilities::new(json!({"field1": 1}), Grants::all());
        let out = render_value(&schema, &entity, &Request::get(), None);
        assert_eq!(
            out,
            json!({"field1": 1, "permissions": ["destroy", "retrieve", "update"]})
        );
    }
}
