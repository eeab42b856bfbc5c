//! Entities the engines read from.
//!
//! The engines never own entities; they look attributes up by field name and,
//! for the `permissions` field, ask for the entity's [`Capabilities`].

use serde_json::{Map, Value};

use crate::permissions::Capabilities;

/// Attribute access for rendering.
///
/// Each accessor returns `None` when the attribute is missing; the render
/// engine turns that into `null` (or `[]` for collections).
pub trait Entity {
    /// Value of a primitive attribute.
    fn value(&self, name: &str) -> Option<Value>;

    /// A single related entity.
    fn nested(&self, name: &str) -> Option<&dyn Entity>;

    /// An ordered collection of related entities.
    fn nested_many(&self, name: &str) -> Option<Vec<&dyn Entity>>;

    /// Capability predicates, if this entity has any.
    ///
    /// Only consulted when `permissions` is rendered.
    fn capabilities(&self) -> Option<&dyn Capabilities> {
        None
    }
}

impl Entity for Map<String, Value> {
    fn value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn nested(&self, name: &str) -> Option<&dyn Entity> {
        match self.get(name) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v as &dyn Entity),
        }
    }

    fn nested_many(&self, name: &str) -> Option<Vec<&dyn Entity>> {
        let items = self.get(name)?.as_array()?;
        Some(items.iter().map(|v| v as &dyn Entity).collect())
    }
}

/// JSON documents are entities: object members are attributes.
///
/// Non-object values have no attributes.
impl Entity for Value {
    fn value(&self, name: &str) -> Option<Value> {
        self.as_object()?.value(name)
    }

    fn nested(&self, name: &str) -> Option<&dyn Entity> {
        self.as_object()?.nested(name)
    }

    fn nested_many(&self, name: &str) -> Option<Vec<&dyn Entity>> {
        self.as_object()?.nested_many(name)
    }
}

/// Attaches capability predicates to an entity that has none of its own.
#[derive(Debug, Clone)]
pub struct WithCapabilities<E, C> {
    pub entity: E,
    pub capabilities: C,
}

impl<E, C> WithCapabilities<E, C> {
    pub fn new(entity: E, capabilities: C) -> Self {
        Self {
            entity,
            capabilities,
        }
    }
}

impl<E: Entity, C: Capabilities> Entity for WithCapabilities<E, C> {
    fn value(&self, name: &str) -> Option<Value> {
        self.entity.value(name)
    }

    fn nested(&self, name: &str) -> Option<&dyn Entity> {
        self.entity.nested(name)
    }

    fn nested_many(&self, name: &str) -> Option<Vec<&dyn Entity>> {
        self.entity.nested_many(name)
    }

    fn capabilities(&self) -> Option<&dyn Capabilities> {
        Some(&self.capabilities)
    }
}
