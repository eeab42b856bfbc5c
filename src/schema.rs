//! Schema descriptors.
//!
//! A [`Schema`] declares the fields of one serializer type, each with a
//! [`FieldKind`], plus the readable and writable [`FieldPolicy`]. Schemas
//! are built once and shared read-only across requests.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::SchemaError;
use crate::types::{Request, PERMISSIONS_FIELD};

/// Request-aware policy override: returns the permitted field names.
pub type PolicyFn = Arc<dyn Fn(&Request) -> Vec<String> + Send + Sync>;

/// Which field names a schema permits for reading or writing.
#[derive(Clone, Default)]
pub enum FieldPolicy {
    /// Every declared field.
    #[default]
    All,
    /// A fixed list, checked against the declared fields at build time.
    Only(Vec<String>),
    /// Computed per request. Undeclared names are dropped at resolution.
    With(PolicyFn),
}

impl fmt::Debug for FieldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPolicy::All => f.write_str("All"),
            FieldPolicy::Only(names) => f.debug_tuple("Only").field(names).finish(),
            FieldPolicy::With(_) => f.write_str("With(..)"),
        }
    }
}

/// Value-level conversion for a primitive field.
///
/// Output passes values through; input is checked against an optional JSON
/// Schema fragment compiled when the owning schema is built.
#[derive(Clone, Default)]
pub struct ValueDescriptor {
    schema: Option<Value>,
    validator: Option<Arc<jsonschema::Validator>>,
}

impl ValueDescriptor {
    /// Accepts any value.
    pub fn any() -> Self {
        Self::default()
    }

    fn compile(schema: Value, path: &str) -> Result<Self, SchemaError> {
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| SchemaError::InvalidValueSchema {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            schema: Some(schema),
            validator: Some(Arc::new(validator)),
        })
    }

    /// The JSON Schema fragment values are checked against, if any.
    pub fn value_schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    pub fn to_output(&self, value: &Value) -> Value {
        value.clone()
    }

    /// Validate an incoming value.
    ///
    /// Errors are `(instance path, message)` pairs relative to the value.
    pub fn from_input(&self, raw: &Value) -> Result<Value, Vec<(String, String)>> {
        let Some(validator) = &self.validator else {
            return Ok(raw.clone());
        };

        let errors: Vec<(String, String)> = validator
            .iter_errors(raw)
            .map(|e| (e.instance_path.to_string(), e.to_string()))
            .collect();

        if errors.is_empty() {
            Ok(raw.clone())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Debug for ValueDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueDescriptor")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Kind of a declared field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Primitive(ValueDescriptor),
    /// A single sub-entity rendered with its own schema.
    Nested(Arc<Schema>),
    /// An ordered collection of sub-entities.
    NestedMany(Arc<Schema>),
}

#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: FieldKind,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// The sub-schema of a nested field.
    pub fn nested_schema(&self) -> Option<&Arc<Schema>> {
        match &self.kind {
            FieldKind::Nested(schema) | FieldKind::NestedMany(schema) => Some(schema),
            FieldKind::Primitive(_) => None,
        }
    }
}

/// Field declarations and read/write policies of one serializer type.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    readable: FieldPolicy,
    writable: FieldPolicy,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            readable: FieldPolicy::All,
            writable: FieldPolicy::All,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Names permitted for reading on this request.
    pub fn readable_field_names(&self, request: &Request) -> Vec<String> {
        self.policy_names(&self.readable, request)
    }

    /// Names permitted for writing on this request.
    pub fn writable_field_names(&self, request: &Request) -> Vec<String> {
        self.policy_names(&self.writable, request)
    }

    fn policy_names(&self, policy: &FieldPolicy, request: &Request) -> Vec<String> {
        match policy {
            FieldPolicy::All => self.fields.iter().map(|f| f.name.clone()).collect(),
            FieldPolicy::Only(names) => names.clone(),
            FieldPolicy::With(f) => f(request),
        }
    }
}

/// Builder for [`Schema`]; validation happens in [`SchemaBuilder::build`].
pub struct SchemaBuilder {
    name: String,
    fields: Vec<(String, PendingKind)>,
    readable: FieldPolicy,
    writable: FieldPolicy,
}

enum PendingKind {
    Primitive(Option<Value>),
    Nested(Arc<Schema>),
    NestedMany(Arc<Schema>),
}

impl SchemaBuilder {
    /// Declare a primitive field accepting any value.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push((name.into(), PendingKind::Primitive(None)));
        self
    }

    /// Declare a primitive field whose input is checked against a JSON Schema.
    pub fn typed_field(mut self, name: impl Into<String>, value_schema: Value) -> Self {
        self.fields
            .push((name.into(), PendingKind::Primitive(Some(value_schema))));
        self
    }

    pub fn nested(mut self, name: impl Into<String>, schema: Arc<Schema>) -> Self {
        self.fields.push((name.into(), PendingKind::Nested(schema)));
        self
    }

    pub fn nested_many(mut self, name: impl Into<String>, schema: Arc<Schema>) -> Self {
        self.fields.push((name.into(), PendingKind::NestedMany(schema)));
        self
    }

    /// Restrict readable fields to a fixed list. May include `permissions`.
    pub fn readable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.readable = FieldPolicy::Only(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict writable fields to a fixed list.
    ///
    /// `permissions` is allowed here but never accepted, since it is not a
    /// declared field.
    pub fn writable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writable = FieldPolicy::Only(names.into_iter().map(Into::into).collect());
        self
    }

    /// Compute readable fields per request.
    pub fn readable_with<F>(mut self, policy: F) -> Self
    where
        F: Fn(&Request) -> Vec<String> + Send + Sync + 'static,
    {
        self.readable = FieldPolicy::With(Arc::new(policy));
        self
    }

    /// Compute writable fields per request.
    pub fn writable_with<F>(mut self, policy: F) -> Self
    where
        F: Fn(&Request) -> Vec<String> + Send + Sync + 'static,
    {
        self.writable = FieldPolicy::With(Arc::new(policy));
        self
    }

    /// Validate declarations and compile value schemas.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for duplicate or reserved field names, policy
    /// lists naming undeclared fields, or a value schema that does not compile.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());

        for (name, pending) in self.fields {
            if name == PERMISSIONS_FIELD {
                return Err(SchemaError::ReservedFieldName { schema: self.name });
            }
            if !seen.insert(name.clone()) {
                return Err(SchemaError::DuplicateField {
                    schema: self.name,
                    name,
                });
            }
            let kind = match pending {
                PendingKind::Primitive(None) => FieldKind::Primitive(ValueDescriptor::any()),
                PendingKind::Primitive(Some(value_schema)) => {
                    let path = format!("{}.{}", self.name, name);
                    FieldKind::Primitive(ValueDescriptor::compile(value_schema, &path)?)
                }
                PendingKind::Nested(schema) => FieldKind::Nested(schema),
                PendingKind::NestedMany(schema) => FieldKind::NestedMany(schema),
            };
            fields.push(Field { name, kind });
        }

        check_policy(&self.name, "readable", &self.readable, &seen)?;
        check_policy(&self.name, "writable", &self.writable, &seen)?;

        Ok(Schema {
            name: self.name,
            fields,
            readable: self.readable,
            writable: self.writable,
        })
    }
}

fn check_policy(
    schema: &str,
    policy_name: &'static str,
    policy: &FieldPolicy,
    declared: &HashSet<String>,
) -> Result<(), SchemaError> {
    let FieldPolicy::Only(names) = policy else {
        return Ok(());
    };

    for name in names {
        if !declared.contains(name) && name != PERMISSIONS_FIELD {
            return Err(SchemaError::UnknownPolicyField {
                schema: schema.to_string(),
                policy: policy_name,
                name: name.clone(),
            });
        }
    }
    Ok(())
}
