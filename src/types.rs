//! Core types shared by the resolver, render and accept engines.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved virtual field synthesized from capability predicates.
pub const PERMISSIONS_FIELD: &str = "permissions";

/// Query parameter carrying the selection string, by convention.
pub const FIELDS_PARAM: &str = "fields";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// HTTP-like request method.
///
/// Only the distinction between safe (read) and write methods matters to the
/// engines; the full set is kept so hosts can pass their method through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Parse a method name, case-insensitively.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "HEAD" => Some(Method::Head),
            "OPTIONS" => Some(Method::Options),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "PATCH" => Some(Method::Patch),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// True for methods that carry a payload to accept (`POST`, `PUT`, `PATCH`).
    pub fn is_write(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::parse(s).ok_or_else(|| format!("unknown method \"{}\"", s))
    }
}

/// The acting principal of a request.
///
/// Immutable for the lifetime of the request; predicates only read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Identifier of an authenticated principal, `None` when anonymous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Free-form claims supplied by the host's authentication layer.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub claims: Map<String, Value>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            claims: Map::new(),
        }
    }

    /// Add a claim.
    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.claims.insert(key.into(), value);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }
}

/// Per-request context handed to the engines by the host framework.
///
/// The engines only ever borrow it.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    fields: Option<String>,
    payload: Option<Value>,
    principal: Principal,
}

impl Request {
    /// Create a request with no selection, no payload and an anonymous principal.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            fields: None,
            payload: None,
            principal: Principal::anonymous(),
        }
    }

    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    /// Set the raw selection string (the `fields` query parameter).
    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Set the request body.
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn selection_str(&self) -> Option<&str> {
        self.fields.as_deref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn acting_principal(&self) -> &Principal {
        &self.principal
    }
}

/// An operation the permission field can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Destroy,
    Retrieve,
    Update,
}

impl Capability {
    /// Every capability, in the order the permission field lists them.
    pub const ALL: [Capability; 3] = [Capability::Destroy, Capability::Retrieve, Capability::Update];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Destroy => "destroy",
            Capability::Retrieve => "retrieve",
            Capability::Update => "update",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "destroy" => Some(Capability::Destroy),
            "retrieve" => Some(Capability::Retrieve),
            "update" => Some(Capability::Update),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::parse(&s.to_lowercase())
            .ok_or_else(|| format!("unknown capability \"{}\": expected destroy, retrieve, or update", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!(Method::parse("get"), Some(Method::Get));
        assert_eq!(Method::parse("Patch"), Some(Method::Patch));
        assert_eq!(Method::parse("DELETE"), Some(Method::Delete));
        assert_eq!(Method::parse("fetch"), None);
        assert_eq!(Method::parse(""), None);
    }

    #[test]
    fn write_methods() {
        assert!(Method::Post.is_write());
        assert!(Method::Put.is_write());
        assert!(Method::Patch.is_write());
        assert!(!Method::Get.is_write());
        assert!(!Method::Delete.is_write());
    }

    #[test]
    fn capability_order_is_alphabetical() {
        let names: Vec<_> = Capability::ALL.iter().map(Capability::as_str).collect();
        assert_eq!(names, ["destroy", "retrieve", "update"]);
    }

    #[test]
    fn capability_from_str() {
        assert_eq!("Retrieve".parse::<Capability>(), Ok(Capability::Retrieve));
        assert!("delete".parse::<Capability>().is_err());
    }

    #[test]
    fn request_builder() {
        let req = Request::new(Method::Patch)
            .fields("a,b")
            .payload(json!({"a": 1}))
            .principal(Principal::new("alice"));
        assert_eq!(req.method(), Method::Patch);
        assert_eq!(req.selection_str(), Some("a,b"));
        assert_eq!(req.body(), Some(&json!({"a": 1})));
        assert!(req.acting_principal().is_authenticated());
        assert!(!Request::get().acting_principal().is_authenticated());
    }
}
