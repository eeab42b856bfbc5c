//! Loading schema descriptors and JSON documents from files, strings and URLs.
//!
//! A descriptor document declares fields in order. A field with `nested` is a
//! nested schema (a collection when `many` is true); otherwise it is
//! primitive, optionally checked against the JSON Schema in `value`:
//!
//! ```json
//! {
//!   "name": "parent",
//!   "fields": [
//!     { "name": "id", "value": { "type": "integer" } },
//!     { "name": "children", "many": true, "nested": {
//!         "fields": [{ "name": "id" }, { "name": "label" }]
//!     } }
//!   ],
//!   "readable": ["id", "children", "permissions"],
//!   "writable": ["children"]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::LoadError;
use crate::schema::Schema;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Serialized form of a [`Schema`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default)]
    pub name: Option<String>,
    pub fields: Vec<FieldDocument>,
    /// Readable override; all declared fields when absent.
    #[serde(default)]
    pub readable: Option<Vec<String>>,
    /// Writable override; all declared fields when absent.
    #[serde(default)]
    pub writable: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDocument {
    pub name: String,
    /// JSON Schema for primitive values.
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub nested: Option<SchemaDocument>,
    #[serde(default)]
    pub many: bool,
}

impl SchemaDocument {
    /// Build the schema; unnamed nested documents take their field's name.
    pub fn build(self, default_name: &str) -> Result<Schema, LoadError> {
        let name = self.name.unwrap_or_else(|| default_name.to_string());
        let mut builder = Schema::builder(name);

        for field in self.fields {
            builder = match (field.nested, field.many) {
                (Some(nested), many) => {
                    let sub = Arc::new(nested.build(&field.name)?);
                    if many {
                        builder.nested_many(field.name, sub)
                    } else {
                        builder.nested(field.name, sub)
                    }
                }
                (None, _) => match field.value {
                    Some(value_schema) => builder.typed_field(field.name, value_schema),
                    None => builder.field(field.name),
                },
            };
        }

        if let Some(readable) = self.readable {
            builder = builder.readable(readable);
        }
        if let Some(writable) = self.writable {
            builder = builder.writable(writable);
        }

        Ok(builder.build()?)
    }
}

/// Load a JSON document (entity or payload) from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

/// Build a schema from an already-parsed descriptor document.
pub fn schema_from_value(document: Value) -> Result<Schema, LoadError> {
    let document: SchemaDocument =
        serde_json::from_value(document).map_err(|source| LoadError::InvalidDescriptor { source })?;
    document.build("root")
}

/// Load a schema descriptor from a JSON string.
pub fn load_schema_str(content: &str) -> Result<Schema, LoadError> {
    let document = serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    schema_from_value(document)
}

/// Load a schema descriptor from a file path.
pub fn load_schema(path: &Path) -> Result<Schema, LoadError> {
    schema_from_value(load_json(path)?)
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the response
/// isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    tracing::debug!(url, "fetching document");
    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(network)?
        .json()
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a schema descriptor from a file path or URL.
pub fn load_schema_auto(source: &str) -> Result<Schema, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            schema_from_value(load_json_url(source)?)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_schema(Path::new(source))
    }
}
