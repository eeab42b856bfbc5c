//! Error types for selection parsing, schema construction, rendering and accepting.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Capability;

/// Errors while parsing a selection string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("unbalanced brace at position {position}")]
    Unbalanced { position: usize },

    #[error("selection nested deeper than {max} levels")]
    TooDeep { max: usize },
}

/// Errors while building a schema descriptor.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("field \"{name}\" declared more than once in {schema}")]
    DuplicateField { schema: String, name: String },

    #[error("{policy} policy of {schema} names undeclared field \"{name}\"")]
    UnknownPolicyField {
        schema: String,
        policy: &'static str,
        name: String,
    },

    #[error("\"permissions\" is reserved and cannot be declared as a field in {schema}")]
    ReservedFieldName { schema: String },

    #[error("invalid value schema for {path}: {message}")]
    InvalidValueSchema { path: String, message: String },
}

/// Errors raised by an entity while its permissions are synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityAccessError {
    #[error("{capability} predicate failed: {message}")]
    Predicate {
        capability: Capability,
        message: String,
    },

    #[error("entity exposes no capability predicates")]
    NoCapabilities,
}

impl EntityAccessError {
    /// Convenience constructor for predicate implementations.
    pub fn predicate(capability: Capability, message: impl Into<String>) -> Self {
        Self::Predicate {
            capability,
            message: message.into(),
        }
    }
}

/// Errors during rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("cannot render {path}: {source}")]
    Entity {
        path: String,
        #[source]
        source: EntityAccessError,
    },
}

impl RenderError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RenderError::Selection(_) => 2,
            RenderError::Entity { .. } => 1,
        }
    }
}

/// Errors while accepting a write payload.
#[derive(Debug, Error)]
pub enum AcceptError {
    #[error("payload must be an object, got {actual}")]
    NotAnObject { actual: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<FieldError> },
}

impl AcceptError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            AcceptError::NotAnObject { .. } => 2,
            AcceptError::Invalid { .. } => 1,
        }
    }
}

/// Single field validation error with path context.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FieldError {
    /// JSON Pointer (RFC 6901) to the invalid value.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors while loading descriptor, entity or payload documents.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid schema descriptor: {source}")]
    InvalidDescriptor {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}
