//! Error types for ApiSchema loading, identity extraction and dependency ordering.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading an ApiSchema or a payload from disk or the network.
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
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

/// A structurally invalid ApiSchema.
///
/// Raised at load and reload time, never per request.
#[derive(Debug, Error)]
pub enum ApiSchemaError {
    #[error("invalid ApiSchema at {path}: {message}")]
    SchemaInvalid { path: String, message: String },

    #[error("cannot compile JSON schema for {resource} ({method}): {message}")]
    CompileFailed {
        resource: String,
        method: String,
        message: String,
    },

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl ApiSchemaError {
    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        ApiSchemaError::SchemaInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ApiSchemaError::Load(e) => e.exit_code(),
            _ => 2,
        }
    }
}

/// Errors while deriving identities and references from a document.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("identity value missing at {path}")]
    MissingIdentityValue { path: String },

    #[error("identity value at {path} must be a string, number or boolean, got {actual}")]
    UnsupportedIdentityValue { path: String, actual: String },

    #[error("reference to {resource} has mismatched element counts across its identity paths")]
    ReferenceArityMismatch { resource: String },

    #[error("descriptor value at {path} must be a string")]
    InvalidDescriptorValue { path: String },
}

impl ExtractionError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Errors while computing the resource load order.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("project '{project}' declares no resource schemas")]
    NoResourceSchemas { project: String },

    #[error("no project schemas found in ApiSchema")]
    NoProjectSchemas,
}

impl DependencyError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::Read { .. } => 3,
            ConfigError::Parse { .. } => 2,
        }
    }
}

/// Single document validation error with path context.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SchemaError {
    /// JSON path (`$.a.b`) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
