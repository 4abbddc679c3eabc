//! Hot-reloadable holder of the active ApiSchema generation.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{info, warn};

use crate::api_schema::ApiSchemaDocument;
use crate::error::ApiSchemaError;
use crate::loader::load_json_auto;

/// One hot-loaded version of the ApiSchema. Immutable once published.
#[derive(Debug)]
pub struct SchemaGeneration {
    /// Monotonically increasing, starting at 1.
    pub reload_id: u64,
    pub document: ApiSchemaDocument,
}

/// Publishes the current schema generation and swaps it on reload.
///
/// Readers take an `Arc` snapshot and keep using it for the whole request,
/// so a reload never changes the schema under an in-flight request.
#[derive(Debug)]
pub struct ApiSchemaProvider {
    current: RwLock<Arc<SchemaGeneration>>,
}

impl ApiSchemaProvider {
    pub fn new(document: ApiSchemaDocument) -> Self {
        Self {
            current: RwLock::new(Arc::new(SchemaGeneration {
                reload_id: 1,
                document,
            })),
        }
    }

    /// Build a provider from a raw ApiSchema, validating it first.
    pub fn from_value(root: &Value) -> Result<Self, ApiSchemaError> {
        Ok(Self::new(ApiSchemaDocument::from_value(root)?))
    }

    /// Snapshot of the active generation.
    pub fn current(&self) -> Arc<SchemaGeneration> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reload_id(&self) -> u64 {
        self.current().reload_id
    }

    /// Validate `root` and, if valid, publish it as the next generation.
    ///
    /// # Errors
    ///
    /// An invalid replacement is rejected before the swap; the previous
    /// generation stays active.
    pub fn reload(&self, root: &Value) -> Result<Arc<SchemaGeneration>, ApiSchemaError> {
        let document = ApiSchemaDocument::from_value(root).inspect_err(|e| {
            warn!(error = %e, "rejected ApiSchema reload, keeping current generation");
        })?;

        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(SchemaGeneration {
            reload_id: current.reload_id + 1,
            document,
        });
        *current = Arc::clone(&next);

        info!(reload_id = next.reload_id, "ApiSchema reloaded");
        Ok(next)
    }

    /// Reload from a file path or URL.
    pub fn reload_from_source(&self, source: &str) -> Result<Arc<SchemaGeneration>, ApiSchemaError> {
        let root = load_json_auto(source)?;
        self.reload(&root)
    }
}
