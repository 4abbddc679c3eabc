//! Compiled JSON-Schema validators cached per resource, method and schema generation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use crate::api_schema::ApiSchemaDocument;
use crate::error::ApiSchemaError;
use crate::resource_schema::ResourceSchema;
use crate::types::RequestMethod;

/// A compiled validator for one resource and request method.
pub struct CompiledSchema {
    resource_name: String,
    method: RequestMethod,
    validator: jsonschema::Validator,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("resource_name", &self.resource_name)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// Compile `schema`, validating string formats.
    ///
    /// # Errors
    ///
    /// Returns `ApiSchemaError::CompileFailed` if the JSON schema is malformed.
    pub fn compile(
        resource_name: &str,
        method: RequestMethod,
        schema: &Value,
    ) -> Result<Self, ApiSchemaError> {
        let validator = jsonschema::options()
            .should_validate_formats(true)
            .build(schema)
            .map_err(|e| ApiSchemaError::CompileFailed {
                resource: resource_name.to_string(),
                method: method.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            resource_name: resource_name.to_string(),
            method,
            validator,
        })
    }

    pub fn validator(&self) -> &jsonschema::Validator {
        &self.validator
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }
}

/// Cache key. Embedding the reload id means a lookup can never hit a
/// validator compiled from another schema generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub project_name: String,
    pub resource_name: String,
    pub method: RequestMethod,
    pub reload_id: u64,
}

#[derive(Default)]
struct CacheState {
    reload_id: u64,
    entries: HashMap<CacheKey, Arc<CompiledSchema>>,
}

/// Shared across all requests.
///
/// Seeing a newer reload id clears every entry in one step. Compilation runs
/// outside the lock, so no reader waits on a compile.
#[derive(Default)]
pub struct CompiledSchemaCache {
    state: RwLock<CacheState>,
}

impl fmt::Debug for CompiledSchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CompiledSchemaCache")
            .field("reload_id", &state.reload_id)
            .field("entries", &state.entries.len())
            .finish()
    }
}

impl CompiledSchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload id of the entries currently held.
    pub fn current_reload_id(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .reload_id
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the entry for `key`, compiling it with `factory` on a miss.
    ///
    /// A key from a newer generation clears the whole cache first. A key
    /// from an older generation is compiled and returned but not stored.
    /// Reload ids only increase, so any id other than the current one is
    /// either newer (clear) or superseded (bypass); entries from two
    /// generations never coexist.
    pub fn get_or_add<E>(
        &self,
        key: CacheKey,
        factory: impl FnOnce() -> Result<CompiledSchema, E>,
    ) -> Result<Arc<CompiledSchema>, E> {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.reload_id == key.reload_id {
                if let Some(hit) = state.entries.get(&key) {
                    return Ok(Arc::clone(hit));
                }
            }
        }

        let compiled = Arc::new(factory()?);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if key.reload_id > state.reload_id {
            debug!(
                previous = state.reload_id,
                current = key.reload_id,
                evicted = state.entries.len(),
                "schema generation changed, clearing compiled schema cache"
            );
            state.entries.clear();
            state.reload_id = key.reload_id;
        } else if key.reload_id < state.reload_id {
            debug!(
                reload_id = key.reload_id,
                current = state.reload_id,
                "compiled schema for a superseded generation, not caching"
            );
            return Ok(compiled);
        }

        Ok(Arc::clone(state.entries.entry(key).or_insert(compiled)))
    }

    /// Validator for a resource's request body under the given generation.
    pub fn schema_for(
        &self,
        project_name: &str,
        resource: &ResourceSchema,
        method: RequestMethod,
        reload_id: u64,
    ) -> Result<Arc<CompiledSchema>, ApiSchemaError> {
        let key = CacheKey {
            project_name: project_name.to_string(),
            resource_name: resource.resource_name.clone(),
            method,
            reload_id,
        };
        self.get_or_add(key, || {
            debug!(resource = %resource.resource_name, %method, "compiling JSON schema");
            CompiledSchema::compile(&resource.resource_name, method, resource.json_schema_for(method))
        })
    }

    /// Compile POST and PUT validators for every resource of a generation.
    ///
    /// A resource whose schema fails to compile is logged and skipped.
    /// Returns the number of validators compiled.
    pub fn prime(&self, document: &ApiSchemaDocument, reload_id: u64) -> usize {
        let mut primed = 0;
        for project in document.all_project_schemas() {
            for (endpoint, resource) in project.resource_schemas() {
                for method in [RequestMethod::Post, RequestMethod::Put] {
                    match self.schema_for(&project.project_name, resource, method, reload_id) {
                        Ok(_) => primed += 1,
                        Err(e) => {
                            warn!(
                                project = %project.project_endpoint_name,
                                resource = endpoint,
                                error = %e,
                                "skipping resource while priming schema cache"
                            );
                            break;
                        }
                    }
                }
            }
        }
        debug!(reload_id, primed, "primed compiled schema cache");
        primed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(resource: &str, method: RequestMethod, reload_id: u64) -> CacheKey {
        CacheKey {
            project_name: "Ed-Fi".into(),
            resource_name: resource.into(),
            method,
            reload_id,
        }
    }

    fn compile_object() -> Result<CompiledSchema, ApiSchemaError> {
        CompiledSchema::compile("School", RequestMethod::Post, &json!({ "type": "object" }))
    }

    #[test]
    fn caches_by_key() {
        let cache = CompiledSchemaCache::new();
        let compiles = AtomicUsize::new(0);
        let factory = || {
            compiles.fetch_add(1, Ordering::SeqCst);
            compile_object()
        };

        let first = cache.get_or_add(key("School", RequestMethod::Post, 1), factory).unwrap();
        let second = cache.get_or_add(key("School", RequestMethod::Post, 1), factory).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compiles.load(Ordering::SeqCst), 1);

        cache.get_or_add(key("School", RequestMethod::Put, 1), factory).unwrap();
        assert_eq!(compiles.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn newer_reload_id_clears_everything() {
        let cache = CompiledSchemaCache::new();
        let old = cache.get_or_add(key("School", RequestMethod::Post, 1), compile_object).unwrap();
        cache.get_or_add(key("Student", RequestMethod::Post, 1), compile_object).unwrap();
        assert_eq!(cache.len(), 2);

        let new = cache.get_or_add(key("School", RequestMethod::Post, 2), compile_object).unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_reload_id(), 2);
    }

    #[test]
    fn stale_reload_id_is_not_cached() {
        let cache = CompiledSchemaCache::new();
        cache.get_or_add(key("School", RequestMethod::Post, 2), compile_object).unwrap();
        cache.get_or_add(key("School", RequestMethod::Post, 1), compile_object).unwrap();

        assert_eq!(cache.current_reload_id(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn factory_error_propagates_and_caches_nothing() {
        let cache = CompiledSchemaCache::new();
        let result = cache.get_or_add(key("School", RequestMethod::Post, 1), || {
            CompiledSchema::compile("School", RequestMethod::Post, &json!({ "type": 12 }))
        });
        assert!(matches!(result, Err(ApiSchemaError::CompileFailed { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn compiled_schema_validates() {
        let compiled = CompiledSchema::compile(
            "School",
            RequestMethod::Post,
            &json!({ "type": "object", "required": ["schoolId"] }),
        )
        .unwrap();
        assert!(compiled.validator().is_valid(&json!({ "schoolId": 1 })));
        assert!(!compiled.validator().is_valid(&json!({})));
    }
}
