//! Read-only access to a parsed ApiSchema document.
//!
//! The whole document is validated when it is built, so a live
//! `ApiSchemaDocument` never yields a schema error later on.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiSchemaError;
use crate::json_path::escape_pointer_token;
use crate::loader::{load_json_auto, load_json_str};
use crate::resource_schema::ResourceSchema;

/// One project (core data model or extension) of an ApiSchema.
#[derive(Debug, Clone)]
pub struct ProjectSchema {
    /// Key under `projectSchemas` and first path segment of requests, e.g. `ed-fi`.
    pub project_endpoint_name: String,
    /// Project name used in identities, e.g. `Ed-Fi`.
    pub project_name: String,
    pub project_version: String,
    pub is_extension_project: bool,
    pub description: String,
    /// Keyed by resource endpoint name, e.g. `schools`.
    resource_schemas: BTreeMap<String, Arc<ResourceSchema>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSchemaNode {
    project_name_mapping: BTreeMap<String, String>,
    project_schemas: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectSchemaNode {
    project_name: String,
    #[serde(default)]
    project_version: String,
    #[serde(default)]
    is_extension_project: bool,
    #[serde(default)]
    description: String,
    resource_schemas: BTreeMap<String, Value>,
}

impl ProjectSchema {
    fn from_node(endpoint_name: &str, node: &Value) -> Result<Self, ApiSchemaError> {
        let path = format!("/projectSchemas/{}", escape_pointer_token(endpoint_name));
        let raw: ProjectSchemaNode = serde_json::from_value(node.clone())
            .map_err(|e| ApiSchemaError::invalid(&path, e.to_string()))?;

        let mut resource_schemas = BTreeMap::new();
        for (resource_endpoint, resource_node) in &raw.resource_schemas {
            let resource_path = format!(
                "{}/resourceSchemas/{}",
                path,
                escape_pointer_token(resource_endpoint)
            );
            let schema = ResourceSchema::from_node(&resource_path, resource_node)?;
            resource_schemas.insert(resource_endpoint.clone(), Arc::new(schema));
        }

        Ok(ProjectSchema {
            project_endpoint_name: endpoint_name.to_string(),
            project_name: raw.project_name,
            project_version: raw.project_version,
            is_extension_project: raw.is_extension_project,
            description: raw.description,
            resource_schemas,
        })
    }

    /// Resource schema for a request path segment such as `schools`.
    pub fn find_resource_schema(&self, endpoint_name: &str) -> Option<&Arc<ResourceSchema>> {
        self.resource_schemas.get(endpoint_name)
    }

    /// Resource schema by resource name such as `School`.
    pub fn find_resource_schema_by_name(&self, resource_name: &str) -> Option<&Arc<ResourceSchema>> {
        self.resource_schemas
            .values()
            .find(|r| r.resource_name == resource_name)
    }

    /// (endpoint name, schema) pairs ordered by endpoint name.
    pub fn resource_schemas(&self) -> impl Iterator<Item = (&str, &Arc<ResourceSchema>)> {
        self.resource_schemas.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn resource_count(&self) -> usize {
        self.resource_schemas.len()
    }
}

/// A validated ApiSchema: every project and resource schema parsed eagerly.
#[derive(Debug, Clone)]
pub struct ApiSchemaDocument {
    project_name_mapping: BTreeMap<String, String>,
    project_schemas: Vec<ProjectSchema>,
}

impl ApiSchemaDocument {
    /// Parse and validate an ApiSchema document.
    ///
    /// # Errors
    ///
    /// Returns `ApiSchemaError::SchemaInvalid` with the JSON Pointer of the
    /// first invalid node.
    pub fn from_value(root: &Value) -> Result<Self, ApiSchemaError> {
        let raw: ApiSchemaNode = serde_json::from_value(root.clone())
            .map_err(|e| ApiSchemaError::invalid("/", e.to_string()))?;

        let project_schemas = raw
            .project_schemas
            .iter()
            .map(|(endpoint, node)| ProjectSchema::from_node(endpoint, node))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ApiSchemaDocument {
            project_name_mapping: raw.project_name_mapping,
            project_schemas,
        })
    }

    /// Parse an ApiSchema from a JSON string.
    pub fn parse_str(content: &str) -> Result<Self, ApiSchemaError> {
        Self::from_value(&load_json_str(content)?)
    }

    /// Load an ApiSchema from a file path or URL.
    pub fn load(source: &str) -> Result<Self, ApiSchemaError> {
        Self::from_value(&load_json_auto(source)?)
    }

    /// Project schema for a namespace: either the endpoint name (`ed-fi`)
    /// or the project name (`Ed-Fi`), matched case-insensitively.
    pub fn find_project_schema(&self, project_namespace: &str) -> Option<&ProjectSchema> {
        let wanted = project_namespace.to_ascii_lowercase();
        let endpoint = self
            .project_name_mapping
            .iter()
            .find(|(name, _)| name.to_ascii_lowercase() == wanted)
            .map(|(_, endpoint)| endpoint.to_ascii_lowercase())
            .unwrap_or(wanted);

        self.project_schemas
            .iter()
            .find(|p| p.project_endpoint_name.to_ascii_lowercase() == endpoint)
    }

    /// All project schemas, ordered by endpoint name.
    pub fn all_project_schemas(&self) -> &[ProjectSchema] {
        &self.project_schemas
    }

    /// Resource schema by project name and resource name, as references name them.
    pub fn find_resource_schema(
        &self,
        project_name: &str,
        resource_name: &str,
    ) -> Option<&Arc<ResourceSchema>> {
        self.find_project_schema(project_name)
            .and_then(|p| p.find_resource_schema_by_name(resource_name))
    }
}
