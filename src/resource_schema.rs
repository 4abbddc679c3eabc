//! Typed view over one resource node of an ApiSchema.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiSchemaError;
use crate::json_path::JsonPath;
use crate::types::{BaseResourceInfo, RequestMethod};

/// A source/target pair whose values must be textually equal in a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqualityConstraint {
    pub source_json_path: JsonPath,
    pub target_json_path: JsonPath,
}

/// Identity path of a referenced resource and where its value sits in the referencing document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceJsonPaths {
    pub identity_json_path: JsonPath,
    pub reference_json_path: JsonPath,
}

/// One queryable field and its type (`string`, `number`, `boolean`, `date`, `date-time`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFieldPath {
    pub path: JsonPath,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Precision envelope for a decimal-typed property.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecimalValidationInfo {
    pub path: JsonPath,
    pub total_digits: Option<u32>,
    pub decimal_places: Option<u32>,
}

/// An entry of `documentPathsMapping`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentPath {
    /// A plain property of this document.
    Scalar { path: JsonPath },
    /// A reference to another non-descriptor document, located by its identity.
    DocumentReference {
        target: BaseResourceInfo,
        reference_json_paths: Vec<ReferenceJsonPaths>,
    },
    /// A descriptor URI stored at `path`.
    DescriptorReference {
        target: BaseResourceInfo,
        path: JsonPath,
    },
}

/// The superclass a subclass resource shares identity with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superclass {
    /// Such as "association" or "domainEntity".
    pub subclass_type: String,
    pub resource_info: BaseResourceInfo,
    pub identity_json_path: JsonPath,
}

/// Everything the core needs to know about one resource.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_name: String,
    pub is_descriptor: bool,
    pub is_school_year_enumeration: bool,
    pub allow_identity_updates: bool,
    pub json_schema_for_insert: Value,
    pub json_schema_for_update: Value,
    pub identity_json_paths: Vec<JsonPath>,
    pub boolean_json_paths: Vec<JsonPath>,
    pub numeric_json_paths: Vec<JsonPath>,
    pub document_paths_mapping: BTreeMap<String, DocumentPath>,
    pub query_field_mapping: BTreeMap<String, Vec<QueryFieldPath>>,
    pub equality_constraints: Vec<EqualityConstraint>,
    pub decimal_validation_infos: Vec<DecimalValidationInfo>,
    pub superclass: Option<Superclass>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceSchemaNode {
    resource_name: String,
    is_descriptor: bool,
    is_school_year_enumeration: bool,
    allow_identity_updates: bool,
    json_schema_for_insert: Value,
    identity_json_paths: Vec<JsonPath>,
    boolean_json_paths: Vec<JsonPath>,
    numeric_json_paths: Vec<JsonPath>,
    document_paths_mapping: BTreeMap<String, DocumentPathNode>,
    query_field_mapping: BTreeMap<String, Vec<QueryFieldPath>>,
    equality_constraints: Vec<EqualityConstraint>,
    is_subclass: bool,
    subclass_type: Option<String>,
    superclass_project_name: Option<String>,
    superclass_resource_name: Option<String>,
    superclass_identity_json_path: Option<JsonPath>,
    #[serde(default)]
    decimal_property_validation_infos: Vec<DecimalValidationInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentPathNode {
    is_reference: bool,
    #[serde(default)]
    is_descriptor: bool,
    project_name: Option<String>,
    resource_name: Option<String>,
    path: Option<JsonPath>,
    #[serde(default)]
    reference_json_paths: Vec<ReferenceJsonPaths>,
}

impl ResourceSchema {
    /// Build the view from a resource node. `path` locates the node in the
    /// ApiSchema (a JSON Pointer) and is carried by any error.
    ///
    /// # Errors
    ///
    /// Returns `ApiSchemaError::SchemaInvalid` naming the first missing or
    /// malformed field.
    pub fn from_node(path: &str, node: &Value) -> Result<Self, ApiSchemaError> {
        let raw: ResourceSchemaNode = serde_json::from_value(node.clone())
            .map_err(|e| ApiSchemaError::invalid(path, e.to_string()))?;

        let mut document_paths_mapping = BTreeMap::new();
        for (key, entry) in raw.document_paths_mapping {
            let entry_path = format!("{}/documentPathsMapping/{}", path, key);
            document_paths_mapping.insert(key, entry.into_document_path(&entry_path)?);
        }

        let superclass = if raw.is_subclass {
            let missing = |field: &str| {
                ApiSchemaError::invalid(path, format!("subclass missing field `{}`", field))
            };
            Some(Superclass {
                subclass_type: raw.subclass_type.ok_or_else(|| missing("subclassType"))?,
                resource_info: BaseResourceInfo::new(
                    raw.superclass_project_name
                        .ok_or_else(|| missing("superclassProjectName"))?,
                    raw.superclass_resource_name
                        .ok_or_else(|| missing("superclassResourceName"))?,
                    false,
                ),
                identity_json_path: raw
                    .superclass_identity_json_path
                    .ok_or_else(|| missing("superclassIdentityJsonPath"))?,
            })
        } else {
            None
        };

        let json_schema_for_update = update_schema_from(&raw.json_schema_for_insert);

        Ok(ResourceSchema {
            resource_name: raw.resource_name,
            is_descriptor: raw.is_descriptor,
            is_school_year_enumeration: raw.is_school_year_enumeration,
            allow_identity_updates: raw.allow_identity_updates,
            json_schema_for_insert: raw.json_schema_for_insert,
            json_schema_for_update,
            identity_json_paths: raw.identity_json_paths,
            boolean_json_paths: raw.boolean_json_paths,
            numeric_json_paths: raw.numeric_json_paths,
            document_paths_mapping,
            query_field_mapping: raw.query_field_mapping,
            equality_constraints: raw.equality_constraints,
            decimal_validation_infos: raw.decimal_property_validation_infos,
            superclass,
        })
    }

    /// The JSON schema a request body of `method` is validated against.
    ///
    /// POST bodies carry no `id`; every other method requires one.
    pub fn json_schema_for(&self, method: RequestMethod) -> &Value {
        match method {
            RequestMethod::Post => &self.json_schema_for_insert,
            _ => &self.json_schema_for_update,
        }
    }

    pub fn is_subclass(&self) -> bool {
        self.superclass.is_some()
    }

    /// Resource names this resource points at through document or descriptor references.
    pub fn referenced_resource_names(&self) -> Vec<&str> {
        self.document_paths_mapping
            .values()
            .filter_map(|p| match p {
                DocumentPath::DocumentReference { target, .. }
                | DocumentPath::DescriptorReference { target, .. } => {
                    Some(target.resource_name.as_str())
                }
                DocumentPath::Scalar { .. } => None,
            })
            .collect()
    }
}

impl DocumentPathNode {
    fn into_document_path(self, path: &str) -> Result<DocumentPath, ApiSchemaError> {
        if !self.is_reference {
            let json_path = self
                .path
                .ok_or_else(|| ApiSchemaError::invalid(path, "missing field `path`"))?;
            return Ok(DocumentPath::Scalar { path: json_path });
        }

        let target = BaseResourceInfo::new(
            self.project_name
                .ok_or_else(|| ApiSchemaError::invalid(path, "missing field `projectName`"))?,
            self.resource_name
                .ok_or_else(|| ApiSchemaError::invalid(path, "missing field `resourceName`"))?,
            self.is_descriptor,
        );

        if self.is_descriptor {
            let json_path = self
                .path
                .ok_or_else(|| ApiSchemaError::invalid(path, "missing field `path`"))?;
            Ok(DocumentPath::DescriptorReference {
                target,
                path: json_path,
            })
        } else {
            Ok(DocumentPath::DocumentReference {
                target,
                reference_json_paths: self.reference_json_paths,
            })
        }
    }
}

/// The insert schema plus a required string `id`.
fn update_schema_from(insert: &Value) -> Value {
    let mut update = insert.clone();
    if let Some(obj) = update.as_object_mut() {
        if let Some(Value::Object(properties)) = obj.get_mut("properties") {
            properties.insert(
                "id".to_string(),
                json!({ "type": "string", "description": "The item id" }),
            );
        } else {
            obj.insert(
                "properties".to_string(),
                json!({ "id": { "type": "string", "description": "The item id" } }),
            );
        }

        match obj.get_mut("required") {
            Some(Value::Array(required)) => {
                if !required.iter().any(|r| r == "id") {
                    required.push(json!("id"));
                }
            }
            _ => {
                obj.insert("required".to_string(), json!(["id"]));
            }
        }
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school_node() -> Value {
        json!({
            "resourceName": "School",
            "isDescriptor": false,
            "isSchoolYearEnumeration": false,
            "allowIdentityUpdates": false,
            "jsonSchemaForInsert": {
                "type": "object",
                "properties": { "schoolId": { "type": "integer" } },
                "required": ["schoolId"]
            },
            "identityJsonPaths": ["$.schoolId"],
            "booleanJsonPaths": [],
            "numericJsonPaths": ["$.schoolId"],
            "documentPathsMapping": {
                "SchoolId": { "isReference": false, "path": "$.schoolId" },
                "LocalEducationAgency": {
                    "isReference": true,
                    "isDescriptor": false,
                    "projectName": "Ed-Fi",
                    "resourceName": "LocalEducationAgency",
                    "referenceJsonPaths": [{
                        "identityJsonPath": "$.localEducationAgencyId",
                        "referenceJsonPath": "$.localEducationAgencyReference.localEducationAgencyId"
                    }]
                },
                "SchoolCategoryDescriptor": {
                    "isReference": true,
                    "isDescriptor": true,
                    "projectName": "Ed-Fi",
                    "resourceName": "SchoolCategoryDescriptor",
                    "path": "$.schoolCategories[*].schoolCategoryDescriptor"
                }
            },
            "queryFieldMapping": {},
            "equalityConstraints": [],
            "isSubclass": true,
            "subclassType": "domainEntity",
            "superclassProjectName": "Ed-Fi",
            "superclassResourceName": "EducationOrganization",
            "superclassIdentityJsonPath": "$.educationOrganizationId"
        })
    }

    #[test]
    fn parses_complete_node() {
        let schema = ResourceSchema::from_node("/r", &school_node()).unwrap();
        assert_eq!(schema.resource_name, "School");
        assert_eq!(schema.identity_json_paths, vec![JsonPath::from("$.schoolId")]);
        assert_eq!(schema.document_paths_mapping.len(), 3);

        let superclass = schema.superclass.as_ref().unwrap();
        assert_eq!(superclass.resource_info.resource_name, "EducationOrganization");
        assert_eq!(superclass.identity_json_path.as_str(), "$.educationOrganizationId");
    }

    #[test]
    fn missing_required_field_names_field_and_path() {
        let mut node = school_node();
        node.as_object_mut().unwrap().remove("identityJsonPaths");

        let err = ResourceSchema::from_node("/projectSchemas/ed-fi/resourceSchemas/schools", &node)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("identityJsonPaths"), "{}", message);
        assert!(message.contains("/resourceSchemas/schools"), "{}", message);
    }

    #[test]
    fn subclass_without_superclass_fields_is_invalid() {
        let mut node = school_node();
        node.as_object_mut().unwrap().remove("superclassResourceName");

        let err = ResourceSchema::from_node("/r", &node).unwrap_err();
        assert!(err.to_string().contains("superclassResourceName"));
    }

    #[test]
    fn non_subclass_ignores_superclass_fields() {
        let mut node = school_node();
        node["isSubclass"] = json!(false);
        let schema = ResourceSchema::from_node("/r", &node).unwrap();
        assert!(!schema.is_subclass());
    }

    #[test]
    fn update_schema_requires_id() {
        let schema = ResourceSchema::from_node("/r", &school_node()).unwrap();
        let update = schema.json_schema_for(RequestMethod::Put);
        assert_eq!(update["properties"]["id"]["type"], "string");
        assert_eq!(update["required"], json!(["schoolId", "id"]));

        let insert = schema.json_schema_for(RequestMethod::Post);
        assert!(insert["properties"].get("id").is_none());
    }

    #[test]
    fn classifies_document_paths() {
        let schema = ResourceSchema::from_node("/r", &school_node()).unwrap();
        assert!(matches!(
            schema.document_paths_mapping["SchoolId"],
            DocumentPath::Scalar { .. }
        ));
        assert!(matches!(
            schema.document_paths_mapping["SchoolCategoryDescriptor"],
            DocumentPath::DescriptorReference { .. }
        ));

        let mut names = schema.referenced_resource_names();
        names.sort();
        assert_eq!(names, vec!["LocalEducationAgency", "SchoolCategoryDescriptor"]);
    }

    #[test]
    fn reference_without_resource_name_is_invalid() {
        let mut node = school_node();
        node["documentPathsMapping"]["LocalEducationAgency"]
            .as_object_mut()
            .unwrap()
            .remove("resourceName");
        let err = ResourceSchema::from_node("/r", &node).unwrap_err();
        assert!(err
            .to_string()
            .contains("/r/documentPathsMapping/LocalEducationAgency"));
    }
}
