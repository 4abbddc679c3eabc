//! Extraction of identity and references from a validated document.

use serde::Serialize;
use serde_json::Value;

use crate::error::ExtractionError;
use crate::identity::{
    compute_document_identity, compute_referential_id, compute_superclass_identity,
    identity_value_text, DocumentIdentity, DocumentIdentityElement, ReferentialId,
    SuperclassIdentity, DESCRIPTOR_IDENTITY_PATH,
};
use crate::json_path::JsonPath;
use crate::resource_schema::{DocumentPath, ReferenceJsonPaths, ResourceSchema};
use crate::types::BaseResourceInfo;

/// A reference from this document to another non-descriptor document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReference {
    pub resource_info: BaseResourceInfo,
    pub document_identity: DocumentIdentity,
    pub referential_id: ReferentialId,
}

/// A descriptor URI used by this document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorReference {
    pub resource_info: BaseResourceInfo,
    pub document_identity: DocumentIdentity,
    pub referential_id: ReferentialId,
    /// Concrete path of the value, e.g. `$.gradeLevels[0].gradeLevelDescriptor`.
    pub path: JsonPath,
}

impl DescriptorReference {
    /// The descriptor URI as the client sent it.
    pub fn uri(&self) -> &str {
        self.document_identity
            .elements()
            .first()
            .map(|e| e.identity_value.as_str())
            .unwrap_or_default()
    }
}

/// Everything the document store needs to persist and cross-check a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub document_identity: DocumentIdentity,
    pub referential_id: ReferentialId,
    pub document_references: Vec<DocumentReference>,
    pub descriptor_references: Vec<DescriptorReference>,
    pub superclass_identity: Option<SuperclassIdentity>,
}

/// Derive the full `DocumentInfo` of `document`, a resource of `project_name`.
pub fn extract_document_info(
    project_name: &str,
    schema: &ResourceSchema,
    document: &Value,
) -> Result<DocumentInfo, ExtractionError> {
    let resource_info =
        BaseResourceInfo::new(project_name, schema.resource_name.clone(), schema.is_descriptor);
    let document_identity = compute_document_identity(schema, document)?;
    let referential_id = compute_referential_id(&resource_info, &document_identity);
    let superclass_identity = compute_superclass_identity(schema, &document_identity);

    Ok(DocumentInfo {
        document_references: extract_document_references(schema, document)?,
        descriptor_references: extract_descriptor_references(schema, document)?,
        document_identity,
        referential_id,
        superclass_identity,
    })
}

/// One `DocumentReference` per referenced document.
///
/// The values at each reference path are zipped index-wise, so a reference
/// nested in an array yields one reference per array element. A reference
/// the document leaves out yields nothing.
pub fn extract_document_references(
    schema: &ResourceSchema,
    document: &Value,
) -> Result<Vec<DocumentReference>, ExtractionError> {
    let mut references = Vec::new();

    for mapping in schema.document_paths_mapping.values() {
        let DocumentPath::DocumentReference {
            target,
            reference_json_paths,
        } = mapping
        else {
            continue;
        };

        for identity in reference_identities(target, reference_json_paths, document)? {
            references.push(DocumentReference {
                referential_id: compute_referential_id(target, &identity),
                resource_info: target.clone(),
                document_identity: identity,
            });
        }
    }

    Ok(references)
}

fn reference_identities(
    target: &BaseResourceInfo,
    reference_json_paths: &[ReferenceJsonPaths],
    document: &Value,
) -> Result<Vec<DocumentIdentity>, ExtractionError> {
    let columns: Vec<Vec<&Value>> = reference_json_paths
        .iter()
        .map(|p| p.reference_json_path.select(document))
        .collect();

    let Some(count) = columns.first().map(Vec::len) else {
        return Ok(Vec::new());
    };
    if columns.iter().all(Vec::is_empty) {
        return Ok(Vec::new());
    }
    if columns.iter().any(|c| c.len() != count) {
        return Err(ExtractionError::ReferenceArityMismatch {
            resource: target.resource_name.clone(),
        });
    }

    (0..count)
        .map(|row| {
            reference_json_paths
                .iter()
                .zip(&columns)
                .map(|(paths, column)| {
                    Ok(DocumentIdentityElement {
                        identity_json_path: paths.identity_json_path.clone(),
                        identity_value: identity_value_text(
                            &paths.reference_json_path,
                            column[row],
                        )?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(DocumentIdentity::new)
        })
        .collect()
}

/// One `DescriptorReference` per descriptor value found in the document.
pub fn extract_descriptor_references(
    schema: &ResourceSchema,
    document: &Value,
) -> Result<Vec<DescriptorReference>, ExtractionError> {
    let mut references = Vec::new();

    for mapping in schema.document_paths_mapping.values() {
        let DocumentPath::DescriptorReference { target, path } = mapping else {
            continue;
        };

        for (concrete_path, value) in path.select_with_paths(document) {
            let Value::String(uri) = value else {
                return Err(ExtractionError::InvalidDescriptorValue {
                    path: concrete_path,
                });
            };
            let identity = DocumentIdentity::new(vec![DocumentIdentityElement::new(
                DESCRIPTOR_IDENTITY_PATH,
                uri.clone(),
            )]);
            references.push(DescriptorReference {
                referential_id: compute_referential_id(target, &identity),
                resource_info: target.clone(),
                document_identity: identity,
                path: JsonPath::new(concrete_path),
            });
        }
    }

    Ok(references)
}
