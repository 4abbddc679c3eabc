//! Document identity, referential ids and superclass identity aliasing.
//!
//! A referential id is a UUID v5 over `{projectName}{resourceName}` followed
//! by the identity elements rendered as `$path=value` and joined with `#`.
//! Stores resolve cross-document references by this id, so the string
//! construction and namespace must stay bit-for-bit stable.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ExtractionError;
use crate::json_path::JsonPath;
use crate::resource_schema::ResourceSchema;
use crate::types::{json_type_name, BaseResourceInfo};

/// Namespace for every referential id.
pub const REFERENTIAL_ID_NAMESPACE: Uuid = Uuid::from_u128(0xedf1edf1_3df1_3df1_3df1_3df1edf1edf1);

/// Synthetic identity path of every descriptor.
pub const DESCRIPTOR_IDENTITY_PATH: &str = "$.descriptor";

/// Identity path of the school year enumeration.
pub const SCHOOL_YEAR_IDENTITY_PATH: &str = "$.schoolYear";

/// One (path, value) pair of a document identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentIdentityElement {
    pub identity_json_path: JsonPath,
    pub identity_value: String,
}

impl DocumentIdentityElement {
    pub fn new(path: impl Into<JsonPath>, value: impl Into<String>) -> Self {
        Self {
            identity_json_path: path.into(),
            identity_value: value.into(),
        }
    }
}

/// Ordered identity of a document. Order is significant for hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentIdentity(Vec<DocumentIdentityElement>);

impl DocumentIdentity {
    pub fn new(elements: Vec<DocumentIdentityElement>) -> Self {
        DocumentIdentity(elements)
    }

    pub fn elements(&self) -> &[DocumentIdentityElement] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The same identity with the first element's path replaced.
    ///
    /// Subclass identities have a single element naming the subclass field
    /// (`$.schoolId`); the superclass names the same value differently
    /// (`$.educationOrganizationId`).
    pub fn with_first_path_renamed(&self, path: &JsonPath) -> Self {
        let mut elements = self.0.clone();
        if let Some(first) = elements.first_mut() {
            first.identity_json_path = path.clone();
        }
        DocumentIdentity(elements)
    }
}

/// Deterministic id of a document derived from its resource and identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferentialId(pub Uuid);

impl fmt::Display for ReferentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Identity of a subclass document re-expressed against its superclass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperclassIdentity {
    pub resource_info: BaseResourceInfo,
    pub document_identity: DocumentIdentity,
    pub referential_id: ReferentialId,
}

/// Render an identity value as text: strings verbatim, numbers and booleans
/// in their JSON spelling.
pub(crate) fn identity_value_text(path: &JsonPath, value: &Value) -> Result<String, ExtractionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ExtractionError::UnsupportedIdentityValue {
            path: path.to_string(),
            actual: json_type_name(other).to_string(),
        }),
    }
}

/// Identity of a descriptor: the single pair (`$.descriptor`, `namespace#codeValue`).
pub fn descriptor_identity(document: &Value) -> Result<DocumentIdentity, ExtractionError> {
    let field = |name: &str| -> Result<String, ExtractionError> {
        let path = JsonPath::new(format!("$.{}", name));
        match document.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => identity_value_text(&path, other),
            None => Err(ExtractionError::MissingIdentityValue {
                path: path.to_string(),
            }),
        }
    };
    let namespace = field("namespace")?;
    let code_value = field("codeValue")?;
    Ok(DocumentIdentity(vec![DocumentIdentityElement::new(
        DESCRIPTOR_IDENTITY_PATH,
        format!("{}#{}", namespace, code_value),
    )]))
}

/// Identity of a document of `schema`, in schema-declared path order.
///
/// # Errors
///
/// Returns `ExtractionError::MissingIdentityValue` when an identity path
/// selects nothing.
pub fn compute_document_identity(
    schema: &ResourceSchema,
    document: &Value,
) -> Result<DocumentIdentity, ExtractionError> {
    if schema.is_descriptor {
        return descriptor_identity(document);
    }

    if schema.is_school_year_enumeration {
        let path = JsonPath::from(SCHOOL_YEAR_IDENTITY_PATH);
        let value = path
            .select_first(document)
            .ok_or_else(|| ExtractionError::MissingIdentityValue {
                path: path.to_string(),
            })?;
        let text = identity_value_text(&path, value)?;
        return Ok(DocumentIdentity(vec![DocumentIdentityElement::new(path, text)]));
    }

    schema
        .identity_json_paths
        .iter()
        .map(|path| {
            let value =
                path.select_first(document)
                    .ok_or_else(|| ExtractionError::MissingIdentityValue {
                        path: path.to_string(),
                    })?;
            Ok(DocumentIdentityElement {
                identity_json_path: path.clone(),
                identity_value: identity_value_text(path, value)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(DocumentIdentity)
}

/// The exact string hashed into a referential id.
pub fn referential_id_name(resource: &BaseResourceInfo, identity: &DocumentIdentity) -> String {
    let elements = identity
        .elements()
        .iter()
        .map(|e| format!("${}={}", e.identity_json_path, e.identity_value))
        .collect::<Vec<_>>()
        .join("#");
    format!("{}{}{}", resource.project_name, resource.resource_name, elements)
}

/// UUID v5 of `referential_id_name` under `REFERENTIAL_ID_NAMESPACE`.
pub fn compute_referential_id(resource: &BaseResourceInfo, identity: &DocumentIdentity) -> ReferentialId {
    let name = referential_id_name(resource, identity);
    ReferentialId(Uuid::new_v5(&REFERENTIAL_ID_NAMESPACE, name.as_bytes()))
}

/// Superclass identity of a subclass document; `None` for other resources.
///
/// Associations share their identity with the superclass unchanged. Other
/// subclasses rename their identity field to the superclass's.
pub fn compute_superclass_identity(
    schema: &ResourceSchema,
    identity: &DocumentIdentity,
) -> Option<SuperclassIdentity> {
    let superclass = schema.superclass.as_ref()?;

    let document_identity = if superclass.subclass_type == "association" {
        identity.clone()
    } else {
        identity.with_first_path_renamed(&superclass.identity_json_path)
    };
    let referential_id = compute_referential_id(&superclass.resource_info, &document_identity);

    Some(SuperclassIdentity {
        resource_info: superclass.resource_info.clone(),
        document_identity,
        referential_id,
    })
}
