//! Response builders, including problem-details failure bodies.

use serde::Serialize;
use serde_json::Value;

use crate::extraction::DescriptorReference;
use crate::types::{DocumentUuid, TraceId};
use crate::validator::ValidationErrors;

use super::context::FrontendResponse;

const NOT_FOUND_TYPE: &str = "urn:ed-fi:api:not-found";
const BAD_REQUEST_TYPE: &str = "urn:ed-fi:api:bad-request";
const DATA_VALIDATION_TYPE: &str = "urn:ed-fi:api:bad-request:data-validation-failed";
const KEY_CHANGE_TYPE: &str = "urn:ed-fi:api:bad-request:data-validation-failed:key-change-not-supported";
const UNRESOLVED_REFERENCE_TYPE: &str = "urn:ed-fi:api:conflict:unresolved-reference";
const DEPENDENT_ITEM_TYPE: &str = "urn:ed-fi:api:conflict:dependent-item-exists";
const IDENTITY_CONFLICT_TYPE: &str = "urn:ed-fi:api:identity-conflict";
const INTERNAL_ERROR_TYPE: &str = "urn:ed-fi:api:internal-server-error";

/// Problem-details body shared by every failure response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureBody {
    pub detail: String,
    #[serde(rename = "type")]
    pub failure_type: String,
    pub title: String,
    pub status: u16,
    pub correlation_id: String,
    pub validation_errors: ValidationErrors,
    pub errors: Vec<String>,
}

impl FailureBody {
    fn new(status: u16, failure_type: &str, title: &str, detail: String, trace_id: &TraceId) -> Self {
        Self {
            detail,
            failure_type: failure_type.to_string(),
            title: title.to_string(),
            status,
            correlation_id: trace_id.to_string(),
            validation_errors: ValidationErrors::new(),
            errors: Vec::new(),
        }
    }

    fn into_response(self) -> FrontendResponse {
        let status = self.status;
        let body = serde_json::to_value(&self).unwrap_or(Value::Null);
        FrontendResponse::new(status, Some(body))
    }
}

/// `/{path_base}/{project}/{endpoint}/{uuid}`.
pub fn location(path_base: &str, project: &str, endpoint: &str, uuid: &DocumentUuid) -> String {
    let base = path_base.trim_matches('/');
    if base.is_empty() {
        format!("/{}/{}/{}", project, endpoint, uuid)
    } else {
        format!("/{}/{}/{}/{}", base, project, endpoint, uuid)
    }
}

pub fn ok(body: Value) -> FrontendResponse {
    FrontendResponse::new(200, Some(body))
}

pub fn created(location: String) -> FrontendResponse {
    FrontendResponse::new(201, None).with_header("Location", location)
}

pub fn ok_with_location(location: String) -> FrontendResponse {
    FrontendResponse::new(200, None).with_header("Location", location)
}

pub fn no_content() -> FrontendResponse {
    FrontendResponse::new(204, None)
}

pub fn no_content_with_location(location: String) -> FrontendResponse {
    no_content().with_header("Location", location)
}

/// 404 with an empty body, for a document that does not exist.
pub fn not_exists() -> FrontendResponse {
    FrontendResponse::new(404, None)
}

/// 404 for a path that names no known project, resource or id.
pub fn not_found(trace_id: &TraceId, detail: impl Into<String>) -> FrontendResponse {
    FailureBody::new(404, NOT_FOUND_TYPE, "Not Found", detail.into(), trace_id).into_response()
}

pub fn method_not_allowed() -> FrontendResponse {
    FrontendResponse::new(405, None)
}

/// 409 with an empty body; the client should retry.
pub fn write_conflict() -> FrontendResponse {
    FrontendResponse::new(409, None)
}

pub fn bad_request(trace_id: &TraceId, errors: Vec<String>) -> FrontendResponse {
    let mut body = FailureBody::new(
        400,
        BAD_REQUEST_TYPE,
        "Bad Request",
        "The request could not be processed. See 'errors' for details.".to_string(),
        trace_id,
    );
    body.errors = errors;
    body.into_response()
}

pub fn data_validation(trace_id: &TraceId, validation_errors: ValidationErrors) -> FrontendResponse {
    let mut body = FailureBody::new(
        400,
        DATA_VALIDATION_TYPE,
        "Data Validation Failed",
        "Data validation failed. See 'validationErrors' for details.".to_string(),
        trace_id,
    );
    body.validation_errors = validation_errors;
    body.into_response()
}

/// 400 with one message per descriptor URI that does not resolve.
pub fn descriptor_reference_failure(
    trace_id: &TraceId,
    invalid: &[DescriptorReference],
) -> FrontendResponse {
    let mut errors = ValidationErrors::new();
    for reference in invalid {
        let message = format!(
            "{} value '{}' does not exist.",
            reference.resource_info.resource_name,
            reference.uri()
        );
        errors.entry(reference.path.to_string()).or_default().push(message);
    }
    data_validation(trace_id, errors)
}

pub fn reference_failure(trace_id: &TraceId, resource_names: &[String]) -> FrontendResponse {
    FailureBody::new(
        409,
        UNRESOLVED_REFERENCE_TYPE,
        "Unresolved Reference",
        format!(
            "The referenced {} item(s) do not exist.",
            resource_names.join(", ")
        ),
        trace_id,
    )
    .into_response()
}

pub fn dependent_item_exists(trace_id: &TraceId, resource_names: &[String]) -> FrontendResponse {
    FailureBody::new(
        409,
        DEPENDENT_ITEM_TYPE,
        "Dependent Item Exists",
        format!(
            "The requested action cannot be performed because this item is referenced by existing {} item(s).",
            resource_names.join(", ")
        ),
        trace_id,
    )
    .into_response()
}

/// Natural key conflict. Upsert reports it as 409, update as 400.
pub fn identity_conflict(
    trace_id: &TraceId,
    status: u16,
    resource_name: &str,
    duplicate_identity_values: &[(String, String)],
) -> FrontendResponse {
    let values = duplicate_identity_values
        .iter()
        .map(|(key, value)| format!("({} = {})", key, value))
        .collect::<Vec<_>>()
        .join(", ");
    FailureBody::new(
        status,
        IDENTITY_CONFLICT_TYPE,
        "Identifying Values Are Not Unique",
        format!(
            "A natural key conflict occurred when attempting to create a new resource {} with a duplicate key. The duplicate keys and values are {}",
            resource_name, values
        ),
        trace_id,
    )
    .into_response()
}

pub fn immutable_identity(trace_id: &TraceId, resource_name: &str) -> FrontendResponse {
    FailureBody::new(
        400,
        KEY_CHANGE_TYPE,
        "Key Change Not Supported",
        format!(
            "Identifying values for the {} resource cannot be changed. Delete and recreate the resource item instead.",
            resource_name
        ),
        trace_id,
    )
    .into_response()
}

pub fn cascade_required(trace_id: &TraceId) -> FrontendResponse {
    bad_request(
        trace_id,
        vec!["The identity of the resource cannot be changed while other documents reference it.".to_string()],
    )
}

/// Generic 500. The failure detail is logged, never returned.
pub fn unknown_failure(trace_id: &TraceId) -> FrontendResponse {
    FailureBody::new(
        500,
        INTERNAL_ERROR_TYPE,
        "Internal Server Error",
        "The server encountered an unexpected condition that prevented it from fulfilling the request.".to_string(),
        trace_id,
    )
    .into_response()
}
