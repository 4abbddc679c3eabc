//! Pipeline steps that prepare a request before it reaches a handler.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, error};

use crate::backend::{PaginationParameters, QueryElement};
use crate::coercion::coerce_from_strings;
use crate::compiled_cache::CompiledSchemaCache;
use crate::config::CoreConfig;
use crate::equality::validate_equality_constraints;
use crate::extraction::extract_document_info;
use crate::types::{BaseResourceInfo, DocumentUuid, RequestMethod, ResourceInfo};
use crate::validator::{merge_errors, validate_decimals, validate_document, ValidationErrors};

use super::context::{PathComponents, ProjectInfo, RequestContext};
use super::responses;
use super::PipelineStep;

const NOT_FOUND_DETAIL: &str = "The specified data could not be found.";

/// End the request with a 500 when an earlier step did not populate `what`.
fn missing(context: &mut RequestContext, what: &str) {
    error!(
        trace_id = %context.trace_id(),
        "{} missing from request context",
        what
    );
    context.response = Some(responses::unknown_failure(context.trace_id()));
}

fn single_error(key: &str, message: String) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.insert(key.to_string(), vec![message]);
    errors
}

/// Resolve `/{project}/{endpoint}[/{id}]` against the captured schema generation.
#[derive(Debug, Default)]
pub struct ParsePath;

#[async_trait]
impl PipelineStep for ParsePath {
    async fn execute(&self, context: &mut RequestContext) {
        let path = context.frontend_request.path.clone();
        debug!(trace_id = %context.trace_id(), %path, "parsing request path");

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let (project_segment, endpoint, id) = match segments.as_slice() {
            [project, endpoint] => (*project, *endpoint, None),
            [project, endpoint, id] => (*project, *endpoint, Some(*id)),
            _ => {
                context.response = Some(responses::not_found(context.trace_id(), NOT_FOUND_DETAIL));
                return;
            }
        };

        let document_uuid = match id {
            None => None,
            Some(text) => match DocumentUuid::parse(text) {
                Some(uuid) => Some(uuid),
                None => {
                    context.response =
                        Some(responses::not_found(context.trace_id(), NOT_FOUND_DETAIL));
                    return;
                }
            },
        };

        match (context.method(), document_uuid.is_some()) {
            (RequestMethod::Post, true)
            | (RequestMethod::Put, false)
            | (RequestMethod::Delete, false) => {
                context.response = Some(responses::method_not_allowed());
                return;
            }
            _ => {}
        }

        let generation = Arc::clone(&context.generation);
        let Some(project) = generation.document.find_project_schema(project_segment) else {
            debug!(trace_id = %context.trace_id(), project = project_segment, "unknown project");
            context.response = Some(responses::not_found(context.trace_id(), NOT_FOUND_DETAIL));
            return;
        };
        let Some(resource) = project.find_resource_schema(endpoint) else {
            debug!(trace_id = %context.trace_id(), endpoint, "unknown resource");
            context.response = Some(responses::not_found(context.trace_id(), NOT_FOUND_DETAIL));
            return;
        };

        context.project = Some(ProjectInfo {
            project_name: project.project_name.clone(),
            project_version: project.project_version.clone(),
        });
        context.resource_schema = Some(Arc::clone(resource));
        context.path_components = Some(PathComponents {
            project_endpoint_name: project.project_endpoint_name.clone(),
            endpoint_name: endpoint.to_string(),
            document_uuid,
        });
    }
}

/// Parse the request body as JSON.
#[derive(Debug)]
pub struct ParseBody {
    pub mask_request_body_in_logs: bool,
}

#[async_trait]
impl PipelineStep for ParseBody {
    async fn execute(&self, context: &mut RequestContext) {
        let body = context.frontend_request.body.clone().unwrap_or_default();
        if self.mask_request_body_in_logs {
            debug!(trace_id = %context.trace_id(), body = "*", "parsing request body");
        } else {
            debug!(trace_id = %context.trace_id(), %body, "parsing request body");
        }

        if body.trim().is_empty() {
            context.response = Some(responses::bad_request(
                context.trace_id(),
                vec!["A non-empty request body is required.".to_string()],
            ));
            return;
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(parsed) => context.parsed_body = parsed,
            Err(e) => {
                let errors = single_error("$", format!("The request body is not valid JSON: {}", e));
                context.response = Some(responses::data_validation(context.trace_id(), errors));
            }
        }
    }
}

/// Reject a client-assigned `id` on POST.
#[derive(Debug, Default)]
pub struct RejectResourceIdentifier;

#[async_trait]
impl PipelineStep for RejectResourceIdentifier {
    async fn execute(&self, context: &mut RequestContext) {
        if context.parsed_body.get("id").is_some() {
            let errors = single_error(
                "$.id",
                "Resource identifiers cannot be assigned by the client. The 'id' property should not be included in the request body.".to_string(),
            );
            context.response = Some(responses::data_validation(context.trace_id(), errors));
        }
    }
}

/// Convert string booleans and numbers in place.
#[derive(Debug)]
pub struct CoerceFromStrings {
    pub bypass: bool,
}

#[async_trait]
impl PipelineStep for CoerceFromStrings {
    async fn execute(&self, context: &mut RequestContext) {
        if self.bypass {
            return;
        }
        let Some(schema) = context.resource_schema.clone() else {
            return missing(context, "resource schema");
        };
        let coerced = coerce_from_strings(&schema, &mut context.parsed_body);
        if coerced > 0 {
            debug!(trace_id = %context.trace_id(), coerced, "coerced string values");
        }
    }
}

/// JSON-schema validation with pruning, plus the decimal envelope.
#[derive(Debug)]
pub struct ValidateDocument {
    pub cache: Arc<CompiledSchemaCache>,
}

#[async_trait]
impl PipelineStep for ValidateDocument {
    async fn execute(&self, context: &mut RequestContext) {
        let (Some(schema), Some(project)) =
            (context.resource_schema.clone(), context.project.clone())
        else {
            return missing(context, "resource schema");
        };

        let compiled = match self.cache.schema_for(
            &project.project_name,
            &schema,
            context.method(),
            context.generation.reload_id,
        ) {
            Ok(compiled) => compiled,
            Err(e) => {
                error!(trace_id = %context.trace_id(), error = %e, "schema compilation failed");
                context.response = Some(responses::unknown_failure(context.trace_id()));
                return;
            }
        };

        let mut validation = validate_document(&compiled, &mut context.parsed_body);
        merge_errors(
            &mut validation.errors,
            validate_decimals(&schema, &context.parsed_body),
        );

        if !validation.pruned.is_empty() {
            debug!(
                trace_id = %context.trace_id(),
                overposted = validation.pruned.overposted,
                nulls = validation.pruned.nulls,
                trimmed = validation.pruned.trimmed,
                "pruned request body"
            );
        }
        if !validation.is_valid() {
            debug!(trace_id = %context.trace_id(), errors = validation.errors.len(), "document failed validation");
            context.response = Some(responses::data_validation(context.trace_id(), validation.errors));
        }
    }
}

/// On PUT, the body id must be the id in the path.
#[derive(Debug, Default)]
pub struct ValidateMatchingDocumentUuids;

#[async_trait]
impl PipelineStep for ValidateMatchingDocumentUuids {
    async fn execute(&self, context: &mut RequestContext) {
        let Some(expected) = context.path_components.as_ref().and_then(|p| p.document_uuid) else {
            return missing(context, "document uuid");
        };
        let body_id = context
            .parsed_body
            .get("id")
            .and_then(Value::as_str)
            .and_then(DocumentUuid::parse);

        if body_id != Some(expected) {
            context.response = Some(responses::bad_request(
                context.trace_id(),
                vec!["Request body id must match the id in the url.".to_string()],
            ));
        }
    }
}

#[derive(Debug, Default)]
pub struct ValidateEqualityConstraint;

#[async_trait]
impl PipelineStep for ValidateEqualityConstraint {
    async fn execute(&self, context: &mut RequestContext) {
        let Some(schema) = context.resource_schema.clone() else {
            return missing(context, "resource schema");
        };
        let errors = validate_equality_constraints(&schema, &context.parsed_body);
        if !errors.is_empty() {
            context.response = Some(responses::data_validation(context.trace_id(), errors));
        }
    }
}

/// Describe the resource for the document store.
#[derive(Debug)]
pub struct BuildResourceInfo {
    pub config: Arc<CoreConfig>,
}

#[async_trait]
impl PipelineStep for BuildResourceInfo {
    async fn execute(&self, context: &mut RequestContext) {
        let (Some(schema), Some(project)) =
            (context.resource_schema.clone(), context.project.clone())
        else {
            return missing(context, "resource schema");
        };

        context.resource_info = Some(ResourceInfo {
            base: BaseResourceInfo::new(
                project.project_name,
                schema.resource_name.clone(),
                schema.is_descriptor,
            ),
            resource_version: project.project_version,
            allow_identity_updates: self
                .config
                .allows_identity_update(&schema.resource_name, schema.allow_identity_updates),
        });
    }
}

/// Identity, referential id and references of the validated body.
#[derive(Debug, Default)]
pub struct ExtractDocumentInfo;

#[async_trait]
impl PipelineStep for ExtractDocumentInfo {
    async fn execute(&self, context: &mut RequestContext) {
        let (Some(schema), Some(project)) =
            (context.resource_schema.clone(), context.project.clone())
        else {
            return missing(context, "resource schema");
        };

        match extract_document_info(&project.project_name, &schema, &context.parsed_body) {
            Ok(info) => context.document_info = Some(info),
            Err(e) => {
                debug!(trace_id = %context.trace_id(), error = %e, "document info extraction failed");
                let errors = single_error("$", e.to_string());
                context.response = Some(responses::data_validation(context.trace_id(), errors));
            }
        }
    }
}

fn is_valid_query_value(field_type: &str, value: &str) -> bool {
    match field_type {
        "boolean" => value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false"),
        "number" => value.parse::<f64>().is_ok(),
        "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        "date-time" => {
            DateTime::parse_from_rfc3339(value).is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
        }
        _ => true,
    }
}

/// Pagination and query-field parsing for GET without an id.
#[derive(Debug)]
pub struct ValidateQuery {
    pub maximum_page_size: u32,
}

impl ValidateQuery {
    fn pagination(
        &self,
        key: &str,
        value: &str,
        pagination: &mut PaginationParameters,
        errors: &mut ValidationErrors,
    ) -> bool {
        match key {
            "offset" => match value.parse::<u32>() {
                Ok(offset) => pagination.offset = Some(offset),
                Err(_) => errors.entry("$.offset".into()).or_default().push(
                    "Offset must be a numeric value greater than or equal to 0.".to_string(),
                ),
            },
            "limit" => match value.parse::<u32>() {
                Ok(limit) if limit <= self.maximum_page_size => pagination.limit = Some(limit),
                _ => errors.entry("$.limit".into()).or_default().push(format!(
                    "Limit must be omitted or set to a numeric value between 0 and {}.",
                    self.maximum_page_size
                )),
            },
            "totalCount" => match value.to_ascii_lowercase().as_str() {
                "true" => pagination.total_count = true,
                "false" => pagination.total_count = false,
                _ => errors
                    .entry("$.totalCount".into())
                    .or_default()
                    .push("TotalCount must be a boolean value.".to_string()),
            },
            _ => return false,
        }
        true
    }
}

#[async_trait]
impl PipelineStep for ValidateQuery {
    async fn execute(&self, context: &mut RequestContext) {
        let Some(schema) = context.resource_schema.clone() else {
            return missing(context, "resource schema");
        };
        debug!(trace_id = %context.trace_id(), "validating query parameters");

        let mut pagination = PaginationParameters::default();
        let mut query_elements = Vec::new();
        let mut errors = ValidationErrors::new();

        for (key, value) in &context.frontend_request.query_parameters {
            if self.pagination(key, value, &mut pagination, &mut errors) {
                continue;
            }

            let Some((field_name, paths)) = schema
                .query_field_mapping
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(key))
            else {
                errors
                    .entry(format!("$.{}", key))
                    .or_default()
                    .push(format!("The query field '{}' is not valid for this resource.", key));
                continue;
            };

            if let Some(bad) = paths.iter().find(|p| !is_valid_query_value(&p.field_type, value)) {
                errors.entry(format!("$.{}", field_name)).or_default().push(format!(
                    "{} value '{}' is not a valid {}.",
                    field_name, value, bad.field_type
                ));
                continue;
            }

            query_elements.push(QueryElement {
                query_field_name: field_name.clone(),
                document_paths: paths.iter().map(|p| p.path.to_string()).collect(),
                value: value.clone(),
            });
        }

        if errors.is_empty() {
            context.pagination = pagination;
            context.query_elements = query_elements;
        } else {
            context.response = Some(responses::data_validation(context.trace_id(), errors));
        }
    }
}
