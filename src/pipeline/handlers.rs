//! Terminal steps: one store call each, result mapped to a response.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use crate::backend::{
    DeleteRequest, DeleteResult, DocumentStore, GetRequest, GetResult, QueryHandler, QueryRequest,
    QueryResult, UpdateRequest, UpdateResult, UpsertRequest, UpsertResult,
};
use crate::types::DocumentUuid;

use super::context::{PathComponents, RequestContext};
use super::responses;
use super::PipelineStep;

fn unprepared(context: &mut RequestContext, handler: &str) {
    error!(trace_id = %context.trace_id(), handler, "request context not prepared for handler");
    context.response = Some(responses::unknown_failure(context.trace_id()));
}

fn store_failure(context: &RequestContext, operation: &str, failure_message: &str) {
    error!(
        trace_id = %context.trace_id(),
        operation,
        failure_message,
        "document store reported an unknown failure"
    );
}

fn location_of(path_base: &str, path: &PathComponents, uuid: &DocumentUuid) -> String {
    responses::location(path_base, &path.project_endpoint_name, &path.endpoint_name, uuid)
}

#[derive(Debug)]
pub struct GetByIdHandler {
    pub store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl PipelineStep for GetByIdHandler {
    async fn execute(&self, context: &mut RequestContext) {
        let (Some(resource_info), Some(document_uuid)) = (
            context.resource_info.clone(),
            context.path_components.as_ref().and_then(|p| p.document_uuid),
        ) else {
            return unprepared(context, "get");
        };
        debug!(trace_id = %context.trace_id(), %document_uuid, "get by id");

        let result = self
            .store
            .get_document_by_id(GetRequest {
                document_uuid,
                resource_info,
                trace_id: context.trace_id().clone(),
            })
            .await;

        let response = match result {
            GetResult::Success {
                document_uuid,
                mut edfi_doc,
            } => {
                if let Value::Object(map) = &mut edfi_doc {
                    map.entry("id")
                        .or_insert_with(|| Value::String(document_uuid.to_string()));
                }
                responses::ok(edfi_doc)
            }
            GetResult::NotExists => responses::not_exists(),
            GetResult::UnknownFailure { failure_message } => {
                store_failure(context, "get", &failure_message);
                responses::unknown_failure(context.trace_id())
            }
        };
        context.response = Some(response);
    }
}

#[derive(Debug)]
pub struct UpsertHandler {
    pub store: Arc<dyn DocumentStore>,
    pub path_base: String,
}

#[async_trait]
impl PipelineStep for UpsertHandler {
    async fn execute(&self, context: &mut RequestContext) {
        let (Some(resource_info), Some(document_info), Some(path)) = (
            context.resource_info.clone(),
            context.document_info.clone(),
            context.path_components.clone(),
        ) else {
            return unprepared(context, "upsert");
        };
        debug!(trace_id = %context.trace_id(), resource = %resource_info.base.resource_name, "upsert");

        let result = self
            .store
            .upsert_document(UpsertRequest {
                resource_info,
                document_info,
                edfi_doc: context.parsed_body.clone(),
                trace_id: context.trace_id().clone(),
                document_uuid: DocumentUuid::new_random(),
            })
            .await;

        let trace_id = context.trace_id();
        let response = match result {
            UpsertResult::InsertSuccess { document_uuid } => {
                responses::created(location_of(&self.path_base, &path, &document_uuid))
            }
            UpsertResult::UpdateSuccess { document_uuid } => {
                responses::ok_with_location(location_of(&self.path_base, &path, &document_uuid))
            }
            UpsertResult::DescriptorReferenceFailure {
                invalid_descriptor_references,
            } => responses::descriptor_reference_failure(trace_id, &invalid_descriptor_references),
            UpsertResult::ReferenceFailure {
                invalid_resource_names,
            } => responses::reference_failure(trace_id, &invalid_resource_names),
            UpsertResult::IdentityConflict {
                resource_name,
                duplicate_identity_values,
            } => responses::identity_conflict(
                trace_id,
                409,
                &resource_name,
                &duplicate_identity_values,
            ),
            UpsertResult::WriteConflict => responses::write_conflict(),
            UpsertResult::UnknownFailure { failure_message } => {
                store_failure(context, "upsert", &failure_message);
                responses::unknown_failure(trace_id)
            }
        };
        context.response = Some(response);
    }
}

#[derive(Debug)]
pub struct UpdateByIdHandler {
    pub store: Arc<dyn DocumentStore>,
    pub path_base: String,
}

#[async_trait]
impl PipelineStep for UpdateByIdHandler {
    async fn execute(&self, context: &mut RequestContext) {
        let (Some(resource_info), Some(document_info), Some(path)) = (
            context.resource_info.clone(),
            context.document_info.clone(),
            context.path_components.clone(),
        ) else {
            return unprepared(context, "update");
        };
        let Some(document_uuid) = path.document_uuid else {
            return unprepared(context, "update");
        };
        debug!(trace_id = %context.trace_id(), %document_uuid, "update by id");

        let resource_name = resource_info.base.resource_name.clone();
        let result = self
            .store
            .update_document_by_id(UpdateRequest {
                document_uuid,
                resource_info,
                document_info,
                edfi_doc: context.parsed_body.clone(),
                trace_id: context.trace_id().clone(),
            })
            .await;

        let trace_id = context.trace_id();
        let response = match result {
            UpdateResult::Success { document_uuid } => {
                responses::no_content_with_location(location_of(&self.path_base, &path, &document_uuid))
            }
            UpdateResult::NotExists => responses::not_exists(),
            UpdateResult::DescriptorReferenceFailure {
                invalid_descriptor_references,
            } => responses::descriptor_reference_failure(trace_id, &invalid_descriptor_references),
            UpdateResult::ReferenceFailure {
                invalid_resource_names,
            } => responses::reference_failure(trace_id, &invalid_resource_names),
            UpdateResult::IdentityConflict {
                resource_name,
                duplicate_identity_values,
            } => responses::identity_conflict(
                trace_id,
                400,
                &resource_name,
                &duplicate_identity_values,
            ),
            UpdateResult::ImmutableIdentity { failure_message } => {
                debug!(trace_id = %trace_id, %failure_message, "identity change rejected");
                responses::immutable_identity(trace_id, &resource_name)
            }
            UpdateResult::CascadeRequired => responses::cascade_required(trace_id),
            UpdateResult::WriteConflict => responses::write_conflict(),
            UpdateResult::UnknownFailure { failure_message } => {
                store_failure(context, "update", &failure_message);
                responses::unknown_failure(trace_id)
            }
        };
        context.response = Some(response);
    }
}

#[derive(Debug)]
pub struct DeleteByIdHandler {
    pub store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl PipelineStep for DeleteByIdHandler {
    async fn execute(&self, context: &mut RequestContext) {
        let (Some(resource_info), Some(document_uuid)) = (
            context.resource_info.clone(),
            context.path_components.as_ref().and_then(|p| p.document_uuid),
        ) else {
            return unprepared(context, "delete");
        };
        debug!(trace_id = %context.trace_id(), %document_uuid, "delete by id");

        let result = self
            .store
            .delete_document_by_id(DeleteRequest {
                document_uuid,
                resource_info,
                trace_id: context.trace_id().clone(),
            })
            .await;

        let response = match result {
            DeleteResult::Success => responses::no_content(),
            DeleteResult::NotExists => responses::not_exists(),
            DeleteResult::ReferenceFailure {
                referencing_resource_names,
            } => responses::dependent_item_exists(context.trace_id(), &referencing_resource_names),
            DeleteResult::WriteConflict => responses::write_conflict(),
            DeleteResult::UnknownFailure { failure_message } => {
                store_failure(context, "delete", &failure_message);
                responses::unknown_failure(context.trace_id())
            }
        };
        context.response = Some(response);
    }
}

#[derive(Debug)]
pub struct QueryRequestHandler {
    pub query_handler: Arc<dyn QueryHandler>,
}

#[async_trait]
impl PipelineStep for QueryRequestHandler {
    async fn execute(&self, context: &mut RequestContext) {
        let Some(resource_info) = context.resource_info.clone() else {
            return unprepared(context, "query");
        };
        let pagination = context.pagination;
        debug!(
            trace_id = %context.trace_id(),
            terms = context.query_elements.len(),
            "query"
        );

        let result = self
            .query_handler
            .query_documents(QueryRequest {
                resource_info,
                query_elements: context.query_elements.clone(),
                pagination,
                trace_id: context.trace_id().clone(),
            })
            .await;

        let response = match result {
            QueryResult::Success {
                edfi_docs,
                total_count,
            } => {
                let response = responses::ok(Value::Array(edfi_docs));
                match total_count {
                    Some(total) if pagination.total_count => {
                        response.with_header("Total-Count", total.to_string())
                    }
                    _ => response,
                }
            }
            QueryResult::UnknownFailure { failure_message } => {
                store_failure(context, "query", &failure_message);
                responses::unknown_failure(context.trace_id())
            }
        };
        context.response = Some(response);
    }
}
