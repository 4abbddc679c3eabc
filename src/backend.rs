//! Boundary to the external document store and query handler.
//!
//! Storage engines implement these traits; the core never persists anything
//! itself. Results are closed sum types so every outcome has an explicit
//! mapping to a response.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::extraction::{DescriptorReference, DocumentInfo};
use crate::types::{DocumentUuid, ResourceInfo, TraceId};

/// Insert-or-update by identity.
#[derive(Debug, Clone)]
pub struct UpsertRequest {
    pub resource_info: ResourceInfo,
    pub document_info: DocumentInfo,
    pub edfi_doc: Value,
    pub trace_id: TraceId,
    /// Id to assign if the upsert turns out to be an insert.
    pub document_uuid: DocumentUuid,
}

#[derive(Debug, Clone)]
pub struct GetRequest {
    pub document_uuid: DocumentUuid,
    pub resource_info: ResourceInfo,
    pub trace_id: TraceId,
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub document_uuid: DocumentUuid,
    pub resource_info: ResourceInfo,
    pub document_info: DocumentInfo,
    pub edfi_doc: Value,
    pub trace_id: TraceId,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub document_uuid: DocumentUuid,
    pub resource_info: ResourceInfo,
    pub trace_id: TraceId,
}

/// Pagination parsed from `offset`, `limit` and `totalCount`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationParameters {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub total_count: bool,
}

/// One client query term matched to the document paths it filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryElement {
    pub query_field_name: String,
    pub document_paths: Vec<String>,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub resource_info: ResourceInfo,
    pub query_elements: Vec<QueryElement>,
    pub pagination: PaginationParameters,
    pub trace_id: TraceId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GetResult {
    Success {
        document_uuid: DocumentUuid,
        edfi_doc: Value,
    },
    NotExists,
    UnknownFailure {
        failure_message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertResult {
    InsertSuccess {
        document_uuid: DocumentUuid,
    },
    UpdateSuccess {
        document_uuid: DocumentUuid,
    },
    DescriptorReferenceFailure {
        invalid_descriptor_references: Vec<DescriptorReference>,
    },
    ReferenceFailure {
        /// Resource names of the references that do not resolve.
        invalid_resource_names: Vec<String>,
    },
    IdentityConflict {
        resource_name: String,
        duplicate_identity_values: Vec<(String, String)>,
    },
    WriteConflict,
    UnknownFailure {
        failure_message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateResult {
    Success {
        document_uuid: DocumentUuid,
    },
    NotExists,
    DescriptorReferenceFailure {
        invalid_descriptor_references: Vec<DescriptorReference>,
    },
    ReferenceFailure {
        invalid_resource_names: Vec<String>,
    },
    IdentityConflict {
        resource_name: String,
        duplicate_identity_values: Vec<(String, String)>,
    },
    ImmutableIdentity {
        failure_message: String,
    },
    CascadeRequired,
    WriteConflict,
    UnknownFailure {
        failure_message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteResult {
    Success,
    NotExists,
    ReferenceFailure {
        /// Resource names of the documents still referencing this one.
        referencing_resource_names: Vec<String>,
    },
    WriteConflict,
    UnknownFailure {
        failure_message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Success {
        edfi_docs: Vec<Value>,
        total_count: Option<u64>,
    },
    UnknownFailure {
        failure_message: String,
    },
}

/// Document persistence. Each call is the pipeline's single suspension point.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    async fn upsert_document(&self, request: UpsertRequest) -> UpsertResult;

    async fn get_document_by_id(&self, request: GetRequest) -> GetResult;

    async fn update_document_by_id(&self, request: UpdateRequest) -> UpdateResult;

    async fn delete_document_by_id(&self, request: DeleteRequest) -> DeleteResult;
}

/// Filtered, paginated reads.
#[async_trait]
pub trait QueryHandler: Send + Sync + fmt::Debug {
    async fn query_documents(&self, request: QueryRequest) -> QueryResult;
}
