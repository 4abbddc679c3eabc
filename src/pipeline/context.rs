//! Per-request state shared by the steps of a pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::backend::{PaginationParameters, QueryElement};
use crate::extraction::DocumentInfo;
use crate::provider::SchemaGeneration;
use crate::resource_schema::ResourceSchema;
use crate::types::{DocumentUuid, RequestMethod, ResourceInfo, TraceId};

/// A request as handed over by the hosting layer.
#[derive(Debug, Clone)]
pub struct FrontendRequest {
    pub method: RequestMethod,
    /// Path below the base, e.g. `/ed-fi/schools/{uuid}`.
    pub path: String,
    pub body: Option<String>,
    pub query_parameters: BTreeMap<String, String>,
    pub trace_id: TraceId,
}

impl FrontendRequest {
    pub fn new(method: RequestMethod, path: impl Into<String>, trace_id: TraceId) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query_parameters: BTreeMap::new(),
            trace_id,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_parameters.insert(key.into(), value.into());
        self
    }
}

/// The response handed back to the hosting layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontendResponse {
    pub status_code: u16,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl FrontendResponse {
    pub fn new(status_code: u16, body: Option<Value>) -> Self {
        Self {
            status_code,
            body,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get("Location").map(String::as_str)
    }
}

/// Parsed `/{project}/{resource}[/{id}]` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathComponents {
    pub project_endpoint_name: String,
    pub endpoint_name: String,
    pub document_uuid: Option<DocumentUuid>,
}

/// The project a request addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub project_name: String,
    pub project_version: String,
}

/// Mutable state threaded through the steps.
///
/// A step that produces `response` ends the pipeline.
#[derive(Debug)]
pub struct RequestContext {
    pub frontend_request: FrontendRequest,
    /// Schema generation captured when the request started.
    pub generation: Arc<SchemaGeneration>,
    pub path_components: Option<PathComponents>,
    pub project: Option<ProjectInfo>,
    pub resource_schema: Option<Arc<ResourceSchema>>,
    pub parsed_body: Value,
    pub resource_info: Option<ResourceInfo>,
    pub document_info: Option<DocumentInfo>,
    pub pagination: PaginationParameters,
    pub query_elements: Vec<QueryElement>,
    pub response: Option<FrontendResponse>,
}

impl RequestContext {
    pub fn new(frontend_request: FrontendRequest, generation: Arc<SchemaGeneration>) -> Self {
        Self {
            frontend_request,
            generation,
            path_components: None,
            project: None,
            resource_schema: None,
            parsed_body: Value::Null,
            resource_info: None,
            document_info: None,
            pagination: PaginationParameters::default(),
            query_elements: Vec::new(),
            response: None,
        }
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.frontend_request.trace_id
    }

    pub fn method(&self) -> RequestMethod {
        self.frontend_request.method
    }
}
