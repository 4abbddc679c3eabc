//! DMS Core
//!
//! Request-processing core of a schema-driven document API.
//!
//! An ApiSchema describes every resource: its JSON shape, identity fields,
//! references to other resources and equality constraints. From it this
//! library validates and normalizes incoming documents, derives
//! deterministic identities and referential ids, orders resources by their
//! dependencies, and runs CRUD requests through step pipelines against an
//! external [`DocumentStore`].
//!
//! # Example
//!
//! ```
//! use dms_core::{compute_referential_id, BaseResourceInfo, DocumentIdentity, DocumentIdentityElement};
//!
//! let school = BaseResourceInfo::new("Ed-Fi", "School", false);
//! let identity = DocumentIdentity::new(vec![DocumentIdentityElement::new("$.schoolId", "255901")]);
//!
//! // Same resource, same identity: same id, on every run and every machine.
//! assert_eq!(
//!     compute_referential_id(&school, &identity),
//!     compute_referential_id(&school, &identity)
//! );
//! ```
//!
//! # Request flow
//!
//! | Method | Steps |
//! |--------|-------|
//! | POST | path, body, reject `id`, coerce, validate, equality, resource info, document info, upsert |
//! | PUT | path, body, coerce, validate, matching ids, equality, resource info, document info, update |
//! | GET | path, resource info, get by id; or path, query, resource info, query |
//! | DELETE | path, resource info, delete by id |

mod api_schema;
mod backend;
mod coercion;
mod compiled_cache;
mod config;
mod dependency;
mod equality;
mod error;
mod extraction;
mod identity;
mod json_path;
mod linter;
mod loader;
pub mod pipeline;
mod provider;
mod resource_schema;
mod service;
mod types;
mod validator;

pub use api_schema::{ApiSchemaDocument, ProjectSchema};
pub use backend::{
    DeleteRequest, DeleteResult, DocumentStore, GetRequest, GetResult, PaginationParameters,
    QueryElement, QueryHandler, QueryRequest, QueryResult, UpdateRequest, UpdateResult,
    UpsertRequest, UpsertResult,
};
pub use coercion::coerce_from_strings;
pub use compiled_cache::{CacheKey, CompiledSchema, CompiledSchemaCache};
pub use config::CoreConfig;
pub use dependency::{
    build_dependency_graph, calculate_dependencies, order_resources, DependencyGraph,
    ResourceDependency, DEPENDENCY_OPERATIONS,
};
pub use equality::validate_equality_constraints;
pub use error::{
    ApiSchemaError, ConfigError, DependencyError, ExtractionError, LoadError, SchemaError,
};
pub use extraction::{
    extract_descriptor_references, extract_document_info, extract_document_references,
    DescriptorReference, DocumentInfo, DocumentReference,
};
pub use identity::{
    compute_document_identity, compute_referential_id, compute_superclass_identity,
    descriptor_identity, referential_id_name, DocumentIdentity, DocumentIdentityElement,
    ReferentialId, SuperclassIdentity, DESCRIPTOR_IDENTITY_PATH, REFERENTIAL_ID_NAMESPACE,
    SCHOOL_YEAR_IDENTITY_PATH,
};
pub use json_path::JsonPath;
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{is_url, load_json, load_json_auto, load_json_str};
#[cfg(feature = "remote")]
pub use loader::load_json_url;
pub use pipeline::{FrontendRequest, FrontendResponse};
pub use provider::{ApiSchemaProvider, SchemaGeneration};
pub use resource_schema::{
    DecimalValidationInfo, DocumentPath, EqualityConstraint, QueryFieldPath, ReferenceJsonPaths,
    ResourceSchema, Superclass,
};
pub use service::ApiService;
pub use types::{
    json_type_name, BaseResourceInfo, DocumentUuid, RequestMethod, ResourceInfo, TraceId,
};
pub use validator::{
    decimal_bound, merge_errors, to_schema_errors, validate_decimals, validate_document,
    DocumentValidation, PruneReport, ValidationErrors, TRIMMABLE_FIELDS,
};
