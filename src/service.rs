//! The API service: pipelines per operation over a shared schema provider
//! and compiled schema cache.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::backend::{DocumentStore, QueryHandler};
use crate::compiled_cache::CompiledSchemaCache;
use crate::config::CoreConfig;
use crate::dependency::{calculate_dependencies, ResourceDependency};
use crate::error::{ApiSchemaError, DependencyError};
use crate::pipeline::{
    BuildResourceInfo, CoerceFromStrings, DeleteByIdHandler, ExtractDocumentInfo, FrontendRequest,
    FrontendResponse, GetByIdHandler, ParseBody, ParsePath, Pipeline, PipelineStep,
    QueryRequestHandler, RejectResourceIdentifier, RequestContext, UpdateByIdHandler,
    UpsertHandler, ValidateDocument, ValidateEqualityConstraint, ValidateMatchingDocumentUuids,
    ValidateQuery,
};
use crate::provider::ApiSchemaProvider;
use crate::types::RequestMethod;

#[derive(Debug)]
pub struct ApiService {
    provider: Arc<ApiSchemaProvider>,
    cache: Arc<CompiledSchemaCache>,
    config: Arc<CoreConfig>,
    upsert_pipeline: Pipeline,
    get_by_id_pipeline: Pipeline,
    query_pipeline: Pipeline,
    update_pipeline: Pipeline,
    delete_pipeline: Pipeline,
}

impl ApiService {
    pub fn new(
        provider: Arc<ApiSchemaProvider>,
        store: Arc<dyn DocumentStore>,
        query_handler: Arc<dyn QueryHandler>,
        config: CoreConfig,
    ) -> Self {
        let config = Arc::new(config);
        let cache = Arc::new(CompiledSchemaCache::new());

        let write_steps = |method: RequestMethod| -> Vec<Box<dyn PipelineStep>> {
            let mut steps: Vec<Box<dyn PipelineStep>> = vec![
                Box::new(ParsePath),
                Box::new(ParseBody {
                    mask_request_body_in_logs: config.mask_request_body_in_logs,
                }),
            ];
            if method == RequestMethod::Post {
                steps.push(Box::new(RejectResourceIdentifier));
            }
            steps.push(Box::new(CoerceFromStrings {
                bypass: config.bypass_string_type_coercion,
            }));
            steps.push(Box::new(ValidateDocument {
                cache: Arc::clone(&cache),
            }));
            if method == RequestMethod::Put {
                steps.push(Box::new(ValidateMatchingDocumentUuids));
            }
            steps.push(Box::new(ValidateEqualityConstraint));
            steps.push(Box::new(BuildResourceInfo {
                config: Arc::clone(&config),
            }));
            steps.push(Box::new(ExtractDocumentInfo));
            steps
        };

        let mut upsert_steps = write_steps(RequestMethod::Post);
        upsert_steps.push(Box::new(UpsertHandler {
            store: Arc::clone(&store),
            path_base: config.path_base.clone(),
        }));

        let mut update_steps = write_steps(RequestMethod::Put);
        update_steps.push(Box::new(UpdateByIdHandler {
            store: Arc::clone(&store),
            path_base: config.path_base.clone(),
        }));

        let get_by_id_pipeline = Pipeline::new(vec![
            Box::new(ParsePath),
            Box::new(BuildResourceInfo {
                config: Arc::clone(&config),
            }),
            Box::new(GetByIdHandler {
                store: Arc::clone(&store),
            }),
        ]);

        let query_pipeline = Pipeline::new(vec![
            Box::new(ParsePath),
            Box::new(ValidateQuery {
                maximum_page_size: config.maximum_page_size,
            }),
            Box::new(BuildResourceInfo {
                config: Arc::clone(&config),
            }),
            Box::new(QueryRequestHandler { query_handler }),
        ]);

        let delete_pipeline = Pipeline::new(vec![
            Box::new(ParsePath),
            Box::new(BuildResourceInfo {
                config: Arc::clone(&config),
            }),
            Box::new(DeleteByIdHandler { store }),
        ]);

        Self {
            provider,
            cache,
            upsert_pipeline: Pipeline::new(upsert_steps),
            get_by_id_pipeline,
            query_pipeline,
            update_pipeline: Pipeline::new(update_steps),
            delete_pipeline,
            config,
        }
    }

    pub fn provider(&self) -> &Arc<ApiSchemaProvider> {
        &self.provider
    }

    pub fn cache(&self) -> &Arc<CompiledSchemaCache> {
        &self.cache
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Compile validators for the active generation ahead of the first request.
    pub fn prime(&self) -> usize {
        let generation = self.provider.current();
        self.cache.prime(&generation.document, generation.reload_id)
    }

    fn context(&self, request: FrontendRequest) -> RequestContext {
        RequestContext::new(request, self.provider.current())
    }

    /// Dispatch by request method.
    pub async fn handle(&self, request: FrontendRequest) -> FrontendResponse {
        match request.method {
            RequestMethod::Post => self.upsert(request).await,
            RequestMethod::Get => self.get(request).await,
            RequestMethod::Put => self.update_by_id(request).await,
            RequestMethod::Delete => self.delete_by_id(request).await,
        }
    }

    pub async fn upsert(&self, request: FrontendRequest) -> FrontendResponse {
        self.upsert_pipeline.process(self.context(request)).await
    }

    /// Get by id when the path carries one, otherwise query.
    pub async fn get(&self, request: FrontendRequest) -> FrontendResponse {
        let by_id = request.path.trim_matches('/').split('/').count() == 3;
        let context = self.context(request);
        if by_id {
            self.get_by_id_pipeline.process(context).await
        } else {
            self.query_pipeline.process(context).await
        }
    }

    pub async fn update_by_id(&self, request: FrontendRequest) -> FrontendResponse {
        self.update_pipeline.process(self.context(request)).await
    }

    pub async fn delete_by_id(&self, request: FrontendRequest) -> FrontendResponse {
        self.delete_pipeline.process(self.context(request)).await
    }

    /// Load order of every resource in the active generation.
    pub fn get_dependencies(&self) -> Result<Vec<ResourceDependency>, DependencyError> {
        calculate_dependencies(&self.provider.current().document)
    }

    /// Validate and publish a new ApiSchema, then prime the cache for it.
    ///
    /// Returns the new reload id. An invalid schema leaves the current
    /// generation in service.
    pub fn reload_api_schema(&self, root: &Value) -> Result<u64, ApiSchemaError> {
        let generation = self.provider.reload(root)?;
        let primed = self.cache.prime(&generation.document, generation.reload_id);
        info!(reload_id = generation.reload_id, primed, "schema cache primed after reload");
        Ok(generation.reload_id)
    }

    /// Reload from a file path or URL.
    pub fn reload_api_schema_from_source(&self, source: &str) -> Result<u64, ApiSchemaError> {
        debug!(source, "reloading ApiSchema");
        let generation = self.provider.reload_from_source(source)?;
        self.cache.prime(&generation.document, generation.reload_id);
        Ok(generation.reload_id)
    }
}
