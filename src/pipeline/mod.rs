//! Request pipelines.
//!
//! A pipeline is an ordered list of steps over one [`RequestContext`]. The
//! first step that sets a response ends it; the last step of every pipeline
//! is a handler that calls the document store exactly once.

mod context;
mod handlers;
pub mod responses;
mod steps;

use std::fmt;

use async_trait::async_trait;
use tracing::error;

pub use context::{FrontendRequest, FrontendResponse, PathComponents, ProjectInfo, RequestContext};
pub use handlers::{
    DeleteByIdHandler, GetByIdHandler, QueryRequestHandler, UpdateByIdHandler, UpsertHandler,
};
pub use responses::FailureBody;
pub use steps::{
    BuildResourceInfo, CoerceFromStrings, ExtractDocumentInfo, ParseBody, ParsePath,
    RejectResourceIdentifier, ValidateDocument, ValidateEqualityConstraint,
    ValidateMatchingDocumentUuids, ValidateQuery,
};

/// One stage of request processing.
#[async_trait]
pub trait PipelineStep: Send + Sync + fmt::Debug {
    /// Advance the request, or end it by setting `context.response`.
    async fn execute(&self, context: &mut RequestContext);
}

#[derive(Debug, Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn PipelineStep>>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the steps in order until one produces a response.
    pub async fn run(&self, context: &mut RequestContext) {
        for step in &self.steps {
            step.execute(context).await;
            if context.response.is_some() {
                return;
            }
        }
    }

    /// Run to completion and take the response.
    ///
    /// A pipeline that ends without a response yields a 500.
    pub async fn process(&self, mut context: RequestContext) -> FrontendResponse {
        self.run(&mut context).await;
        match context.response.take() {
            Some(response) => response,
            None => {
                error!(trace_id = %context.trace_id(), "pipeline finished without a response");
                responses::unknown_failure(context.trace_id())
            }
        }
    }
}
