//! Filtering and invoking stages of the server chain.
//!
//! The server chain is:
//!
//! ```text
//! PreMatchFilteringStage -> RoutingStage -> RequestFilteringStage -> InvokingStage
//! ```
//!
//! A request filter that aborts ends the chain with its response after the
//! response filters ran on it.

use crate::filter::{self, FilterAction, FilterSet, ServerProvider};
use crate::request::ContainerRequest;
use crate::response::ContainerResponse;
use std::sync::Arc;
use trellis_core::{BoxFuture, ProcessingError, ProcessingResult};
use trellis_process::{Continuation, Stage};

type ServerContinuation = Continuation<ContainerRequest, ContainerResponse>;

async fn abort(
    response_filters: &FilterSet,
    request: &ContainerRequest,
    mut response: ContainerResponse,
) -> ProcessingResult<ServerContinuation> {
    filter::filter_response(response_filters, request.head(), &mut response).await?;
    Ok(Continuation::Respond(response))
}

/// Runs the global pre-matching request filters.
pub struct PreMatchFilteringStage {
    filters: Vec<Arc<dyn ServerProvider>>,
    global: Arc<FilterSet>,
}

impl PreMatchFilteringStage {
    /// Creates the stage. `global` supplies the response filters of aborted
    /// requests.
    #[must_use]
    pub fn new(filters: Vec<Arc<dyn ServerProvider>>, global: Arc<FilterSet>) -> Self {
        Self { filters, global }
    }
}

impl Stage<ContainerRequest, ContainerResponse> for PreMatchFilteringStage {
    fn name(&self) -> &'static str {
        "pre-match-filtering"
    }

    fn apply(&self, mut request: ContainerRequest) -> BoxFuture<'_, ProcessingResult<ServerContinuation>> {
        Box::pin(async move {
            match filter::filter_request(&self.filters, &mut request).await? {
                FilterAction::Continue => Ok(Continuation::Done(request)),
                FilterAction::Abort(response) => abort(&self.global, &request, response).await,
            }
        })
    }
}

/// Runs the global and bound request filters of the matched method.
pub struct RequestFilteringStage {
    global: Arc<FilterSet>,
}

impl RequestFilteringStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(global: Arc<FilterSet>) -> Self {
        Self { global }
    }
}

impl Stage<ContainerRequest, ContainerResponse> for RequestFilteringStage {
    fn name(&self) -> &'static str {
        "request-filtering"
    }

    fn apply(&self, mut request: ContainerRequest) -> BoxFuture<'_, ProcessingResult<ServerContinuation>> {
        Box::pin(async move {
            let filters = self.global.merged(request.routing().bindings());
            match filter::filter_request(filters.request_filters(), &mut request).await? {
                FilterAction::Continue => Ok(Continuation::Done(request)),
                FilterAction::Abort(response) => abort(&filters, &request, response).await,
            }
        })
    }
}

/// The terminal stage: applies the matched inflector.
///
/// Reader interceptors run on the request entity first. Response filters
/// and writer interceptors run on the response the inflector produced.
pub struct InvokingStage {
    global: Arc<FilterSet>,
}

impl InvokingStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(global: Arc<FilterSet>) -> Self {
        Self { global }
    }
}

impl Stage<ContainerRequest, ContainerResponse> for InvokingStage {
    fn name(&self) -> &'static str {
        "invoking"
    }

    fn apply(&self, mut request: ContainerRequest) -> BoxFuture<'_, ProcessingResult<ServerContinuation>> {
        Box::pin(async move {
            let Some(inflector) = request.routing().inflector().cloned() else {
                return Err(ProcessingError::illegal_state(
                    "No resource method was matched before invocation",
                ));
            };
            let filters = self.global.merged(request.routing().bindings());
            let head = request.head().clone();

            filter::intercept_read(filters.reader_interceptors(), &mut request)?;
            let mut response = inflector.apply(request).await?;
            filter::filter_response(&filters, &head, &mut response).await?;
            Ok(Continuation::Respond(response))
        })
    }
}
