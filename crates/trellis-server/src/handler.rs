//! The application handler.
//!
//! [`ApplicationHandler`] owns the server chain of one application and runs
//! requests through it:
//!
//! ```text
//! http::Request
//!      |
//!      v
//! PreMatchFilteringStage -> RoutingStage -> RequestFilteringStage -> InvokingStage
//!      |
//!      v
//! http::Response
//! ```
//!
//! Providers are partitioned once, at build time. Executor providers choose
//! the executor pair; every other provider is a filter or interceptor,
//! either global or bound to resource methods by name.

use crate::executors::ServerExecutorsFactory;
use crate::filter::{FilterSet, ServerProvider};
use crate::model::{Resource, ResourceModel};
use crate::request::ContainerRequest;
use crate::response::ContainerResponse;
use crate::routing::RoutingStage;
use crate::stages::{InvokingStage, PreMatchFilteringStage, RequestFilteringStage};
use bytes::Bytes;
use http::HeaderValue;
use http_body_util::Full;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trellis_config::{ServerConfig, TrellisConfig};
use trellis_core::{ProcessingError, ProcessingResult, ProviderPartition};
use trellis_process::{Invocation, RequestInvoker, Stages};
use trellis_telemetry::Side;

/// Header carrying the request id on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

type ServerInvoker = RequestInvoker<ContainerRequest, ContainerResponse>;

/// Runs requests through the server chain of an application.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use http::{Method, StatusCode};
/// use trellis_core::ProcessingResult;
/// use trellis_process::Stages;
/// use trellis_server::{ApplicationHandler, ContainerRequest, ContainerResponse, Resource, ResourceMethod};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let get = ResourceMethod::builder(Method::GET)
///     .path("/{id}")
///     .build(Stages::inflector_fn(|request: ContainerRequest| async move {
///         let id = request.path_params().get("id").unwrap_or_default().to_string();
///         ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, id))
///     }))
///     .unwrap();
///
/// let handler = ApplicationHandler::builder()
///     .resource(Resource::new("/items").unwrap().method(get))
///     .build()
///     .unwrap();
///
/// let request = http::Request::get("/items/42").body(Bytes::new()).unwrap();
/// let response = handler.handle(request).await;
/// assert_eq!(response.status(), StatusCode::OK);
/// # });
/// ```
pub struct ApplicationHandler {
    invoker: RwLock<Option<ServerInvoker>>,
    model: Arc<ResourceModel>,
    providers: Mutex<Vec<Arc<dyn ServerProvider>>>,
    config: ServerConfig,
    closed: AtomicBool,
}

impl ApplicationHandler {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> ApplicationHandlerBuilder {
        ApplicationHandlerBuilder::default()
    }

    /// Starts processing a request.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::IllegalState`] after [`close`](Self::close).
    pub async fn apply(&self, request: ContainerRequest) -> ProcessingResult<Invocation<ContainerResponse>> {
        let invoker = self.invoker.read().clone().ok_or_else(closed)?;

        let mut request = request.with_base_path(&self.config.base_path);
        request.set_suspend_timeout(self.config.suspend_timeout_ms.map(Duration::from_millis));
        Ok(invoker.apply(request).await)
    }

    /// Processes a request and waits for its response.
    pub async fn invoke(&self, request: ContainerRequest) -> ProcessingResult<ContainerResponse> {
        self.apply(request).await?.outcome().await
    }

    /// Processes an `http` request.
    ///
    /// Never fails: errors become JSON error responses.
    pub async fn handle(&self, request: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let details = self.config.include_error_details;
        let request = match ContainerRequest::from_http(request) {
            Ok(request) => request,
            Err(error) => return ContainerResponse::from_error(&error, None, details).into_http(),
        };
        let request_id = request.request_id();

        let response = match self.invoke(request).await {
            Ok(response) => response,
            Err(error) => {
                if error.status_code().is_server_error() {
                    tracing::error!(request_id = %request_id, %error, "request failed");
                } else {
                    tracing::debug!(request_id = %request_id, %error, "request rejected");
                }
                ContainerResponse::from_error(&error, Some(request_id), details)
            }
        };

        let mut response = response.into_http();
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    /// Closes the handler.
    ///
    /// The first call releases the chain and the registered providers. Later
    /// calls do nothing.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let invoker = self.invoker.write().take();
        let providers = std::mem::take(&mut *self.providers.lock());
        drop(invoker);
        tracing::info!(providers = providers.len(), "application handler closed");
    }

    /// Returns `true` once [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns the resource model.
    #[must_use]
    pub fn model(&self) -> &Arc<ResourceModel> {
        &self.model
    }

    /// Returns the registered filter and interceptor providers.
    ///
    /// Empty after close.
    #[must_use]
    pub fn providers(&self) -> Vec<Arc<dyn ServerProvider>> {
        self.providers.lock().clone()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl fmt::Debug for ApplicationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationHandler")
            .field("resources", &self.model.resources().len())
            .field("providers", &self.providers.lock().len())
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn closed() -> ProcessingError {
    ProcessingError::illegal_state("Application handler has been closed.")
}

/// Builder for [`ApplicationHandler`].
#[derive(Default)]
pub struct ApplicationHandlerBuilder {
    config: TrellisConfig,
    providers: Vec<Arc<dyn ServerProvider>>,
    resources: Vec<Resource>,
}

impl ApplicationHandlerBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: TrellisConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a provider.
    #[must_use]
    pub fn register(mut self, provider: Arc<dyn ServerProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Adds a root resource.
    #[must_use]
    pub fn resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Builds the handler.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, or if it selects a runtime
    /// executor outside of a Tokio runtime.
    pub fn build(self) -> ProcessingResult<ApplicationHandler> {
        self.config.validate().map_err(|e| {
            ProcessingError::processing_with_source("Invalid server configuration", e)
        })?;

        let mut providers = self.providers;
        let configured = self.config.executors.provider().map_err(|e| {
            ProcessingError::processing_with_source("Invalid executor configuration", e)
        })?;
        if let Some(configured) = configured {
            providers.push(Arc::new(configured));
        }

        let (executor_providers, general) = ProviderPartition::partition(providers).into_parts();
        let executors = ServerExecutorsFactory::new(&executor_providers);

        let (name_bound, global): (Vec<_>, Vec<_>) = general
            .iter()
            .cloned()
            .partition(|provider| !provider.name_bindings().is_empty());

        let model = Arc::new(ResourceModel::new(self.resources, &name_bound));
        let mut global = FilterSet::from_providers(&global);
        let pre_matching = global.take_pre_matching();
        let global = Arc::new(global);

        let server = self.config.server;
        let routing = RoutingStage::new(model.clone())
            .with_response_filters(global.clone())
            .with_error_details(server.include_error_details);
        let root = Stages::chain(PreMatchFilteringStage::new(pre_matching, global.clone()))
            .to(routing)
            .to(RequestFilteringStage::new(global.clone()))
            .build(Arc::new(InvokingStage::new(global)));

        tracing::info!(
            resources = model.resources().len(),
            providers = general.len(),
            executors = ?executors.factory(),
            base_path = %server.base_path,
            "application handler built"
        );

        let invoker = RequestInvoker::builder(root)
            .executors(Arc::new(executors))
            .side(Side::Server)
            .build();

        Ok(ApplicationHandler {
            invoker: RwLock::new(Some(invoker)),
            model,
            providers: Mutex::new(general),
            config: server,
            closed: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceMethod;
    use http::{Method, StatusCode};

    fn handler() -> ApplicationHandler {
        let ping = ResourceMethod::builder(Method::GET)
            .build(Stages::inflector_fn(|_request: ContainerRequest| async {
                ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, "pong"))
            }))
            .unwrap();
        ApplicationHandler::builder()
            .resource(Resource::new("/ping").unwrap().method(ping))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_handle_sets_request_id_header() {
        let response = handler()
            .handle(http::Request::get("/ping").body(Bytes::new()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let handler = handler();
        handler.close();
        handler.close();
        assert!(handler.is_closed());

        let request = ContainerRequest::new(Method::GET, "/ping".parse().unwrap());
        let error = handler.apply(request).await.unwrap_err();
        assert!(error.is_illegal_state());
    }

    #[tokio::test]
    async fn test_closed_handler_responds_with_server_error() {
        let handler = handler();
        handler.close();
        let response = handler
            .handle(http::Request::get("/ping").body(Bytes::new()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = TrellisConfig::default();
        config.server.base_path = "api".to_string();
        let error = ApplicationHandler::builder().config(config).build().unwrap_err();
        assert!(error.to_string().contains("Invalid server configuration"));
    }
}
