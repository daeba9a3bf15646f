//! Executor selection for server requests.

use crate::filter::ServerProvider;
use crate::request::ContainerRequest;
use std::sync::Arc;
use trellis_config::ConfiguredExecutors;
use trellis_core::Executor;
use trellis_process::{ExecutorPolicy, ExecutorsFactory};

/// The executor pair of a server, bound to [`ContainerRequest`].
#[derive(Debug, Clone, Default)]
pub struct ServerExecutorsFactory {
    factory: ExecutorsFactory,
}

impl ServerExecutorsFactory {
    /// Selects the executor pair from the server's executor providers.
    #[must_use]
    pub fn new(executor_providers: &[Arc<dyn ServerProvider>]) -> Self {
        Self {
            factory: ExecutorsFactory::new(executor_providers),
        }
    }

    /// Returns the selected executor pair.
    #[must_use]
    pub fn factory(&self) -> &ExecutorsFactory {
        &self.factory
    }
}

impl ExecutorPolicy<ContainerRequest> for ServerExecutorsFactory {
    fn requesting_executor(&self, request: &ContainerRequest) -> Arc<dyn Executor> {
        let executor = self.factory.requesting().clone();
        tracing::trace!(
            request_id = %request.request_id(),
            executor = executor.name(),
            "requesting executor selected"
        );
        executor
    }

    fn responding_executor(&self, _request: &ContainerRequest) -> Arc<dyn Executor> {
        self.factory.responding().clone()
    }
}

impl ServerProvider for ConfiguredExecutors {}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use trellis_core::{InlineExecutor, Provider, RequestExecutorsProvider, RuntimeExecutor};

    struct Pooled;

    impl RequestExecutorsProvider for Pooled {
        fn requesting_executor(&self) -> Arc<dyn Executor> {
            Arc::new(RuntimeExecutor::new(tokio::runtime::Handle::current()))
        }
    }

    impl Provider for Pooled {
        fn name(&self) -> &str {
            "pooled"
        }

        fn as_request_executors(&self) -> Option<&dyn RequestExecutorsProvider> {
            Some(self)
        }
    }

    impl ServerProvider for Pooled {}

    #[test]
    fn test_defaults_to_inline() {
        let factory = ServerExecutorsFactory::default();
        let request = ContainerRequest::new(Method::GET, "/".parse().unwrap());
        assert_eq!(factory.requesting_executor(&request).name(), InlineExecutor.name());
        assert_eq!(factory.responding_executor(&request).name(), InlineExecutor.name());
    }

    #[tokio::test]
    async fn test_provider_selects_requesting_executor() {
        let providers: Vec<Arc<dyn ServerProvider>> = vec![Arc::new(Pooled)];
        let factory = ServerExecutorsFactory::new(&providers);
        let request = ContainerRequest::new(Method::GET, "/".parse().unwrap());

        assert_ne!(factory.requesting_executor(&request).name(), InlineExecutor.name());
        assert_eq!(factory.responding_executor(&request).name(), InlineExecutor.name());
    }
}
