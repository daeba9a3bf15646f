//! Executor selection for client requests.

use crate::filter::ClientProvider;
use crate::request::ClientRequest;
use std::sync::Arc;
use trellis_config::ConfiguredExecutors;
use trellis_core::Executor;
use trellis_process::{ExecutorPolicy, ExecutorsFactory};

/// The executor pair of a client, bound to [`ClientRequest`].
#[derive(Debug, Clone, Default)]
pub struct ClientExecutorsFactory {
    factory: ExecutorsFactory,
}

impl ClientExecutorsFactory {
    /// Selects the executor pair from the client's executor providers.
    #[must_use]
    pub fn new(executor_providers: &[Arc<dyn ClientProvider>]) -> Self {
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

impl ExecutorPolicy<ClientRequest> for ClientExecutorsFactory {
    fn requesting_executor(&self, request: &ClientRequest) -> Arc<dyn Executor> {
        let executor = self.factory.requesting().clone();
        tracing::trace!(
            request_id = %request.request_id(),
            uri = %request.uri(),
            executor = executor.name(),
            "client executor selected"
        );
        executor
    }

    fn responding_executor(&self, _request: &ClientRequest) -> Arc<dyn Executor> {
        self.factory.responding().clone()
    }
}

impl ClientProvider for ConfiguredExecutors {}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use trellis_config::{ExecutorKind, ExecutorsConfig};
    use trellis_core::{InlineExecutor, Provider};

    #[test]
    fn test_defaults_to_inline() {
        let factory = ClientExecutorsFactory::default();
        let request = ClientRequest::new(Method::GET, "http://localhost/".parse().unwrap());
        assert_eq!(factory.requesting_executor(&request).name(), InlineExecutor.name());
    }

    #[tokio::test]
    async fn test_configured_responding_executor() {
        let config = ExecutorsConfig {
            responding: ExecutorKind::Runtime,
            ..ExecutorsConfig::default()
        };
        let configured = config.provider().unwrap().unwrap();
        assert!(configured.is_executor_provider());

        let providers: Vec<Arc<dyn ClientProvider>> = vec![Arc::new(configured)];
        let factory = ClientExecutorsFactory::new(&providers);
        let request = ClientRequest::new(Method::GET, "http://localhost/".parse().unwrap());

        assert_eq!(factory.requesting_executor(&request).name(), InlineExecutor.name());
        assert_ne!(factory.responding_executor(&request).name(), InlineExecutor.name());
    }
}
