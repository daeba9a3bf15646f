//! Client filters and client providers.
//!
//! Request filters run in ascending priority before the connector. Response
//! filters run in descending priority on the connector's response, and on
//! the response of a request filter that aborted.

use crate::request::{ClientRequest, ClientRequestHead};
use crate::response::ClientResponse;
use async_trait::async_trait;
use std::sync::Arc;
use trellis_core::{ProcessingResult, Provider};

/// Priority of client providers that do not declare one.
pub const DEFAULT_PRIORITY: i32 = 5000;

/// What a client request filter wants to happen next.
#[derive(Debug)]
pub enum ClientFilterAction {
    /// Continue with the next filter.
    Continue,
    /// Skip the connector and use this response.
    Abort(ClientResponse),
}

/// Filters outgoing requests.
#[async_trait]
pub trait ClientRequestFilter: Send + Sync {
    /// Inspects or modifies a request, or aborts it with a response.
    async fn filter(&self, request: &mut ClientRequest) -> ProcessingResult<ClientFilterAction>;
}

/// Filters incoming responses.
#[async_trait]
pub trait ClientResponseFilter: Send + Sync {
    /// Inspects or modifies a response.
    async fn filter(&self, request: &ClientRequestHead, response: &mut ClientResponse) -> ProcessingResult<()>;
}

/// A provider registered with a client.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use http::HeaderValue;
/// use trellis_client::{ClientFilterAction, ClientProvider, ClientRequest, ClientRequestFilter};
/// use trellis_core::{ProcessingResult, Provider};
///
/// struct BearerAuth(&'static str);
///
/// #[async_trait]
/// impl ClientRequestFilter for BearerAuth {
///     async fn filter(&self, request: &mut ClientRequest) -> ProcessingResult<ClientFilterAction> {
///         let value = HeaderValue::from_str(&format!("Bearer {}", self.0)).unwrap();
///         request.headers_mut().insert(http::header::AUTHORIZATION, value);
///         Ok(ClientFilterAction::Continue)
///     }
/// }
///
/// impl Provider for BearerAuth {
///     fn name(&self) -> &str {
///         "bearer-auth"
///     }
/// }
///
/// impl ClientProvider for BearerAuth {
///     fn as_client_request_filter(&self) -> Option<&dyn ClientRequestFilter> {
///         Some(self)
///     }
/// }
/// ```
pub trait ClientProvider: Provider {
    /// Exposes the request filter capability.
    fn as_client_request_filter(&self) -> Option<&dyn ClientRequestFilter> {
        None
    }

    /// Exposes the response filter capability.
    fn as_client_response_filter(&self) -> Option<&dyn ClientResponseFilter> {
        None
    }

    /// Returns the provider priority. Lower runs first on requests.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }
}

/// Client filters in execution order.
#[derive(Clone, Default)]
pub struct ClientFilters {
    request: Vec<Arc<dyn ClientProvider>>,
    response: Vec<Arc<dyn ClientProvider>>,
}

impl ClientFilters {
    /// Collects and orders the filters of `providers`.
    pub fn from_providers<'a>(providers: impl IntoIterator<Item = &'a Arc<dyn ClientProvider>>) -> Self {
        let mut filters = Self::default();
        for provider in providers {
            if provider.as_client_request_filter().is_some() {
                filters.request.push(provider.clone());
            }
            if provider.as_client_response_filter().is_some() {
                filters.response.push(provider.clone());
            }
        }
        filters.request.sort_by_key(|p| p.priority());
        filters.response.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        filters
    }

    /// Returns providers exposing a request filter, in execution order.
    #[must_use]
    pub fn request_filters(&self) -> &[Arc<dyn ClientProvider>] {
        &self.request
    }

    /// Returns providers exposing a response filter, in execution order.
    #[must_use]
    pub fn response_filters(&self) -> &[Arc<dyn ClientProvider>] {
        &self.response
    }

    pub(crate) async fn filter_request(&self, request: &mut ClientRequest) -> ProcessingResult<ClientFilterAction> {
        for provider in &self.request {
            if let Some(filter) = provider.as_client_request_filter() {
                if let ClientFilterAction::Abort(response) = filter.filter(request).await? {
                    tracing::debug!(
                        request_id = %request.request_id(),
                        provider = provider.name(),
                        status = response.status().as_u16(),
                        "client request aborted by filter"
                    );
                    return Ok(ClientFilterAction::Abort(response));
                }
            }
        }
        Ok(ClientFilterAction::Continue)
    }

    pub(crate) async fn filter_response(
        &self,
        head: &ClientRequestHead,
        response: &mut ClientResponse,
    ) -> ProcessingResult<()> {
        for provider in &self.response {
            if let Some(filter) = provider.as_client_response_filter() {
                filter.filter(head, response).await?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ClientFilters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |providers: &[Arc<dyn ClientProvider>]| {
            providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>()
        };
        f.debug_struct("ClientFilters")
            .field("request", &names(&self.request))
            .field("response", &names(&self.response))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, i32);

    #[async_trait]
    impl ClientRequestFilter for Named {
        async fn filter(&self, _request: &mut ClientRequest) -> ProcessingResult<ClientFilterAction> {
            Ok(ClientFilterAction::Continue)
        }
    }

    #[async_trait]
    impl ClientResponseFilter for Named {
        async fn filter(&self, _request: &ClientRequestHead, _response: &mut ClientResponse) -> ProcessingResult<()> {
            Ok(())
        }
    }

    impl Provider for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    impl ClientProvider for Named {
        fn as_client_request_filter(&self) -> Option<&dyn ClientRequestFilter> {
            Some(self)
        }

        fn as_client_response_filter(&self) -> Option<&dyn ClientResponseFilter> {
            Some(self)
        }

        fn priority(&self) -> i32 {
            self.1
        }
    }

    #[test]
    fn test_priority_order() {
        let providers: Vec<Arc<dyn ClientProvider>> = vec![
            Arc::new(Named("late", 300)),
            Arc::new(Named("early", 100)),
            Arc::new(Named("middle", 200)),
        ];
        let filters = ClientFilters::from_providers(&providers);

        let request: Vec<_> = filters.request_filters().iter().map(|p| p.name().to_string()).collect();
        let response: Vec<_> = filters.response_filters().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(request, ["early", "middle", "late"]);
        assert_eq!(response, ["late", "middle", "early"]);
    }

    #[test]
    fn test_providers_without_filters_are_skipped() {
        struct Plain;
        impl Provider for Plain {
            fn name(&self) -> &str {
                "plain"
            }
        }
        impl ClientProvider for Plain {}

        let providers: Vec<Arc<dyn ClientProvider>> = vec![Arc::new(Plain)];
        let filters = ClientFilters::from_providers(&providers);
        assert!(filters.request_filters().is_empty());
        assert!(filters.response_filters().is_empty());
    }
}
