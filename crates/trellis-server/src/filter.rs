//! Filters, interceptors and server providers.
//!
//! | Capability | Runs | Order |
//! |---|---|---|
//! | [`ContainerRequestFilter`] (pre-matching) | before routing | ascending priority |
//! | [`ContainerRequestFilter`] | after routing, before the resource method | ascending priority |
//! | [`ReaderInterceptor`] | on the request entity, before the resource method | ascending priority |
//! | [`ContainerResponseFilter`] | on the response | descending priority |
//! | [`WriterInterceptor`] | on the response entity, after response filters | ascending priority |
//!
//! A provider without name bindings applies to every request. A provider
//! with name bindings applies only to resource methods declaring one of
//! those names.

use crate::request::{ContainerRequest, RequestHead};
use crate::response::ContainerResponse;
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use std::sync::Arc;
use trellis_core::{Provider, ProcessingResult};

/// Priority of providers that do not declare one.
pub const DEFAULT_PRIORITY: i32 = 5000;

/// What a request filter wants to happen next.
#[derive(Debug)]
pub enum FilterAction {
    /// Continue with the next filter.
    Continue,
    /// Stop processing and respond.
    Abort(ContainerResponse),
}

/// Filters requests.
#[async_trait]
pub trait ContainerRequestFilter: Send + Sync {
    /// Inspects or modifies a request, or aborts it with a response.
    async fn filter(&self, request: &mut ContainerRequest) -> ProcessingResult<FilterAction>;
}

/// Filters responses.
#[async_trait]
pub trait ContainerResponseFilter: Send + Sync {
    /// Inspects or modifies a response.
    async fn filter(&self, request: &RequestHead, response: &mut ContainerResponse) -> ProcessingResult<()>;
}

/// Transforms a request entity before it is read.
pub trait ReaderInterceptor: Send + Sync {
    /// Returns the entity the resource method sees.
    fn around_read(&self, headers: &HeaderMap, entity: Bytes) -> ProcessingResult<Bytes>;
}

/// Transforms a response entity before it is written.
pub trait WriterInterceptor: Send + Sync {
    /// Returns the entity that is written.
    fn around_write(&self, headers: &mut HeaderMap, entity: Bytes) -> ProcessingResult<Bytes>;
}

/// A provider registered with a server.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use trellis_core::{Provider, ProcessingResult};
/// use trellis_server::{ContainerRequest, ContainerRequestFilter, FilterAction, ServerProvider};
///
/// struct Audit;
///
/// #[async_trait]
/// impl ContainerRequestFilter for Audit {
///     async fn filter(&self, request: &mut ContainerRequest) -> ProcessingResult<FilterAction> {
///         tracing::info!(method = %request.method(), "audited");
///         Ok(FilterAction::Continue)
///     }
/// }
///
/// impl Provider for Audit {
///     fn name(&self) -> &str {
///         "audit"
///     }
/// }
///
/// impl ServerProvider for Audit {
///     fn as_request_filter(&self) -> Option<&dyn ContainerRequestFilter> {
///         Some(self)
///     }
///
///     fn name_bindings(&self) -> &[&'static str] {
///         &["audited"]
///     }
/// }
/// ```
pub trait ServerProvider: Provider {
    /// Exposes the request filter capability.
    fn as_request_filter(&self) -> Option<&dyn ContainerRequestFilter> {
        None
    }

    /// Exposes the response filter capability.
    fn as_response_filter(&self) -> Option<&dyn ContainerResponseFilter> {
        None
    }

    /// Exposes the reader interceptor capability.
    fn as_reader_interceptor(&self) -> Option<&dyn ReaderInterceptor> {
        None
    }

    /// Exposes the writer interceptor capability.
    fn as_writer_interceptor(&self) -> Option<&dyn WriterInterceptor> {
        None
    }

    /// Names this provider is bound to. Empty means global.
    fn name_bindings(&self) -> &[&'static str] {
        &[]
    }

    /// Returns `true` for request filters that run before routing.
    fn pre_matching(&self) -> bool {
        false
    }

    /// Returns the provider priority. Lower runs first on requests.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }
}

/// Registered providers grouped by capability.
#[derive(Clone, Default)]
pub struct FilterSet {
    pub(crate) request_filters: Vec<Arc<dyn ServerProvider>>,
    pub(crate) response_filters: Vec<Arc<dyn ServerProvider>>,
    pub(crate) reader_interceptors: Vec<Arc<dyn ServerProvider>>,
    pub(crate) writer_interceptors: Vec<Arc<dyn ServerProvider>>,
}

impl FilterSet {
    /// Groups providers by capability and sorts every group by priority.
    pub fn from_providers<'a>(providers: impl IntoIterator<Item = &'a Arc<dyn ServerProvider>>) -> Self {
        let mut set = Self::default();
        for provider in providers {
            if provider.as_request_filter().is_some() {
                set.request_filters.push(provider.clone());
            }
            if provider.as_response_filter().is_some() {
                set.response_filters.push(provider.clone());
            }
            if provider.as_reader_interceptor().is_some() {
                set.reader_interceptors.push(provider.clone());
            }
            if provider.as_writer_interceptor().is_some() {
                set.writer_interceptors.push(provider.clone());
            }
        }
        set.sort();
        set
    }

    fn sort(&mut self) {
        self.request_filters.sort_by_key(|p| p.priority());
        self.response_filters.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        self.reader_interceptors.sort_by_key(|p| p.priority());
        self.writer_interceptors.sort_by_key(|p| p.priority());
    }

    /// Appends another set, keeping the priority order.
    pub(crate) fn merge(&mut self, other: &Self) {
        self.request_filters.extend(other.request_filters.iter().cloned());
        self.response_filters.extend(other.response_filters.iter().cloned());
        self.reader_interceptors.extend(other.reader_interceptors.iter().cloned());
        self.writer_interceptors.extend(other.writer_interceptors.iter().cloned());
        self.sort();
    }

    /// Returns a copy of this set extended with `other`.
    pub(crate) fn merged(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// Removes the pre-matching request filters and returns them in order.
    pub(crate) fn take_pre_matching(&mut self) -> Vec<Arc<dyn ServerProvider>> {
        let (pre, post): (Vec<_>, Vec<_>) = std::mem::take(&mut self.request_filters)
            .into_iter()
            .partition(|provider| provider.pre_matching());
        self.request_filters = post;
        pre
    }

    /// Returns providers exposing a request filter.
    #[must_use]
    pub fn request_filters(&self) -> &[Arc<dyn ServerProvider>] {
        &self.request_filters
    }

    /// Returns providers exposing a response filter.
    #[must_use]
    pub fn response_filters(&self) -> &[Arc<dyn ServerProvider>] {
        &self.response_filters
    }

    /// Returns providers exposing a reader interceptor.
    #[must_use]
    pub fn reader_interceptors(&self) -> &[Arc<dyn ServerProvider>] {
        &self.reader_interceptors
    }

    /// Returns providers exposing a writer interceptor.
    #[must_use]
    pub fn writer_interceptors(&self) -> &[Arc<dyn ServerProvider>] {
        &self.writer_interceptors
    }

    /// Returns `true` if the set holds no provider.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.request_filters.is_empty()
            && self.response_filters.is_empty()
            && self.reader_interceptors.is_empty()
            && self.writer_interceptors.is_empty()
    }
}

impl std::fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |providers: &[Arc<dyn ServerProvider>]| {
            providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>()
        };
        f.debug_struct("FilterSet")
            .field("request_filters", &names(&self.request_filters))
            .field("response_filters", &names(&self.response_filters))
            .field("reader_interceptors", &names(&self.reader_interceptors))
            .field("writer_interceptors", &names(&self.writer_interceptors))
            .finish()
    }
}

/// Runs request filters in order until one aborts.
pub(crate) async fn filter_request(
    providers: &[Arc<dyn ServerProvider>],
    request: &mut ContainerRequest,
) -> ProcessingResult<FilterAction> {
    for provider in providers {
        if let Some(filter) = provider.as_request_filter() {
            if let FilterAction::Abort(response) = filter.filter(request).await? {
                tracing::debug!(
                    request_id = %request.request_id(),
                    provider = provider.name(),
                    status = response.status().as_u16(),
                    "request aborted by filter"
                );
                return Ok(FilterAction::Abort(response));
            }
        }
    }
    Ok(FilterAction::Continue)
}

/// Runs response filters and then writer interceptors.
pub(crate) async fn filter_response(
    filters: &FilterSet,
    head: &RequestHead,
    response: &mut ContainerResponse,
) -> ProcessingResult<()> {
    for provider in &filters.response_filters {
        if let Some(filter) = provider.as_response_filter() {
            filter.filter(head, response).await?;
        }
    }

    if !filters.writer_interceptors.is_empty() {
        let mut entity = response.take_entity();
        for provider in &filters.writer_interceptors {
            if let Some(interceptor) = provider.as_writer_interceptor() {
                entity = interceptor.around_write(response.headers_mut(), entity)?;
            }
        }
        response.set_entity(entity);
    }
    Ok(())
}

/// Runs reader interceptors over the request entity.
pub(crate) fn intercept_read(
    providers: &[Arc<dyn ServerProvider>],
    request: &mut ContainerRequest,
) -> ProcessingResult<()> {
    if providers.is_empty() {
        return Ok(());
    }

    let mut entity = request.take_entity();
    for provider in providers {
        if let Some(interceptor) = provider.as_reader_interceptor() {
            entity = interceptor.around_read(request.headers(), entity)?;
        }
    }
    request.set_entity(entity);
    Ok(())
}
