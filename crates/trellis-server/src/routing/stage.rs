//! The routing stage.
//!
//! Routing matches the request path below the base path against the
//! resource model:
//!
//! 1. Root resources are tried from most to least specific template. The
//!    first one whose pattern matches is committed to: its match result,
//!    template, instance and left-hand path are pushed.
//! 2. The remaining path is matched against the resource methods. If a
//!    method template matches, the request method selects the method, or
//!    routing responds `405 Method Not Allowed` with an `Allow` header.
//! 3. Otherwise the remaining path is routed through the child resources.
//!
//! A request nothing matches is answered with `404 Not Found` and the chain
//! ends there. Both rejections pass through the global response filters.

use crate::filter::{self, FilterSet};
use crate::model::{Resource, ResourceMethod, ResourceModel};
use crate::request::ContainerRequest;
use crate::response::ContainerResponse;
use http::header::ALLOW;
use http::{HeaderValue, Method, StatusCode};
use std::sync::Arc;
use trellis_core::{BoxFuture, ProcessingError, ProcessingResult};
use trellis_process::{Continuation, Stage};

enum Routed {
    Matched,
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// Matches requests against a [`ResourceModel`].
#[derive(Debug, Clone)]
pub struct RoutingStage {
    model: Arc<ResourceModel>,
    response_filters: Arc<FilterSet>,
    include_error_details: bool,
}

impl RoutingStage {
    /// Creates a routing stage over `model`.
    #[must_use]
    pub fn new(model: Arc<ResourceModel>) -> Self {
        Self {
            model,
            response_filters: Arc::default(),
            include_error_details: false,
        }
    }

    /// Sets the filters run on `404`/`405` responses.
    #[must_use]
    pub fn with_response_filters(mut self, filters: Arc<FilterSet>) -> Self {
        self.response_filters = filters;
        self
    }

    /// Includes error details in the `404`/`405` envelopes.
    #[must_use]
    pub fn with_error_details(mut self, include: bool) -> Self {
        self.include_error_details = include;
        self
    }

    /// Returns the resource model.
    #[must_use]
    pub fn model(&self) -> &Arc<ResourceModel> {
        &self.model
    }

    fn route(&self, request: &mut ContainerRequest) -> ProcessingResult<Routed> {
        let Some(path) = request.relative_path().map(str::to_string) else {
            return Ok(Routed::NotFound);
        };
        route_resources(self.model.resources(), &path, request)
    }

    fn reject(&self, request: &ContainerRequest, error: &ProcessingError) -> ContainerResponse {
        tracing::debug!(
            request_id = %request.request_id(),
            method = %request.method(),
            path = request.uri().path(),
            status = error.status_code().as_u16(),
            "no resource method matched"
        );
        ContainerResponse::from_error(error, Some(request.request_id()), self.include_error_details)
    }
}

impl Stage<ContainerRequest, ContainerResponse> for RoutingStage {
    fn name(&self) -> &'static str {
        "routing"
    }

    fn apply(
        &self,
        mut request: ContainerRequest,
    ) -> BoxFuture<'_, ProcessingResult<Continuation<ContainerRequest, ContainerResponse>>> {
        Box::pin(async move {
            let mut response = match self.route(&mut request)? {
                Routed::Matched => return Ok(Continuation::Done(request)),
                Routed::NotFound => {
                    let error = ProcessingError::web_application(
                        StatusCode::NOT_FOUND,
                        format!("No resource matches {}", request.uri().path()),
                    );
                    self.reject(&request, &error)
                }
                Routed::MethodNotAllowed(allowed) => {
                    let error = ProcessingError::web_application(
                        StatusCode::METHOD_NOT_ALLOWED,
                        format!("Method {} is not allowed", request.method()),
                    );
                    let mut response = self.reject(&request, &error);
                    let allow = allowed
                        .iter()
                        .map(Method::as_str)
                        .collect::<Vec<_>>()
                        .join(", ");
                    if let Ok(value) = HeaderValue::from_str(&allow) {
                        response.headers_mut().insert(ALLOW, value);
                    }
                    response
                }
            };

            filter::filter_response(&self.response_filters, request.head(), &mut response).await?;
            Ok(Continuation::Respond(response))
        })
    }
}

fn route_resources(
    resources: &[Resource],
    path: &str,
    request: &mut ContainerRequest,
) -> ProcessingResult<Routed> {
    let Some((resource, result)) = resources
        .iter()
        .find_map(|resource| Some((resource, resource.pattern().match_path(path)?)))
    else {
        return Ok(Routed::NotFound);
    };

    let remaining = result.final_group().to_string();
    let routing = request.routing_mut();
    routing.push_match_result(result)?;
    routing.push_template(resource.pattern().template().clone())?;
    if let Some(instance) = resource.instance_handle() {
        routing.push_matched_resource(instance.clone())?;
    }
    routing.push_left_hand_path()?;

    let candidates = matching_methods(resource.methods(), &remaining);
    if !candidates.is_empty() {
        return select_method(&candidates, &remaining, request);
    }

    route_resources(resource.children(), &remaining, request)
}

/// Returns the methods sharing the most specific template matching `path`.
fn matching_methods<'a>(methods: &'a [ResourceMethod], path: &str) -> Vec<&'a ResourceMethod> {
    let Some(first) = methods
        .iter()
        .find(|method| method.pattern().match_path(path).is_some())
    else {
        return Vec::new();
    };

    let template = first.pattern().template();
    methods
        .iter()
        .filter(|method| method.pattern().template() == template)
        .collect()
}

fn select_method(
    candidates: &[&ResourceMethod],
    path: &str,
    request: &mut ContainerRequest,
) -> ProcessingResult<Routed> {
    let Some(method) = candidates
        .iter()
        .copied()
        .find(|method| method.info().http_method() == request.method())
    else {
        let allowed = candidates
            .iter()
            .map(|method| method.info().http_method().clone())
            .collect();
        return Ok(Routed::MethodNotAllowed(allowed));
    };

    let routing = request.routing_mut();
    if !method.pattern().template().is_empty() {
        if let Some(result) = method.pattern().match_path(path) {
            routing.push_match_result(result)?;
            routing.push_template(method.pattern().template().clone())?;
            routing.push_left_hand_path()?;
        }
    }
    routing.set_inflector(method);
    Ok(Routed::Matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{ResourceInfo, RoutingState};
    use trellis_process::Stages;

    fn text_method(http_method: Method, path: &str, body: &'static str) -> ResourceMethod {
        ResourceMethod::builder(http_method)
            .path(path)
            .build(Stages::inflector_fn(move |_request: ContainerRequest| async move {
                ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, body))
            }))
            .unwrap()
    }

    fn stage() -> RoutingStage {
        let items = Resource::new("/items")
            .unwrap()
            .named("items")
            .instance("catalog")
            .method(text_method(Method::GET, "", "list"))
            .method(text_method(Method::GET, "/{id}", "item"))
            .method(text_method(Method::DELETE, "/{id}", "deleted"))
            .child(
                Resource::new("/{id}/tags")
                    .unwrap()
                    .method(text_method(Method::GET, "", "tags")),
            );
        RoutingStage::new(Arc::new(ResourceModel::new(vec![items], &[])))
    }

    async fn route(method: Method, uri: &str) -> Continuation<ContainerRequest, ContainerResponse> {
        stage()
            .apply(ContainerRequest::new(method, uri.parse().unwrap()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_routes_sub_resource_method() {
        let Continuation::Done(request) = route(Method::GET, "/items/42").await else {
            panic!("expected a match");
        };

        let routing = request.routing();
        assert_eq!(routing.state(), RoutingState::Matched);
        assert_eq!(request.path_params().get("id"), Some("42"));
        assert_eq!(routing.matched_uris().collect::<Vec<_>>(), vec!["/items/42", "/items"]);
        assert_eq!(routing.peek_matched_resource_as::<&str>(), Some(&"catalog"));
        assert_eq!(routing.resource_name(), Some("items"));
        assert_eq!(routing.resource_method().unwrap().template().as_str(), "/{id}");
    }

    #[tokio::test]
    async fn test_routes_resource_method() {
        let Continuation::Done(request) = route(Method::GET, "/items/").await else {
            panic!("expected a match");
        };
        assert_eq!(request.routing().matched_results().len(), 1);
        assert!(request.routing().inflector().is_some());
    }

    #[tokio::test]
    async fn test_routes_child_resource() {
        let Continuation::Done(request) = route(Method::GET, "/items/7/tags").await else {
            panic!("expected a match");
        };
        assert_eq!(request.path_params().get("id"), Some("7"));
        assert_eq!(
            request.routing().matched_templates().map(|t| t.as_str()).collect::<Vec<_>>(),
            vec!["/{id}/tags", "/items"]
        );
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let Continuation::Respond(response) = route(Method::GET, "/other").await else {
            panic!("expected a response");
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unsupported_method_lists_allowed() {
        let Continuation::Respond(response) = route(Method::PUT, "/items/42").await else {
            panic!("expected a response");
        };
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, DELETE");
    }

    #[tokio::test]
    async fn test_request_outside_base_path_is_not_found() {
        let request = ContainerRequest::new(Method::GET, "/items/1".parse().unwrap()).with_base_path("/api");
        let Continuation::Respond(response) = stage().apply(request).await.unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
