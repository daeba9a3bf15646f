//! End-to-end dispatch through the application handler.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, Method, StatusCode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trellis_config::{ExecutorKind, TrellisConfig};
use trellis_core::{ProcessingError, ProcessingResult, Provider};
use trellis_extract::{Annotations, StringReaderProviders, TypeCatalog, ENCODED};
use trellis_process::{InvocationContext, InvocationEvent, Stages};
use trellis_server::{
    ApplicationHandler, ContainerRequest, ContainerRequestFilter, ContainerResponse,
    ContainerResponseFilter, FilterAction, RequestHead, Resource, ResourceInfo, ResourceMethod,
    ServerProvider,
};

fn get(path: &str) -> ContainerRequest {
    ContainerRequest::new(Method::GET, path.parse().unwrap())
}

fn item_resource(calls: Arc<AtomicUsize>) -> Resource {
    let item = ResourceMethod::builder(Method::GET)
        .path("/{id}")
        .name("get_item")
        .build(Stages::inflector_fn(move |request: ContainerRequest| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let id = request.path_params().get("id").unwrap_or_default().to_string();
                ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, id))
            }
        }))
        .unwrap();
    Resource::new("/items").unwrap().named("items").method(item)
}

#[tokio::test]
async fn test_matching_path_reaches_inflector() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = ApplicationHandler::builder()
        .resource(item_resource(calls.clone()))
        .build()
        .unwrap();

    let response = handler.invoke(get("/items/42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.entity().as_ref(), b"42");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unmatched_path_short_circuits_with_not_found() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = ApplicationHandler::builder()
        .resource(item_resource(calls.clone()))
        .build()
        .unwrap();

    let response = handler.invoke(get("/other")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wrong_method_is_not_allowed() {
    let handler = ApplicationHandler::builder()
        .resource(item_resource(Arc::new(AtomicUsize::new(0))))
        .build()
        .unwrap();

    let request = ContainerRequest::new(Method::POST, "/items/1".parse().unwrap());
    let response = handler.invoke(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[ALLOW], "GET");
}

#[tokio::test]
async fn test_base_path_from_config() {
    let mut config = TrellisConfig::default();
    config.server.base_path = "/api".to_string();
    let handler = ApplicationHandler::builder()
        .config(config)
        .resource(item_resource(Arc::new(AtomicUsize::new(0))))
        .build()
        .unwrap();

    let response = handler.invoke(get("/api/items/7")).await.unwrap();
    assert_eq!(response.entity().as_ref(), b"7");

    let response = handler.invoke(get("/items/7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_handle_converts_errors_to_envelopes() {
    let failing = ResourceMethod::builder(Method::GET)
        .build(Stages::inflector_fn(|_request: ContainerRequest| async {
            Err::<ContainerResponse, _>(ProcessingError::web_application(
                StatusCode::CONFLICT,
                "already exists",
            ))
        }))
        .unwrap();
    let handler = ApplicationHandler::builder()
        .resource(Resource::new("/conflict").unwrap().method(failing))
        .build()
        .unwrap();

    let request = http::Request::get("/conflict").body(Bytes::new()).unwrap();
    let response = handler.handle(request).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn test_typed_query_parameter() {
    let providers = StringReaderProviders::new(Arc::new(TypeCatalog::with_defaults()));
    let limit = providers
        .parameter_extractor::<u32>("limit", &Annotations::new().default_value("10"))
        .unwrap();

    let list = ResourceMethod::builder(Method::GET)
        .build(Stages::inflector_fn(move |request: ContainerRequest| {
            let limit = limit.clone();
            async move {
                let value = limit.extract(request.query())?.unwrap_or_default();
                ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, value.to_string()))
            }
        }))
        .unwrap();
    let handler = ApplicationHandler::builder()
        .resource(Resource::new("/list").unwrap().method(list))
        .build()
        .unwrap();

    let response = handler.invoke(get("/list?limit=3")).await.unwrap();
    assert_eq!(response.entity().as_ref(), b"3");

    let response = handler.invoke(get("/list")).await.unwrap();
    assert_eq!(response.entity().as_ref(), b"10");

    let error = handler.invoke(get("/list?limit=many")).await.unwrap_err();
    assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
}

struct Audit {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ContainerRequestFilter for Audit {
    async fn filter(&self, request: &mut ContainerRequest) -> ProcessingResult<FilterAction> {
        let method = request.routing().resource_method().map(|m| m.name().to_string());
        self.seen.lock().push(method.unwrap_or_default());
        Ok(FilterAction::Continue)
    }
}

#[async_trait]
impl ContainerResponseFilter for Audit {
    async fn filter(&self, _head: &RequestHead, response: &mut ContainerResponse) -> ProcessingResult<()> {
        response
            .headers_mut()
            .insert("x-audited", HeaderValue::from_static("true"));
        Ok(())
    }
}

impl Provider for Audit {
    fn name(&self) -> &str {
        "audit"
    }
}

impl ServerProvider for Audit {
    fn as_request_filter(&self) -> Option<&dyn ContainerRequestFilter> {
        Some(self)
    }

    fn as_response_filter(&self) -> Option<&dyn ContainerResponseFilter> {
        Some(self)
    }

    fn name_bindings(&self) -> &[&'static str] {
        &["audited"]
    }
}

#[tokio::test]
async fn test_name_bound_filter_applies_to_bound_methods_only() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let secret = ResourceMethod::builder(Method::GET)
        .path("/secret")
        .name("secret")
        .name_binding("audited")
        .build(Stages::inflector_fn(|_request: ContainerRequest| async {
            ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, "s"))
        }))
        .unwrap();
    let public = ResourceMethod::builder(Method::GET)
        .path("/public")
        .build(Stages::inflector_fn(|_request: ContainerRequest| async {
            ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, "p"))
        }))
        .unwrap();

    let handler = ApplicationHandler::builder()
        .register(Arc::new(Audit { seen: seen.clone() }))
        .resource(Resource::new("/docs").unwrap().method(secret).method(public))
        .build()
        .unwrap();

    let response = handler.invoke(get("/docs/secret")).await.unwrap();
    assert_eq!(response.headers()["x-audited"], "true");

    let response = handler.invoke(get("/docs/public")).await.unwrap();
    assert!(!response.headers().contains_key("x-audited"));

    assert_eq!(*seen.lock(), vec!["secret".to_string()]);
}

struct Maintenance;

#[async_trait]
impl ContainerRequestFilter for Maintenance {
    async fn filter(&self, request: &mut ContainerRequest) -> ProcessingResult<FilterAction> {
        assert!(request.routing().peek_match_result().is_none());
        Ok(FilterAction::Abort(ContainerResponse::text(
            StatusCode::SERVICE_UNAVAILABLE,
            "maintenance",
        )))
    }
}

impl Provider for Maintenance {
    fn name(&self) -> &str {
        "maintenance"
    }
}

impl ServerProvider for Maintenance {
    fn as_request_filter(&self) -> Option<&dyn ContainerRequestFilter> {
        Some(self)
    }

    fn pre_matching(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn test_pre_matching_filter_aborts_before_routing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = ApplicationHandler::builder()
        .register(Arc::new(Maintenance))
        .resource(item_resource(calls.clone()))
        .build()
        .unwrap();

    let response = handler.invoke(get("/items/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_suspended_request_resumes() {
    let deferred = ResourceMethod::builder(Method::GET)
        .build(Stages::inflector_fn(|request: ContainerRequest| async move {
            let context = InvocationContext::current()
                .ok_or_else(|| ProcessingError::illegal_state("no invocation context"))?;
            let (resumer, suspension) = context.suspend::<String>(request.suspend_timeout())?;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                resumer.resume("later".to_string());
            });
            let body = suspension.await?;
            ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, body))
        }))
        .unwrap();

    let mut config = TrellisConfig::default();
    config.server.suspend_timeout_ms = Some(5_000);
    let handler = ApplicationHandler::builder()
        .config(config)
        .resource(Resource::new("/deferred").unwrap().method(deferred))
        .build()
        .unwrap();

    let mut invocation = handler.apply(get("/deferred")).await.unwrap();

    assert!(matches!(
        invocation.next_event().await,
        Some(InvocationEvent::Suspended { timeout: Some(t) }) if t == Duration::from_secs(5)
    ));
    assert!(matches!(invocation.next_event().await, Some(InvocationEvent::Resumed)));
    match invocation.next_event().await {
        Some(InvocationEvent::Completed(response)) => assert_eq!(response.entity().as_ref(), b"later"),
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(invocation.next_event().await.is_none());
}

#[tokio::test]
async fn test_suspend_timeout_is_service_unavailable() {
    let stalled = ResourceMethod::builder(Method::GET)
        .build(Stages::inflector_fn(|_request: ContainerRequest| async move {
            let context = InvocationContext::current()
                .ok_or_else(|| ProcessingError::illegal_state("no invocation context"))?;
            let (resumer, suspension) = context.suspend::<String>(Some(Duration::from_millis(10)))?;
            let body = suspension.await;
            drop(resumer);
            ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, body?))
        }))
        .unwrap();
    let handler = ApplicationHandler::builder()
        .resource(Resource::new("/stalled").unwrap().method(stalled))
        .build()
        .unwrap();

    let response = handler
        .handle(http::Request::get("/stalled").body(Bytes::new()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_request_fails_with_cancelled() {
    let started = Arc::new(tokio::sync::Notify::new());
    let notify = started.clone();
    let hanging = ResourceMethod::builder(Method::GET)
        .build(Stages::inflector_fn(move |_request: ContainerRequest| {
            let notify = notify.clone();
            async move {
                notify.notify_one();
                std::future::pending::<()>().await;
                ProcessingResult::Ok(ContainerResponse::ok())
            }
        }))
        .unwrap();

    let mut config = TrellisConfig::default();
    config.executors.requesting = ExecutorKind::Runtime;
    let handler = ApplicationHandler::builder()
        .config(config)
        .resource(Resource::new("/hanging").unwrap().method(hanging))
        .build()
        .unwrap();

    let mut invocation = handler.apply(get("/hanging")).await.unwrap();
    started.notified().await;
    invocation.cancel();

    assert!(matches!(invocation.next_event().await, Some(InvocationEvent::Cancelled)));
    assert!(matches!(
        invocation.next_event().await,
        Some(InvocationEvent::Failed(ProcessingError::Cancelled))
    ));
    assert!(invocation.next_event().await.is_none());
}

#[tokio::test]
async fn test_requests_after_close_fail() {
    let handler = ApplicationHandler::builder()
        .register(Arc::new(Maintenance))
        .resource(item_resource(Arc::new(AtomicUsize::new(0))))
        .build()
        .unwrap();
    assert_eq!(handler.providers().len(), 1);

    handler.close();
    handler.close();

    assert!(handler.providers().is_empty());
    assert!(handler.invoke(get("/items/1")).await.unwrap_err().is_illegal_state());
}

#[tokio::test]
async fn test_path_values_are_percent_decoded() {
    let handler = ApplicationHandler::builder()
        .resource(item_resource(Arc::new(AtomicUsize::new(0))))
        .build()
        .unwrap();

    let response = handler.invoke(get("/items/a%20b")).await.unwrap();
    assert_eq!(response.entity().as_ref(), b"a b");
}

#[tokio::test]
async fn test_encoded_marker_keeps_raw_values() {
    let providers = StringReaderProviders::new(Arc::new(TypeCatalog::with_defaults()));
    let decoded = providers
        .parameter_extractor::<String>("name", &Annotations::new())
        .unwrap();
    let raw = providers
        .parameter_extractor::<String>("name", &Annotations::new().marker(ENCODED))
        .unwrap();
    let raw_query = providers
        .parameter_extractor::<String>("q", &Annotations::new().marker(ENCODED))
        .unwrap();

    let show = ResourceMethod::builder(Method::GET)
        .path("/{name}")
        .build(Stages::inflector_fn(move |request: ContainerRequest| {
            let (decoded, raw, raw_query) = (decoded.clone(), raw.clone(), raw_query.clone());
            async move {
                let body = format!(
                    "{}|{}|{}",
                    request.extract_path(&decoded)?.unwrap_or_default(),
                    request.extract_path(&raw)?.unwrap_or_default(),
                    request.extract_query(&raw_query)?.unwrap_or_default(),
                );
                ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, body))
            }
        }))
        .unwrap();
    let handler = ApplicationHandler::builder()
        .resource(Resource::new("/files").unwrap().method(show))
        .build()
        .unwrap();

    let response = handler.invoke(get("/files/a%20b?q=x%2Fy")).await.unwrap();
    assert_eq!(response.entity().as_ref(), b"a b|a%20b|x%2Fy");
}

#[tokio::test]
async fn test_match_groups_reach_the_inflector() {
    let show = ResourceMethod::builder(Method::GET)
        .path("/{id}")
        .build(Stages::inflector_fn(|request: ContainerRequest| async move {
            let routing = request.routing();
            let result = routing
                .peek_match_result()
                .ok_or_else(|| ProcessingError::illegal_state("no match result"))?;
            let body = serde_json::json!({
                "group": result.group(1),
                "value": result.value("id"),
                "final": routing.final_matching_group(),
                "results": routing.matched_results().len(),
                "uris": routing.matched_uris().collect::<Vec<_>>(),
            });
            ContainerResponse::json(StatusCode::OK, &body)
        }))
        .unwrap();
    let handler = ApplicationHandler::builder()
        .resource(Resource::new("/items").unwrap().method(show))
        .build()
        .unwrap();

    let response = handler.invoke(get("/items/42")).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(response.entity()).unwrap();

    assert_eq!(body["group"], "42");
    assert_eq!(body["value"], "42");
    assert_eq!(body["final"], "");
    assert_eq!(body["results"], 2);
    assert_eq!(body["uris"], serde_json::json!(["/items/42", "/items"]));
}

struct Stamp;

#[async_trait]
impl ContainerResponseFilter for Stamp {
    async fn filter(&self, _head: &RequestHead, response: &mut ContainerResponse) -> ProcessingResult<()> {
        response
            .headers_mut()
            .insert("x-served-by", HeaderValue::from_static("trellis"));
        Ok(())
    }
}

impl Provider for Stamp {
    fn name(&self) -> &str {
        "stamp"
    }
}

impl ServerProvider for Stamp {
    fn as_response_filter(&self) -> Option<&dyn ContainerResponseFilter> {
        Some(self)
    }
}

#[tokio::test]
async fn test_global_response_filters_see_routing_rejections() {
    let handler = ApplicationHandler::builder()
        .register(Arc::new(Stamp))
        .resource(item_resource(Arc::new(AtomicUsize::new(0))))
        .build()
        .unwrap();

    let response = handler.invoke(get("/other")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-served-by"], "trellis");

    let request = ContainerRequest::new(Method::DELETE, "/items/1".parse().unwrap());
    let response = handler.invoke(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[ALLOW], "GET");
    assert_eq!(response.headers()["x-served-by"], "trellis");

    let response = handler.invoke(get("/items/1")).await.unwrap();
    assert_eq!(response.headers()["x-served-by"], "trellis");
}
