//! A client talking to an application handler through an in-process
//! connector.

use async_trait::async_trait;
use http::{Method, StatusCode};
use std::sync::Arc;
use trellis::prelude::*;

struct InProcess {
    handler: ApplicationHandler,
}

#[async_trait]
impl Connector for InProcess {
    fn name(&self) -> &str {
        "in-process"
    }

    async fn apply(&self, request: ClientRequest) -> ProcessingResult<ClientResponse> {
        let mut container = ContainerRequest::new(request.method().clone(), request.uri().clone());
        for (name, value) in request.headers() {
            container = container.with_header(name.clone(), value.clone());
        }
        if let Some(entity) = request.entity() {
            container = container.with_entity(entity.body().clone());
        }

        let mut response = self.handler.invoke(container).await?;
        let mut client = ClientResponse::new(response.status());
        client.headers_mut().extend(response.headers().clone());
        client.set_entity(response.take_entity());
        Ok(client)
    }

    fn close(&self) {
        self.handler.close();
    }
}

fn application() -> ApplicationHandler {
    let show = ResourceMethod::builder(Method::GET)
        .path("/{id}")
        .build(Stages::inflector_fn(|request: ContainerRequest| async move {
            let id = request.path_params().get("id").unwrap_or_default().to_string();
            ContainerResponse::json(StatusCode::OK, &serde_json::json!({ "id": id }))
        }))
        .unwrap();
    let create = ResourceMethod::builder(Method::POST)
        .build(Stages::inflector_fn(|request: ContainerRequest| async move {
            let body: serde_json::Value = request.json()?;
            ContainerResponse::json(StatusCode::CREATED, &body)
        }))
        .unwrap();

    ApplicationHandler::builder()
        .resource(Resource::new("/items").unwrap().method(show).method(create))
        .build()
        .unwrap()
}

fn client() -> (Client, Arc<InProcess>) {
    let connector = Arc::new(InProcess { handler: application() });
    let client = Client::builder().connector(connector.clone()).build().unwrap();
    (client, connector)
}

#[tokio::test]
async fn test_get_through_both_chains() {
    let (client, _) = client();
    let response = client
        .target("http://localhost/items")
        .unwrap()
        .path("7")
        .request()
        .accept(mime::APPLICATION_JSON)
        .get()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>().unwrap()["id"], "7");
}

#[tokio::test]
async fn test_post_link_with_entity() {
    let (client, _) = client();
    let link = Link::new("http://localhost/items")
        .method(Method::POST)
        .consumes(mime::APPLICATION_JSON)
        .produces(mime::APPLICATION_JSON);
    let entity = Entity::json(&serde_json::json!({"name": "widget"})).unwrap();

    let response = client.invocation_with_entity(&link, entity).unwrap().invoke().await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.json::<serde_json::Value>().unwrap()["name"], "widget");
}

#[tokio::test]
async fn test_unmatched_route_is_a_response() {
    let (client, _) = client();
    let response = client.target("http://localhost/other").unwrap().request().get().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_closing_client_closes_application() {
    let (client, connector) = client();
    client.close();
    assert!(connector.handler.is_closed());
}
