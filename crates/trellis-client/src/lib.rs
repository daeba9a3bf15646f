//! # Trellis Client
//!
//! Client API over the staged pipeline.
//!
//! A [`Client`] owns a chain that prepares a request, runs the client
//! filters and hands the request to a [`Connector`]:
//!
//! ```text
//! InitializationStage -> ClientFilteringStage -> ConnectingStage (connector)
//! ```
//!
//! Requests are built from [`WebTarget`]s or from typed [`Link`]s. Every
//! failure reaching the caller is an [`InvocationError`](trellis_core::InvocationError).
//! Once closed, a client rejects every operation with an illegal-state error.
//!
//! ## Modules
//!
//! - [`entity`] - Entities, links and media type compatibility
//! - [`request`] / [`response`] - Client request and response
//! - [`connector`] - The transport seam
//! - [`filter`] - Client filters and providers
//! - [`stages`] - Stages of the client chain
//! - [`executors`] - Executor selection for client requests
//! - [`client`] - The client and its builder
//! - [`target`] - Targets, invocation builders and prepared invocations
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use http::StatusCode;
//! use trellis_client::{Client, ClientRequest, ClientResponse, Connector, Entity};
//! use trellis_core::ProcessingResult;
//!
//! struct Created;
//!
//! #[async_trait]
//! impl Connector for Created {
//!     fn name(&self) -> &str {
//!         "created"
//!     }
//!
//!     async fn apply(&self, request: ClientRequest) -> ProcessingResult<ClientResponse> {
//!         let body = request.entity().map(|e| e.body().clone()).unwrap_or_default();
//!         Ok(ClientResponse::new(StatusCode::CREATED).with_entity(body, &mime::APPLICATION_JSON))
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let client = Client::builder().connector(Arc::new(Created)).build().unwrap();
//! let entity = Entity::json(&serde_json::json!({"name": "widget"})).unwrap();
//!
//! let response = client.target("http://localhost/items").unwrap().request().post(entity).await.unwrap();
//! assert_eq!(response.status(), StatusCode::CREATED);
//! assert_eq!(response.json::<serde_json::Value>().unwrap()["name"], "widget");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-client/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod connector;
pub mod entity;
pub mod executors;
pub mod filter;
pub mod request;
pub mod response;
pub mod stages;
pub mod target;

pub use client::{Client, ClientBuilder};
pub use connector::Connector;
pub use entity::{is_compatible, Entity, Link};
pub use executors::ClientExecutorsFactory;
pub use filter::{
    ClientFilterAction, ClientFilters, ClientProvider, ClientRequestFilter, ClientResponseFilter,
    DEFAULT_PRIORITY,
};
pub use request::{ClientProperties, ClientRequest, ClientRequestHead};
pub use response::ClientResponse;
pub use stages::{ClientFilteringStage, ConnectingStage, InitializationStage};
pub use target::{InvocationBuilder, PreparedInvocation, WebTarget};
