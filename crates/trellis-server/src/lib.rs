//! # Trellis Server
//!
//! Server-side routing and dispatch.
//!
//! An application is a [`ResourceModel`]: a tree of [`Resource`]s whose
//! [`ResourceMethod`]s carry the inflectors producing responses. The
//! [`ApplicationHandler`] runs every request through a stage chain that
//! filters it, routes it through the model while recording progress in the
//! request's [`RoutingContext`], and invokes the matched method.
//!
//! ## Modules
//!
//! - [`request`] / [`response`] - Container request and response
//! - [`filter`] - Filters, interceptors and server providers
//! - [`model`] - Resources and resource methods
//! - [`routing`] - Routing context and the routing stage
//! - [`stages`] - Filtering and invoking stages
//! - [`executors`] - Executor selection for server requests
//! - [`handler`] - The application handler
//!
//! ## Example
//!
//! ```rust
//! use http::{Method, StatusCode};
//! use trellis_core::ProcessingResult;
//! use trellis_process::Stages;
//! use trellis_server::{ApplicationHandler, ContainerRequest, ContainerResponse, Resource, ResourceMethod};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let hello = ResourceMethod::builder(Method::GET)
//!     .build(Stages::inflector_fn(|_request: ContainerRequest| async {
//!         ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, "hello"))
//!     }))
//!     .unwrap();
//!
//! let handler = ApplicationHandler::builder()
//!     .resource(Resource::new("/hello").unwrap().method(hello))
//!     .build()
//!     .unwrap();
//!
//! let response = handler
//!     .invoke(ContainerRequest::new(Method::GET, "/hello".parse().unwrap()))
//!     .await
//!     .unwrap();
//! assert_eq!(response.entity().as_ref(), b"hello");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod executors;
pub mod filter;
pub mod handler;
pub mod model;
pub mod request;
pub mod response;
pub mod routing;
pub mod stages;

pub use executors::ServerExecutorsFactory;
pub use filter::{
    ContainerRequestFilter, ContainerResponseFilter, FilterAction, FilterSet, ReaderInterceptor,
    ServerProvider, WriterInterceptor, DEFAULT_PRIORITY,
};
pub use handler::{ApplicationHandler, ApplicationHandlerBuilder, REQUEST_ID_HEADER};
pub use model::{
    MethodInflector, Resource, ResourceHandle, ResourceMethod, ResourceMethodBuilder,
    ResourceMethodInfo, ResourceModel,
};
pub use request::{ContainerRequest, RequestHead};
pub use response::{ContainerResponse, INTERNAL_ERROR_MESSAGE};
pub use routing::{ResourceInfo, RoutingContext, RoutingStage, RoutingState};
pub use stages::{InvokingStage, PreMatchFilteringStage, RequestFilteringStage};
