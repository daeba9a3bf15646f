//! # Trellis
//!
//! **A staged REST dispatch engine**
//!
//! Trellis runs every request, client or server, through a chain of stages:
//!
//! - **Staged processing** – stages either pass a request on, hand it to the
//!   next stage they pick, or answer it
//! - **Routing** – URI templates matched against a resource model, with
//!   every step recorded in a per-request routing context
//! - **Parameter extraction** – string parameters coerced into typed values
//!   through a fixed list of conversion strategies
//! - **Filters** – request and response filters, reader and writer
//!   interceptors, global or bound by name
//! - **Invocation lifecycle** – completion, failure, cancellation and
//!   suspend/resume events, on selectable executors
//!
//! ## Architecture
//!
//! ```text
//! Server: PreMatchFiltering → Routing → RequestFiltering → Invoking
//! Client: Initialization → ClientFiltering → Connecting (connector)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis::prelude::*;
//! use http::{Method, StatusCode};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let greet = ResourceMethod::builder(Method::GET)
//!     .path("/{name}")
//!     .build(Stages::inflector_fn(|request: ContainerRequest| async move {
//!         let name = request.path_params().get("name").unwrap_or_default().to_string();
//!         ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, format!("hello {name}")))
//!     }))
//!     .unwrap();
//!
//! let handler = ApplicationHandler::builder()
//!     .resource(Resource::new("/greet").unwrap().method(greet))
//!     .build()
//!     .unwrap();
//!
//! let response = handler
//!     .invoke(ContainerRequest::new(Method::GET, "/greet/ada".parse().unwrap()))
//!     .await
//!     .unwrap();
//! assert_eq!(response.entity().as_ref(), b"hello ada");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/trellis/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use trellis_core as core;

// Re-export the stage pipeline
pub use trellis_process as process;

// Re-export URI templates and matching
pub use trellis_router as router;

// Re-export parameter extraction
pub use trellis_extract as extract;

// Re-export the server
pub use trellis_server as server;

// Re-export the client
pub use trellis_client as client;

// Re-export configuration
pub use trellis_config as config;

// Re-export logging and metrics
pub use trellis_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use trellis::prelude::*;
///
/// let config = TrellisConfig::default();
/// assert!(config.validate().is_ok());
/// ```
pub mod prelude {
    pub use trellis_core::{
        InvocationError, ProcessingError, ProcessingResult, Properties, Provider, RequestId,
    };

    pub use trellis_process::{
        Continuation, Inflector, Invocation, InvocationCallback, InvocationContext, InvocationEvent,
        Stage, Stages,
    };

    pub use trellis_router::{MatchResult, PathPattern, UriTemplate};

    pub use trellis_extract::{Annotations, MultivaluedMap, StringReaderProviders, TypeCatalog};

    pub use trellis_server::{
        ApplicationHandler, ContainerRequest, ContainerRequestFilter, ContainerResponse,
        ContainerResponseFilter, FilterAction, Resource, ResourceMethod, RoutingContext,
        ServerProvider,
    };

    pub use trellis_client::{
        Client, ClientFilterAction, ClientProvider, ClientRequest, ClientRequestFilter,
        ClientResponse, ClientResponseFilter, Connector, Entity, Link, WebTarget,
    };

    pub use trellis_config::{ConfigLoader, TrellisConfig};

    pub use trellis_telemetry::{init_logging, LogConfig, Side};
}
