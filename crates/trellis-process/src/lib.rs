//! # Trellis Process
//!
//! The staged request-processing pipeline shared by the Trellis client and
//! server.
//!
//! - [`stage`] - Stages, continuations and the chain builder
//! - [`completion`] - Invocation events and the completion channel
//! - [`scope`] - The task-local request scope
//! - [`context`] - Invocation context with suspend and resume
//! - [`executor`] - Executor pair selection
//! - [`invoker`] - Running one request through a chain
//!
//! ## Example
//!
//! ```
//! use trellis_process::{RequestInvoker, PipelineRequest, Stages};
//! use trellis_core::{ProcessingResult, RequestId};
//!
//! struct Greeting(RequestId, &'static str);
//!
//! impl PipelineRequest for Greeting {
//!     fn request_id(&self) -> RequestId {
//!         self.0
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let terminal = Stages::as_stage(Stages::inflector_fn(|greeting: Greeting| async move {
//!     ProcessingResult::Ok(format!("hello {}", greeting.1))
//! }));
//! let invoker = RequestInvoker::builder(Stages::chain(Stages::identity()).build(terminal)).build();
//!
//! let response = invoker.invoke(Greeting(RequestId::new(), "trellis")).await.unwrap();
//! assert_eq!(response, "hello trellis");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-process/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod completion;
pub mod context;
pub mod executor;
pub mod invoker;
pub mod scope;
pub mod stage;

pub use completion::{
    CancelSignal, Invocation, InvocationCallback, InvocationEvent, LifecycleEvent, Notifier,
    Responder,
};
pub use context::{AsyncResponse, InvocationContext, Suspension};
pub use executor::{ExecutorPolicy, ExecutorsFactory};
pub use invoker::{PipelineRequest, RequestInvoker, RequestInvokerBuilder};
pub use scope::RequestScope;
pub use stage::{
    BoxedInflector, BoxedStage, ChainBuilder, Continuation, FnInflector, FnStage, Inflector,
    Processed, Stage, Stages,
};
