//! # Trellis Core
//!
//! Core types shared by every layer of the Trellis dispatch engine:
//!
//! - [`ProcessingError`] - The error taxonomy used by stages, providers and invokers
//! - [`InvocationError`] - The single error family surfaced to client callers
//! - [`RequestId`] - UUID v7 request identifier for log correlation
//! - [`Properties`] - Typed per-request property bag
//! - [`Executor`] - Where a phase of request processing runs (inline or on a runtime)
//! - [`Provider`] - Structural capability model for registered providers

#![doc(html_root_url = "https://docs.rs/trellis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
pub mod executor;
pub mod provider;

pub use context::{Properties, RequestId};
pub use error::{ErrorEnvelope, InvocationError, ProcessingError, ProcessingResult};
pub use executor::{BoxFuture, Executor, InlineExecutor, RuntimeExecutor};
pub use provider::{
    Provider, ProviderPartition, RequestExecutorsProvider, ResponseExecutorsProvider,
};
