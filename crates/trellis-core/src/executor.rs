//! Executors decide where a phase of request processing runs.
//!
//! The pipeline splits every invocation into a *requesting* phase (running
//! the stage chain) and a *responding* phase (delivering the outcome). Each
//! phase is handed to an [`Executor`] as a boxed task:
//!
//! - [`InlineExecutor`] runs the task on the caller's own task, so submitting
//!   completes only after the task finished. No extra concurrency is added.
//! - [`RuntimeExecutor`] spawns the task onto a Tokio runtime and returns as
//!   soon as it has been handed over.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tokio::runtime::Handle;

/// A boxed future, used for stage and executor tasks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs submitted tasks.
///
/// The future returned by [`submit`](Executor::submit) resolves once the task
/// has been dispatched. For an inline executor dispatching means running the
/// task to completion.
pub trait Executor: Send + Sync + fmt::Debug + 'static {
    /// Returns the executor name used in logs.
    fn name(&self) -> &'static str;

    /// Dispatches a task.
    fn submit(&self, task: BoxFuture<'static, ()>) -> BoxFuture<'static, ()>;
}

/// Executes tasks synchronously on the submitting task.
///
/// This is the default for both the requesting and the responding phase.
///
/// # Example
///
/// ```
/// use trellis_core::{Executor, InlineExecutor};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// # tokio_test_block_on(async {
/// let ran = Arc::new(AtomicBool::new(false));
/// let flag = ran.clone();
/// InlineExecutor.submit(Box::pin(async move { flag.store(true, Ordering::SeqCst) })).await;
/// assert!(ran.load(Ordering::SeqCst));
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn submit(&self, task: BoxFuture<'static, ()>) -> BoxFuture<'static, ()> {
        task
    }
}

/// Executes tasks on a Tokio runtime.
#[derive(Debug, Clone)]
pub struct RuntimeExecutor {
    handle: Handle,
}

impl RuntimeExecutor {
    /// Creates an executor spawning onto the given runtime.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Creates an executor for the runtime the caller is running in.
    ///
    /// Returns `None` outside of a Tokio runtime.
    #[must_use]
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Returns the runtime handle.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Executor for RuntimeExecutor {
    fn name(&self) -> &'static str {
        "runtime"
    }

    fn submit(&self, task: BoxFuture<'static, ()>) -> BoxFuture<'static, ()> {
        drop(self.handle.spawn(task));
        Box::pin(async {})
    }
}
