//! The request invoker.
//!
//! [`RequestInvoker::apply`] runs one request through a built stage chain:
//!
//! 1. The requesting executor is chosen for the request and the chain is
//!    submitted to it.
//! 2. The chain runs inside a fresh request scope carrying the
//!    [`InvocationContext`]. If the caller cancels the invocation, the chain
//!    is dropped at its next await point.
//! 3. The outcome is handed to the responding executor, which delivers it
//!    over the completion channel.
//!
//! The returned [`Invocation`] observes exactly one terminal event.

use crate::completion::{self, CancelSignal, Invocation, LifecycleEvent, Responder};
use crate::context::InvocationContext;
use crate::executor::{ExecutorPolicy, ExecutorsFactory};
use crate::scope::RequestScope;
use crate::stage::{BoxedStage, Stages};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use trellis_core::{ProcessingError, ProcessingResult, RequestId};
use trellis_telemetry::{metrics, Outcome, Side};

/// A request that can be run through an invoker.
pub trait PipelineRequest: Send + 'static {
    /// Returns the id used to correlate logs and events.
    fn request_id(&self) -> RequestId;
}

/// Runs requests through a stage chain.
pub struct RequestInvoker<Req, Resp> {
    root: BoxedStage<Req, Resp>,
    executors: Arc<dyn ExecutorPolicy<Req>>,
    side: Side,
}

impl<Req, Resp> Clone for RequestInvoker<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            executors: self.executors.clone(),
            side: self.side,
        }
    }
}

impl<Req, Resp> RequestInvoker<Req, Resp>
where
    Req: PipelineRequest,
    Resp: Send + 'static,
{
    /// Creates a builder for an invoker running `root`.
    pub fn builder(root: BoxedStage<Req, Resp>) -> RequestInvokerBuilder<Req, Resp> {
        RequestInvokerBuilder {
            root,
            executors: None,
            side: Side::Server,
        }
    }

    /// Returns the pipeline side of this invoker.
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Runs `request` through the chain.
    ///
    /// The returned future resolves once the requesting phase was
    /// dispatched. With the inline executor that means the chain already ran.
    pub async fn apply(&self, request: Req) -> Invocation<Resp> {
        let request_id = request.request_id();
        let (responder, notifier, cancel, invocation) = completion::channel(request_id);

        let requesting = self.executors.requesting_executor(&request);
        let responding = self.executors.responding_executor(&request);
        let context = InvocationContext::new(request_id, self.side, notifier);

        tracing::debug!(
            request_id = %request_id,
            side = self.side.as_str(),
            executor = requesting.name(),
            "dispatching invocation"
        );

        let task = run(self.root.clone(), request, context, cancel, responder, responding);
        requesting.submit(Box::pin(task)).await;

        invocation
    }

    /// Runs `request` and waits for its outcome.
    pub async fn invoke(&self, request: Req) -> ProcessingResult<Resp> {
        self.apply(request).await.outcome().await
    }
}

impl<Req, Resp> fmt::Debug for RequestInvoker<Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInvoker")
            .field("root", &self.root.name())
            .field("side", &self.side)
            .finish_non_exhaustive()
    }
}

async fn run<Req, Resp>(
    root: BoxedStage<Req, Resp>,
    request: Req,
    context: InvocationContext,
    cancel: CancelSignal,
    responder: Responder<Resp>,
    responding: Arc<dyn trellis_core::Executor>,
) where
    Req: PipelineRequest,
    Resp: Send + 'static,
{
    let started = Instant::now();
    let side = context.side();
    let request_id = context.request_id();
    let scoped = context.clone();

    let outcome = tokio::select! {
        biased;

        () = cancel.cancelled() => {
            context.notify(LifecycleEvent::Cancelled);
            Err(ProcessingError::Cancelled)
        }
        responded = RequestScope::run(scoped, Stages::respond(root, request)) => responded,
    };

    let recorded = if outcome.is_ok() {
        Outcome::Completed
    } else {
        Outcome::Failed
    };
    metrics::record_outcome(side, recorded, started.elapsed());

    if let Err(error) = &outcome {
        tracing::debug!(request_id = %request_id, side = side.as_str(), %error, "invocation failed");
    }

    responding
        .submit(Box::pin(async move { responder.finish(outcome) }))
        .await;
}

/// Builder for [`RequestInvoker`].
pub struct RequestInvokerBuilder<Req, Resp> {
    root: BoxedStage<Req, Resp>,
    executors: Option<Arc<dyn ExecutorPolicy<Req>>>,
    side: Side,
}

impl<Req, Resp> RequestInvokerBuilder<Req, Resp>
where
    Req: PipelineRequest,
    Resp: Send + 'static,
{
    /// Sets the executor policy. Defaults to inline execution.
    pub fn executors(mut self, executors: Arc<dyn ExecutorPolicy<Req>>) -> Self {
        self.executors = Some(executors);
        self
    }

    /// Sets the pipeline side reported in logs and metrics.
    pub fn side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Builds the invoker.
    pub fn build(self) -> RequestInvoker<Req, Resp> {
        RequestInvoker {
            root: self.root,
            executors: self
                .executors
                .unwrap_or_else(|| Arc::new(ExecutorsFactory::inline())),
            side: self.side,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::InvocationEvent;
    use crate::stage::Continuation;
    use std::time::Duration;
    use trellis_core::RuntimeExecutor;

    #[derive(Debug)]
    struct Ping {
        id: RequestId,
        value: u32,
    }

    impl Ping {
        fn new(value: u32) -> Self {
            Self {
                id: RequestId::new(),
                value,
            }
        }
    }

    impl PipelineRequest for Ping {
        fn request_id(&self) -> RequestId {
            self.id
        }
    }

    fn doubling() -> BoxedStage<Ping, u32> {
        Stages::as_stage(Stages::inflector_fn(|ping: Ping| async move { Ok(ping.value * 2) }))
    }

    #[tokio::test]
    async fn test_success_fires_completed_once() {
        let invoker = RequestInvoker::builder(doubling()).build();
        let mut invocation = invoker.apply(Ping::new(21)).await;

        assert!(matches!(
            invocation.next_event().await,
            Some(InvocationEvent::Completed(42))
        ));
        assert!(invocation.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_after_inline_run_keeps_outcome() {
        let invoker = RequestInvoker::builder(doubling()).build();
        let mut invocation = invoker.apply(Ping::new(4)).await;
        invocation.cancel();

        assert!(matches!(
            invocation.next_event().await,
            Some(InvocationEvent::Completed(8))
        ));
        assert!(invocation.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_failure_fires_failed_once() {
        let failing = Stages::as_stage(Stages::inflector_fn(|_ping: Ping| async move {
            ProcessingResult::<u32>::Err(ProcessingError::processing("nope"))
        }));
        let invoker = RequestInvoker::builder(failing).build();
        let mut invocation = invoker.apply(Ping::new(1)).await;

        assert!(matches!(
            invocation.next_event().await,
            Some(InvocationEvent::Failed(ProcessingError::Processing { .. }))
        ));
        assert!(invocation.next_event().await.is_none());
    }

    async fn scoped_value(ping: Ping) -> ProcessingResult<u32> {
        let context = InvocationContext::current()
            .ok_or_else(|| ProcessingError::processing("no scope"))?;
        assert_eq!(context.request_id(), ping.id);
        Ok(1)
    }

    async fn suspended_value(ping: Ping) -> ProcessingResult<u32> {
        let context = InvocationContext::current()
            .ok_or_else(|| ProcessingError::processing("no scope"))?;
        let (resumer, suspension) = context.suspend::<u32>(Some(Duration::from_secs(5)))?;
        tokio::spawn(async move {
            resumer.resume(ping.value + 1);
        });
        suspension.await
    }

    #[tokio::test]
    async fn test_chain_runs_in_request_scope() {
        let invoker = RequestInvoker::builder(Stages::as_stage(Stages::inflector_fn(scoped_value)))
            .build();

        assert_eq!(invoker.invoke(Ping::new(0)).await.expect("scoped"), 1);
    }

    #[tokio::test]
    async fn test_suspend_resume_ordering() {
        let invoker =
            RequestInvoker::builder(Stages::as_stage(Stages::inflector_fn(suspended_value))).build();
        let mut invocation = invoker.apply(Ping::new(9)).await;

        let mut names = Vec::new();
        while let Some(event) = invocation.next_event().await {
            names.push(event.name());
        }
        assert_eq!(names, vec!["suspended", "resumed", "completed"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_surfaces_as_failure() {
        let stalled = Stages::as_stage(Stages::inflector_fn(|_ping: Ping| async move {
            std::future::pending::<()>().await;
            Ok(0u32)
        }));
        let runtime: Arc<dyn trellis_core::Executor> =
            Arc::new(RuntimeExecutor::try_current().expect("inside runtime"));
        let invoker = RequestInvoker::builder(stalled)
            .executors(Arc::new(ExecutorsFactory::from_pair(
                runtime.clone(),
                runtime,
            )))
            .build();

        let mut invocation = invoker.apply(Ping::new(0)).await;
        invocation.cancel();

        assert!(matches!(
            invocation.next_event().await,
            Some(InvocationEvent::Cancelled)
        ));
        assert!(matches!(
            invocation.next_event().await,
            Some(InvocationEvent::Failed(ProcessingError::Cancelled))
        ));
        assert!(invocation.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_exhausted_chain_fails() {
        let open = Stages::chain(Stages::stage_fn("pass", |ping: Ping| async move {
            ProcessingResult::<Continuation<Ping, u32>>::Ok(Continuation::Done(ping))
        }))
        .build_open();
        let invoker = RequestInvoker::builder(open).side(Side::Client).build();

        assert_eq!(invoker.side(), Side::Client);
        assert!(invoker.invoke(Ping::new(0)).await.is_err());
    }
}
