//! Invocation context and asynchronous suspension.
//!
//! A stage that cannot produce its result right away suspends the invocation:
//!
//! ```
//! use std::time::Duration;
//! use trellis_process::InvocationContext;
//! use trellis_core::ProcessingResult;
//!
//! async fn lookup(context: InvocationContext) -> ProcessingResult<String> {
//!     let (resumer, suspension) = context.suspend::<String>(Some(Duration::from_secs(5)))?;
//!
//!     tokio::spawn(async move {
//!         // ... compute the value elsewhere ...
//!         resumer.resume("ready".to_string());
//!     });
//!
//!     suspension.await
//! }
//! ```
//!
//! While the stage awaits the [`Suspension`], no further stage of the chain
//! runs. The invocation emits `Suspended` when it suspends, `Resumed` when the
//! [`AsyncResponse`] resumes it, and `SuspendTimeoutChanged` when the timeout
//! is changed. A suspension that outlives its timeout resolves with
//! [`ProcessingError::SuspendTimeout`].

use crate::completion::{LifecycleEvent, Notifier};
use crate::scope::RequestScope;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use trellis_core::{BoxFuture, ProcessingError, ProcessingResult, RequestId};
use trellis_telemetry::{metrics, Side};

/// State shared by everything running for one invocation.
#[derive(Clone)]
pub struct InvocationContext {
    inner: Arc<Inner>,
}

struct Inner {
    request_id: RequestId,
    side: Side,
    notifier: Notifier,
    suspended: AtomicBool,
}

impl InvocationContext {
    /// Creates the context of a new invocation.
    #[must_use]
    pub fn new(request_id: RequestId, side: Side, notifier: Notifier) -> Self {
        Self {
            inner: Arc::new(Inner {
                request_id,
                side,
                notifier,
                suspended: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the context of the enclosing request scope.
    #[must_use]
    pub fn current() -> Option<Self> {
        RequestScope::current()
    }

    /// Returns the id of the invoked request.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.inner.request_id
    }

    /// Returns the pipeline side running the invocation.
    #[must_use]
    pub fn side(&self) -> Side {
        self.inner.side
    }

    /// Returns `true` while the invocation is suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.inner.suspended.load(Ordering::Acquire)
    }

    /// Emits a lifecycle event for this invocation.
    pub fn notify(&self, event: LifecycleEvent) -> bool {
        tracing::debug!(
            request_id = %self.inner.request_id,
            side = self.inner.side.as_str(),
            event = event.name(),
            "invocation event"
        );
        metrics::record_event(self.inner.side, event.name());
        self.inner.notifier.notify(event)
    }

    /// Suspends the invocation until it is resumed or `timeout` elapses.
    ///
    /// Returns the resumer and the future the suspended stage awaits.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the invocation is already suspended.
    pub fn suspend<T: Send + 'static>(
        &self,
        timeout: Option<Duration>,
    ) -> ProcessingResult<(AsyncResponse<T>, Suspension<T>)> {
        if self
            .inner
            .suspended
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ProcessingError::illegal_state(
                "invocation is already suspended",
            ));
        }

        let (resume_tx, resume_rx) = oneshot::channel();
        let (timeout_tx, timeout_rx) = watch::channel(timeout);

        self.notify(LifecycleEvent::Suspended { timeout });

        let resumer = AsyncResponse {
            context: self.clone(),
            resume: Some(resume_tx),
            timeout: timeout_tx,
        };
        let suspension = Suspension {
            context: self.clone(),
            future: Box::pin(wait_for_resume(self.clone(), resume_rx, timeout_rx)),
            settled: false,
        };

        Ok((resumer, suspension))
    }

    fn clear_suspended(&self) {
        self.inner.suspended.store(false, Ordering::Release);
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("request_id", &self.inner.request_id)
            .field("side", &self.inner.side)
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

async fn wait_for_resume<T: Send + 'static>(
    context: InvocationContext,
    mut resume: oneshot::Receiver<ProcessingResult<T>>,
    mut timeout: watch::Receiver<Option<Duration>>,
) -> ProcessingResult<T> {
    loop {
        let limit = *timeout.borrow_and_update();
        let expiry = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;

            resumed = &mut resume => {
                context.clear_suspended();
                return resumed.unwrap_or_else(|_| Err(ProcessingError::Abandoned));
            }
            changed = timeout.changed() => {
                if changed.is_err() {
                    context.clear_suspended();
                    return (&mut resume).await.unwrap_or_else(|_| Err(ProcessingError::Abandoned));
                }
            }
            () = expiry => {
                context.clear_suspended();
                tracing::debug!(request_id = %context.request_id(), ?limit, "suspension expired");
                return Err(ProcessingError::SuspendTimeout {
                    timeout: limit.unwrap_or_default(),
                });
            }
        }
    }
}

/// Resumes a suspended invocation.
pub struct AsyncResponse<T> {
    context: InvocationContext,
    resume: Option<oneshot::Sender<ProcessingResult<T>>>,
    timeout: watch::Sender<Option<Duration>>,
}

impl<T> AsyncResponse<T> {
    /// Resumes the invocation with a value.
    ///
    /// Returns `false` if the suspension already ended.
    pub fn resume(self, value: T) -> bool {
        self.finish(Ok(value))
    }

    /// Resumes the invocation with an error.
    pub fn fail(self, error: ProcessingError) -> bool {
        self.finish(Err(error))
    }

    /// Changes the suspend timeout, restarting it from now.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        self.context
            .notify(LifecycleEvent::SuspendTimeoutChanged { timeout });
        self.timeout.send_replace(timeout);
    }

    /// Returns `true` while the suspended stage still waits.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.resume.as_ref().is_some_and(|sender| !sender.is_closed())
    }

    fn finish(mut self, outcome: ProcessingResult<T>) -> bool {
        let Some(sender) = self.resume.take() else {
            return false;
        };
        if sender.is_closed() {
            return false;
        }
        self.context.notify(LifecycleEvent::Resumed);
        sender.send(outcome).is_ok()
    }
}

impl<T> fmt::Debug for AsyncResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResponse")
            .field("request_id", &self.context.request_id())
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

/// Future awaited by a suspended stage.
///
/// Dropping it before it resolves ends the suspension, so the context can
/// be suspended again.
#[must_use = "a suspension does nothing unless awaited"]
pub struct Suspension<T> {
    context: InvocationContext,
    future: BoxFuture<'static, ProcessingResult<T>>,
    settled: bool,
}

impl<T> Future for Suspension<T> {
    type Output = ProcessingResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = ready!(this.future.as_mut().poll(cx));
        this.settled = true;
        Poll::Ready(outcome)
    }
}

impl<T> Drop for Suspension<T> {
    fn drop(&mut self) {
        if !self.settled {
            self.context.clear_suspended();
        }
    }
}

impl<T> fmt::Debug for Suspension<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension").finish_non_exhaustive()
    }
}
