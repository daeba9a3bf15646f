//! The completion channel of an invocation.
//!
//! Every invocation reports its progress as a sequence of
//! [`InvocationEvent`]s: zero or more lifecycle events (suspended, resumed,
//! cancelled) followed by exactly one terminal event (`Completed` or
//! `Failed`). Nothing follows the terminal event.
//!
//! The producing side is split in two:
//!
//! - [`Responder`] delivers the terminal outcome. It is consumed by
//!   [`complete`](Responder::complete) or [`fail`](Responder::fail), and if it
//!   is dropped without either it delivers `Failed(Abandoned)`.
//! - [`Notifier`] emits lifecycle events. It is not generic over the response
//!   type so it can travel inside the request scope. Once the terminal event
//!   was sent, notifications are discarded.
//!
//! The consuming side is the [`Invocation`] handle.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use trellis_core::{ProcessingError, ProcessingResult, RequestId};

/// One event of an invocation.
#[derive(Debug)]
pub enum InvocationEvent<Resp> {
    /// The invocation produced a response. Terminal.
    Completed(Resp),
    /// The invocation failed. Terminal.
    Failed(ProcessingError),
    /// The invocation was cancelled. A `Failed(Cancelled)` follows.
    Cancelled,
    /// Processing was suspended.
    Suspended {
        /// Time allowed before the suspension expires, `None` for no limit.
        timeout: Option<Duration>,
    },
    /// The timeout of a suspended invocation was changed.
    SuspendTimeoutChanged {
        /// The new timeout.
        timeout: Option<Duration>,
    },
    /// A suspended invocation was resumed.
    Resumed,
}

impl<Resp> InvocationEvent<Resp> {
    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    /// Returns the event name used in logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
            Self::Suspended { .. } => "suspended",
            Self::SuspendTimeoutChanged { .. } => "suspend_timeout_changed",
            Self::Resumed => "resumed",
        }
    }
}

/// A non-terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// See [`InvocationEvent::Cancelled`].
    Cancelled,
    /// See [`InvocationEvent::Suspended`].
    Suspended {
        /// Suspension timeout.
        timeout: Option<Duration>,
    },
    /// See [`InvocationEvent::SuspendTimeoutChanged`].
    SuspendTimeoutChanged {
        /// New timeout.
        timeout: Option<Duration>,
    },
    /// See [`InvocationEvent::Resumed`].
    Resumed,
}

impl LifecycleEvent {
    /// Returns the event name used in logs and metrics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Suspended { .. } => "suspended",
            Self::SuspendTimeoutChanged { .. } => "suspend_timeout_changed",
            Self::Resumed => "resumed",
        }
    }
}

impl<Resp> From<LifecycleEvent> for InvocationEvent<Resp> {
    fn from(event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Cancelled => Self::Cancelled,
            LifecycleEvent::Suspended { timeout } => Self::Suspended { timeout },
            LifecycleEvent::SuspendTimeoutChanged { timeout } => {
                Self::SuspendTimeoutChanged { timeout }
            }
            LifecycleEvent::Resumed => Self::Resumed,
        }
    }
}

/// Sender slot shared by the responder and the notifier.
///
/// Taking the sender out of the slot is what makes an event terminal.
struct Slot<Resp> {
    sender: Mutex<Option<mpsc::UnboundedSender<InvocationEvent<Resp>>>>,
}

impl<Resp: Send + 'static> Slot<Resp> {
    fn finish(&self, event: InvocationEvent<Resp>) {
        if let Some(sender) = self.sender.lock().take() {
            // The invocation handle may already be gone.
            let _ = sender.send(event);
        }
    }
}

trait LifecycleSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent) -> bool;
}

impl<Resp: Send + 'static> LifecycleSink for Slot<Resp> {
    fn emit(&self, event: LifecycleEvent) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(event.into()).is_ok(),
            None => false,
        }
    }
}

/// Emits lifecycle events for one invocation.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn LifecycleSink>,
}

impl Notifier {
    /// Emits a lifecycle event.
    ///
    /// Returns `false` if the invocation already finished.
    pub fn notify(&self, event: LifecycleEvent) -> bool {
        self.sink.emit(event)
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

/// Delivers the terminal outcome of one invocation, exactly once.
pub struct Responder<Resp: Send + 'static> {
    slot: Option<Arc<Slot<Resp>>>,
}

impl<Resp: Send + 'static> Responder<Resp> {
    /// Delivers a response.
    pub fn complete(mut self, response: Resp) {
        if let Some(slot) = self.slot.take() {
            slot.finish(InvocationEvent::Completed(response));
        }
    }

    /// Delivers a failure.
    pub fn fail(mut self, error: ProcessingError) {
        if let Some(slot) = self.slot.take() {
            slot.finish(InvocationEvent::Failed(error));
        }
    }

    /// Delivers either outcome.
    pub fn finish(self, outcome: ProcessingResult<Resp>) {
        match outcome {
            Ok(response) => self.complete(response),
            Err(error) => self.fail(error),
        }
    }
}

impl<Resp: Send + 'static> Drop for Responder<Resp> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::warn!("invocation dropped without an outcome");
            slot.finish(InvocationEvent::Failed(ProcessingError::Abandoned));
        }
    }
}

impl<Resp: Send + 'static> fmt::Debug for Responder<Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("pending", &self.slot.is_some())
            .finish()
    }
}

/// Receives the callbacks of an invocation.
///
/// Only the terminal callbacks are required.
pub trait InvocationCallback<Resp> {
    /// Called with the response of a successful invocation.
    fn completed(&mut self, response: Resp);

    /// Called with the error of a failed invocation.
    fn failed(&mut self, error: ProcessingError);

    /// Called when the invocation was cancelled.
    fn cancelled(&mut self) {}

    /// Called when processing was suspended.
    fn suspended(&mut self, _timeout: Option<Duration>) {}

    /// Called when the suspend timeout was changed.
    fn suspend_timeout_changed(&mut self, _timeout: Option<Duration>) {}

    /// Called when a suspended invocation was resumed.
    fn resumed(&mut self) {}
}

/// Caller-side handle of an invocation.
pub struct Invocation<Resp> {
    request_id: RequestId,
    events: mpsc::UnboundedReceiver<InvocationEvent<Resp>>,
    cancel: watch::Sender<bool>,
    finished: bool,
}

impl<Resp> Invocation<Resp> {
    /// Returns the id of the invoked request.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns `true` once the terminal event was received.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Requests cancellation of the in-flight invocation.
    ///
    /// Has no effect once the invocation finished. With an inline requesting
    /// executor the chain has already run by the time the invocation is
    /// handed out, so only invocations dispatched to a runtime executor or
    /// parked in a suspension can still be cancelled.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Receives the next event, or `None` after the terminal event.
    pub async fn next_event(&mut self) -> Option<InvocationEvent<Resp>> {
        if self.finished {
            return None;
        }

        let event = self
            .events
            .recv()
            .await
            .unwrap_or_else(|| InvocationEvent::Failed(ProcessingError::Abandoned));
        self.finished = event.is_terminal();
        Some(event)
    }

    /// Waits for the terminal outcome, skipping lifecycle events.
    pub async fn outcome(mut self) -> ProcessingResult<Resp> {
        while let Some(event) = self.next_event().await {
            match event {
                InvocationEvent::Completed(response) => return Ok(response),
                InvocationEvent::Failed(error) => return Err(error),
                _ => {}
            }
        }
        Err(ProcessingError::Abandoned)
    }

    /// Delivers every remaining event to a callback.
    pub async fn deliver<C>(mut self, callback: &mut C)
    where
        C: InvocationCallback<Resp> + ?Sized,
    {
        while let Some(event) = self.next_event().await {
            match event {
                InvocationEvent::Completed(response) => callback.completed(response),
                InvocationEvent::Failed(error) => callback.failed(error),
                InvocationEvent::Cancelled => callback.cancelled(),
                InvocationEvent::Suspended { timeout } => callback.suspended(timeout),
                InvocationEvent::SuspendTimeoutChanged { timeout } => {
                    callback.suspend_timeout_changed(timeout);
                }
                InvocationEvent::Resumed => callback.resumed(),
            }
        }
    }
}

impl<Resp> fmt::Debug for Invocation<Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("request_id", &self.request_id)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Fires when the invocation handle requests cancellation.
///
/// Dropping the handle is not a cancellation.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Returns `true` if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested; never resolves otherwise.
    pub async fn cancelled(mut self) {
        if self.receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Opens the completion channel of one invocation.
pub fn channel<Resp: Send + 'static>(
    request_id: RequestId,
) -> (Responder<Resp>, Notifier, CancelSignal, Invocation<Resp>) {
    let (sender, events) = mpsc::unbounded_channel();
    let (cancel, cancel_receiver) = watch::channel(false);
    let slot = Arc::new(Slot {
        sender: Mutex::new(Some(sender)),
    });

    let responder = Responder {
        slot: Some(slot.clone()),
    };
    let notifier = Notifier { sink: slot };
    let signal = CancelSignal {
        receiver: cancel_receiver,
    };
    let invocation = Invocation {
        request_id,
        events,
        cancel,
        finished: false,
    };

    (responder, notifier, signal, invocation)
}
