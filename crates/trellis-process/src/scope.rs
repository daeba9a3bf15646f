//! Request scope.
//!
//! Every stage chain runs inside a request scope that carries the
//! [`InvocationContext`] of the current invocation. Code running anywhere in
//! the chain can reach it through [`RequestScope::current`] without threading
//! it through every signature. Scopes are task-local, so concurrent
//! invocations never see each other's context.

use crate::context::InvocationContext;
use std::future::Future;

tokio::task_local! {
    static CURRENT: InvocationContext;
}

/// Entry point to the task-local request scope.
#[derive(Debug, Clone, Copy)]
pub struct RequestScope;

impl RequestScope {
    /// Runs `future` with `context` as the current invocation context.
    pub async fn run<F>(context: InvocationContext, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(context, future).await
    }

    /// Returns the context of the enclosing scope, if any.
    #[must_use]
    pub fn current() -> Option<InvocationContext> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Returns `true` when called inside a request scope.
    #[must_use]
    pub fn is_active() -> bool {
        CURRENT.try_with(|_| ()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion;
    use trellis_core::RequestId;
    use trellis_telemetry::Side;

    fn context() -> InvocationContext {
        let id = RequestId::new();
        let (_responder, notifier, _signal, _invocation) = completion::channel::<()>(id);
        InvocationContext::new(id, Side::Server, notifier)
    }

    #[tokio::test]
    async fn test_current_inside_scope() {
        let context = context();
        let id = context.request_id();

        let seen = RequestScope::run(context, async { RequestScope::current().map(|c| c.request_id()) })
            .await;

        assert_eq!(seen, Some(id));
    }

    #[tokio::test]
    async fn test_no_scope_outside() {
        assert!(!RequestScope::is_active());
        assert!(RequestScope::current().is_none());
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let first = context();
        let second = context();
        let (first_id, second_id) = (first.request_id(), second.request_id());

        let (a, b) = tokio::join!(
            RequestScope::run(first, async {
                tokio::task::yield_now().await;
                RequestScope::current().map(|c| c.request_id())
            }),
            RequestScope::run(second, async { RequestScope::current().map(|c| c.request_id()) }),
        );

        assert_eq!(a, Some(first_id));
        assert_eq!(b, Some(second_id));
    }
}
