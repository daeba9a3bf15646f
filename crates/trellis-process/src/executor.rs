//! Executor selection.
//!
//! An [`ExecutorsFactory`] holds the executor pair of a client or server:
//! one executor for the requesting phase and one for the responding phase.
//! The pair is chosen once, at construction, from the registered executor
//! providers and shared read-only afterwards.
//!
//! # Selection Rules
//!
//! | Registered providers | Chosen executor |
//! |---|---|
//! | None exposing the capability | [`InlineExecutor`] |
//! | One | Its executor |
//! | Several | The first registered; the others are ignored with a warning |

use std::fmt;
use std::sync::Arc;
use trellis_core::{Executor, InlineExecutor, Provider};

/// Chooses the executors for one request.
pub trait ExecutorPolicy<Req>: Send + Sync {
    /// Returns the executor running the stage chain for `request`.
    fn requesting_executor(&self, request: &Req) -> Arc<dyn Executor>;

    /// Returns the executor delivering the outcome for `request`.
    fn responding_executor(&self, request: &Req) -> Arc<dyn Executor>;
}

/// The executor pair of a client or server.
#[derive(Clone)]
pub struct ExecutorsFactory {
    requesting: Arc<dyn Executor>,
    responding: Arc<dyn Executor>,
}

impl ExecutorsFactory {
    /// Selects the executor pair from the executor providers.
    pub fn new<P>(executor_providers: &[Arc<P>]) -> Self
    where
        P: Provider + ?Sized,
    {
        let requesting = select(
            "requesting",
            executor_providers
                .iter()
                .filter_map(|provider| {
                    provider
                        .as_request_executors()
                        .map(|capability| (provider.name(), capability.requesting_executor()))
                })
                .collect(),
        );
        let responding = select(
            "responding",
            executor_providers
                .iter()
                .filter_map(|provider| {
                    provider
                        .as_response_executors()
                        .map(|capability| (provider.name(), capability.responding_executor()))
                })
                .collect(),
        );

        Self {
            requesting,
            responding,
        }
    }

    /// Creates a factory running both phases inline.
    ///
    /// Inline requesting means [`RequestInvoker::apply`](crate::RequestInvoker::apply)
    /// drives the chain to completion before it returns, which leaves
    /// [`Invocation::cancel`](crate::Invocation::cancel) nothing to stop.
    #[must_use]
    pub fn inline() -> Self {
        Self {
            requesting: Arc::new(InlineExecutor),
            responding: Arc::new(InlineExecutor),
        }
    }

    /// Creates a factory from an explicit pair.
    #[must_use]
    pub fn from_pair(requesting: Arc<dyn Executor>, responding: Arc<dyn Executor>) -> Self {
        Self {
            requesting,
            responding,
        }
    }

    /// Returns the requesting executor.
    #[must_use]
    pub fn requesting(&self) -> &Arc<dyn Executor> {
        &self.requesting
    }

    /// Returns the responding executor.
    #[must_use]
    pub fn responding(&self) -> &Arc<dyn Executor> {
        &self.responding
    }
}

impl Default for ExecutorsFactory {
    fn default() -> Self {
        Self::inline()
    }
}

impl fmt::Debug for ExecutorsFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorsFactory")
            .field("requesting", &self.requesting.name())
            .field("responding", &self.responding.name())
            .finish()
    }
}

impl<Req> ExecutorPolicy<Req> for ExecutorsFactory {
    fn requesting_executor(&self, _request: &Req) -> Arc<dyn Executor> {
        self.requesting.clone()
    }

    fn responding_executor(&self, _request: &Req) -> Arc<dyn Executor> {
        self.responding.clone()
    }
}

fn select(phase: &'static str, candidates: Vec<(&str, Arc<dyn Executor>)>) -> Arc<dyn Executor> {
    let mut candidates = candidates.into_iter();

    let Some((chosen, executor)) = candidates.next() else {
        tracing::debug!(phase, "no executor provider registered, running inline");
        return Arc::new(InlineExecutor);
    };

    for (ignored, _) in candidates {
        tracing::warn!(
            phase,
            chosen,
            ignored,
            "multiple executor providers registered, ignoring all but the first"
        );
    }

    tracing::debug!(phase, provider = chosen, executor = executor.name(), "executor selected");
    executor
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{RequestExecutorsProvider, ResponseExecutorsProvider, RuntimeExecutor};

    struct Runtime {
        name: &'static str,
        requesting: bool,
        responding: bool,
    }

    impl RequestExecutorsProvider for Runtime {
        fn requesting_executor(&self) -> Arc<dyn Executor> {
            Arc::new(RuntimeExecutor::try_current().expect("inside runtime"))
        }
    }

    impl ResponseExecutorsProvider for Runtime {
        fn responding_executor(&self) -> Arc<dyn Executor> {
            Arc::new(RuntimeExecutor::try_current().expect("inside runtime"))
        }
    }

    impl Provider for Runtime {
        fn name(&self) -> &str {
            self.name
        }

        fn as_request_executors(&self) -> Option<&dyn RequestExecutorsProvider> {
            self.requesting.then_some(self as &dyn RequestExecutorsProvider)
        }

        fn as_response_executors(&self) -> Option<&dyn ResponseExecutorsProvider> {
            self.responding.then_some(self as &dyn ResponseExecutorsProvider)
        }
    }

    struct Named(&'static str);

    #[derive(Debug)]
    struct Tagged(&'static str);

    impl Executor for Tagged {
        fn name(&self) -> &'static str {
            self.0
        }

        fn submit(
            &self,
            task: trellis_core::BoxFuture<'static, ()>,
        ) -> trellis_core::BoxFuture<'static, ()> {
            task
        }
    }

    impl RequestExecutorsProvider for Named {
        fn requesting_executor(&self) -> Arc<dyn Executor> {
            Arc::new(Tagged(self.0))
        }
    }

    impl Provider for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn as_request_executors(&self) -> Option<&dyn RequestExecutorsProvider> {
            Some(self)
        }
    }

    #[test]
    fn test_defaults_to_inline() {
        let providers: Vec<Arc<dyn Provider>> = Vec::new();
        let factory = ExecutorsFactory::new(&providers);
        assert_eq!(factory.requesting().name(), "inline");
        assert_eq!(factory.responding().name(), "inline");
    }

    #[tokio::test]
    async fn test_phases_selected_independently() {
        let providers: Vec<Arc<dyn Provider>> = vec![Arc::new(Runtime {
            name: "pool",
            requesting: false,
            responding: true,
        })];
        let factory = ExecutorsFactory::new(&providers);

        assert_eq!(factory.requesting().name(), "inline");
        assert_eq!(factory.responding().name(), "runtime");
    }

    #[test]
    fn test_first_registered_wins() {
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(Named("first")),
            Arc::new(Named("second")),
        ];
        let factory = ExecutorsFactory::new(&providers);
        assert_eq!(factory.requesting().name(), "first");
    }

    #[test]
    fn test_policy_ignores_request() {
        let factory = ExecutorsFactory::inline();
        let executor = ExecutorPolicy::<u8>::requesting_executor(&factory, &0);
        assert_eq!(executor.name(), "inline");
    }
}
