//! Provider capabilities and the startup provider partition.
//!
//! Providers are plain values registered with a client or server at
//! construction time. A provider is identified by what it can do, not by its
//! name: it exposes a capability by returning `Some` from the matching
//! accessor. Layers extend [`Provider`] with their own capabilities (request
//! filters, response filters and so on).
//!
//! Executor providers are special. They are consumed once, when the executor
//! pair is chosen, and must not be bound again as general providers. The
//! [`ProviderPartition`] performs that split exactly once, before either set
//! is used.

use crate::executor::Executor;
use std::fmt;
use std::sync::Arc;

/// Supplies the executor for the requesting phase.
pub trait RequestExecutorsProvider: Send + Sync {
    /// Returns the executor that runs the stage chain.
    fn requesting_executor(&self) -> Arc<dyn Executor>;
}

/// Supplies the executor for the responding phase.
pub trait ResponseExecutorsProvider: Send + Sync {
    /// Returns the executor that delivers invocation outcomes.
    fn responding_executor(&self) -> Arc<dyn Executor>;
}

/// A registered provider.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trellis_core::{Executor, InlineExecutor, Provider, RequestExecutorsProvider};
///
/// struct SameThread;
///
/// impl RequestExecutorsProvider for SameThread {
///     fn requesting_executor(&self) -> Arc<dyn Executor> {
///         Arc::new(InlineExecutor)
///     }
/// }
///
/// impl Provider for SameThread {
///     fn name(&self) -> &str {
///         "same-thread"
///     }
///
///     fn as_request_executors(&self) -> Option<&dyn RequestExecutorsProvider> {
///         Some(self)
///     }
/// }
///
/// assert!(SameThread.is_executor_provider());
/// ```
pub trait Provider: Send + Sync {
    /// Returns the provider name used in logs.
    fn name(&self) -> &str;

    /// Exposes the requesting-executor capability.
    fn as_request_executors(&self) -> Option<&dyn RequestExecutorsProvider> {
        None
    }

    /// Exposes the responding-executor capability.
    fn as_response_executors(&self) -> Option<&dyn ResponseExecutorsProvider> {
        None
    }

    /// Returns `true` if the provider exposes any executor capability.
    fn is_executor_provider(&self) -> bool {
        self.as_request_executors().is_some() || self.as_response_executors().is_some()
    }
}

/// Registered providers split into executor providers and general providers.
///
/// The two collections are disjoint, their union is the input, and the
/// registration order is preserved within each of them.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trellis_core::{Provider, ProviderPartition};
///
/// struct Audit;
///
/// impl Provider for Audit {
///     fn name(&self) -> &str {
///         "audit"
///     }
/// }
///
/// let providers: Vec<Arc<dyn Provider>> = vec![Arc::new(Audit)];
/// let partition = ProviderPartition::partition(providers);
/// assert!(partition.executors().is_empty());
/// assert_eq!(partition.general().len(), 1);
/// ```
pub struct ProviderPartition<P: ?Sized> {
    executors: Vec<Arc<P>>,
    general: Vec<Arc<P>>,
}

impl<P: Provider + ?Sized> ProviderPartition<P> {
    /// Classifies providers by their executor capability.
    pub fn partition(providers: impl IntoIterator<Item = Arc<P>>) -> Self {
        let (executors, general): (Vec<_>, Vec<_>) = providers
            .into_iter()
            .partition(|provider| provider.is_executor_provider());

        tracing::debug!(
            executors = executors.len(),
            general = general.len(),
            "partitioned providers"
        );

        Self { executors, general }
    }

    /// Returns the providers exposing an executor capability.
    #[must_use]
    pub fn executors(&self) -> &[Arc<P>] {
        &self.executors
    }

    /// Returns every other provider.
    #[must_use]
    pub fn general(&self) -> &[Arc<P>] {
        &self.general
    }

    /// Splits the partition into `(executors, general)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Arc<P>>, Vec<Arc<P>>) {
        (self.executors, self.general)
    }
}

impl<P: ?Sized> fmt::Debug for ProviderPartition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderPartition")
            .field("executors", &self.executors.len())
            .field("general", &self.general.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InlineExecutor;

    struct Named(&'static str);

    impl Provider for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    struct Responding;

    impl ResponseExecutorsProvider for Responding {
        fn responding_executor(&self) -> Arc<dyn Executor> {
            Arc::new(InlineExecutor)
        }
    }

    impl Provider for Responding {
        fn name(&self) -> &str {
            "responding"
        }

        fn as_response_executors(&self) -> Option<&dyn ResponseExecutorsProvider> {
            Some(self)
        }
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(Named("first")),
            Arc::new(Responding),
            Arc::new(Named("second")),
        ];

        let partition = ProviderPartition::partition(providers);
        let executors: Vec<_> = partition.executors().iter().map(|p| p.name()).collect();
        let general: Vec<_> = partition.general().iter().map(|p| p.name()).collect();

        assert_eq!(executors, vec!["responding"]);
        assert_eq!(general, vec!["first", "second"]);
    }

    #[test]
    fn test_plain_provider_is_not_executor() {
        assert!(!Named("plain").is_executor_provider());
        assert!(Responding.is_executor_provider());
    }

    #[test]
    fn test_into_parts() {
        let providers: Vec<Arc<dyn Provider>> = vec![Arc::new(Responding)];
        let (executors, general) = ProviderPartition::partition(providers).into_parts();
        assert_eq!(executors.len(), 1);
        assert!(general.is_empty());
    }
}
