//! Stages and stage chains.
//!
//! A [`Stage`] takes a request and decides what happens next by returning a
//! [`Continuation`]:
//!
//! | Continuation | Meaning |
//! |---|---|
//! | `Next { request, stage }` | Continue with the given stage |
//! | `Done(request)` | This stage has nothing more to do with the request |
//! | `Respond(response)` | Short-circuit the chain with a response |
//!
//! Chains are built once with [`Stages::chain`] and are immutable afterwards.
//! Each link of a built chain turns a `Done` of its stage into a `Next` to its
//! successor, so a stage does not need to know what follows it. A stage that
//! wants to branch (routing into a sub-resource, for example) returns an
//! explicit `Next` instead.
//!
//! # Example
//!
//! ```
//! use trellis_process::stage::{Continuation, Stages};
//! use trellis_core::ProcessingResult;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let trim = Stages::stage_fn("trim", |request: String| async move {
//!     ProcessingResult::Ok(Continuation::Done(request.trim().to_string()))
//! });
//! let echo = Stages::inflector_fn(|request: String| async move {
//!     ProcessingResult::Ok(format!("echo {request}"))
//! });
//!
//! let chain = Stages::chain(trim).build(Stages::as_stage(echo));
//! let response = Stages::process(chain, "  hi ".to_string()).await.unwrap();
//! assert_eq!(response.into_response().ok(), Some("echo hi".to_string()));
//! # });
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use trellis_core::{BoxFuture, ProcessingError, ProcessingResult};

/// A shared, type-erased stage.
pub type BoxedStage<Req, Resp> = Arc<dyn Stage<Req, Resp>>;

/// A shared, type-erased inflector.
pub type BoxedInflector<Req, Resp> = Arc<dyn Inflector<Req, Resp>>;

/// What a stage wants to happen after it ran.
pub enum Continuation<Req, Resp> {
    /// Continue processing the request with `stage`.
    Next {
        /// The (possibly transformed) request.
        request: Req,
        /// The stage to run next.
        stage: BoxedStage<Req, Resp>,
    },
    /// The stage is done with the request and names no successor.
    Done(Req),
    /// The chain is finished with a response.
    Respond(Resp),
}

impl<Req, Resp> Continuation<Req, Resp> {
    /// Returns `true` if the continuation carries a response.
    #[must_use]
    pub const fn is_response(&self) -> bool {
        matches!(self, Self::Respond(_))
    }
}

impl<Req, Resp> fmt::Debug for Continuation<Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next { stage, .. } => f.debug_tuple("Next").field(&stage.name()).finish(),
            Self::Done(_) => f.write_str("Done"),
            Self::Respond(_) => f.write_str("Respond"),
        }
    }
}

/// One step of request processing.
pub trait Stage<Req, Resp>: Send + Sync + 'static {
    /// Returns the stage name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Applies the stage to a request.
    fn apply(&self, request: Req) -> BoxFuture<'_, ProcessingResult<Continuation<Req, Resp>>>;
}

impl<Req, Resp, S> Stage<Req, Resp> for Arc<S>
where
    Req: 'static,
    Resp: 'static,
    S: Stage<Req, Resp> + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn apply(&self, request: Req) -> BoxFuture<'_, ProcessingResult<Continuation<Req, Resp>>> {
        (**self).apply(request)
    }
}

/// The terminal function mapping a matched request to a response.
pub trait Inflector<Req, Resp>: Send + Sync + 'static {
    /// Produces the response for a request.
    fn apply(&self, request: Req) -> BoxFuture<'_, ProcessingResult<Resp>>;
}

/// Result of driving a chain to its end.
#[derive(Debug)]
pub enum Processed<Req, Resp> {
    /// A stage produced a response.
    Responded(Resp),
    /// The chain ran out of stages without a response.
    Exhausted(Req),
}

impl<Req, Resp> Processed<Req, Resp> {
    /// Returns the response, or the request if no stage produced one.
    pub fn into_response(self) -> Result<Resp, Req> {
        match self {
            Self::Responded(response) => Ok(response),
            Self::Exhausted(request) => Err(request),
        }
    }
}

/// Entry points for building and running stage chains.
pub struct Stages;

impl Stages {
    /// Starts a chain with its root stage.
    pub fn chain<Req, Resp, S>(root: S) -> ChainBuilder<Req, Resp>
    where
        S: Stage<Req, Resp>,
    {
        ChainBuilder {
            stages: vec![Arc::new(root)],
        }
    }

    /// Returns a stage that passes the request on unchanged.
    pub fn identity<Req, Resp>() -> BoxedStage<Req, Resp>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        Arc::new(Identity(PhantomData))
    }

    /// Adapts an inflector into a terminal stage.
    pub fn as_stage<Req, Resp, I>(inflector: I) -> BoxedStage<Req, Resp>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        I: Inflector<Req, Resp>,
    {
        Arc::new(InflectingStage {
            inflector: Arc::new(inflector),
        })
    }

    /// Adapts a shared inflector into a terminal stage.
    pub fn as_stage_shared<Req, Resp>(inflector: BoxedInflector<Req, Resp>) -> BoxedStage<Req, Resp>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        Arc::new(InflectingStage { inflector })
    }

    /// Creates a stage from an async function.
    pub fn stage_fn<F, Fut, Req, Resp>(name: &'static str, func: F) -> FnStage<F>
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcessingResult<Continuation<Req, Resp>>> + Send + 'static,
    {
        FnStage { name, func }
    }

    /// Creates an inflector from an async function.
    pub fn inflector_fn<F, Fut, Req, Resp>(func: F) -> FnInflector<F>
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcessingResult<Resp>> + Send + 'static,
    {
        FnInflector { func }
    }

    /// Runs a chain until a stage responds or no stage is left.
    ///
    /// Stage errors are not caught; the first one ends processing.
    pub async fn process<Req, Resp>(
        root: BoxedStage<Req, Resp>,
        request: Req,
    ) -> ProcessingResult<Processed<Req, Resp>>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        let mut stage = root;
        let mut request = request;

        loop {
            let continuation = stage.apply(request).await?;
            tracing::debug!(stage = stage.name(), next = ?continuation, "stage applied");

            match continuation {
                Continuation::Next {
                    request: next_request,
                    stage: next_stage,
                } => {
                    request = next_request;
                    stage = next_stage;
                }
                Continuation::Done(request) => return Ok(Processed::Exhausted(request)),
                Continuation::Respond(response) => return Ok(Processed::Responded(response)),
            }
        }
    }

    /// Runs a chain and requires a response.
    pub async fn respond<Req, Resp>(root: BoxedStage<Req, Resp>, request: Req) -> ProcessingResult<Resp>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        Self::process(root, request)
            .await?
            .into_response()
            .map_err(|_| ProcessingError::processing("stage chain finished without a response"))
    }
}

/// Builder collecting the stages of a chain in order.
pub struct ChainBuilder<Req, Resp> {
    stages: Vec<BoxedStage<Req, Resp>>,
}

impl<Req, Resp> ChainBuilder<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Appends a stage.
    pub fn to<S>(self, stage: S) -> Self
    where
        S: Stage<Req, Resp>,
    {
        self.to_shared(Arc::new(stage))
    }

    /// Appends an already shared stage.
    pub fn to_shared(mut self, stage: BoxedStage<Req, Resp>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always `false`; a chain has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Builds the chain, ending in `terminal`.
    pub fn build(self, terminal: BoxedStage<Req, Resp>) -> BoxedStage<Req, Resp> {
        self.link(Some(terminal))
    }

    /// Builds the chain without a terminal stage.
    ///
    /// The last stage's `Done` becomes the end of processing.
    pub fn build_open(self) -> BoxedStage<Req, Resp> {
        self.link(None)
    }

    fn link(self, terminal: Option<BoxedStage<Req, Resp>>) -> BoxedStage<Req, Resp> {
        let mut next = terminal;
        let mut head = None;

        for stage in self.stages.into_iter().rev() {
            let linked: BoxedStage<Req, Resp> = Arc::new(Link { stage, next });
            next = Some(linked.clone());
            head = Some(linked);
        }

        // The builder always holds the root stage.
        head.unwrap_or_else(Stages::identity)
    }
}

impl<Req, Resp> fmt::Debug for ChainBuilder<Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.stages.iter().map(|stage| stage.name()).collect();
        f.debug_struct("ChainBuilder").field("stages", &names).finish()
    }
}

/// A stage linked to its default successor.
struct Link<Req, Resp> {
    stage: BoxedStage<Req, Resp>,
    next: Option<BoxedStage<Req, Resp>>,
}

impl<Req, Resp> Stage<Req, Resp> for Link<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn name(&self) -> &'static str {
        self.stage.name()
    }

    fn apply(&self, request: Req) -> BoxFuture<'_, ProcessingResult<Continuation<Req, Resp>>> {
        Box::pin(async move {
            match self.stage.apply(request).await? {
                Continuation::Done(request) => Ok(match &self.next {
                    Some(next) => Continuation::Next {
                        request,
                        stage: next.clone(),
                    },
                    None => Continuation::Done(request),
                }),
                other => Ok(other),
            }
        })
    }
}

struct Identity<Req, Resp>(PhantomData<fn(Req) -> Resp>);

impl<Req, Resp> Stage<Req, Resp> for Identity<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn name(&self) -> &'static str {
        "identity"
    }

    fn apply(&self, request: Req) -> BoxFuture<'_, ProcessingResult<Continuation<Req, Resp>>> {
        Box::pin(async move { Ok(Continuation::Done(request)) })
    }
}

struct InflectingStage<Req, Resp> {
    inflector: BoxedInflector<Req, Resp>,
}

impl<Req, Resp> Stage<Req, Resp> for InflectingStage<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn name(&self) -> &'static str {
        "inflector"
    }

    fn apply(&self, request: Req) -> BoxFuture<'_, ProcessingResult<Continuation<Req, Resp>>> {
        Box::pin(async move {
            let response = self.inflector.apply(request).await?;
            Ok(Continuation::Respond(response))
        })
    }
}

/// A stage backed by an async function.
pub struct FnStage<F> {
    name: &'static str,
    func: F,
}

impl<F, Fut, Req, Resp> Stage<Req, Resp> for FnStage<F>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProcessingResult<Continuation<Req, Resp>>> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, request: Req) -> BoxFuture<'_, ProcessingResult<Continuation<Req, Resp>>> {
        Box::pin((self.func)(request))
    }
}

/// An inflector backed by an async function.
pub struct FnInflector<F> {
    func: F,
}

impl<F, Fut, Req, Resp> Inflector<Req, Resp> for FnInflector<F>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProcessingResult<Resp>> + Send + 'static,
{
    fn apply(&self, request: Req) -> BoxFuture<'_, ProcessingResult<Resp>> {
        Box::pin((self.func)(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recording(name: &'static str, log: Log) -> BoxedStage<u32, String> {
        Arc::new(Stages::stage_fn(name, move |request: u32| {
            let log = log.clone();
            async move {
                log.lock().push(name);
                Ok(Continuation::Done(request + 1))
            }
        }))
    }

    fn responder(log: Log) -> BoxedStage<u32, String> {
        Stages::as_stage(Stages::inflector_fn(move |request: u32| {
            let log = log.clone();
            async move {
                log.lock().push("terminal");
                Ok(format!("value {request}"))
            }
        }))
    }

    #[tokio::test]
    async fn test_chain_runs_in_declared_order() {
        let log: Log = Arc::default();
        let chain = Stages::chain(Stages::identity())
            .to_shared(recording("first", log.clone()))
            .to_shared(recording("second", log.clone()))
            .build(responder(log.clone()));

        let response = Stages::respond(chain, 0).await.expect("response");

        assert_eq!(response, "value 2");
        assert_eq!(*log.lock(), vec!["first", "second", "terminal"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_later_stages() {
        let log: Log = Arc::default();
        let stop = Stages::stage_fn("stop", |_request: u32| async move {
            Ok(Continuation::Respond("stopped".to_string()))
        });

        let chain = Stages::chain(stop)
            .to_shared(recording("never", log.clone()))
            .build(responder(log.clone()));

        let response = Stages::respond(chain, 0).await.expect("response");

        assert_eq!(response, "stopped");
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_errors_propagate_uncaught() {
        let log: Log = Arc::default();
        let failing = Stages::stage_fn("failing", |_request: u32| async move {
            ProcessingResult::<Continuation<u32, String>>::Err(ProcessingError::processing("boom"))
        });

        let chain = Stages::chain(failing).build(responder(log.clone()));
        let error = Stages::process(chain, 0).await.expect_err("stage failed");

        assert!(error.to_string().contains("boom"));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_next_bypasses_default_successor() {
        let log: Log = Arc::default();
        let detour = responder(log.clone());
        let branch = Stages::stage_fn("branch", move |request: u32| {
            let detour = detour.clone();
            async move {
                Ok(Continuation::Next {
                    request: request * 10,
                    stage: detour,
                })
            }
        });

        let chain = Stages::chain(branch)
            .to_shared(recording("skipped", log.clone()))
            .build_open();

        let response = Stages::respond(chain, 4).await.expect("response");
        assert_eq!(response, "value 40");
        assert_eq!(*log.lock(), vec!["terminal"]);
    }

    #[tokio::test]
    async fn test_open_chain_is_exhausted() {
        let log: Log = Arc::default();
        let chain = Stages::chain(Stages::identity())
            .to_shared(recording("only", log))
            .build_open();

        let processed = Stages::process(chain.clone(), 1).await.expect("processed");
        assert_eq!(processed.into_response().err(), Some(2));

        let error = Stages::respond(chain, 1).await.expect_err("no response");
        assert!(matches!(error, ProcessingError::Processing { .. }));
    }

    #[test]
    fn test_builder_len() {
        let builder: ChainBuilder<u32, String> =
            Stages::chain(Stages::identity()).to_shared(Stages::identity());
        assert_eq!(builder.len(), 2);
        assert!(!builder.is_empty());
    }

    #[test]
    fn test_debug_names_stages() {
        let log: Log = Arc::default();
        let builder = Stages::chain(Stages::identity()).to_shared(recording("audit", log.clone()));
        assert!(format!("{builder:?}").contains("audit"));

        let next: Continuation<u32, String> = Continuation::Next {
            request: 1,
            stage: recording("detour", log),
        };
        assert_eq!(format!("{next:?}"), r#"Next("detour")"#);
        assert_eq!(format!("{:?}", Continuation::<u32, String>::Done(1)), "Done");
    }
}
