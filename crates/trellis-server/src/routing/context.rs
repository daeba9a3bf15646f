//! Per-request routing state.
//!
//! Routing stages record their progress here while they walk the resource
//! tree, and later stages read it back. The context moves through three
//! states:
//!
//! ```text
//! Unmatched --push_*--> Matching --set_inflector--> Matched
//! ```
//!
//! Match results, templates, resources and left-hand paths are stored in
//! push order and read back most recent first. Once a resource method is
//! matched the match state is frozen and every push fails with
//! [`ProcessingError::IllegalState`].

use crate::filter::{FilterSet, ServerProvider};
use crate::model::{MethodInflector, ResourceHandle, ResourceMethod, ResourceMethodInfo};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use trellis_core::{ProcessingError, ProcessingResult};
use trellis_router::{MatchResult, UriTemplate};

/// Where routing is for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingState {
    /// Nothing matched yet.
    Unmatched,
    /// Some path matched, no resource method yet.
    Matching,
    /// A resource method matched; the inflector is set.
    Matched,
}

/// Read access to the matched resource method.
pub trait ResourceInfo {
    /// Returns the matched resource method.
    fn resource_method(&self) -> Option<&ResourceMethodInfo>;

    /// Returns the name of the resource declaring the matched method.
    fn resource_name(&self) -> Option<&str> {
        self.resource_method().map(ResourceMethodInfo::resource_name)
    }
}

#[derive(Clone)]
struct MatchedMethod {
    info: Arc<ResourceMethodInfo>,
    inflector: MethodInflector,
    bindings: FilterSet,
}

/// The routing state of one request.
///
/// # Example
///
/// ```
/// use trellis_router::PathPattern;
/// use trellis_server::RoutingContext;
///
/// let mut routing = RoutingContext::new();
/// let items = PathPattern::resource("/items").unwrap();
/// let id = PathPattern::method("/{id}").unwrap();
///
/// let outer = items.match_path("/items/42").unwrap();
/// routing.push_match_result(outer.clone()).unwrap();
/// routing.push_template(items.template().clone()).unwrap();
/// routing.push_left_hand_path().unwrap();
///
/// let inner = id.match_path(outer.final_group()).unwrap();
/// routing.push_match_result(inner).unwrap();
/// routing.push_left_hand_path().unwrap();
///
/// assert_eq!(routing.final_matching_group(), "");
/// assert_eq!(routing.matched_uris().collect::<Vec<_>>(), vec!["/items/42", "/items"]);
/// ```
pub struct RoutingContext {
    state: RoutingState,
    match_results: Vec<MatchResult>,
    templates: Vec<UriTemplate>,
    resources: Vec<ResourceHandle>,
    left_hand_paths: Vec<String>,
    matched: Option<MatchedMethod>,
    empty: FilterSet,
}

impl RoutingContext {
    /// Creates an unmatched context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RoutingState::Unmatched,
            match_results: Vec::new(),
            templates: Vec::new(),
            resources: Vec::new(),
            left_hand_paths: Vec::new(),
            matched: None,
            empty: FilterSet::default(),
        }
    }

    /// Returns the routing state.
    #[must_use]
    pub fn state(&self) -> RoutingState {
        self.state
    }

    fn ensure_matching(&mut self, operation: &str) -> ProcessingResult<()> {
        if self.state == RoutingState::Matched {
            return Err(ProcessingError::illegal_state(format!(
                "Cannot {operation}: a resource method has already been matched"
            )));
        }
        self.state = RoutingState::Matching;
        Ok(())
    }

    /// Records a successful path match.
    pub fn push_match_result(&mut self, result: MatchResult) -> ProcessingResult<()> {
        self.ensure_matching("push a match result")?;
        self.match_results.push(result);
        Ok(())
    }

    /// Records the resource instance that matched.
    pub fn push_matched_resource(&mut self, resource: ResourceHandle) -> ProcessingResult<()> {
        self.ensure_matching("push a matched resource")?;
        self.resources.push(resource);
        Ok(())
    }

    /// Records the template that matched.
    pub fn push_template(&mut self, template: UriTemplate) -> ProcessingResult<()> {
        self.ensure_matching("push a template")?;
        self.templates.push(template);
        Ok(())
    }

    /// Records the part of the request path matched so far.
    ///
    /// The left-hand path is the whole matched path without the final
    /// matching group of the most recent match result.
    pub fn push_left_hand_path(&mut self) -> ProcessingResult<()> {
        self.ensure_matching("push a left-hand path")?;
        let (Some(first), Some(last)) = (self.match_results.first(), self.match_results.last())
        else {
            return Err(ProcessingError::illegal_state(
                "Cannot push a left-hand path before any match result",
            ));
        };

        let whole = first.matched();
        let end = whole.len().saturating_sub(last.final_group().len());
        let path = whole.get(..end).unwrap_or(whole).to_string();
        self.left_hand_paths.push(path);
        Ok(())
    }

    /// Returns the most recent match result.
    #[must_use]
    pub fn peek_match_result(&self) -> Option<&MatchResult> {
        self.match_results.last()
    }

    /// Returns the most recently matched resource instance.
    #[must_use]
    pub fn peek_matched_resource(&self) -> Option<&ResourceHandle> {
        self.resources.last()
    }

    /// Returns the most recently matched resource instance as a `T`.
    #[must_use]
    pub fn peek_matched_resource_as<T: Any>(&self) -> Option<&T> {
        self.resources.last()?.downcast_ref()
    }

    /// Returns the final group of the most recent match result.
    ///
    /// Never fails: returns `""` when nothing matched.
    #[must_use]
    pub fn final_matching_group(&self) -> &str {
        self.match_results
            .last()
            .map_or("", MatchResult::final_group)
    }

    /// Returns the match results, most recent first.
    pub fn matched_results(&self) -> impl DoubleEndedIterator<Item = &MatchResult> + ExactSizeIterator {
        self.match_results.iter().rev()
    }

    /// Returns the matched templates, most recent first.
    pub fn matched_templates(&self) -> impl DoubleEndedIterator<Item = &UriTemplate> + ExactSizeIterator {
        self.templates.iter().rev()
    }

    /// Returns the matched resource instances, most recent first.
    pub fn matched_resources(&self) -> impl DoubleEndedIterator<Item = &ResourceHandle> + ExactSizeIterator {
        self.resources.iter().rev()
    }

    /// Returns the matched left-hand paths, most recent first.
    pub fn matched_uris(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.left_hand_paths.iter().rev().map(String::as_str)
    }

    /// Sets the matched resource method.
    ///
    /// The inflector and the bound filters and interceptors are replaced
    /// together. Calling this again replaces both.
    pub fn set_inflector(&mut self, method: &ResourceMethod) {
        tracing::debug!(method = method.info().name(), "resource method matched");
        self.matched = Some(MatchedMethod {
            info: method.info().clone(),
            inflector: method.inflector().clone(),
            bindings: method.bindings().clone(),
        });
        self.state = RoutingState::Matched;
    }

    /// Returns the matched inflector.
    #[must_use]
    pub fn inflector(&self) -> Option<&MethodInflector> {
        self.matched.as_ref().map(|matched| &matched.inflector)
    }

    /// Returns the bound filters and interceptors of the matched method.
    ///
    /// Empty until a method matched.
    #[must_use]
    pub fn bindings(&self) -> &FilterSet {
        self.matched
            .as_ref()
            .map_or(&self.empty, |matched| &matched.bindings)
    }

    /// Returns providers of bound request filters.
    #[must_use]
    pub fn bound_request_filters(&self) -> &[Arc<dyn ServerProvider>] {
        self.bindings().request_filters()
    }

    /// Returns providers of bound response filters.
    #[must_use]
    pub fn bound_response_filters(&self) -> &[Arc<dyn ServerProvider>] {
        self.bindings().response_filters()
    }

    /// Returns providers of bound reader interceptors.
    #[must_use]
    pub fn bound_reader_interceptors(&self) -> &[Arc<dyn ServerProvider>] {
        self.bindings().reader_interceptors()
    }

    /// Returns providers of bound writer interceptors.
    #[must_use]
    pub fn bound_writer_interceptors(&self) -> &[Arc<dyn ServerProvider>] {
        self.bindings().writer_interceptors()
    }
}

impl ResourceInfo for RoutingContext {
    fn resource_method(&self) -> Option<&ResourceMethodInfo> {
        self.matched.as_ref().map(|matched| matched.info.as_ref())
    }
}

impl Default for RoutingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RoutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingContext")
            .field("state", &self.state)
            .field("match_results", &self.match_results.len())
            .field("templates", &self.templates)
            .field("left_hand_paths", &self.left_hand_paths)
            .field("method", &self.resource_method().map(ResourceMethodInfo::name))
            .finish_non_exhaustive()
    }
}
