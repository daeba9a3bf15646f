//! The resource model.
//!
//! An application is a tree of [`Resource`]s. Every resource has a path
//! template, an optional resource instance, resource methods and child
//! resources. Routing walks the tree from the roots, matching the remaining
//! path at every level.

use crate::filter::{FilterSet, ServerProvider};
use crate::request::ContainerRequest;
use crate::response::ContainerResponse;
use http::Method;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use trellis_process::{BoxedInflector, Inflector};
use trellis_router::{PathPattern, TemplateResult, UriTemplate};

/// A shared resource instance.
pub type ResourceHandle = Arc<dyn Any + Send + Sync>;

/// The inflector type of resource methods.
pub type MethodInflector = BoxedInflector<ContainerRequest, ContainerResponse>;

/// Describes a resource method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMethodInfo {
    name: String,
    resource_name: String,
    http_method: Method,
    template: UriTemplate,
    produces: Vec<mime::Mime>,
}

impl ResourceMethodInfo {
    /// Returns the method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the resource declaring the method.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn http_method(&self) -> &Method {
        &self.http_method
    }

    /// Returns the method path template.
    #[must_use]
    pub fn template(&self) -> &UriTemplate {
        &self.template
    }

    /// Returns the media types the method produces.
    #[must_use]
    pub fn produces(&self) -> &[mime::Mime] {
        &self.produces
    }
}

/// A resource method: an HTTP method, a path and an inflector.
#[derive(Clone)]
pub struct ResourceMethod {
    info: Arc<ResourceMethodInfo>,
    pattern: PathPattern,
    inflector: MethodInflector,
    name_bindings: Vec<&'static str>,
    dynamic: Vec<Arc<dyn ServerProvider>>,
    bindings: FilterSet,
}

impl ResourceMethod {
    /// Starts building a resource method.
    ///
    /// # Example
    ///
    /// ```
    /// use http::{Method, StatusCode};
    /// use trellis_core::ProcessingResult;
    /// use trellis_process::Stages;
    /// use trellis_server::{ContainerRequest, ContainerResponse, ResourceMethod};
    ///
    /// let method = ResourceMethod::builder(Method::GET)
    ///     .name("get_item")
    ///     .path("/{id}")
    ///     .produces(mime::TEXT_PLAIN)
    ///     .name_binding("audited")
    ///     .build(Stages::inflector_fn(|request: ContainerRequest| async move {
    ///         let id = request.path_params().get("id").unwrap_or_default().to_string();
    ///         ProcessingResult::Ok(ContainerResponse::text(StatusCode::OK, id))
    ///     }))
    ///     .unwrap();
    ///
    /// assert_eq!(method.info().template().as_str(), "/{id}");
    /// ```
    #[must_use]
    pub fn builder(http_method: Method) -> ResourceMethodBuilder {
        ResourceMethodBuilder {
            http_method,
            name: None,
            path: String::new(),
            produces: Vec::new(),
            name_bindings: Vec::new(),
            dynamic: Vec::new(),
        }
    }

    /// Returns the method description.
    #[must_use]
    pub fn info(&self) -> &Arc<ResourceMethodInfo> {
        &self.info
    }

    /// Returns the path pattern.
    #[must_use]
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Returns the inflector producing the response.
    #[must_use]
    pub fn inflector(&self) -> &MethodInflector {
        &self.inflector
    }

    /// Returns the names the method is bound to.
    #[must_use]
    pub fn name_bindings(&self) -> &[&'static str] {
        &self.name_bindings
    }

    /// Returns the filters and interceptors bound to the method.
    #[must_use]
    pub fn bindings(&self) -> &FilterSet {
        &self.bindings
    }

    fn bind(&mut self, name_bound: &[Arc<dyn ServerProvider>]) {
        let bound = name_bound.iter().filter(|provider| {
            provider
                .name_bindings()
                .iter()
                .any(|name| self.name_bindings.contains(name))
        });
        let mut bindings = FilterSet::from_providers(bound);
        bindings.merge(&FilterSet::from_providers(self.dynamic.iter()));
        self.bindings = bindings;
    }
}

impl fmt::Debug for ResourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMethod")
            .field("info", &self.info)
            .field("name_bindings", &self.name_bindings)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ResourceMethod`].
pub struct ResourceMethodBuilder {
    http_method: Method,
    name: Option<String>,
    path: String,
    produces: Vec<mime::Mime>,
    name_bindings: Vec<&'static str>,
    dynamic: Vec<Arc<dyn ServerProvider>>,
}

impl ResourceMethodBuilder {
    /// Sets the method name used in logs and [`ResourceMethodInfo`].
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the sub-resource path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds a produced media type.
    #[must_use]
    pub fn produces(mut self, media_type: mime::Mime) -> Self {
        self.produces.push(media_type);
        self
    }

    /// Binds name-bound providers with this name to the method.
    #[must_use]
    pub fn name_binding(mut self, name: &'static str) -> Self {
        self.name_bindings.push(name);
        self
    }

    /// Binds a provider to this method only.
    #[must_use]
    pub fn bind(mut self, provider: Arc<dyn ServerProvider>) -> Self {
        self.dynamic.push(provider);
        self
    }

    /// Builds the method with its inflector.
    pub fn build<I>(self, inflector: I) -> TemplateResult<ResourceMethod>
    where
        I: Inflector<ContainerRequest, ContainerResponse>,
    {
        self.build_shared(Arc::new(inflector))
    }

    /// Builds the method with a shared inflector.
    pub fn build_shared(self, inflector: MethodInflector) -> TemplateResult<ResourceMethod> {
        let pattern = PathPattern::method(&self.path)?;
        let name = self
            .name
            .unwrap_or_else(|| format!("{} {}", self.http_method, pattern.template()));

        Ok(ResourceMethod {
            info: Arc::new(ResourceMethodInfo {
                name,
                resource_name: String::new(),
                http_method: self.http_method,
                template: pattern.template().clone(),
                produces: self.produces,
            }),
            pattern,
            inflector,
            name_bindings: self.name_bindings,
            dynamic: self.dynamic,
            bindings: FilterSet::default(),
        })
    }
}

/// A resource: a path template with methods and child resources.
#[derive(Clone)]
pub struct Resource {
    name: String,
    pattern: PathPattern,
    instance: Option<ResourceHandle>,
    methods: Vec<ResourceMethod>,
    children: Vec<Resource>,
}

impl Resource {
    /// Creates a resource.
    ///
    /// # Example
    ///
    /// ```
    /// use trellis_server::Resource;
    ///
    /// struct Catalog;
    ///
    /// let resource = Resource::new("/items").unwrap().named("items").instance(Catalog);
    /// assert_eq!(resource.pattern().template().as_str(), "/items");
    /// assert!(resource.instance_as::<Catalog>().is_some());
    /// ```
    pub fn new(path: &str) -> TemplateResult<Self> {
        let pattern = PathPattern::resource(path)?;
        Ok(Self {
            name: pattern.template().to_string(),
            pattern,
            instance: None,
            methods: Vec::new(),
            children: Vec::new(),
        })
    }

    /// Names the resource.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the resource instance pushed when the resource matches.
    #[must_use]
    pub fn instance<T: Any + Send + Sync>(mut self, instance: T) -> Self {
        self.instance = Some(Arc::new(instance));
        self
    }

    /// Adds a resource method.
    #[must_use]
    pub fn method(mut self, method: ResourceMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a child resource.
    #[must_use]
    pub fn child(mut self, child: Resource) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path pattern.
    #[must_use]
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Returns the resource instance.
    #[must_use]
    pub fn instance_handle(&self) -> Option<&ResourceHandle> {
        self.instance.as_ref()
    }

    /// Returns the resource instance as a `T`.
    #[must_use]
    pub fn instance_as<T: Any>(&self) -> Option<&T> {
        self.instance.as_ref()?.downcast_ref()
    }

    /// Returns the resource methods.
    #[must_use]
    pub fn methods(&self) -> &[ResourceMethod] {
        &self.methods
    }

    /// Returns the child resources.
    #[must_use]
    pub fn children(&self) -> &[Resource] {
        &self.children
    }

    fn prepare(&mut self, name_bound: &[Arc<dyn ServerProvider>]) {
        for method in &mut self.methods {
            let mut info = (*method.info).clone();
            info.resource_name.clone_from(&self.name);
            method.info = Arc::new(info);
            method.bind(name_bound);
        }
        self.methods
            .sort_by(|a, b| a.pattern.template().specificity_cmp(b.pattern.template()));

        for child in &mut self.children {
            child.prepare(name_bound);
        }
        sort_resources(&mut self.children);
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("template", &self.pattern.template().as_str())
            .field("methods", &self.methods)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// The resources of an application, ready for routing.
#[derive(Debug, Clone, Default)]
pub struct ResourceModel {
    resources: Vec<Resource>,
}

impl ResourceModel {
    /// Prepares resources for routing.
    ///
    /// Resources and methods are ordered from most to least specific
    /// template, and name-bound providers are bound to the methods declaring
    /// their names.
    #[must_use]
    pub fn new(mut resources: Vec<Resource>, name_bound: &[Arc<dyn ServerProvider>]) -> Self {
        for resource in &mut resources {
            resource.prepare(name_bound);
        }
        sort_resources(&mut resources);
        Self { resources }
    }

    /// Returns the root resources in matching order.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Returns `true` if there are no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn sort_resources(resources: &mut [Resource]) {
    resources.sort_by(|a, b| a.pattern.template().specificity_cmp(b.pattern.template()));
}
