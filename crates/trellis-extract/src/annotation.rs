//! Parameter annotations.

/// Marker keeping path and query values percent-encoded.
pub const ENCODED: &str = "encoded";

/// One annotation attached to a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// Value used when the parameter is absent.
    DefaultValue(String),
    /// A named marker with no value, such as `encoded`.
    Marker(&'static str),
}

/// The annotations of one parameter.
///
/// # Example
///
/// ```rust
/// use trellis_extract::Annotations;
///
/// let annotations = Annotations::new().default_value("10").marker("encoded");
/// assert_eq!(annotations.get_default_value(), Some("10"));
/// assert!(annotations.is_encoded());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    items: Vec<Annotation>,
}

impl Annotations {
    /// Creates an empty annotation set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a default value.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.items.push(Annotation::DefaultValue(value.into()));
        self
    }

    /// Adds a marker.
    pub fn marker(mut self, name: &'static str) -> Self {
        self.items.push(Annotation::Marker(name));
        self
    }

    /// Returns the default value, if one was declared.
    #[must_use]
    pub fn get_default_value(&self) -> Option<&str> {
        self.items.iter().find_map(|item| match item {
            Annotation::DefaultValue(value) => Some(value.as_str()),
            Annotation::Marker(_) => None,
        })
    }

    /// Returns `true` if the marker is present.
    #[must_use]
    pub fn has_marker(&self, name: &str) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, Annotation::Marker(marker) if *marker == name))
    }

    /// Returns `true` if the [`ENCODED`] marker is present.
    #[must_use]
    pub fn is_encoded(&self) -> bool {
        self.has_marker(ENCODED)
    }

    /// Returns the annotations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.items.iter()
    }

    /// Returns `true` if there are no annotations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
