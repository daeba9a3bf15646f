//! Template variable values captured by a match.
//!
//! Values are kept in template order. Templates rarely bind more than a
//! handful of variables, so the first few values live inline without a heap
//! allocation. A template may bind the same name twice; [`Params::get`]
//! returns the last binding and [`Params::get_all`] returns every one.

use smallvec::SmallVec;

const INLINE_PARAMS: usize = 4;

/// Captured template variable values.
///
/// # Example
///
/// ```rust
/// use trellis_router::Params;
///
/// let mut params = Params::new();
/// params.push("id", "42");
/// params.push("id", "43");
///
/// assert_eq!(params.get("id"), Some("43"));
/// assert_eq!(params.get_all("id").collect::<Vec<_>>(), vec!["42", "43"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    values: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl Params {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.push((name.into(), value.into()));
    }

    /// Returns the last value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value bound to `name`, in template order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if a value is bound to `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|(n, _)| n == name)
    }

    /// Returns true if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterates over `(name, value)` pairs in template order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Appends every value of `other`.
    pub fn extend_from(&mut self, other: &Self) {
        self.values.extend(other.values.iter().cloned());
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
