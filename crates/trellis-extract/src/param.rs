//! Named parameter extraction from multivalued sources.
//!
//! A [`MultivaluedParameterExtractor`] reads one named parameter out of a
//! [`ParameterSource`] (path variables, query string, headers or form
//! fields) and converts it with a [`StringReader`]. A declared default value
//! is used when the parameter is absent.

use crate::annotation::Annotations;
use crate::error::{ExtractError, ExtractionSource};
use crate::providers::StringReaderProviders;
use crate::reader::StringReader;
use http::HeaderMap;
use trellis_router::Params;

/// A source of named, possibly repeated, parameter values.
pub trait ParameterSource {
    /// Returns where values come from.
    fn kind(&self) -> ExtractionSource;

    /// Returns every value of a parameter in order.
    fn values<'a>(&'a self, name: &str) -> Vec<&'a str>;
}

impl ParameterSource for Params {
    fn kind(&self) -> ExtractionSource {
        ExtractionSource::Path
    }

    fn values<'a>(&'a self, name: &str) -> Vec<&'a str> {
        self.iter()
            .filter(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .collect()
    }
}

impl ParameterSource for HeaderMap {
    fn kind(&self) -> ExtractionSource {
        ExtractionSource::Header
    }

    fn values<'a>(&'a self, name: &str) -> Vec<&'a str> {
        self.get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }
}

/// An ordered multimap of string parameters, such as a query string.
///
/// # Example
///
/// ```rust
/// use trellis_extract::{MultivaluedMap, ParameterSource};
///
/// let query = MultivaluedMap::query([("tag", "a"), ("page", "2"), ("tag", "b")]);
/// assert_eq!(query.values("tag"), vec!["a", "b"]);
/// assert_eq!(query.first("page"), Some("2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultivaluedMap {
    kind: ExtractionSource,
    entries: Vec<(String, String)>,
}

impl MultivaluedMap {
    /// Creates an empty map for a source.
    #[must_use]
    pub fn new(kind: ExtractionSource) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Creates a query parameter map from pairs.
    pub fn query<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new(ExtractionSource::Query);
        for (name, value) in pairs {
            map.add(name, value);
        }
        map
    }

    /// Appends a value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Returns the first value of a parameter.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if the parameter is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.first(name).is_some()
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl Default for MultivaluedMap {
    fn default() -> Self {
        Self::new(ExtractionSource::Query)
    }
}

impl ParameterSource for MultivaluedMap {
    fn kind(&self) -> ExtractionSource {
        self.kind
    }

    fn values<'a>(&'a self, name: &str) -> Vec<&'a str> {
        self.entries
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

/// Extracts one named parameter as a typed value.
#[derive(Debug, Clone)]
pub struct MultivaluedParameterExtractor<T> {
    name: String,
    default_value: Option<String>,
    encoded: bool,
    reader: StringReader<T>,
}

impl<T: 'static> MultivaluedParameterExtractor<T> {
    /// Creates an extractor.
    pub fn new(name: impl Into<String>, default_value: Option<String>, reader: StringReader<T>) -> Self {
        Self {
            name: name.into(),
            default_value,
            encoded: false,
            reader,
        }
    }

    /// Keeps path and query values percent-encoded when `encoded` is set.
    #[must_use]
    pub fn encoded(mut self, encoded: bool) -> Self {
        self.encoded = encoded;
        self
    }

    /// Returns `true` if the extractor wants raw, still encoded values.
    #[must_use]
    pub const fn is_encoded(&self) -> bool {
        self.encoded
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared default value.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Extracts the first value of the parameter.
    ///
    /// Falls back to the default value when the parameter is absent, and to
    /// `None` when there is no default either.
    pub fn extract(&self, source: &impl ParameterSource) -> Result<Option<T>, ExtractError> {
        let values = source.values(&self.name);
        match values.first().copied().or(self.default_value.as_deref()) {
            Some(text) => self.convert(source.kind(), text),
            None => Ok(None),
        }
    }

    /// Extracts every value of the parameter.
    ///
    /// Empty values that cannot be converted are skipped.
    pub fn extract_list(&self, source: &impl ParameterSource) -> Result<Vec<T>, ExtractError> {
        let mut values = source.values(&self.name);
        if values.is_empty() {
            values.extend(self.default_value.as_deref());
        }

        let mut converted = Vec::with_capacity(values.len());
        for text in values {
            converted.extend(self.convert(source.kind(), text)?);
        }
        Ok(converted)
    }

    fn convert(&self, kind: ExtractionSource, text: &str) -> Result<Option<T>, ExtractError> {
        self.reader
            .from_string(text)
            .map_err(|error| ExtractError::Parameter {
                source_kind: kind,
                name: self.name.clone(),
                error: Box::new(error),
            })
    }
}

impl StringReaderProviders {
    /// Builds an extractor for a named parameter of type `T`.
    ///
    /// The default value from the annotations is converted once here so a
    /// bad default fails at startup rather than on the first request.
    pub fn parameter_extractor<T: 'static>(
        &self,
        name: impl Into<String>,
        annotations: &Annotations,
    ) -> Result<MultivaluedParameterExtractor<T>, ExtractError> {
        let name = name.into();
        let reader = self
            .string_reader::<T>(annotations)
            .ok_or(ExtractError::NoReader {
                target: std::any::type_name::<T>(),
            })?;

        let default_value = annotations.get_default_value().map(str::to_string);
        if let Some(default) = &default_value {
            reader
                .from_string(default)
                .map_err(|error| ExtractError::Parameter {
                    source_kind: ExtractionSource::Other,
                    name: name.clone(),
                    error: Box::new(error),
                })?;
        }

        Ok(MultivaluedParameterExtractor::new(name, default_value, reader).encoded(annotations.is_encoded()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeCatalog;
    use std::sync::Arc;

    fn providers() -> StringReaderProviders {
        StringReaderProviders::new(Arc::new(TypeCatalog::with_defaults()))
    }

    #[test]
    fn test_query_first_value() {
        let extractor = providers()
            .parameter_extractor::<u32>("page", &Annotations::new())
            .unwrap();
        let query = MultivaluedMap::query([("page", "3"), ("page", "4")]);

        assert_eq!(extractor.extract(&query).unwrap(), Some(3));
        assert_eq!(extractor.extract_list(&query).unwrap(), vec![3, 4]);
    }

    #[test]
    fn test_default_value_when_absent() {
        let extractor = providers()
            .parameter_extractor::<u32>("limit", &Annotations::new().default_value("25"))
            .unwrap();
        let query = MultivaluedMap::default();

        assert_eq!(extractor.default_value(), Some("25"));
        assert_eq!(extractor.extract(&query).unwrap(), Some(25));
        assert_eq!(extractor.extract_list(&query).unwrap(), vec![25]);
    }

    #[test]
    fn test_absent_without_default() {
        let extractor = providers()
            .parameter_extractor::<String>("q", &Annotations::new())
            .unwrap();
        assert_eq!(extractor.extract(&MultivaluedMap::default()).unwrap(), None);
        assert!(extractor.extract_list(&MultivaluedMap::default()).unwrap().is_empty());
    }

    #[test]
    fn test_bad_default_fails_at_build() {
        let result = providers().parameter_extractor::<u32>("limit", &Annotations::new().default_value("many"));
        assert!(matches!(result, Err(ExtractError::Parameter { .. })));
    }

    #[test]
    fn test_encoded_marker_is_carried() {
        let plain = providers()
            .parameter_extractor::<String>("name", &Annotations::new())
            .unwrap();
        let raw = providers()
            .parameter_extractor::<String>("name", &Annotations::new().marker(crate::annotation::ENCODED))
            .unwrap();

        assert!(!plain.is_encoded());
        assert!(raw.is_encoded());
    }

    #[test]
    fn test_path_params() {
        let extractor = providers()
            .parameter_extractor::<i64>("id", &Annotations::new())
            .unwrap();
        let mut params = Params::new();
        params.push("id", "42");

        assert_eq!(extractor.extract(&params).unwrap(), Some(42));
    }

    #[test]
    fn test_header_error_carries_source() {
        let extractor = providers()
            .parameter_extractor::<u8>("x-retries", &Annotations::new())
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-retries", "lots".parse().unwrap());

        let error = extractor.extract(&headers).unwrap_err();
        assert!(matches!(
            error,
            ExtractError::Parameter {
                source_kind: ExtractionSource::Header,
                ..
            }
        ));
        assert!(matches!(error.root(), ExtractError::Extraction { .. }));
    }

    #[test]
    fn test_empty_values_are_skipped_in_lists() {
        let extractor = providers()
            .parameter_extractor::<u32>("n", &Annotations::new())
            .unwrap();
        let query = MultivaluedMap::query([("n", "1"), ("n", ""), ("n", "2")]);
        assert_eq!(extractor.extract_list(&query).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_no_reader() {
        struct Opaque;
        let result = providers().parameter_extractor::<Opaque>("x", &Annotations::new());
        assert!(matches!(result, Err(ExtractError::NoReader { .. })));
    }
}
