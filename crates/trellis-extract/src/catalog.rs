//! The type catalog.
//!
//! Rust has no runtime reflection, so the conversions a type supports are
//! declared up front. Each registration records one factory for one target
//! type; a type may register several. The catalog is built once at startup
//! and is immutable afterwards.
//!
//! | Registration | Factory | Typical Rust source |
//! |---|---|---|
//! | [`register_enum`](TypeCatalogBuilder::register_enum) | enum `from_string` | a closed set of variants |
//! | [`register_from_str`](TypeCatalogBuilder::register_from_str) | `value_of` | [`FromStr`] |
//! | [`register_from_string`](TypeCatalogBuilder::register_from_string) | `from_string` | an associated parsing fn |
//! | [`register_constructor`](TypeCatalogBuilder::register_constructor) | single-string constructor | `From<String>`, `new(String)` |
//! | [`register_date`](TypeCatalogBuilder::register_date) | HTTP date | `From<DateTime<Utc>>` |
//! | [`register_structural`](TypeCatalogBuilder::register_structural) | structural | `serde::Deserialize` |

use crate::http_date::parse_http_date;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;

/// A type-erased conversion from text.
pub type Converter = Arc<dyn Fn(&str) -> anyhow::Result<Box<dyn Any + Send>> + Send + Sync>;

/// The factories a type can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Factory {
    /// A `value_of(&str)` factory.
    ValueOf,
    /// A `from_string(&str)` factory.
    FromString,
    /// A constructor taking one string.
    StringConstructor,
    /// Parsing from an HTTP date.
    Date,
    /// Structural deserialization.
    Structural,
}

/// Everything registered for one type.
#[derive(Clone)]
pub struct TypeEntry {
    name: &'static str,
    is_enum: bool,
    factories: HashMap<Factory, Converter>,
}

impl TypeEntry {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            is_enum: false,
            factories: HashMap::new(),
        }
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if the type was registered as an enum.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.is_enum
    }

    /// Returns the converter for a factory.
    #[must_use]
    pub fn factory(&self, factory: Factory) -> Option<&Converter> {
        self.factories.get(&factory)
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("name", &self.name)
            .field("is_enum", &self.is_enum)
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Identifies a target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key of `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Immutable registry of type conversions.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    entries: HashMap<TypeId, TypeEntry>,
}

impl TypeCatalog {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> TypeCatalogBuilder {
        TypeCatalogBuilder::default()
    }

    /// Returns a catalog with the standard scalar types registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::builder().defaults().build()
    }

    /// Returns the entry for a type.
    #[must_use]
    pub fn entry(&self, key: TypeKey) -> Option<&TypeEntry> {
        self.entries.get(&key.id)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`TypeCatalog`].
///
/// # Example
///
/// ```rust
/// use trellis_extract::{TypeCatalog, TypeKey, Factory};
///
/// #[derive(Debug, PartialEq)]
/// enum Color { Red, Green }
///
/// let catalog = TypeCatalog::builder()
///     .defaults()
///     .register_enum::<Color, _>(|text| match text {
///         "red" => Ok(Color::Red),
///         "green" => Ok(Color::Green),
///         other => Err(anyhow::anyhow!("unknown color {other}")),
///     })
///     .build();
///
/// let entry = catalog.entry(TypeKey::of::<Color>()).unwrap();
/// assert!(entry.is_enum());
/// assert!(entry.factory(Factory::FromString).is_some());
/// ```
#[derive(Debug, Default)]
pub struct TypeCatalogBuilder {
    entries: HashMap<TypeId, TypeEntry>,
}

impl TypeCatalogBuilder {
    /// Registers the standard scalar types.
    ///
    /// Numbers, `bool`, `char` and `String` use their [`FromStr`] impl,
    /// [`DateTime<Utc>`] and [`SystemTime`] parse HTTP dates and
    /// [`serde_json::Value`] is structural.
    pub fn defaults(self) -> Self {
        self.register_from_str::<bool>()
            .register_from_str::<char>()
            .register_from_str::<String>()
            .register_from_str::<i8>()
            .register_from_str::<i16>()
            .register_from_str::<i32>()
            .register_from_str::<i64>()
            .register_from_str::<i128>()
            .register_from_str::<isize>()
            .register_from_str::<u8>()
            .register_from_str::<u16>()
            .register_from_str::<u32>()
            .register_from_str::<u64>()
            .register_from_str::<u128>()
            .register_from_str::<usize>()
            .register_from_str::<f32>()
            .register_from_str::<f64>()
            .register_date::<DateTime<Utc>>()
            .register_date::<SystemTime>()
            .register_structural::<serde_json::Value>()
    }

    /// Registers an enum with its `from_string` factory.
    pub fn register_enum<T, F>(self, from_string: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&str) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let mut builder = self.register_from_string::<T, F>(from_string);
        builder.entry::<T>().is_enum = true;
        builder
    }

    /// Registers the [`FromStr`] impl of `T` as its `value_of` factory.
    pub fn register_from_str<T>(self) -> Self
    where
        T: FromStr + Send + 'static,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.register_value_of::<T, _>(|text| T::from_str(text).map_err(anyhow::Error::new))
    }

    /// Registers a `value_of` factory.
    pub fn register_value_of<T, F>(self, value_of: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&str) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.insert::<T, _>(Factory::ValueOf, value_of)
    }

    /// Registers a `from_string` factory.
    pub fn register_from_string<T, F>(self, from_string: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&str) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.insert::<T, _>(Factory::FromString, from_string)
    }

    /// Registers a constructor taking one owned string.
    pub fn register_constructor<T, F>(self, constructor: F) -> Self
    where
        T: Send + 'static,
        F: Fn(String) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.insert::<T, _>(Factory::StringConstructor, move |text| {
            constructor(text.to_string())
        })
    }

    /// Registers `From<String>` as the string constructor of `T`.
    pub fn register_from_string_into<T>(self) -> Self
    where
        T: From<String> + Send + 'static,
    {
        self.register_constructor::<T, _>(|text| Ok(T::from(text)))
    }

    /// Registers `T` as a date type parsed from HTTP dates.
    pub fn register_date<T>(self) -> Self
    where
        T: From<DateTime<Utc>> + Send + 'static,
    {
        self.insert::<T, _>(Factory::Date, |text| {
            parse_http_date(text).map(T::from).map_err(anyhow::Error::new)
        })
    }

    /// Registers `T` for structural deserialization.
    ///
    /// The text is parsed as JSON; if that fails it is read as a JSON string.
    pub fn register_structural<T>(self) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.insert::<T, _>(Factory::Structural, |text| {
            serde_json::from_str::<T>(text)
                .or_else(|_| serde_json::from_value::<T>(serde_json::Value::String(text.to_string())))
                .map_err(anyhow::Error::new)
        })
    }

    /// Builds the catalog.
    #[must_use]
    pub fn build(self) -> TypeCatalog {
        tracing::debug!(types = self.entries.len(), "type catalog built");
        TypeCatalog {
            entries: self.entries,
        }
    }

    fn entry<T: 'static>(&mut self) -> &mut TypeEntry {
        let key = TypeKey::of::<T>();
        self.entries
            .entry(key.id)
            .or_insert_with(|| TypeEntry::new(key.name))
    }

    fn insert<T, F>(mut self, factory: Factory, convert: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&str) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let converter: Converter = Arc::new(move |text| {
            convert(text).map(|value| Box::new(value) as Box<dyn Any + Send>)
        });
        self.entry::<T>().factories.insert(factory, converter);
        self
    }
}
