//! The ordered string reader providers.
//!
//! A target type is converted by the first provider that supports it:
//!
//! 1. [`EnumFromString`] - an enum with a `from_string` factory
//! 2. [`ValueOf`] - a `value_of` factory
//! 3. [`FromString`] - a `from_string` factory
//! 4. [`StringConstructor`] - a single-string constructor
//! 5. [`DateReader`] - an HTTP date type
//! 6. [`Structural`] - a deserializable type

use crate::annotation::Annotations;
use crate::catalog::{Converter, Factory, TypeCatalog, TypeEntry, TypeKey};
use crate::reader::{Strategy, StringReader};
use std::fmt;
use std::sync::Arc;

/// Offers a conversion for the types it supports.
pub trait StringReaderProvider: Send + Sync {
    /// Returns the strategy this provider implements.
    fn strategy(&self) -> Strategy;

    /// Returns a converter if the provider supports the type.
    fn converter(&self, entry: &TypeEntry, annotations: &Annotations) -> Option<Converter>;
}

macro_rules! factory_provider {
    ($(#[$meta:meta])* $name:ident, $strategy:ident, $factory:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl StringReaderProvider for $name {
            fn strategy(&self) -> Strategy {
                Strategy::$strategy
            }

            fn converter(&self, entry: &TypeEntry, _annotations: &Annotations) -> Option<Converter> {
                entry.factory(Factory::$factory).cloned()
            }
        }
    };
}

/// Converts enums through their `from_string` factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumFromString;

impl StringReaderProvider for EnumFromString {
    fn strategy(&self) -> Strategy {
        Strategy::EnumFromString
    }

    fn converter(&self, entry: &TypeEntry, annotations: &Annotations) -> Option<Converter> {
        if !entry.is_enum() {
            return None;
        }
        FromString.converter(entry, annotations)
    }
}

factory_provider!(
    /// Converts through a `value_of` factory.
    ValueOf,
    ValueOf,
    ValueOf
);

factory_provider!(
    /// Converts through a `from_string` factory.
    FromString,
    FromString,
    FromString
);

factory_provider!(
    /// Converts through a single-string constructor.
    StringConstructor,
    StringConstructor,
    StringConstructor
);

factory_provider!(
    /// Parses HTTP dates.
    DateReader,
    Date,
    Date
);

factory_provider!(
    /// Deserializes structured text.
    Structural,
    Structural,
    Structural
);

/// The aggregate provider that tries every strategy in order.
///
/// Built once at startup; immutable afterwards.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use trellis_extract::{Annotations, Strategy, StringReaderProviders, TypeCatalog};
///
/// let providers = StringReaderProviders::new(Arc::new(TypeCatalog::with_defaults()));
///
/// let reader = providers.string_reader::<u16>(&Annotations::new()).unwrap();
/// assert_eq!(reader.strategy(), Strategy::ValueOf);
/// assert_eq!(reader.from_string("8080").unwrap(), Some(8080));
/// ```
#[derive(Clone)]
pub struct StringReaderProviders {
    catalog: Arc<TypeCatalog>,
    providers: Arc<[Box<dyn StringReaderProvider>]>,
}

impl StringReaderProviders {
    /// Creates the provider chain over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        let providers: Vec<Box<dyn StringReaderProvider>> = vec![
            Box::new(EnumFromString),
            Box::new(ValueOf),
            Box::new(FromString),
            Box::new(StringConstructor),
            Box::new(DateReader),
            Box::new(Structural),
        ];
        Self {
            catalog,
            providers: providers.into(),
        }
    }

    /// Returns the catalog.
    #[must_use]
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Returns the strategies in the order they are tried.
    pub fn strategies(&self) -> impl Iterator<Item = Strategy> + '_ {
        self.providers.iter().map(|provider| provider.strategy())
    }

    /// Returns a reader for `T`, or `None` if no strategy supports it.
    #[must_use]
    pub fn string_reader<T: 'static>(&self, annotations: &Annotations) -> Option<StringReader<T>> {
        let key = TypeKey::of::<T>();
        let entry = self.catalog.entry(key)?;

        let reader = self.providers.iter().find_map(|provider| {
            provider
                .converter(entry, annotations)
                .map(|converter| StringReader::new(provider.strategy(), converter))
        });

        if let Some(reader) = &reader {
            tracing::trace!(target_type = key.name(), strategy = %reader.strategy(), "string reader selected");
        }
        reader
    }
}

impl fmt::Debug for StringReaderProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringReaderProviders")
            .field("catalog", &self.catalog)
            .field("strategies", &self.strategies().collect::<Vec<_>>())
            .finish()
    }
}
