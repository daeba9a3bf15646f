//! Typed string readers.

use crate::catalog::Converter;
use crate::error::{ExtractError, WebApplicationError};
use std::fmt;
use std::marker::PhantomData;

/// The strategy that produced a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// An enum `from_string` factory.
    EnumFromString,
    /// A `value_of` factory.
    ValueOf,
    /// A `from_string` factory.
    FromString,
    /// A single-string constructor.
    StringConstructor,
    /// HTTP date parsing.
    Date,
    /// Structural deserialization.
    Structural,
}

impl Strategy {
    /// Returns the strategy name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnumFromString => "enum_from_string",
            Self::ValueOf => "value_of",
            Self::FromString => "from_string",
            Self::StringConstructor => "string_constructor",
            Self::Date => "date",
            Self::Structural => "structural",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts parameter text into a `T`.
pub struct StringReader<T> {
    strategy: Strategy,
    target: &'static str,
    converter: Converter,
    _target: PhantomData<fn() -> T>,
}

impl<T: 'static> StringReader<T> {
    pub(crate) fn new(strategy: Strategy, converter: Converter) -> Self {
        Self {
            strategy,
            target: std::any::type_name::<T>(),
            converter,
            _target: PhantomData,
        }
    }

    /// Returns the strategy this reader uses.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Converts text into a value.
    ///
    /// A failed conversion of the empty string yields `Ok(None)`. A
    /// [`WebApplicationError`] raised by the conversion is returned as is.
    /// Any other failure becomes [`ExtractError::Extraction`].
    pub fn from_string(&self, text: &str) -> Result<Option<T>, ExtractError> {
        let error = match (self.converter)(text) {
            Ok(value) => {
                return value
                    .downcast::<T>()
                    .map(|value| Some(*value))
                    .map_err(|_| ExtractError::NoReader {
                        target: self.target,
                    });
            }
            Err(error) => error,
        };

        if text.is_empty() {
            return Ok(None);
        }

        match error.downcast::<WebApplicationError>() {
            Ok(web) => Err(ExtractError::WebApplication(web)),
            Err(source) => Err(ExtractError::Extraction {
                target: self.target,
                value: text.to_string(),
                source,
            }),
        }
    }
}

impl<T> Clone for StringReader<T> {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy,
            target: self.target,
            converter: self.converter.clone(),
            _target: PhantomData,
        }
    }
}

impl<T> fmt::Debug for StringReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringReader")
            .field("strategy", &self.strategy)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
