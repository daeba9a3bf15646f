//! # Trellis Extract
//!
//! Turns parameter text into typed values.
//!
//! Types declare how they can be built from a string by registering with a
//! [`TypeCatalog`]. The [`StringReaderProviders`] chain then picks a
//! conversion for a target type, trying six strategies in a fixed order, and
//! [`MultivaluedParameterExtractor`] applies it to a named path, query or
//! header parameter.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_extract::{Annotations, MultivaluedMap, StringReaderProviders, TypeCatalog};
//!
//! let providers = StringReaderProviders::new(Arc::new(TypeCatalog::with_defaults()));
//! let page = providers
//!     .parameter_extractor::<u32>("page", &Annotations::new().default_value("1"))
//!     .unwrap();
//!
//! assert_eq!(page.extract(&MultivaluedMap::query([("page", "7")])).unwrap(), Some(7));
//! assert_eq!(page.extract(&MultivaluedMap::default()).unwrap(), Some(1));
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-extract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod annotation;
mod catalog;
mod error;
pub mod http_date;
mod param;
mod providers;
mod reader;

pub use annotation::{Annotation, Annotations, ENCODED};
pub use catalog::{Converter, Factory, TypeCatalog, TypeCatalogBuilder, TypeEntry, TypeKey};
pub use error::{ExtractError, ExtractionSource, WebApplicationError};
pub use param::{MultivaluedMap, MultivaluedParameterExtractor, ParameterSource};
pub use providers::{
    DateReader, EnumFromString, FromString, StringConstructor, StringReaderProvider,
    StringReaderProviders, Structural, ValueOf,
};
pub use reader::{Strategy, StringReader};
