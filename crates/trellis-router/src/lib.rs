//! URI templates and path patterns for Trellis.
//!
//! Resource matching walks a tree of resources. At every level the remaining
//! request path is matched against a [`PathPattern`]; the [`MatchResult`]
//! records the variable values and the right-hand path that the next level
//! continues with.
//!
//! # Example
//!
//! ```rust
//! use trellis_router::PathPattern;
//!
//! let resource = PathPattern::resource("/items").unwrap();
//! let method = PathPattern::method("/{id}").unwrap();
//!
//! let outer = resource.match_path("/items/42").unwrap();
//! assert_eq!(outer.final_group(), "/42");
//!
//! let inner = method.match_path(outer.final_group()).unwrap();
//! assert_eq!(inner.value("id"), Some("42"));
//! assert_eq!(inner.final_group(), "");
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod params;
mod pattern;
mod template;

pub use error::{TemplateError, TemplateResult};
pub use params::Params;
pub use pattern::{MatchResult, PathPattern, RightHandPath};
pub use template::{UriTemplate, DEFAULT_VARIABLE_REGEX};
