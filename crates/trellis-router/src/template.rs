//! URI templates.
//!
//! A template is a path with embedded variables:
//!
//! | Syntax | Matches |
//! |---|---|
//! | `{id}` | One path segment (`[^/]+?`) |
//! | `{id: \d+}` | The given regular expression |
//!
//! Templates are normalized to start with `/` and never end with one, so
//! `items/` and `/items` are the same template. The empty template matches
//! the empty path.

use crate::error::{TemplateError, TemplateResult};
use crate::params::Params;
use std::cmp::Ordering;
use std::fmt;

/// Regex for a variable without an explicit expression.
pub const DEFAULT_VARIABLE_REGEX: &str = "[^/]+?";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable { name: String, regex: Option<String> },
}

/// A parsed URI template.
///
/// # Example
///
/// ```rust
/// use trellis_router::{Params, UriTemplate};
///
/// let template = UriTemplate::new("/items/{id: \\d+}/tags/{tag}").unwrap();
/// assert_eq!(template.variables().collect::<Vec<_>>(), vec!["id", "tag"]);
///
/// let mut params = Params::new();
/// params.push("id", "42");
/// params.push("tag", "red");
/// assert_eq!(template.expand(&params).as_deref(), Some("/items/42/tags/red"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    template: String,
    segments: Vec<Segment>,
    regex: String,
}

impl UriTemplate {
    /// Parses a template.
    pub fn new(template: &str) -> TemplateResult<Self> {
        let normalized = normalize(template);
        let segments = parse(&normalized)?;

        let mut regex = String::new();
        let mut index = 0;
        for segment in &segments {
            match segment {
                Segment::Literal(text) => regex.push_str(&regex::escape(text)),
                Segment::Variable { regex: explicit, .. } => {
                    let body = explicit.as_deref().unwrap_or(DEFAULT_VARIABLE_REGEX);
                    regex.push_str(&format!("(?P<{}>{})", group_name(index), body));
                    index += 1;
                }
            }
        }

        Ok(Self {
            template: normalized,
            segments,
            regex,
        })
    }

    /// Returns the empty template.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            template: String::new(),
            segments: Vec::new(),
            regex: String::new(),
        }
    }

    /// Returns the normalized template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Returns `true` for the empty template.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }

    /// Returns the variable names in template order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables().count()
    }

    /// Returns the number of variables with an explicit regex.
    #[must_use]
    pub fn explicit_regex_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Variable { regex: Some(_), .. }))
            .count()
    }

    /// Returns the number of literal characters.
    #[must_use]
    pub fn literal_chars(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.chars().count(),
                Segment::Variable { .. } => 0,
            })
            .sum()
    }

    /// Returns the unanchored regex source of the template.
    ///
    /// The `n`-th variable is captured by a group named after its position.
    #[must_use]
    pub fn regex(&self) -> &str {
        &self.regex
    }

    /// Substitutes variable values into the template.
    ///
    /// Returns `None` if a variable has no value.
    #[must_use]
    pub fn expand(&self, params: &Params) -> Option<String> {
        let mut uri = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => uri.push_str(text),
                Segment::Variable { name, .. } => uri.push_str(params.get(name)?),
            }
        }
        Some(uri)
    }

    /// Orders templates from most to least specific.
    ///
    /// More literal characters sort first, then more variables, then more
    /// variables with explicit regexes. Ties fall back to the template text so
    /// the order is total.
    #[must_use]
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        other
            .literal_chars()
            .cmp(&self.literal_chars())
            .then_with(|| other.variable_count().cmp(&self.variable_count()))
            .then_with(|| other.explicit_regex_count().cmp(&self.explicit_regex_count()))
            .then_with(|| self.template.cmp(&other.template))
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

pub(crate) fn group_name(index: usize) -> String {
    format!("__v{index}")
}

fn normalize(template: &str) -> String {
    let trimmed = template.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parse(template: &str) -> TemplateResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '{' {
            literal.push(c);
            continue;
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }

        // Regexes may contain braces of their own, e.g. `{code: [a-z]{3}}`.
        let mut depth = 1;
        let mut body = String::new();
        for c in chars.by_ref() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            body.push(c);
        }
        if depth != 0 {
            return Err(TemplateError::UnclosedVariable {
                template: template.to_string(),
            });
        }

        segments.push(variable(&body, template)?);
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

fn variable(body: &str, template: &str) -> TemplateResult<Segment> {
    let (name, regex) = match body.split_once(':') {
        Some((name, regex)) => (name.trim(), Some(regex.trim())),
        None => (body.trim(), None),
    };

    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(TemplateError::InvalidVariableName {
            name: name.to_string(),
            template: template.to_string(),
        });
    }

    let regex = match regex {
        Some(regex) if !regex.is_empty() => {
            regex::Regex::new(regex).map_err(|source| TemplateError::InvalidRegex {
                template: template.to_string(),
                source,
            })?;
            Some(regex.to_string())
        }
        _ => None,
    };

    Ok(Segment::Variable {
        name: name.to_string(),
        regex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(UriTemplate::new("items/").unwrap().as_str(), "/items");
        assert_eq!(UriTemplate::new("/items").unwrap().as_str(), "/items");
        assert!(UriTemplate::new("/").unwrap().is_empty());
        assert!(UriTemplate::new("").unwrap().is_empty());
    }

    #[test]
    fn test_variables_and_counts() {
        let template = UriTemplate::new("/a/{x}/b/{y: [0-9]{2}}").unwrap();
        assert_eq!(template.variables().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(template.variable_count(), 2);
        assert_eq!(template.explicit_regex_count(), 1);
        assert_eq!(template.literal_chars(), "/a/".len() + "/b/".len());
    }

    #[test]
    fn test_unclosed_variable() {
        assert!(matches!(
            UriTemplate::new("/items/{id"),
            Err(TemplateError::UnclosedVariable { .. })
        ));
    }

    #[test]
    fn test_invalid_name() {
        assert!(matches!(
            UriTemplate::new("/items/{}"),
            Err(TemplateError::InvalidVariableName { .. })
        ));
        assert!(matches!(
            UriTemplate::new("/items/{a b}"),
            Err(TemplateError::InvalidVariableName { .. })
        ));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            UriTemplate::new("/items/{id: [}"),
            Err(TemplateError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_expand_missing_value() {
        let template = UriTemplate::new("/items/{id}").unwrap();
        assert_eq!(template.expand(&Params::new()), None);
    }

    #[test]
    fn test_specificity_order() {
        let mut templates = vec![
            UriTemplate::new("/{any}").unwrap(),
            UriTemplate::new("/items/{id}").unwrap(),
            UriTemplate::new("/items/{id: \\d+}").unwrap(),
            UriTemplate::new("/items/special").unwrap(),
        ];
        templates.sort_by(UriTemplate::specificity_cmp);

        let order: Vec<_> = templates.iter().map(UriTemplate::as_str).collect();
        assert_eq!(
            order,
            vec!["/items/special", "/items/{id: \\d+}", "/items/{id}", "/{any}"]
        );
    }
}
