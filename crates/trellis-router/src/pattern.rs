//! Path patterns and match results.
//!
//! A [`PathPattern`] anchors a [`UriTemplate`] and appends a capturing group
//! for the right-hand path, the part of the path left for deeper matching:
//!
//! | Right-hand path | Appended group | Used for |
//! |---|---|---|
//! | [`RightHandPath::ZeroOrMoreSegments`] | `(/.*)?` | Resources, which delegate the rest |
//! | [`RightHandPath::ZeroSegments`] | `(/)?` | Resource methods, which must consume the path |

use crate::error::{TemplateError, TemplateResult};
use crate::params::Params;
use crate::template::{group_name, UriTemplate};
use regex::Regex;

const RIGHT_HAND_GROUP: &str = "__rhp";

/// What a pattern captures after its template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightHandPath {
    /// Any number of further segments.
    ZeroOrMoreSegments,
    /// At most a trailing slash.
    ZeroSegments,
}

impl RightHandPath {
    const fn group_body(self) -> &'static str {
        match self {
            Self::ZeroOrMoreSegments => "/.*",
            Self::ZeroSegments => "/",
        }
    }
}

/// An anchored, compiled template.
#[derive(Debug, Clone)]
pub struct PathPattern {
    template: UriTemplate,
    right_hand: RightHandPath,
    regex: Regex,
}

impl PathPattern {
    /// Compiles a template into a pattern.
    pub fn new(template: UriTemplate, right_hand: RightHandPath) -> TemplateResult<Self> {
        let source = format!(
            "^{}(?P<{RIGHT_HAND_GROUP}>{})?$",
            template.regex(),
            right_hand.group_body()
        );
        let regex = Regex::new(&source).map_err(|source| TemplateError::InvalidRegex {
            template: template.as_str().to_string(),
            source,
        })?;

        Ok(Self {
            template,
            right_hand,
            regex,
        })
    }

    /// Parses a resource pattern, which leaves any remaining path unmatched.
    pub fn resource(template: &str) -> TemplateResult<Self> {
        Self::new(UriTemplate::new(template)?, RightHandPath::ZeroOrMoreSegments)
    }

    /// Parses a resource method pattern, which must consume the whole path.
    pub fn method(template: &str) -> TemplateResult<Self> {
        Self::new(UriTemplate::new(template)?, RightHandPath::ZeroSegments)
    }

    /// Returns the template.
    #[must_use]
    pub fn template(&self) -> &UriTemplate {
        &self.template
    }

    /// Returns the right-hand path kind.
    #[must_use]
    pub fn right_hand(&self) -> RightHandPath {
        self.right_hand
    }

    /// Matches a path.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<MatchResult> {
        let captures = self.regex.captures(path)?;

        let mut values = Params::new();
        for (index, name) in self.template.variables().enumerate() {
            if let Some(value) = captures.name(&group_name(index)) {
                values.push(name, value.as_str());
            }
        }

        Some(MatchResult {
            matched: path.to_string(),
            values,
            final_group: captures
                .name(RIGHT_HAND_GROUP)
                .map(|group| group.as_str().to_string()),
        })
    }
}

/// The outcome of matching a path against a pattern.
///
/// Groups are numbered the way the pattern declares them: group 0 is the
/// whole match, groups `1..=n` are the template variables and the last
/// group is the right-hand path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    matched: String,
    values: Params,
    final_group: Option<String>,
}

impl MatchResult {
    /// Returns the whole matched path.
    #[must_use]
    pub fn matched(&self) -> &str {
        &self.matched
    }

    /// Returns the variable values.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.values
    }

    /// Returns the value of a template variable.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name)
    }

    /// Returns the number of groups, not counting group 0.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.values.len() + 1
    }

    /// Returns a group by number.
    #[must_use]
    pub fn group(&self, index: usize) -> Option<&str> {
        match index {
            0 => Some(self.matched.as_str()),
            i if i <= self.values.len() => self.values.iter().nth(i - 1).map(|(_, v)| v),
            i if i == self.values.len() + 1 => self.final_group.as_deref(),
            _ => None,
        }
    }

    /// Returns the right-hand path, or `""` if nothing was left.
    #[must_use]
    pub fn final_group(&self) -> &str {
        self.final_group.as_deref().unwrap_or("")
    }

    /// Returns the consumed part of the path.
    #[must_use]
    pub fn left_hand_path(&self) -> &str {
        &self.matched[..self.matched.len() - self.final_group().len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_keeps_right_hand_path() {
        let pattern = PathPattern::resource("/items").unwrap();
        let result = pattern.match_path("/items/42/tags").unwrap();

        assert_eq!(result.final_group(), "/42/tags");
        assert_eq!(result.left_hand_path(), "/items");
    }

    #[test]
    fn test_method_consumes_path() {
        let pattern = PathPattern::method("/{id}").unwrap();

        let result = pattern.match_path("/42").unwrap();
        assert_eq!(result.value("id"), Some("42"));
        assert_eq!(result.final_group(), "");

        let slash = pattern.match_path("/42/").unwrap();
        assert_eq!(slash.final_group(), "/");
        assert!(pattern.match_path("/42/more").is_none());
    }

    #[test]
    fn test_items_id() {
        let pattern = PathPattern::resource("/items/{id}").unwrap();
        let result = pattern.match_path("/items/42").unwrap();

        assert_eq!(result.group(1), Some("42"));
        assert_eq!(result.group(2), None);
        assert_eq!(result.group_count(), 2);
        assert!(pattern.match_path("/other").is_none());
    }

    #[test]
    fn test_empty_template_matches_everything_below() {
        let pattern = PathPattern::resource("").unwrap();
        assert_eq!(pattern.match_path("").unwrap().final_group(), "");
        assert_eq!(pattern.match_path("/a/b").unwrap().final_group(), "/a/b");
    }

    #[test]
    fn test_nested_user_groups_do_not_shift_values() {
        let pattern = PathPattern::method("/{code: (ab)+}/{rest}").unwrap();
        let result = pattern.match_path("/abab/x").unwrap();

        assert_eq!(result.value("code"), Some("abab"));
        assert_eq!(result.value("rest"), Some("x"));
    }
}
