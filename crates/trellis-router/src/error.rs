//! URI template errors.

use thiserror::Error;

/// Errors raised while parsing a URI template.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// A `{` was never closed.
    #[error("Unclosed template variable in '{template}'")]
    UnclosedVariable {
        /// The offending template.
        template: String,
    },

    /// A variable name is empty or contains illegal characters.
    #[error("Invalid template variable name '{name}' in '{template}'")]
    InvalidVariableName {
        /// The offending name.
        name: String,
        /// The template it appeared in.
        template: String,
    },

    /// The regular expression of a variable or of the whole template is invalid.
    #[error("Invalid regular expression in template '{template}': {source}")]
    InvalidRegex {
        /// The offending template.
        template: String,
        /// The regex compilation error.
        #[source]
        source: regex::Error,
    },
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TemplateError::UnclosedVariable {
            template: "/items/{id".to_string(),
        };
        assert_eq!(error.to_string(), "Unclosed template variable in '/items/{id'");
    }
}
