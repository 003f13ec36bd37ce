//! Compilation errors.

use crate::tsx::TsxError;
use thiserror::Error;

/// A failure while compiling or rendering one source unit.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{unit}:{line}:{column}: {message}")]
    Syntax {
        unit: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// Runtime failure. `message` starts with its own location.
    #[error("{message}")]
    Evaluate { unit: String, message: String },

    #[error("{unit}: invalid frontmatter: {message}")]
    Frontmatter { unit: String, message: String },

    /// Import resolution failure. `message` starts with its own location.
    #[error("{message}")]
    Module { unit: String, message: String },

    #[error("{second}: duplicate post slug `{slug}` (already used by {first})")]
    DuplicateSlug {
        slug: String,
        first: String,
        second: String,
    },
}

impl CompileError {
    /// Attribute a template-language error to `unit`.
    pub fn from_tsx(unit: &str, err: TsxError) -> Self {
        match err {
            TsxError::Syntax { file, error } => Self::Syntax {
                unit: file,
                line: error.line,
                column: error.column,
                message: error.message,
            },
            TsxError::Eval(err) => Self::evaluate(unit, err.to_string(), err.location.is_some()),
            TsxError::Module(message) => Self::Module {
                unit: unit.to_owned(),
                message,
            },
        }
    }

    /// Runtime failure; `located` tells whether `message` already names a location.
    pub fn evaluate(unit: &str, message: impl Into<String>, located: bool) -> Self {
        let message = message.into();
        Self::Evaluate {
            unit: unit.to_owned(),
            message: if located {
                message
            } else {
                format!("{unit}: {message}")
            },
        }
    }
}

impl From<(&str, crate::tsx::EvalError)> for CompileError {
    fn from((unit, err): (&str, crate::tsx::EvalError)) -> Self {
        let located = err.location.is_some();
        Self::evaluate(unit, err.to_string(), located)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tsx::{EvalError, SyntaxError};

    #[test]
    fn test_syntax_error_display() {
        let err = CompileError::from_tsx(
            "src/index.tsx",
            TsxError::Syntax {
                file: "src/index.tsx".into(),
                error: SyntaxError {
                    message: "expected `)`".into(),
                    line: 3,
                    column: 7,
                },
            },
        );
        assert_eq!(err.to_string(), "src/index.tsx:3:7: expected `)`");
    }

    #[test]
    fn test_evaluate_error_location() {
        let unlocated = CompileError::from(("src/a.tsx", EvalError::new("boom")));
        assert_eq!(unlocated.to_string(), "src/a.tsx: boom");

        let mut located = EvalError::new("`x` is not defined");
        located.location = Some("src/a.tsx:2:5".into());
        let err = CompileError::from_tsx("src/a.tsx", TsxError::Eval(located));
        assert_eq!(err.to_string(), "src/a.tsx:2:5: `x` is not defined");
    }

    #[test]
    fn test_duplicate_slug_names_both_units() {
        let err = CompileError::DuplicateSlug {
            slug: "hello".into(),
            first: "src/posts/hello.md".into(),
            second: "src/posts/hello.mdx".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("src/posts/hello.mdx:"));
        assert!(msg.contains("src/posts/hello.md)"));
    }
}
