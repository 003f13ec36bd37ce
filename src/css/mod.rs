//! Stylesheet generation.
//!
//! One input stylesheet plus the fully written output tree produce one output
//! stylesheet. The engine is selected by `[build.css] engine`:
//!
//! | Engine     | Transform                                                  |
//! |------------|------------------------------------------------------------|
//! | `builtin`  | vendor prefixer, then `@tailwind` / `@import` expansion    |
//! | `tailwind` | external Tailwind CLI, stdout becomes the stylesheet       |

mod palette;
mod prefix;
mod tailwind;
mod utility;

pub use tailwind::TailwindEngine;

use crate::compiler::SourceUnit;
use crate::config::{CssEngine, SiteConfig};
use crate::log;
use regex::{Captures, Regex};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use thiserror::Error;

/// Base styles emitted for `@tailwind base`.
const PREFLIGHT: &str = include_str!("../embed/css/preflight.css");

#[derive(Debug, Error)]
pub enum StylesheetError {
    #[error("failed to read `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to scan `{}` for class names", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Command(String),

    #[error("`{0}` printed non-UTF-8 output")]
    Encoding(String),
}

/// Turns the input stylesheet into the published one.
pub trait StylesheetEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// `input` is the contents of `input_path`; `content` is the built HTML
    /// tree to scan for class names.
    fn transform(
        &self,
        input: &str,
        input_path: &Path,
        content: &Path,
    ) -> Result<String, StylesheetError>;
}

/// Engine selected by the config.
pub fn engine(config: &SiteConfig) -> Box<dyn StylesheetEngine> {
    match config.build.css.engine {
        CssEngine::Builtin => Box::new(BuiltinEngine),
        CssEngine::Tailwind => Box::new(TailwindEngine::new(
            config.root.clone(),
            config.build.css.command.clone(),
        )),
    }
}

/// Generate the output stylesheet for `stylesheet` against the tree at
/// `content`.
pub fn generate(
    config: &SiteConfig,
    stylesheet: &SourceUnit,
    content: &Path,
) -> Result<String, StylesheetError> {
    let input = fs::read_to_string(&stylesheet.path).map_err(|source| StylesheetError::Read {
        path: stylesheet.path.clone(),
        source,
    })?;
    let engine = engine(config);
    log!("css"; "{} via {} engine", stylesheet.name, engine.name());
    engine.transform(&input, &stylesheet.path, content)
}

// ============================================================================
// Builtin Engine
// ============================================================================

/// In-process prefixer and utility generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEngine;

static DIRECTIVE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*(?:@tailwind\s+(?P<layer>base|components|utilities)|@import\s+["']tailwindcss["'])[ \t]*;[ \t]*$"#,
    )
    .ok()
});

impl StylesheetEngine for BuiltinEngine {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn transform(
        &self,
        input: &str,
        _input_path: &Path,
        content: &Path,
    ) -> Result<String, StylesheetError> {
        let prefixed = prefix::prefix(input);
        let Some(re) = DIRECTIVE.as_ref() else {
            return Ok(prefixed.into_owned());
        };

        let needs_utilities = re
            .captures_iter(&prefixed)
            .any(|caps| caps.name("layer").is_none_or(|l| l.as_str() == "utilities"));
        let utilities = if needs_utilities {
            let classes = utility::scan(content).map_err(|source| StylesheetError::Scan {
                path: content.to_path_buf(),
                source,
            })?;
            utility::generate(&classes)
        } else {
            String::new()
        };

        let preflight = PREFLIGHT.trim_end();
        let utilities = utilities.trim_end();
        let expanded = re.replace_all(&prefixed, |caps: &Captures| match caps
            .name("layer")
            .map(|l| l.as_str())
        {
            Some("base") => preflight.to_owned(),
            Some("utilities") => utilities.to_owned(),
            Some(_) => String::new(),
            None => format!("{preflight}\n\n{utilities}").trim_end().to_owned(),
        });
        Ok(expanded.into_owned())
    }
}
