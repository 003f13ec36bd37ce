//! External Tailwind CLI engine.

use super::{StylesheetEngine, StylesheetError};
use crate::exec;
use crate::utils::exec::FilterRule;
use std::path::{Path, PathBuf};

/// Tailwind progress chatter on stderr.
const TAILWIND_FILTER: FilterRule = FilterRule::new(&["≈", "Done in", "Rebuilding", "Browserslist"]);

/// Runs `<command> -i <input> --content <tree>/**/*.html` and takes stdout.
#[derive(Debug, Clone)]
pub struct TailwindEngine {
    root: PathBuf,
    command: Vec<String>,
}

impl TailwindEngine {
    pub fn new(root: PathBuf, command: Vec<String>) -> Self {
        Self { root, command }
    }

    fn content_glob(content: &Path) -> PathBuf {
        content.join("**").join("*.html")
    }
}

impl StylesheetEngine for TailwindEngine {
    fn name(&self) -> &'static str {
        "tailwind"
    }

    fn transform(
        &self,
        _input: &str,
        input_path: &Path,
        content: &Path,
    ) -> Result<String, StylesheetError> {
        let glob = Self::content_glob(content);
        let output = exec!(
            filter=&TAILWIND_FILTER;
            self.root.as_path();
            &self.command;
            "-i", input_path, "--content", &glob
        )
        .map_err(|e| StylesheetError::Command(format!("{e:#}")))?;

        let program = self.command.first().cloned().unwrap_or_default();
        String::from_utf8(output.stdout).map_err(|_| StylesheetError::Encoding(program))
    }
}
