//! Source discovery and the per-unit compilers.
//!
//! - **source**: enumerate layout, pages, posts, assets and the stylesheet
//! - **template**: compile a page or layout into a component
//! - **content**: compile a post into a component plus its frontmatter
//! - **layout**: wrap rendered bodies into full documents
//! - **assets**: copy static files
//!
//! # Flow
//!
//! ```text
//! SourceSet ──► content::compile ──► PostIndex ─┐
//!     │                                         ▼
//!     └──────► template::compile ──► CompiledComponent ──► LayoutRenderer ──► HTML
//! ```

pub mod assets;
pub mod component;
pub mod content;
pub mod error;
pub mod frontmatter;
pub mod layout;
pub mod source;
pub mod template;

pub use assets::copy_assets;
pub use component::{CompiledComponent, PageProps, PostIndex, PostProps};
pub use frontmatter::Frontmatter;
pub use layout::{LayoutRenderer, Mode, page_route, post_route};
pub use source::{SourceSet, SourceUnit};

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files to ignore during directory traversal
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Collect all files from a directory recursively, sorted by path.
pub fn collect_all_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .map(walkdir::DirEntry::into_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_collect_all_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/c.txt"), "").unwrap();
        fs::write(dir.path().join("z.txt"), "").unwrap();
        fs::write(dir.path().join(".DS_Store"), "").unwrap();

        let files: Vec<_> = collect_all_files(dir.path())
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(files, [PathBuf::from("a/b/c.txt"), PathBuf::from("z.txt")]);
    }

    #[test]
    fn test_collect_missing_dir() {
        assert!(collect_all_files(Path::new("/nonexistent/sprig/dir")).is_empty());
    }
}
