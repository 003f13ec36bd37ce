//! Source discovery.
//!
//! ```text
//! src/+layout.tsx      Layout
//! src/*.tsx            Page (marker-prefixed files excluded)
//! src/posts/*.mdx      Post
//! src/index.css        Stylesheet
//! public/**            StaticAsset
//! ```

use super::collect_all_files;
use crate::config::SiteConfig;
use anyhow::{Context, Result, bail};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Layout,
    Page,
    Post,
    StaticAsset,
    Stylesheet,
}

impl UnitKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Layout => "layout",
            Self::Page => "page",
            Self::Post => "post",
            Self::StaticAsset => "asset",
            Self::Stylesheet => "stylesheet",
        }
    }
}

/// One input file of a build pass.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub kind: UnitKind,
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the project root, for diagnostics (`src/index.tsx`).
    pub name: String,
}

impl SourceUnit {
    fn new(kind: UnitKind, path: PathBuf, root: &Path) -> Self {
        let name = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        Self { kind, path, name }
    }

    /// File name without its extension: a page's output name or a post's slug.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    /// Read the unit as text.
    pub fn read(&self) -> Result<Arc<str>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {} {}", self.kind.label(), self.name))?;
        Ok(text.into())
    }
}

/// Every unit of one build pass, sorted by path within each kind.
#[derive(Debug)]
pub struct SourceSet {
    pub layout: SourceUnit,
    pub pages: Vec<SourceUnit>,
    pub posts: Vec<SourceUnit>,
    pub assets: Vec<SourceUnit>,
    pub stylesheet: Option<SourceUnit>,
}

impl SourceSet {
    pub fn discover(config: &SiteConfig) -> Result<Self> {
        let build = &config.build;
        let root = config.root.as_path();

        if !build.layout.is_file() {
            bail!(
                "layout `{}` not found",
                SourceUnit::new(UnitKind::Layout, build.layout.clone(), root).name
            );
        }
        let layout = SourceUnit::new(UnitKind::Layout, build.layout.clone(), root);

        let pages = list_dir(&build.source)?
            .into_iter()
            .filter(|path| build.is_template(path))
            .filter(|path| path != &build.layout && !is_marked(path, &build.layout_marker))
            .map(|path| SourceUnit::new(UnitKind::Page, path, root))
            .collect();

        let posts = list_dir(&build.posts)?
            .into_iter()
            .filter(|path| build.is_post(path))
            .map(|path| SourceUnit::new(UnitKind::Post, path, root))
            .collect();

        let mut assets: Vec<_> = collect_all_files(&build.public)
            .into_iter()
            .map(|path| SourceUnit::new(UnitKind::StaticAsset, path, root))
            .collect();
        assets.sort_by(|a, b| a.path.cmp(&b.path));

        let stylesheet = build
            .stylesheet
            .is_file()
            .then(|| SourceUnit::new(UnitKind::Stylesheet, build.stylesheet.clone(), root));

        Ok(Self {
            layout,
            pages,
            posts,
            assets,
            stylesheet,
        })
    }
}

/// Files directly inside `dir`, sorted. A missing directory is empty.
fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn is_marked(path: &Path, marker: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn site(root: &Path) -> SiteConfig {
        SiteConfig::load(root, Path::new("sprig.toml")).unwrap()
    }

    #[test]
    fn test_discover_classifies_units() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/+layout.tsx", "");
        write(root, "src/+shared.tsx", "");
        write(root, "src/index.tsx", "");
        write(root, "src/contact.jsx", "");
        write(root, "src/notes.txt", "");
        write(root, "src/components/Card.tsx", "");
        write(root, "src/posts/b.mdx", "");
        write(root, "src/posts/a.md", "");
        write(root, "src/posts/draft.txt", "");
        write(root, "src/index.css", "");
        write(root, "public/robots.txt", "");
        write(root, "public/img/logo.svg", "");
        write(root, "public/.DS_Store", "");

        let sources = SourceSet::discover(&site(root)).unwrap();

        assert_eq!(sources.layout.name, "src/+layout.tsx");
        let pages: Vec<_> = sources.pages.iter().map(SourceUnit::stem).collect();
        assert_eq!(pages, ["contact", "index"]);
        let posts: Vec<_> = sources.posts.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(posts, ["src/posts/a.md", "src/posts/b.mdx"]);
        let assets: Vec<_> = sources.assets.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(assets, ["public/img/logo.svg", "public/robots.txt"]);
        assert_eq!(sources.stylesheet.unwrap().kind, UnitKind::Stylesheet);
    }

    #[test]
    fn test_discover_requires_layout() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/index.tsx", "");

        let err = SourceSet::discover(&site(dir.path())).unwrap_err();
        assert!(err.to_string().contains("src/+layout.tsx"));
    }

    #[test]
    fn test_discover_layout_only() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/+layout.tsx", "");

        let sources = SourceSet::discover(&site(dir.path())).unwrap();
        assert!(sources.pages.is_empty());
        assert!(sources.posts.is_empty());
        assert!(sources.assets.is_empty());
        assert!(sources.stylesheet.is_none());
    }
}
