//! `[build]` section configuration.
//!
//! Source locations, output directory and the stylesheet engine.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stylesheet generator selected by `[build.css] engine`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CssEngine {
    /// In-process prefixer and utility generator (default).
    #[default]
    Builtin,
    /// External Tailwind CLI.
    Tailwind,
}

/// `[build]` section in sprig.toml.
///
/// # Example
/// ```toml
/// [build]
/// source = "src"
/// output = "out"
/// post_extensions = ["md", "mdx"]
///
/// [build.css]
/// engine = "tailwind"
/// command = ["npx", "tailwindcss"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Template and post root.
    #[serde(default = "defaults::build::source")]
    #[educe(Default = defaults::build::source())]
    pub source: PathBuf,

    /// Post directory, relative to `source`.
    #[serde(default = "defaults::build::posts")]
    #[educe(Default = defaults::build::posts())]
    pub posts: PathBuf,

    /// Static assets copied verbatim into the output root.
    #[serde(default = "defaults::build::public")]
    #[educe(Default = defaults::build::public())]
    pub public: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Shared layout, relative to `source`.
    #[serde(default = "defaults::build::layout")]
    #[educe(Default = defaults::build::layout())]
    pub layout: PathBuf,

    /// Filename prefix that excludes a template from page rendering.
    #[serde(default = "defaults::build::layout_marker")]
    #[educe(Default = defaults::build::layout_marker())]
    pub layout_marker: String,

    /// Stylesheet input, relative to `source`.
    #[serde(default = "defaults::build::stylesheet")]
    #[educe(Default = defaults::build::stylesheet())]
    pub stylesheet: PathBuf,

    #[serde(default = "defaults::build::template_extensions")]
    #[educe(Default = defaults::build::template_extensions())]
    pub template_extensions: Vec<String>,

    #[serde(default = "defaults::build::post_extensions")]
    #[educe(Default = defaults::build::post_extensions())]
    pub post_extensions: Vec<String>,

    #[serde(default)]
    pub css: CssConfig,
}

/// `[build.css]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct CssConfig {
    #[serde(default = "defaults::build::css::engine")]
    #[educe(Default = defaults::build::css::engine())]
    pub engine: CssEngine,

    /// Tailwind command and leading arguments.
    #[serde(default = "defaults::build::css::command")]
    #[educe(Default = defaults::build::css::command())]
    pub command: Vec<String>,
}

impl BuildConfig {
    /// Resolve every path against `root`. `posts`, `layout` and `stylesheet`
    /// are relative to `source`.
    pub(super) fn resolve(&mut self, root: &Path) {
        self.source = root.join(&self.source);
        self.posts = self.source.join(&self.posts);
        self.public = root.join(&self.public);
        self.output = root.join(&self.output);
        self.layout = self.source.join(&self.layout);
        self.stylesheet = self.source.join(&self.stylesheet);
    }

    /// Sibling of the output directory a pass builds into.
    pub fn staging_dir(&self) -> PathBuf {
        let name = self
            .output
            .file_name()
            .map_or_else(|| "out".into(), |n| n.to_string_lossy());
        self.output.with_file_name(format!(".{name}.staging"))
    }

    pub fn is_template(&self, path: &Path) -> bool {
        has_extension(path, &self.template_extensions)
    }

    pub fn is_post(&self, path: &Path) -> bool {
        has_extension(path, &self.post_extensions)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e == ext))
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use super::*;

    #[test]
    fn test_build_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.source, PathBuf::from("src"));
        assert_eq!(config.build.output, PathBuf::from("out"));
        assert_eq!(config.build.layout, PathBuf::from("+layout.tsx"));
        assert_eq!(config.build.layout_marker, "+");
        assert_eq!(config.build.post_extensions, ["md", "mdx", "markdown"]);
        assert_eq!(config.build.css.engine, CssEngine::Builtin);
    }

    #[test]
    fn test_css_engine_parsing() {
        let config: SiteConfig = toml::from_str(
            r#"
            [build.css]
            engine = "tailwind"
            command = ["npx", "tailwindcss"]
        "#,
        )
        .unwrap();
        assert_eq!(config.build.css.engine, CssEngine::Tailwind);
        assert_eq!(config.build.css.command, ["npx", "tailwindcss"]);

        let bad: Result<SiteConfig, _> = toml::from_str("[build.css]\nengine = \"lightning\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let mut build = BuildConfig::default();
        build.resolve(Path::new("/site"));

        assert_eq!(build.source, PathBuf::from("/site/src"));
        assert_eq!(build.posts, PathBuf::from("/site/src/posts"));
        assert_eq!(build.public, PathBuf::from("/site/public"));
        assert_eq!(build.layout, PathBuf::from("/site/src/+layout.tsx"));
        assert_eq!(build.stylesheet, PathBuf::from("/site/src/index.css"));
        assert_eq!(build.staging_dir(), PathBuf::from("/site/.out.staging"));
    }

    #[test]
    fn test_extension_checks() {
        let build = BuildConfig::default();
        assert!(build.is_template(Path::new("src/index.tsx")));
        assert!(!build.is_template(Path::new("src/index.css")));
        assert!(build.is_post(Path::new("src/posts/a.mdx")));
        assert!(!build.is_post(Path::new("src/posts/a")));
    }
}
