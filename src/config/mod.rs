//! Project configuration from `sprig.toml`.
//!
//! # Sections
//!
//! | Section       | Purpose                                        |
//! |---------------|------------------------------------------------|
//! | `[build]`     | Source locations, output directory, extensions |
//! | `[build.css]` | Stylesheet engine (builtin or tailwind)        |
//! | `[serve]`     | Dev server ports, interface and debounce       |
//!
//! The file is optional: a project laid out with the default directories
//! builds without one.
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "src"
//! output = "out"
//!
//! [build.css]
//! engine = "builtin"
//!
//! [serve]
//! port = 3000
//! reload_port = 3001
//! ```

mod build;
pub mod defaults;
mod error;
mod handle;
mod serve;

pub use build::{BuildConfig, CssEngine};
pub use error::ConfigError;
pub use handle::ConfigHandle;
pub use serve::ServeConfig;

use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing sprig.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute project root (set after loading)
    #[serde(skip)]
    pub root: PathBuf,

    /// Absolute path to the config file, whether or not it exists
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load `config` from `root` and resolve every path against the root.
    /// A missing config file yields the defaults.
    pub fn load(root: &Path, config: &Path) -> Result<Self> {
        let root = Self::normalize_path(root);
        let config_path = root.join(config);

        let mut site = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };
        site.config_path = config_path;
        site.build.resolve(&root);
        site.root = root;
        Ok(site)
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate settings that serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.serve.interface.parse::<IpAddr>().is_err() {
            bail!(ConfigError::invalid(
                "serve.interface",
                format!("`{}` is not an IP address", self.serve.interface)
            ));
        }

        if self.serve.port == self.serve.reload_port {
            bail!(ConfigError::invalid(
                "serve.port",
                "must differ from [serve.reload_port]"
            ));
        }

        if self.build.layout_marker.is_empty() {
            bail!(ConfigError::invalid("build.layout_marker", "must not be empty"));
        }

        if self.build.template_extensions.is_empty() {
            bail!(ConfigError::invalid(
                "build.template_extensions",
                "must have at least one element"
            ));
        }

        let build = &self.build;
        if build.output == self.root
            || build.source.starts_with(&build.output)
            || build.public.starts_with(&build.output)
        {
            bail!(ConfigError::invalid(
                "build.output",
                "must not contain the project, its sources or the public directory"
            ));
        }

        // Builds would feed the watcher their own writes.
        if build.output.starts_with(&build.source) || build.output.starts_with(&build.public) {
            bail!(ConfigError::invalid(
                "build.output",
                "must not be inside the sources or the public directory"
            ));
        }

        if self.build.css.engine == CssEngine::Tailwind {
            Self::check_command_installed("build.css.command", &self.build.css.command)?;
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &'static str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::invalid(field, "must have at least one element"));
        };

        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_str() {
        let config = SiteConfig::from_str(
            r#"
            [build]
            source = "site"
            post_extensions = ["md"]
        "#,
        )
        .unwrap();

        assert_eq!(config.build.source, PathBuf::from("site"));
        assert_eq!(config.build.post_extensions, ["md"]);
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let invalid_config = r#"
            [build
            source = "src"
        "#;
        assert!(SiteConfig::from_str(invalid_config).is_err());
    }

    #[test]
    fn test_unknown_top_level_field_rejection() {
        let config = r#"
            [deploy]
            provider = "github"
        "#;
        let result: Result<SiteConfig, _> = toml::from_str(config);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_without_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = SiteConfig::load(dir.path(), Path::new("sprig.toml")).unwrap();

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.root, root);
        assert_eq!(config.config_path, root.join("sprig.toml"));
        assert_eq!(config.build.posts, root.join("src/posts"));
        assert_eq!(config.build.output, root.join("out"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_reads_config_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("site.toml"),
            "[build]\noutput = \"dist\"\n[serve]\nport = 8000\n",
        )
        .unwrap();
        let config = SiteConfig::load(dir.path(), Path::new("site.toml")).unwrap();

        assert!(config.build.output.ends_with("dist"));
        assert_eq!(config.serve.port, 8000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SiteConfig::load(Path::new("/site"), Path::new("sprig.toml")).unwrap();
        config.serve.reload_port = config.serve.port;
        assert!(config.validate().is_err());

        let mut config = SiteConfig::load(Path::new("/site"), Path::new("sprig.toml")).unwrap();
        config.serve.interface = "localhost:80".into();
        assert!(config.validate().is_err());

        let mut config = SiteConfig::load(Path::new("/site"), Path::new("sprig.toml")).unwrap();
        config.build.output = config.root.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_output_inside_watched_dirs() {
        let dir = tempdir().unwrap();
        for output in ["src/out", "public/out", "src"] {
            fs::write(
                dir.path().join("sprig.toml"),
                format!("[build]\noutput = \"{output}\"\n"),
            )
            .unwrap();
            let config = SiteConfig::load(dir.path(), Path::new("sprig.toml")).unwrap();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("[build.output]"), "{output}: {err}");
        }

        fs::write(dir.path().join("sprig.toml"), "[build]\noutput = \"dist/site\"\n").unwrap();
        let config = SiteConfig::load(dir.path(), Path::new("sprig.toml")).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_tailwind_command() {
        let mut config = SiteConfig::load(Path::new("/site"), Path::new("sprig.toml")).unwrap();
        config.build.css.engine = CssEngine::Tailwind;
        config.build.css.command = vec!["sprig-test-no-such-command".into()];
        assert!(config.validate().is_err());

        config.build.css.command.clear();
        assert!(config.validate().is_err());
    }
}
