use super::source::SourceUnit;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs;
use std::path::Path;

/// Copy static assets byte-for-byte from `public` into `dest`, keeping their
/// relative paths.
pub fn copy_assets(assets: &[SourceUnit], public: &Path, dest: &Path) -> Result<()> {
    assets.par_iter().try_for_each(|asset| {
        let relative = asset
            .path
            .strip_prefix(public)
            .with_context(|| format!("{} is outside {}", asset.name, public.display()))?;
        let target = dest.join(relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&asset.path, &target)
            .with_context(|| format!("failed to copy {}", asset.name))?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::source::{SourceSet, UnitKind};
    use crate::config::SiteConfig;
    use tempfile::tempdir;

    #[test]
    fn test_copy_assets_preserves_bytes_and_paths() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/+layout.tsx"), "").unwrap();
        fs::create_dir_all(root.join("public/img")).unwrap();
        let bytes: Vec<u8> = (0..=255).collect();
        fs::write(root.join("public/img/blob.bin"), &bytes).unwrap();
        fs::write(root.join("public/robots.txt"), "User-agent: *\n").unwrap();

        let config = SiteConfig::load(root, Path::new("sprig.toml")).unwrap();
        let sources = SourceSet::discover(&config).unwrap();
        assert!(sources.assets.iter().all(|a| a.kind == UnitKind::StaticAsset));

        let dest = root.join("dest");
        copy_assets(&sources.assets, &config.build.public, &dest).unwrap();

        assert_eq!(fs::read(dest.join("img/blob.bin")).unwrap(), bytes);
        assert_eq!(fs::read_to_string(dest.join("robots.txt")).unwrap(), "User-agent: *\n");
    }
}
