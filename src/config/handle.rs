//! Shared config with atomic reload.
//!
//! The dev server owns one [`ConfigHandle`]. Builds take a snapshot with
//! [`ConfigHandle::get`]; the watcher calls [`ConfigHandle::reload`] when
//! `sprig.toml` changes. A reload that fails leaves the previous config in
//! place.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            ConfigHandle (ArcSwap)             │
//! │                                               │
//! │   build pass ──► get()       watcher ──► reload()
//! │   (lock-free snapshot)      (atomic replace)  │
//! └───────────────────────────────────────────────┘
//! ```

use super::SiteConfig;
use anyhow::Result;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

pub struct ConfigHandle {
    current: ArcSwap<SiteConfig>,
    /// Hash of the file contents behind `current`; `None` when no file exists.
    hash: Mutex<Option<blake3::Hash>>,
    root: PathBuf,
    file: PathBuf,
}

impl ConfigHandle {
    /// Load the config for `root`, remembering how to load it again.
    pub fn load(root: &Path, file: &Path) -> Result<Self> {
        let config = SiteConfig::load(root, file)?;
        config.validate()?;
        let hash = hash_file(&config.config_path);
        Ok(Self {
            current: ArcSwap::from_pointee(config),
            hash: Mutex::new(hash),
            root: root.to_path_buf(),
            file: file.to_path_buf(),
        })
    }

    /// Current config snapshot.
    #[inline]
    pub fn get(&self) -> Arc<SiteConfig> {
        self.current.load_full()
    }

    /// Reload from disk. Returns `false` when the file contents did not change.
    ///
    /// # Errors
    ///
    /// Parse or validation failure; the current config stays in effect.
    pub fn reload(&self) -> Result<bool> {
        let path = self.current.load().config_path.clone();
        let new_hash = hash_file(&path);

        let mut hash = self.hash.lock();
        if *hash == new_hash {
            return Ok(false);
        }

        let config = SiteConfig::load(&self.root, &self.file)?;
        config.validate()?;
        self.current.store(Arc::new(config));
        *hash = new_hash;
        Ok(true)
    }
}

fn hash_file(path: &Path) -> Option<blake3::Hash> {
    fs::read(path).ok().map(|bytes| blake3::hash(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reload_picks_up_changes() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("sprig.toml");
        fs::write(&file, "[serve]\nport = 4000\n").unwrap();

        let handle = ConfigHandle::load(dir.path(), Path::new("sprig.toml")).unwrap();
        assert_eq!(handle.get().serve.port, 4000);

        // unchanged contents
        assert!(!handle.reload().unwrap());

        fs::write(&file, "[serve]\nport = 4100\n").unwrap();
        assert!(handle.reload().unwrap());
        assert_eq!(handle.get().serve.port, 4100);
    }

    #[test]
    fn test_failed_reload_keeps_previous_config() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("sprig.toml");
        fs::write(&file, "[serve]\nport = 4000\n").unwrap();
        let handle = ConfigHandle::load(dir.path(), Path::new("sprig.toml")).unwrap();

        fs::write(&file, "[serve]\nport = \"nope\"\n").unwrap();
        assert!(handle.reload().is_err());
        assert_eq!(handle.get().serve.port, 4000);

        fs::write(&file, "[serve]\nport = 4001\nreload_port = 4001\n").unwrap();
        assert!(handle.reload().is_err());
        assert_eq!(handle.get().serve.port, 4000);
    }

    #[test]
    fn test_snapshot_outlives_reload() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("sprig.toml");
        fs::write(&file, "[build]\noutput = \"a\"\n").unwrap();
        let handle = ConfigHandle::load(dir.path(), Path::new("sprig.toml")).unwrap();

        let snapshot = handle.get();
        fs::write(&file, "[build]\noutput = \"b\"\n").unwrap();
        handle.reload().unwrap();

        assert!(snapshot.build.output.ends_with("a"));
        assert!(handle.get().build.output.ends_with("b"));
    }
}
