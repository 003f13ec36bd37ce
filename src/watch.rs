//! File system watcher for live rebuilds.
//!
//! Watches the source tree, the public directory and the config file. Bursts
//! of events are debounced into one batch of paths handed to a callback; the
//! dev server turns each batch into a rebuild through a [`BuildGuard`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Watcher Thread                           │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│  on_change(paths)      │  │
//! │  │ events   │    │          │    │  (BuildGuard::run)     │  │
//! │  └──────────┘    └──────────┘    └────────────────────────┘  │
//! │        ▲                                                     │
//! │        └── Signal::Stop from WatchHandle::stop               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::{config::SiteConfig, log};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

// =============================================================================
// Path Filtering
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// What a dev session watches.
#[derive(Debug, Clone)]
pub struct WatchTargets {
    /// Watched recursively.
    dirs: Vec<PathBuf>,
    /// Single files, watched through their parent directory so editors that
    /// replace the file on save keep being noticed.
    files: Vec<PathBuf>,
    /// Subtrees never reported, even inside `dirs`.
    ignored: Vec<PathBuf>,
}

impl WatchTargets {
    pub fn new(dirs: Vec<PathBuf>, files: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            files,
            ignored: Vec::new(),
        }
    }

    pub fn ignoring(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.ignored.extend(paths);
        self
    }

    /// Source tree, public directory and config file of `config`. The
    /// builder's own output and staging trees are ignored.
    pub fn for_site(config: &SiteConfig) -> Self {
        Self::new(
            vec![config.build.source.clone(), config.build.public.clone()],
            vec![config.config_path.clone()],
        )
        .ignoring([config.build.output.clone(), config.build.staging_dir()])
    }

    fn contains(&self, path: &Path) -> bool {
        !is_temp_file(path)
            && !self.ignored.iter().any(|i| path.starts_with(i))
            && (self.files.iter().any(|f| f == path)
                || self.dirs.iter().any(|d| path.starts_with(d)))
    }

    fn register(&self, watcher: &mut impl Watcher) -> Result<()> {
        for dir in self.dirs.iter().filter(|d| d.is_dir()) {
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
        }

        let parents: FxHashSet<&Path> = self
            .files
            .iter()
            .filter_map(|f| f.parent())
            .filter(|p| p.is_dir() && !self.dirs.iter().any(|d| p.starts_with(d)))
            .collect();
        for parent in parents {
            watcher
                .watch(parent, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", parent.display()))?;
        }
        Ok(())
    }
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events until they go quiet for `delay`.
struct Debouncer {
    delay: Duration,
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        let mut touched = false;
        for path in paths {
            self.pending.insert(path);
            touched = true;
        }
        if touched {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.delay)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        match self.last_event {
            None => Duration::from_secs(60),
            Some(t) => self.delay.saturating_sub(t.elapsed()).max(Duration::from_millis(1)),
        }
    }
}

// =============================================================================
// Build Guard
// =============================================================================

/// Single-flight gate for rebuilds.
///
/// One build runs at a time. Triggers that arrive while it runs are folded
/// into a single follow-up build.
#[derive(Debug, Default)]
pub struct BuildGuard {
    state: Mutex<GuardState>,
}

#[derive(Debug, Default)]
struct GuardState {
    running: bool,
    pending: bool,
}

impl BuildGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `build`, or mark a follow-up if a build is already in flight.
    ///
    /// Returns `true` when this call ran the build (plus any follow-ups),
    /// `false` when it only queued one.
    pub fn run(&self, mut build: impl FnMut()) -> bool {
        {
            let mut state = self.state.lock();
            if state.running {
                state.pending = true;
                return false;
            }
            state.running = true;
        }

        loop {
            build();
            let mut state = self.state.lock();
            if state.pending {
                state.pending = false;
            } else {
                state.running = false;
                return true;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

// =============================================================================
// Watcher Thread
// =============================================================================

enum Signal {
    Event(notify::Result<Event>),
    Stop,
}

/// A running watcher. Stopped on [`WatchHandle::stop`] or drop.
pub struct WatchHandle {
    stop: Sender<Signal>,
    thread: Option<JoinHandle<()>>,
    watcher: Option<RecommendedWatcher>,
}

impl WatchHandle {
    /// Stop watching and wait for the watcher thread. A batch being handled
    /// finishes first.
    pub fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            _ = self.stop.send(Signal::Stop);
            _ = thread.join();
        }
        self.watcher.take();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start watching `targets`, calling `on_change` with each debounced batch of
/// changed paths (sorted).
pub fn watch(
    targets: WatchTargets,
    debounce: Duration,
    mut on_change: impl FnMut(Vec<PathBuf>) + Send + 'static,
) -> Result<WatchHandle> {
    let (tx, rx) = mpsc::channel();
    let events = tx.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        _ = events.send(Signal::Event(res));
    })
    .context("Failed to create file watcher")?;
    targets.register(&mut watcher)?;

    let thread = thread::Builder::new()
        .name("watch".into())
        .spawn(move || {
            let mut debouncer = Debouncer::new(debounce);
            loop {
                match rx.recv_timeout(debouncer.timeout()) {
                    Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    Ok(Signal::Event(Ok(event))) if is_relevant(&event) => {
                        debouncer.add(event.paths.into_iter().filter(|p| targets.contains(p)));
                    }
                    Ok(Signal::Event(Err(e))) => log!("watch"; "error: {e}"),
                    Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                        on_change(debouncer.take());
                    }
                    // irrelevant events, timeout with nothing ready
                    _ => {}
                }
            }
        })
        .context("Failed to spawn watcher thread")?;

    Ok(WatchHandle {
        stop: tx,
        thread: Some(thread),
        watcher: Some(watcher),
    })
}
