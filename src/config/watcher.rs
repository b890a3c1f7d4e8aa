//! File watcher feeding the hot-reload loop.
//!
//! The watcher only classifies events and forwards them; deciding when to
//! reload is the coordinator's job. Parent directories are watched rather
//! than the files themselves because mounted ConfigMaps and Secrets are
//! updated by swapping a symlinked directory, which never touches the
//! original file inode.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A filesystem event, reduced to what the reload loop cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Modified(Vec<PathBuf>),
    Created(Vec<PathBuf>),
    Removed(Vec<PathBuf>),
    Renamed(Vec<PathBuf>),
    Other,
    /// The watch backend reported a failure.
    Error(String),
}

impl WatchEvent {
    /// Whether this event should (re)arm the reload timer.
    pub fn triggers_reload(&self) -> bool {
        matches!(self, WatchEvent::Modified(_) | WatchEvent::Created(_))
    }
}

impl From<Event> for WatchEvent {
    fn from(event: Event) -> Self {
        match event.kind {
            EventKind::Modify(ModifyKind::Name(_)) => WatchEvent::Renamed(event.paths),
            EventKind::Modify(_) => WatchEvent::Modified(event.paths),
            EventKind::Create(_) => WatchEvent::Created(event.paths),
            EventKind::Remove(_) => WatchEvent::Removed(event.paths),
            _ => WatchEvent::Other,
        }
    }
}

/// Owns the OS watch handle. Dropping it stops the watch and closes the
/// event channel.
pub struct ConfigWatcher {
    _inner: RecommendedWatcher,
    directories: Vec<PathBuf>,
}

impl ConfigWatcher {
    /// Watch the parent directory of every path in `files`.
    ///
    /// Returns the watcher and the receiving end of its event stream.
    pub fn start<P: AsRef<Path>>(
        files: &[P],
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => WatchEvent::from(event),
                    Err(e) => WatchEvent::Error(e.to_string()),
                };
                // The receiver is gone once the coordinator has stopped.
                let _ = tx.send(event);
            },
            Config::default(),
        )?;

        let directories: BTreeSet<PathBuf> = files
            .iter()
            .map(|file| watch_directory(file.as_ref()))
            .collect();

        for dir in &directories {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            tracing::info!(path = ?dir, "Watching directory for changes");
        }

        Ok((
            Self {
                _inner: watcher,
                directories: directories.into_iter().collect(),
            },
            rx,
        ))
    }

    /// Directories currently being watched.
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

fn watch_directory(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
