use std::io;
use std::path::Path;

use hashlink::LinkedHashSet;
use parking_lot::Mutex;
use snafu::{ResultExt, Snafu, ensure};
use tracing::info;

use crate::ext::{BestEffortPathExt, best_effort_absolute};

/// The producer's set of watched root directories.
pub trait WatchRegistry {
    /// Adds `path` to the watch set. Fails when it is not an accessible
    /// directory or is already watched.
    async fn add_watch_path(&self, path: &str) -> Result<String, WatchRegistryError>;

    /// Watched roots in registration order.
    async fn watch_paths(&self) -> Vec<String>;
}

/// Watch set validated against the local filesystem.
#[derive(Default)]
pub struct LocalWatchRegistry {
    roots: Mutex<LinkedHashSet<String>>,
}

impl LocalWatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatchRegistry for LocalWatchRegistry {
    async fn add_watch_path(&self, path: &str) -> Result<String, WatchRegistryError> {
        let trimmed = path.trim();
        ensure!(!trimmed.is_empty(), EmptyPathSnafu);

        let metadata = compio::fs::metadata(trimmed)
            .await
            .context(InaccessibleSnafu { path: trimmed })?;
        ensure!(metadata.is_dir(), NotADirectorySnafu { path: trimmed });

        let root = best_effort_absolute(Path::new(trimmed))
            .display()
            .to_string();
        let inserted = self.roots.lock().insert(root.clone());
        ensure!(inserted, AlreadyWatchedSnafu { path: root.clone() });

        info!("Watching {}", root);
        Ok(root)
    }

    async fn watch_paths(&self) -> Vec<String> {
        self.roots.lock().iter().cloned().collect()
    }
}

#[derive(Debug, Snafu)]
pub enum WatchRegistryError {
    #[snafu(display("Watch path must not be empty"))]
    EmptyPath,
    #[snafu(display("Cannot access {}", path.best_effort_path_display()))]
    Inaccessible { path: String, source: io::Error },
    #[snafu(display("{} is not a directory", path.best_effort_path_display()))]
    NotADirectory { path: String },
    #[snafu(display("{} is already watched", path))]
    AlreadyWatched { path: String },
}
