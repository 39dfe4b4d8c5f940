//! `.env` file parsing and hot-reload.
//!
//! The server keeps the injected variables live by watching the directory
//! containing the `.env` file. Watching the directory instead of the file
//! itself survives editors and config mounts that replace the file via
//! rename.
//!
//! The watch runs as one background task for the lifetime of the server;
//! every write to the directory re-parses the file and hands the fresh map
//! to the `on_change` callback. The callback receives the parsed map as-is:
//! merging with the server configuration happens one layer up.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::VariableMap;

/// Parses a `.env` file into a variable map.
///
/// A missing file yields an empty map (the file is optional); a parse
/// failure logs a warning and also yields an empty map.
#[must_use]
pub fn parse_dotenv(path: &Path) -> VariableMap {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(_) => return VariableMap::new(),
    };

    tracing::info!(
        "Detected .env file at {}. Reading variables.",
        path.display()
    );
    let mut variables = VariableMap::new();
    for item in iter {
        match item {
            Ok((key, value)) => {
                variables.insert(key, Some(value));
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to parse dot env file at {}: {err}. Continuing without dot env file.",
                    path.display()
                );
                return VariableMap::new();
            }
        }
    }

    variables
}

/// A watched `.env` file feeding variable updates into a callback.
///
/// Created once at server start; [`DotEnv::close`] (or drop) stops the
/// watch. Watch setup failure is non-fatal: the initial parse still runs,
/// the server just continues without live reload.
pub struct DotEnv {
    path: PathBuf,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl DotEnv {
    /// Parses `path` and installs a watch on its containing directory.
    ///
    /// `on_change` is invoked once synchronously with the initial map, then
    /// again from the watch task on every write to the directory. Must be
    /// called within a tokio runtime.
    pub fn create<F>(path: PathBuf, on_change: F) -> Self
    where
        F: Fn(VariableMap) + Send + Sync + 'static,
    {
        on_change(parse_dotenv(&path));

        let (tx, rx) = mpsc::channel(16);
        let mut watcher = match notify::recommended_watcher(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = tx.blocking_send(event);
                }
                Err(err) => tracing::error!("Watch error: {err}"),
            },
        ) {
            Ok(watcher) => watcher,
            Err(err) => {
                tracing::error!(
                    "Failed to create file watcher for {}: {err}",
                    path.display()
                );
                return Self {
                    path,
                    watcher: None,
                    task: None,
                };
            }
        };

        let watch_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        if let Err(err) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
            tracing::error!(
                "Failed to watch file changes for {}: {err}",
                path.display()
            );
            return Self {
                path,
                watcher: None,
                task: None,
            };
        }

        let task = tokio::spawn(Self::watch_loop(path.clone(), rx, on_change));
        Self {
            path,
            watcher: Some(watcher),
            task: Some(task),
        }
    }

    async fn watch_loop<F>(path: PathBuf, mut rx: mpsc::Receiver<Event>, on_change: F)
    where
        F: Fn(VariableMap) + Send + Sync + 'static,
    {
        while let Some(event) = rx.recv().await {
            // Renaming into place shows up as a create in the directory.
            if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                on_change(parse_dotenv(&path));
            }
        }
    }

    /// Returns the watched file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stops the watch. Safe to call repeatedly, and safe when the watch
    /// setup failed.
    pub fn close(&mut self) {
        self.watcher.take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for DotEnv {
    fn drop(&mut self) {
        self.close();
    }
}
