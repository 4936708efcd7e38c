// Spacecheck - CPU/GPU execution-space checks for cppcheck dumps
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Watch mode.
//!
//! Editors save files in different ways (direct write, write to a temporary
//! file then rename, rename to a backup then write). The watcher follows the
//! parent directories of the sources and filters their events, so every
//! pattern is seen as a change of the source itself.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use super::DriverError;

/// Changes closer together than this are reported once.
const DEBOUNCE_DURATION: Duration = Duration::from_millis(100);

/// Blocks until one of a set of source files changes.
///
/// ```no_run
/// use std::path::PathBuf;
/// use spacecheck::driver::SourceWatcher;
///
/// let paths = vec![PathBuf::from("src/geometryXY/geometry.hpp")];
/// let watcher = SourceWatcher::new(&paths).expect("Failed to create watcher");
/// watcher.wait_for_change().expect("Watch error");
/// ```
pub struct SourceWatcher {
    /// Kept alive for as long as events are wanted.
    _watcher: RecommendedWatcher,
    /// Events of the watched directories.
    rx: Receiver<Result<Event, notify::Error>>,
    /// Canonical paths of the watched files.
    paths: Vec<PathBuf>,
}

impl SourceWatcher {
    /// Watch `paths`.
    ///
    /// The parent directory of each file is watched once, however many of
    /// the files it holds.
    ///
    /// # Arguments
    ///
    /// * `paths` - Sources and headers to watch; every path must exist
    ///
    /// # Errors
    ///
    /// Returns `DriverError::Watch` if a path cannot be resolved or a
    /// directory cannot be watched.
    pub fn new(paths: &[PathBuf]) -> Result<Self, DriverError> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(tx)
            .map_err(|e| DriverError::Watch(format!("Failed to create watcher: {}", e)))?;

        let mut canonical_paths = Vec::with_capacity(paths.len());
        let mut watched_dirs = HashSet::new();

        for path in paths {
            let canonical = path.canonicalize().map_err(|e| {
                DriverError::Watch(format!("Cannot resolve path {}: {}", path.display(), e))
            })?;

            if let Some(parent) = canonical.parent() {
                if watched_dirs.insert(parent.to_path_buf()) {
                    watcher
                        .watch(parent, RecursiveMode::NonRecursive)
                        .map_err(|e| {
                            DriverError::Watch(format!(
                                "Failed to watch {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                }
            }

            canonical_paths.push(canonical);
        }
        debug!(
            files = canonical_paths.len(),
            directories = watched_dirs.len(),
            "watching"
        );

        Ok(Self {
            _watcher: watcher,
            rx,
            paths: canonical_paths,
        })
    }

    /// The canonical paths being watched.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Block until a watched file is modified or recreated.
    ///
    /// Events arriving within `DEBOUNCE_DURATION` of the first one are
    /// drained, so a save which touches a file several times returns once.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::Watch` if the event channel closes or the
    /// watcher reports an error.
    pub fn wait_for_change(&self) -> Result<(), DriverError> {
        loop {
            let event = self
                .rx
                .recv()
                .map_err(|e| DriverError::Watch(format!("Watch channel closed: {}", e)))?
                .map_err(|e| DriverError::Watch(format!("Watch error: {}", e)))?;

            if !self.is_relevant_event(&event) {
                continue;
            }

            std::thread::sleep(DEBOUNCE_DURATION);
            self.drain_pending_events();
            return Ok(());
        }
    }

    fn is_relevant_event(&self, event: &Event) -> bool {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return false;
        }

        event.paths.iter().any(|event_path| {
            // A file renamed into place may not resolve yet.
            let canonical = event_path
                .canonicalize()
                .unwrap_or_else(|_| event_path.clone());
            self.paths.iter().any(|watched| {
                canonical == *watched
                    || (canonical.file_name().is_some()
                        && canonical.file_name() == watched.file_name()
                        && canonical.parent() == watched.parent())
            })
        })
    }

    fn drain_pending_events(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_source_watcher_new() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("advection.cpp");
        File::create(&file_path).unwrap();

        let watcher = SourceWatcher::new(&[file_path.clone()]).unwrap();
        assert_eq!(watcher.paths().len(), 1);
    }

    #[test]
    fn test_source_watcher_nonexistent_file() {
        let result = SourceWatcher::new(&[PathBuf::from("/nonexistent/path/geometry.hpp")]);
        assert!(matches!(result, Err(DriverError::Watch(_))));
    }

    #[test]
    fn test_source_watcher_shares_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let header = temp_dir.path().join("geometry.hpp");
        let source = temp_dir.path().join("geometry.cpp");
        File::create(&header).unwrap();
        File::create(&source).unwrap();

        let watcher = SourceWatcher::new(&[header, source]).unwrap();
        assert_eq!(watcher.paths().len(), 2);
    }

    #[test]
    fn test_file_change_detection() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("watched.cpp");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "void f() {{}}").unwrap();
        }

        let watcher = SourceWatcher::new(&[file_path.clone()]).unwrap();

        let file_path_clone = file_path.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&file_path_clone)
                .unwrap();
            writeln!(file, "void f() {{ int i = 0; }}").unwrap();
        });

        let result = watcher.wait_for_change();
        handle.join().unwrap();

        assert!(result.is_ok(), "Should detect file change");
    }

    #[test]
    fn test_debounce_duration() {
        assert!(DEBOUNCE_DURATION.as_millis() >= 50);
        assert!(DEBOUNCE_DURATION.as_millis() <= 500);
    }
}
