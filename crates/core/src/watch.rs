//! Live rescans of content directories while a game tree is being edited.

use std::path::PathBuf;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::content::{ContentRegistry, ContentScanner, ScanRule, SharedRegistry};

/// Events emitted by the content watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// Registry rebuilt after a filesystem change.
    Rescanned {
        /// Files registered across all categories.
        total: usize,
    },
    /// A rescan or the underlying watcher failed.
    Error(anyhow::Error),
}

/// Keeps a [`SharedRegistry`] in step with the files under a game root.
pub struct ContentWatcher {
    root: PathBuf,
    rules: Vec<ScanRule>,
    scanner: ContentScanner,
    registry: SharedRegistry,
}

impl ContentWatcher {
    /// Create a watcher over `rules`, all relative to `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        rules: Vec<ScanRule>,
        scanner: ContentScanner,
        registry: SharedRegistry,
    ) -> Self {
        Self {
            root: root.into(),
            rules,
            scanner,
            registry,
        }
    }

    /// Handle to the registry being maintained.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Rebuild the registry from scratch and swap it in.
    ///
    /// Categories already declared are kept. Starting from an empty registry
    /// means deleted files disappear and a source that appears next to its
    /// compiled artifact replaces it.
    pub fn rescan(&self) -> Result<usize> {
        let current = self.registry.snapshot();
        let mut fresh =
            ContentRegistry::with_categories(current.categories().map(|(name, _)| name.to_string()));
        for rule in &self.rules {
            if !fresh.has_category(&rule.category) {
                debug!(
                    "category {} not declared, skipping {}",
                    rule.category, rule.pattern
                );
                continue;
            }
            self.scanner
                .scan_rule(&self.root, rule, &mut fresh)
                .with_context(|| format!("failed to rescan {}", rule.pattern))?;
        }

        let total = fresh.total();
        self.registry.update(|registry| *registry = fresh);
        Ok(total)
    }

    /// Existing directories the rules scan, without duplicates.
    pub fn watch_dirs(&self) -> Vec<(PathBuf, RecursiveMode)> {
        let mut dirs: Vec<(PathBuf, RecursiveMode)> = Vec::new();
        for rule in &self.rules {
            let dir = match rule.directory(&self.root) {
                Ok(dir) => dir,
                Err(err) => {
                    warn!("Skipping watch for {}: {err:#}", rule.pattern);
                    continue;
                }
            };
            if !dir.is_dir() {
                debug!("{} does not exist yet, not watching", dir.display());
                continue;
            }
            let mode = if rule.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            match dirs.iter_mut().find(|(existing, _)| *existing == dir) {
                Some(entry) if mode == RecursiveMode::Recursive => entry.1 = mode,
                Some(_) => {}
                None => dirs.push((dir, mode)),
            }
        }
        dirs
    }

    /// Watch the rule directories until the receiving side hangs up,
    /// rescanning after every create, modify or remove.
    pub async fn run(self, sender: mpsc::Sender<WatchEvent>) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |event: notify::Result<Event>| {
                let _ = tx.send(event);
            })
            .context("failed to create filesystem watcher")?;

        for (dir, mode) in self.watch_dirs() {
            watcher
                .watch(&dir, mode)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
            info!("watching {}", dir.display());
        }

        let event = match self.rescan() {
            Ok(total) => WatchEvent::Rescanned { total },
            Err(err) => WatchEvent::Error(err),
        };
        if sender.send(event).await.is_err() {
            return Ok(());
        }

        while let Some(event) = rx.recv().await {
            let event = match event {
                Ok(event) if is_content_change(&event.kind) => {
                    debug!("content change: {:?}", event.paths);
                    match self.rescan() {
                        Ok(total) => WatchEvent::Rescanned { total },
                        Err(err) => WatchEvent::Error(err),
                    }
                }
                Ok(_) => continue,
                Err(err) => WatchEvent::Error(anyhow::Error::new(err).context("watcher error")),
            };
            if sender.send(event).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn watcher(root: &std::path::Path) -> ContentWatcher {
        let registry = SharedRegistry::new(ContentRegistry::with_categories(["LevelFiles"]));
        ContentWatcher::new(
            root,
            vec![
                ScanRule::new("LevelFiles", "levels/*.mis"),
                ScanRule::new("Unused", "other/*.cs"),
            ],
            ContentScanner::default(),
            registry,
        )
    }

    #[test]
    fn rescan_tracks_additions_and_deletions() -> Result<()> {
        let temp = tempdir()?;
        let levels = temp.path().join("levels");
        fs::create_dir_all(&levels)?;
        fs::write(levels.join("island.mis"), b"new Scene() {};")?;

        let watcher = watcher(temp.path());
        assert_eq!(watcher.rescan()?, 1);

        fs::write(levels.join("desert.mis"), b"new Scene() {};")?;
        assert_eq!(watcher.rescan()?, 2);

        fs::remove_file(levels.join("island.mis"))?;
        assert_eq!(watcher.rescan()?, 1);
        let snapshot = watcher.registry().snapshot();
        assert_eq!(
            snapshot.paths("LevelFiles"),
            [PathBuf::from("levels/desert.mis")]
        );
        assert!(!snapshot.has_category("Unused"));
        Ok(())
    }

    #[test]
    fn rescan_is_idempotent() -> Result<()> {
        let temp = tempdir()?;
        let levels = temp.path().join("levels");
        fs::create_dir_all(&levels)?;
        fs::write(levels.join("island.mis"), b"new Scene() {};")?;

        let watcher = watcher(temp.path());
        watcher.rescan()?;
        let first = watcher.registry().snapshot();
        watcher.rescan()?;
        assert_eq!(first, watcher.registry().snapshot());
        Ok(())
    }

    #[test]
    fn only_existing_directories_are_watched() -> Result<()> {
        let temp = tempdir()?;
        fs::create_dir_all(temp.path().join("levels"))?;
        let dirs = watcher(temp.path()).watch_dirs();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].0, temp.path().join("levels"));
        Ok(())
    }
}
