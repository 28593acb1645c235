#![allow(missing_docs)]

use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Insertion-ordered set of discovered paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PathBuf>", into = "Vec<PathBuf>")]
pub struct ContentList {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl ContentList {
    /// Add a path unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.seen.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.paths.push(path);
        true
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.seen.contains(path.as_ref())
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl From<Vec<PathBuf>> for ContentList {
    fn from(paths: Vec<PathBuf>) -> Self {
        let mut list = ContentList::default();
        for path in paths {
            list.insert(path);
        }
        list
    }
}

impl From<ContentList> for Vec<PathBuf> {
    fn from(list: ContentList) -> Self {
        list.paths
    }
}

/// Named collections of content files handed to the engine's content system.
///
/// Categories are declared up front by the engine (`DatablockFiles`,
/// `LevelFiles`, ...). Each holds an ordered set, so repeated scans never
/// duplicate a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRegistry {
    categories: BTreeMap<String, ContentList>,
}

impl ContentRegistry {
    /// Registry with the given categories declared and empty.
    pub fn with_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::default();
        for category in categories {
            registry.declare(category);
        }
        registry
    }

    /// Declare a category, keeping its contents if it already exists.
    pub fn declare(&mut self, category: impl Into<String>) {
        self.categories.entry(category.into()).or_default();
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// Insert a path into a category, declaring the category when needed.
    pub fn insert(&mut self, category: &str, path: impl Into<PathBuf>) -> bool {
        self.categories
            .entry(category.to_string())
            .or_default()
            .insert(path)
    }

    pub fn get(&self, category: &str) -> Option<&ContentList> {
        self.categories.get(category)
    }

    /// Paths registered under a category, empty when it is unknown.
    pub fn paths(&self, category: &str) -> &[PathBuf] {
        self.categories
            .get(category)
            .map(ContentList::paths)
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &ContentList)> {
        self.categories
            .iter()
            .map(|(name, list)| (name.as_str(), list))
    }

    /// Total number of registered paths across all categories.
    pub fn total(&self) -> usize {
        self.categories.values().map(ContentList::len).sum()
    }
}

/// Thread-safe handle to a registry that keeps being rescanned after startup.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<ContentRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: ContentRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Clone of the current registry contents.
    pub fn snapshot(&self) -> ContentRegistry {
        self.inner.read().clone()
    }

    /// Run `update` with exclusive access to the registry.
    pub fn update<T>(&self, update: impl FnOnce(&mut ContentRegistry) -> T) -> T {
        let mut inner = self.inner.write();
        update(&mut inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_keep_insertion_order_without_duplicates() {
        let mut registry = ContentRegistry::with_categories(["LevelFiles"]);
        assert!(registry.insert("LevelFiles", "levels/b.mis"));
        assert!(registry.insert("LevelFiles", "levels/a.mis"));
        assert!(!registry.insert("LevelFiles", "levels/b.mis"));

        assert_eq!(
            registry.paths("LevelFiles"),
            &[PathBuf::from("levels/b.mis"), PathBuf::from("levels/a.mis")]
        );
        assert_eq!(registry.total(), 2);
        assert!(registry.paths("DatablockFiles").is_empty());
    }

    #[test]
    fn declaring_twice_keeps_contents() {
        let mut registry = ContentRegistry::default();
        registry.declare("DatablockFiles");
        registry.insert("DatablockFiles", "db/player.cs");
        registry.declare("DatablockFiles");
        assert_eq!(registry.paths("DatablockFiles").len(), 1);
    }

    #[test]
    fn deserialized_lists_are_deduplicated() -> serde_json::Result<()> {
        let registry: ContentRegistry =
            serde_json::from_str(r#"{"categories":{"LevelFiles":["a.mis","a.mis","b.mis"]}}"#)?;
        let list = registry.get("LevelFiles").expect("category");
        assert_eq!(list.len(), 2);
        assert!(list.contains("b.mis"));
        Ok(())
    }

    #[test]
    fn shared_registry_updates_are_visible_in_snapshots() {
        let shared = SharedRegistry::new(ContentRegistry::with_categories(["LevelFiles"]));
        let handle = shared.clone();
        handle.update(|registry| registry.insert("LevelFiles", "levels/new.mis"));
        assert_eq!(shared.snapshot().paths("LevelFiles").len(), 1);
    }
}
