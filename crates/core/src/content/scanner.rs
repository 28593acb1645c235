use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use super::registry::ContentRegistry;

/// A directory plus file-name glob, e.g. `data/pkg/levels/*.mis`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRule {
    /// Registry category receiving the discovered files.
    pub category: String,
    /// `dir/glob` pattern relative to the game root.
    pub pattern: String,
    /// Descend into subdirectories.
    #[serde(default)]
    pub recursive: bool,
}

impl ScanRule {
    /// Non-recursive rule.
    pub fn new(category: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            pattern: pattern.into(),
            recursive: false,
        }
    }

    /// Directory part of the pattern, resolved against `root`.
    pub fn directory(&self, root: &Path) -> Result<PathBuf> {
        let (dir, _) = split_pattern(&self.pattern)?;
        Ok(root.join(dir))
    }
}

/// Enumerates content files and registers them, preferring sources over
/// compiled artifacts.
#[derive(Debug, Clone)]
pub struct ContentScanner {
    derived_extension: String,
}

impl Default for ContentScanner {
    fn default() -> Self {
        Self::new("dso")
    }
}

impl ContentScanner {
    /// Scanner treating `<source>.<derived_extension>` as a compiled artifact.
    pub fn new(derived_extension: impl Into<String>) -> Self {
        Self {
            derived_extension: derived_extension
                .into()
                .trim_start_matches('.')
                .to_string(),
        }
    }

    /// Extension of compiled artifacts, without the leading dot.
    pub fn derived_extension(&self) -> &str {
        &self.derived_extension
    }

    /// Scan `pattern` (relative to the working directory) into `registry[category]`.
    ///
    /// Returns how many paths were newly registered.
    pub fn scan(
        &self,
        pattern: &str,
        registry: &mut ContentRegistry,
        category: &str,
    ) -> Result<usize> {
        self.scan_in(Path::new(""), pattern, false, registry, category)
    }

    /// Scan a rule whose pattern is relative to `root`. Registered paths stay
    /// relative to `root`.
    pub fn scan_rule(
        &self,
        root: &Path,
        rule: &ScanRule,
        registry: &mut ContentRegistry,
    ) -> Result<usize> {
        self.scan_in(root, &rule.pattern, rule.recursive, registry, &rule.category)
    }

    fn scan_in(
        &self,
        root: &Path,
        pattern: &str,
        recursive: bool,
        registry: &mut ContentRegistry,
        category: &str,
    ) -> Result<usize> {
        let (dir, glob) = split_pattern(pattern)?;
        let source_re = glob_regex(glob, None)?;
        let derived_re = glob_regex(glob, Some(&self.derived_extension))?;

        let scan_dir = root.join(dir);
        if !scan_dir.is_dir() {
            debug!("content directory {} not present", scan_dir.display());
            return Ok(0);
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut added = 0;
        for entry in WalkDir::new(&scan_dir)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy();
            let candidate = if derived_re.is_match(&name) {
                let source = strip_derived(entry.path(), &self.derived_extension);
                if is_valid(&source) {
                    Some(source)
                } else if is_valid(entry.path()) {
                    Some(entry.path().to_path_buf())
                } else {
                    None
                }
            } else if source_re.is_match(&name) && is_valid(entry.path()) {
                Some(entry.path().to_path_buf())
            } else {
                None
            };

            let Some(path) = candidate else {
                continue;
            };
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            if registry.insert(category, relative) {
                added += 1;
            }
        }

        debug!("registered {added} new file(s) in {category} from {pattern}");
        Ok(added)
    }

    /// Resolve a script path the way the engine executes it: the source when
    /// valid, else its compiled artifact when valid.
    pub fn resolve_source(&self, source: &Path) -> Option<PathBuf> {
        if is_valid(source) {
            return Some(source.to_path_buf());
        }
        let derived = with_derived(source, &self.derived_extension);
        is_valid(&derived).then_some(derived)
    }
}

/// A regular, non-empty file.
pub fn is_valid(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn split_pattern(pattern: &str) -> Result<(&str, &str)> {
    let pattern = pattern.trim();
    let (dir, glob) = match pattern.rfind('/') {
        Some(index) => (&pattern[..index], &pattern[index + 1..]),
        None => ("", pattern),
    };
    if glob.is_empty() {
        return Err(anyhow!("scan pattern '{pattern}' has no file glob"));
    }
    Ok((dir, glob))
}

fn glob_regex(glob: &str, derived_extension: Option<&str>) -> Result<Regex> {
    let mut expr = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    if let Some(ext) = derived_extension {
        expr.push_str(&regex::escape(&format!(".{ext}")));
    }
    expr.push('$');
    Regex::new(&expr).with_context(|| format!("invalid scan glob '{glob}'"))
}

fn strip_derived(path: &Path, derived_extension: &str) -> PathBuf {
    let raw = path.to_string_lossy();
    let suffix = format!(".{derived_extension}");
    PathBuf::from(raw.strip_suffix(&suffix).unwrap_or(&raw))
}

fn with_derived(path: &Path, derived_extension: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(format!(".{derived_extension}"));
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DATABLOCKS: &str = "DatablockFiles";

    fn scan_dir(root: &Path) -> Result<ContentRegistry> {
        let mut registry = ContentRegistry::with_categories([DATABLOCKS]);
        let scanner = ContentScanner::default();
        let rule = ScanRule::new(DATABLOCKS, "scripts/datablocks/*.cs");
        scanner.scan_rule(root, &rule, &mut registry)?;
        Ok(registry)
    }

    #[test]
    fn source_shadows_derived_artifact() -> Result<()> {
        let temp = tempdir()?;
        let dir = temp.path().join("scripts/datablocks");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("player.cs"), "datablock PlayerData(Soldier) {};")?;
        fs::write(dir.join("player.cs.dso"), b"\x01\x02")?;

        let registry = scan_dir(temp.path())?;
        assert_eq!(
            registry.paths(DATABLOCKS),
            &[PathBuf::from("scripts/datablocks/player.cs")]
        );
        Ok(())
    }

    #[test]
    fn derived_artifact_registered_without_source() -> Result<()> {
        let temp = tempdir()?;
        let dir = temp.path().join("scripts/datablocks");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("weapon.cs.dso"), b"\x01")?;

        let registry = scan_dir(temp.path())?;
        assert_eq!(
            registry.paths(DATABLOCKS),
            &[PathBuf::from("scripts/datablocks/weapon.cs.dso")]
        );
        Ok(())
    }

    #[test]
    fn empty_source_falls_back_to_derived_and_empty_pairs_are_skipped() -> Result<()> {
        let temp = tempdir()?;
        let dir = temp.path().join("scripts/datablocks");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("ammo.cs"), "")?;
        fs::write(dir.join("ammo.cs.dso"), b"\x07")?;
        fs::write(dir.join("blank.cs"), "")?;
        fs::write(dir.join("blank.cs.dso"), b"")?;
        fs::write(dir.join("notes.txt"), "not content")?;

        let registry = scan_dir(temp.path())?;
        assert_eq!(
            registry.paths(DATABLOCKS),
            &[PathBuf::from("scripts/datablocks/ammo.cs.dso")]
        );
        Ok(())
    }

    #[test]
    fn rescanning_adds_nothing_new() -> Result<()> {
        let temp = tempdir()?;
        let dir = temp.path().join("levels");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("island.mis"), "new SimGroup(MissionGroup) {};")?;
        fs::write(dir.join("arena.mis"), "new SimGroup(MissionGroup) {};")?;

        let scanner = ContentScanner::default();
        let rule = ScanRule::new("LevelFiles", "levels/*.mis");
        let mut registry = ContentRegistry::with_categories(["LevelFiles"]);
        assert_eq!(scanner.scan_rule(temp.path(), &rule, &mut registry)?, 2);
        assert_eq!(scanner.scan_rule(temp.path(), &rule, &mut registry)?, 0);
        assert_eq!(
            registry.paths("LevelFiles"),
            &[PathBuf::from("levels/arena.mis"), PathBuf::from("levels/island.mis")]
        );
        Ok(())
    }

    #[test]
    fn recursive_rules_descend_and_missing_directories_are_empty() -> Result<()> {
        let temp = tempdir()?;
        let nested = temp.path().join("levels/campaign");
        fs::create_dir_all(&nested)?;
        fs::write(nested.join("one.mis"), "mission")?;

        let scanner = ContentScanner::default();
        let mut registry = ContentRegistry::default();
        let flat = ScanRule::new("LevelFiles", "levels/*.mis");
        assert_eq!(scanner.scan_rule(temp.path(), &flat, &mut registry)?, 0);

        let deep = ScanRule {
            recursive: true,
            ..flat.clone()
        };
        assert_eq!(scanner.scan_rule(temp.path(), &deep, &mut registry)?, 1);

        let absent = ScanRule::new("LevelFiles", "missing/*.mis");
        assert_eq!(scanner.scan_rule(temp.path(), &absent, &mut registry)?, 0);
        Ok(())
    }

    #[test]
    fn resolve_source_prefers_source_then_artifact() -> Result<()> {
        let temp = tempdir()?;
        let scanner = ContentScanner::new(".dso");
        let source = temp.path().join("camera.cs");
        assert_eq!(scanner.resolve_source(&source), None);

        fs::write(temp.path().join("camera.cs.dso"), b"\x01")?;
        assert_eq!(
            scanner.resolve_source(&source),
            Some(temp.path().join("camera.cs.dso"))
        );

        fs::write(&source, "function Camera::onAdd() {}")?;
        assert_eq!(scanner.resolve_source(&source), Some(source.clone()));
        Ok(())
    }

    #[test]
    fn patterns_without_a_glob_are_rejected() {
        assert!(split_pattern("levels/").is_err());
        assert_eq!(split_pattern("*.mis").ok(), Some(("", "*.mis")));
    }
}
