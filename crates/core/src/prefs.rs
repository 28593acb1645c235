//! User preference resolution.
//!
//! Two tiers, no merging: a readable override in the profile directory wins
//! outright, otherwise the packaged defaults are used.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::content::is_valid;

/// Default name of the user preference override.
pub const CLIENT_PREFS_FILE: &str = "clientPrefs.cs";

/// Preference key that requests graphics auto-detection on first run.
pub const AUTO_DETECT_KEY: &str = "pref::Video::autoDetect";

/// Where this session's preferences come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "path", rename_all = "snake_case")]
pub enum PreferenceSource {
    /// The user's own file in the profile directory.
    UserOverride(PathBuf),
    /// The defaults shipped with the game.
    PackagedDefault(PathBuf),
}

impl PreferenceSource {
    /// File the preferences come from.
    pub fn path(&self) -> &Path {
        match self {
            PreferenceSource::UserOverride(path) | PreferenceSource::PackagedDefault(path) => path,
        }
    }

    /// True for the user's profile copy.
    pub fn is_user_override(&self) -> bool {
        matches!(self, PreferenceSource::UserOverride(_))
    }
}

/// Pick `profile_dir/clientPrefs.cs` when readable, else `packaged_default`.
pub fn resolve_preferences(profile_dir: &Path, packaged_default: &Path) -> PreferenceSource {
    resolve_override(&profile_dir.join(CLIENT_PREFS_FILE), packaged_default)
}

/// Two-tier choice between an override file and a packaged default.
pub fn resolve_override(candidate: &Path, packaged_default: &Path) -> PreferenceSource {
    if is_readable(candidate) {
        debug!("using user preferences {}", candidate.display());
        PreferenceSource::UserOverride(candidate.to_path_buf())
    } else {
        debug!("no user preferences, using {}", packaged_default.display());
        PreferenceSource::PackagedDefault(packaged_default.to_path_buf())
    }
}

// Same rule the script host applies before executing: a regular, non-empty
// file. An empty override falls back instead of being chosen and skipped.
fn is_readable(path: &Path) -> bool {
    is_valid(path) && File::open(path).is_ok()
}

static PREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*\$(pref(?:::\w+)+)\s*=\s*(?:"([^"]*)"|([^;\s]+))\s*;"#)
        .expect("invalid preference regex")
});

/// `$pref::...` assignments read from a preference script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    values: BTreeMap<String, String>,
}

impl Preferences {
    /// Parse assignments; later assignments to the same key win.
    pub fn parse(content: &str) -> Self {
        let values = PREF_RE
            .captures_iter(content)
            .filter_map(|caps| {
                let key = caps.get(1)?.as_str().to_string();
                let value = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
                Some((key, value))
            })
            .collect();
        Self { values }
    }

    /// Read and parse the file behind a resolved source.
    pub fn load(source: &PreferenceSource) -> Result<Self> {
        let path = source.path();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read preferences {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Raw value for a key such as `pref::Video::autoDetect`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key.trim_start_matches('$'))
            .map(String::as_str)
    }

    /// Script-style truthiness: non-zero numbers and `true`.
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).map(|value| {
            let value = value.trim();
            value.eq_ignore_ascii_case("true")
                || value.parse::<f64>().map(|n| n != 0.0).unwrap_or(false)
        })
    }

    /// Number of assignments read.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no assignment was read.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn user_override_selected_when_present() -> Result<()> {
        let temp = tempdir()?;
        let profile = temp.path().join("profile");
        fs::create_dir_all(&profile)?;
        let default = temp.path().join("data/defaults.cs");

        assert_eq!(
            resolve_preferences(&profile, &default),
            PreferenceSource::PackagedDefault(default.clone())
        );

        fs::write(profile.join(CLIENT_PREFS_FILE), "$pref::Video::mode = \"800 600\";")?;
        let source = resolve_preferences(&profile, &default);
        assert!(source.is_user_override());
        assert_eq!(source.path(), profile.join(CLIENT_PREFS_FILE));
        Ok(())
    }

    #[test]
    fn empty_override_falls_back_to_default() -> Result<()> {
        let temp = tempdir()?;
        fs::write(temp.path().join(CLIENT_PREFS_FILE), "")?;
        let default = temp.path().join("defaults.cs");
        assert_eq!(
            resolve_preferences(temp.path(), &default),
            PreferenceSource::PackagedDefault(default.clone())
        );
        Ok(())
    }

    #[test]
    fn directory_named_like_override_is_ignored() -> Result<()> {
        let temp = tempdir()?;
        fs::create_dir_all(temp.path().join(CLIENT_PREFS_FILE))?;
        let default = temp.path().join("defaults.cs");
        assert!(!resolve_preferences(temp.path(), &default).is_user_override());
        Ok(())
    }

    #[test]
    fn parses_assignments_and_flags() {
        let prefs = Preferences::parse(
            r#"
$pref::Video::autoDetect = 1;
$pref::Video::mode = "1280 720 false 32 60 4";
$pref::Player::Name = "Visitor";
// $pref::Commented::out = 1;
$pref::Video::disableVerticalSync = false;
$pref::Video::autoDetect = "0";
"#,
        );
        assert_eq!(prefs.get("pref::Player::Name"), Some("Visitor"));
        assert_eq!(prefs.get("$pref::Video::mode"), Some("1280 720 false 32 60 4"));
        assert_eq!(prefs.flag(AUTO_DETECT_KEY), Some(false));
        assert_eq!(prefs.flag("pref::Video::disableVerticalSync"), Some(false));
        assert_eq!(prefs.get("pref::Commented::out"), None);
        assert_eq!(prefs.len(), 4);
    }

    #[test]
    fn loads_through_resolved_source() -> Result<()> {
        let temp = tempdir()?;
        let default = temp.path().join("defaults.cs");
        fs::write(&default, "$pref::Video::autoDetect = true;\n")?;
        let prefs = Preferences::load(&resolve_preferences(temp.path(), &default))?;
        assert_eq!(prefs.flag(AUTO_DETECT_KEY), Some(true));
        Ok(())
    }
}
