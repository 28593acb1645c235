//! Outcome of a bootstrap run, optionally persisted as JSON.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    content::ContentRegistry, keybinds::KeyBindings, mode::RunMode, prefs::PreferenceSource,
};

/// Something that went wrong without stopping the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootFailure {
    /// Module, package or script the failure concerns.
    pub subject: String,
    /// Rendered error.
    pub reason: String,
}

/// Everything a bootstrap run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootReport {
    /// Startup path taken.
    pub mode: RunMode,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// Unset until [`BootReport::finish`] runs.
    pub finished_at: Option<DateTime<Utc>>,
    /// Module ids in load order.
    pub modules: Vec<String>,
    /// Scripts handed to the host, in order.
    pub executed: Vec<PathBuf>,
    /// Required manifest entries that were not on disk.
    pub missing: Vec<PathBuf>,
    /// Optional entries that were not on disk.
    pub skipped_optional: Vec<PathBuf>,
    /// Errors that were logged and skipped.
    pub failures: Vec<BootFailure>,
    /// Content discovered by the packages' scan rules.
    pub registry: ContentRegistry,
    /// Client path only.
    pub preferences: Option<PreferenceSource>,
    /// Bindings layered from every keybind entry executed.
    pub keybindings: KeyBindings,
    /// Whether graphics auto-detection was requested.
    pub auto_detected: bool,
}

impl BootReport {
    /// Empty report starting now, scanning into `registry`.
    pub fn new(mode: RunMode, registry: ContentRegistry) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            finished_at: None,
            modules: Vec::new(),
            executed: Vec::new(),
            missing: Vec::new(),
            skipped_optional: Vec::new(),
            failures: Vec::new(),
            registry,
            preferences: None,
            keybindings: KeyBindings::default(),
            auto_detected: false,
        }
    }

    /// Record a failure and keep going.
    pub fn fail(&mut self, subject: impl Into<String>, reason: impl ToString) {
        self.failures.push(BootFailure {
            subject: subject.into(),
            reason: reason.to_string(),
        });
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True when every required script ran.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.failures.is_empty()
    }

    /// Load a report from the given path, returning `None` if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read boot report {}", path.display()))?;
        let report = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse boot report {}", path.display()))?;
        Ok(Some(report))
    }

    /// Persist the report, creating parent directories if needed.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create report directory {}", parent.display())
            })?;
        }

        let serialized =
            serde_json::to_string_pretty(self).context("failed to serialize boot report")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write boot report {}", path.display()))
    }
}
