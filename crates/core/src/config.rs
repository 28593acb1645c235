//! Layered bootstrap configuration.
//!
//! Values come from built-in defaults, then an optional `pkgboot.toml`, then
//! `PKGBOOT_*` environment variables (`PKGBOOT_RUN_MODE=dedicated`,
//! `PKGBOOT_GAME_ROOT=/srv/game`, ...).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::mode::RunMode;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pkgboot.toml";

/// Runtime configuration for a bootstrap run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name, also used for the profile directory.
    pub app_name: String,
    /// Directory all game-anchored paths are relative to.
    pub game_root: PathBuf,
    /// User profile directory. Falls back to the platform config dir.
    pub profile_dir: Option<PathBuf>,
    /// Dedicated server or interactive client.
    pub run_mode: RunMode,
    /// Directory scanned for core modules, relative to the game root.
    pub core_modules_dir: PathBuf,
    /// Core module loaded explicitly before any game module.
    pub core_module: String,
    /// Directory scanned for gameplay modules, relative to the game root.
    pub game_modules_dir: PathBuf,
    /// Module group loaded after the core module.
    pub module_group: String,
    /// File extension of module descriptors.
    pub module_extension: String,
    /// Packaged preferences used when the profile has none.
    pub default_prefs: PathBuf,
    /// Name of the user preference override inside the profile directory.
    pub client_prefs_file: String,
    /// Extension appended to a source file name by the script compiler.
    pub derived_extension: String,
    /// Lighting system requested from the engine on the client path.
    pub lighting: String,
    /// Forces graphics auto-detection on or off regardless of preferences.
    pub auto_detect: Option<bool>,
    /// Registry categories the engine declares before packages load.
    pub content_categories: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Expeditious".to_string(),
            game_root: PathBuf::from("."),
            profile_dir: None,
            run_mode: RunMode::Client,
            core_modules_dir: PathBuf::from("core"),
            core_module: "CoreModule".to_string(),
            game_modules_dir: PathBuf::from("data"),
            module_group: "Game".to_string(),
            module_extension: "module".to_string(),
            default_prefs: PathBuf::from("data/defaults.cs"),
            client_prefs_file: "clientPrefs.cs".to_string(),
            derived_extension: "dso".to_string(),
            lighting: "Advanced Lighting".to_string(),
            auto_detect: None,
            content_categories: vec!["DatablockFiles".to_string(), "LevelFiles".to_string()],
        }
    }
}

impl AppConfig {
    /// Load configuration from `pkgboot.toml` in the working directory, if present.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from the given file (optional) layered with the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("PKGBOOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Resolved user profile directory.
    pub fn profile_dir(&self) -> PathBuf {
        self.profile_dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(&self.app_name)
        })
    }

    /// Packaged preference file resolved against the game root.
    pub fn default_prefs_path(&self) -> PathBuf {
        self.game_root.join(&self.default_prefs)
    }
}
