//! Package descriptors and the ordered manifests built from them.
//!
//! A descriptor is authored as JSON next to its module:
//!
//! ```json
//! {
//!   "name": "pkg",
//!   "server": ["./scripts/server/camera.cs", "./scripts/server/player.cs"],
//!   "content": [{ "category": "LevelFiles", "pattern": "data/pkg/levels/*.mis" }],
//!   "client": {
//!     "default_keybinds": "data/pkg/scripts/client/default.keybinds.cs",
//!     "user_keybinds": "$prefs/keybinds.cs",
//!     "guis": ["./scripts/gui/playGui.gui"]
//!   }
//! }
//! ```

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{content::ScanRule, mode::RunMode};

const PACKAGE_PREFIX: &str = "./";
const PROFILE_PREFIX: &str = "$prefs/";

/// What a manifest path is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    /// The directory holding the package descriptor.
    Package,
    /// The game root.
    Game,
    /// The user profile directory.
    Profile,
}

/// A manifest path together with its anchor.
///
/// Written as `./x` (package), `$prefs/x` (profile) or a plain relative path
/// (game root).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath {
    anchor: Anchor,
    relative: PathBuf,
}

impl ResourcePath {
    /// Path `relative` to `anchor`.
    pub fn new(anchor: Anchor, relative: impl Into<PathBuf>) -> Self {
        Self {
            anchor,
            relative: relative.into(),
        }
    }

    /// Directory the path is relative to.
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Path below the anchor, without its prefix.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Absolute location given the three anchor directories.
    pub fn resolve(&self, roots: &AnchorRoots<'_>) -> PathBuf {
        let base = match self.anchor {
            Anchor::Package => roots.package,
            Anchor::Game => roots.game,
            Anchor::Profile => roots.profile,
        };
        base.join(&self.relative)
    }
}

impl FromStr for ResourcePath {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (anchor, relative) = if let Some(rest) = raw.strip_prefix(PACKAGE_PREFIX) {
            (Anchor::Package, rest)
        } else if let Some(rest) = raw.strip_prefix(PROFILE_PREFIX) {
            (Anchor::Profile, rest)
        } else {
            (Anchor::Game, raw)
        };
        if relative.is_empty() {
            return Err(format!("empty resource path '{raw}'"));
        }
        if Path::new(relative).is_absolute() {
            return Err(format!("resource path '{raw}' must be relative"));
        }
        Ok(Self::new(anchor, relative))
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.anchor {
            Anchor::Package => PACKAGE_PREFIX,
            Anchor::Profile => PROFILE_PREFIX,
            Anchor::Game => "",
        };
        write!(f, "{prefix}{}", self.relative.display())
    }
}

/// Directories the three anchors resolve against.
#[derive(Debug, Clone, Copy)]
pub struct AnchorRoots<'a> {
    /// Directory of the package descriptor, for `./` paths.
    pub package: &'a Path,
    /// Game root, for plain paths.
    pub game: &'a Path,
    /// User profile directory, for `$prefs/` paths.
    pub profile: &'a Path,
}

/// How the engine consumes an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Executed as a script.
    Script,
    /// Executed to construct a GUI.
    Gui,
    /// Executed, and its bindings layered into the report.
    Keybinds,
}

/// Which startup path an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Run on every startup path.
    Shared,
    /// Run only when a client is starting.
    Client,
}

/// One resource to execute during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Where the resource lives.
    pub path: ResourcePath,
    /// How the host consumes it.
    pub kind: EntryKind,
    /// Startup path it belongs to.
    pub scope: Scope,
    /// Absent optional entries are expected and not reported.
    pub optional: bool,
}

/// Ordered list of resources to load. Client entries always follow shared ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    entries: Vec<ManifestEntry>,
}

impl PackageManifest {
    /// Every entry, shared ones first.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Entries run by both startup paths.
    pub fn shared(&self) -> &[ManifestEntry] {
        &self.entries[..self.client_start()]
    }

    /// Entries run only by the client path.
    pub fn client(&self) -> &[ManifestEntry] {
        &self.entries[self.client_start()..]
    }

    /// Number of entries across both scopes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing would be executed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn client_start(&self) -> usize {
        self.entries
            .iter()
            .position(|entry| entry.scope == Scope::Client)
            .unwrap_or(self.entries.len())
    }

    fn push(&mut self, path: &ResourcePath, kind: EntryKind, scope: Scope, optional: bool) {
        self.entries.push(ManifestEntry {
            path: path.clone(),
            kind,
            scope,
            optional,
        });
    }
}

/// Client-only part of a descriptor, appended in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    /// GUI profiles, loaded before anything that draws.
    pub profiles: Vec<ResourcePath>,
    /// Baseline bindings, always loaded.
    pub default_keybinds: Option<ResourcePath>,
    /// User override layered over the defaults when present.
    pub user_keybinds: Option<ResourcePath>,
    /// Scripts defining the commands the bindings call.
    pub input_commands: Vec<ResourcePath>,
    /// GUI definitions.
    pub guis: Vec<ResourcePath>,
    /// Remaining client scripts.
    pub scripts: Vec<ResourcePath>,
}

/// Authored description of a package's scripts and content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Package name, used in logs.
    pub name: String,
    /// Scripts run on every startup path, in order.
    #[serde(default)]
    pub server: Vec<ResourcePath>,
    /// Content discovery rules, run after the server scripts.
    #[serde(default)]
    pub content: Vec<ScanRule>,
    /// Entries appended only for clients.
    #[serde(default)]
    pub client: ClientSection,
}

impl PackageDescriptor {
    /// Read a descriptor from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read package descriptor {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse package descriptor {}", path.display()))
    }

    /// Persist the descriptor as pretty JSON, creating parent directories.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create descriptor directory {}", parent.display())
            })?;
        }
        let serialized =
            serde_json::to_string_pretty(self).context("failed to serialize package descriptor")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write package descriptor {}", path.display()))
    }

    /// Ordered manifest for `mode`. Pure: nothing is checked on disk here.
    pub fn build_manifest(&self, mode: RunMode) -> PackageManifest {
        let mut manifest = PackageManifest::default();
        for script in &self.server {
            manifest.push(script, EntryKind::Script, Scope::Shared, false);
        }

        if !mode.is_client() {
            return manifest;
        }

        let client = &self.client;
        for profile in &client.profiles {
            manifest.push(profile, EntryKind::Script, Scope::Client, false);
        }
        if let Some(defaults) = &client.default_keybinds {
            manifest.push(defaults, EntryKind::Keybinds, Scope::Client, false);
        }
        if let Some(overrides) = &client.user_keybinds {
            manifest.push(overrides, EntryKind::Keybinds, Scope::Client, true);
        }
        for script in &client.input_commands {
            manifest.push(script, EntryKind::Script, Scope::Client, false);
        }
        for gui in &client.guis {
            manifest.push(gui, EntryKind::Gui, Scope::Client, false);
        }
        for script in &client.scripts {
            manifest.push(script, EntryKind::Script, Scope::Client, false);
        }
        manifest
    }
}
