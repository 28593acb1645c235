//! Module discovery and dependency-ordered loading.
//!
//! Modules are declared by small JSON files carrying the module extension
//! (`pkg.module` by default):
//!
//! ```json
//! {
//!   "moduleId": "pkg",
//!   "versionId": 1,
//!   "group": "Game",
//!   "scriptFile": "pkg.cs",
//!   "package": "pkg.json",
//!   "dependencies": ["CoreModule=1"]
//! }
//! ```

use std::{
    collections::{BTreeMap, HashSet},
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Errors raised while resolving module load order.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModuleError {
    /// Requested module was never scanned.
    #[error("module '{id}' is not registered{}", required_by_suffix(.required_by))]
    Unknown {
        /// Id that was asked for.
        id: String,
        /// Module whose dependency named it, if any.
        required_by: Option<String>,
    },

    /// A dependency pins a version the database does not have.
    #[error("module '{id}' has version {found}, but '{required_by}' requires version {required}")]
    VersionMismatch {
        /// Dependency id.
        id: String,
        /// Version the dependent pinned.
        required: u32,
        /// Version that was scanned.
        found: u32,
        /// Module declaring the dependency.
        required_by: String,
    },

    /// Dependencies loop back on themselves.
    #[error("module dependency cycle: {chain}")]
    Cycle {
        /// Ids along the loop, joined with ` -> `.
        chain: String,
    },
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    required_by
        .as_ref()
        .map(|by| format!(" (required by '{by}')"))
        .unwrap_or_default()
}

/// `Id` or `Id=Version`; version 0 accepts any version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleDependency {
    /// Module id depended on.
    pub id: String,
    /// Required version, or 0 for any.
    pub version: u32,
}

impl FromStr for ModuleDependency {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (id, version) = match raw.split_once('=') {
            Some((id, version)) => {
                let version = version.trim();
                let version = if version == "*" {
                    0
                } else {
                    version
                        .parse()
                        .map_err(|_| format!("invalid version in dependency '{raw}'"))?
                };
                (id.trim(), version)
            }
            None => (raw.trim(), 0),
        };
        if id.is_empty() {
            return Err(format!("empty module id in dependency '{raw}'"));
        }
        Ok(Self {
            id: id.to_string(),
            version,
        })
    }
}

impl TryFrom<String> for ModuleDependency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleDependency> for String {
    fn from(dependency: ModuleDependency) -> Self {
        dependency.to_string()
    }
}

impl fmt::Display for ModuleDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version == 0 {
            f.write_str(&self.id)
        } else {
            write!(f, "{}={}", self.id, self.version)
        }
    }
}

/// A scanned module declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDefinition {
    /// Unique module id.
    pub module_id: String,
    /// Declared version; 0 when unset.
    #[serde(default)]
    pub version_id: u32,
    /// Group loaded together by [`ModuleDatabase::load_group`].
    #[serde(default)]
    pub group: Option<String>,
    /// Script executed when the module loads, relative to the module directory.
    #[serde(default)]
    pub script_file: Option<PathBuf>,
    /// Package descriptor, relative to the module directory.
    #[serde(default)]
    pub package: Option<PathBuf>,
    /// Modules loaded before this one.
    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,
    /// Directory the declaration was found in.
    #[serde(skip)]
    pub module_path: PathBuf,
}

impl ModuleDefinition {
    /// Read a declaration file, recording its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read module {}", path.display()))?;
        let mut definition: ModuleDefinition = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse module {}", path.display()))?;
        definition.module_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(definition)
    }

    /// Absolute location of the module script, if one is declared.
    pub fn script_path(&self) -> Option<PathBuf> {
        self.script_file
            .as_ref()
            .map(|file| self.module_path.join(file))
    }

    /// Absolute location of the package descriptor, if one is declared.
    pub fn package_path(&self) -> Option<PathBuf> {
        self.package.as_ref().map(|file| self.module_path.join(file))
    }
}

/// Registry of scanned modules and the order they were loaded in.
#[derive(Debug, Clone)]
pub struct ModuleDatabase {
    extension: String,
    modules: BTreeMap<String, ModuleDefinition>,
    load_order: Vec<String>,
    loaded: HashSet<String>,
}

impl Default for ModuleDatabase {
    fn default() -> Self {
        Self::new("module")
    }
}

impl ModuleDatabase {
    /// Empty database scanning for `*.{extension}` declarations.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_string(),
            modules: BTreeMap::new(),
            load_order: Vec::new(),
            loaded: HashSet::new(),
        }
    }

    /// Change the declaration extension used by later scans.
    pub fn set_module_extension(&mut self, extension: impl Into<String>) {
        self.extension = extension.into().trim_start_matches('.').to_string();
    }

    /// Register every declaration beneath `dir`. Unreadable declarations and
    /// duplicate ids are skipped with a warning. Returns how many were added.
    pub fn scan_modules(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            debug!("module directory {} not present", dir.display());
            return Ok(0);
        }

        let mut added = 0;
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(self.extension.as_str()) {
                continue;
            }

            let definition = match ModuleDefinition::load(path) {
                Ok(definition) => definition,
                Err(err) => {
                    warn!("Skipping module {}: {err:#}", path.display());
                    continue;
                }
            };

            if let Some(existing) = self.modules.get(&definition.module_id) {
                warn!(
                    "Skipping duplicate module '{}' at {} (already registered from {})",
                    definition.module_id,
                    path.display(),
                    existing.module_path.display()
                );
                continue;
            }

            debug!("registered module '{}'", definition.module_id);
            self.modules
                .insert(definition.module_id.clone(), definition);
            added += 1;
        }

        Ok(added)
    }

    /// Load `id` after its dependencies. Returns the newly loaded ids in order;
    /// nothing is marked loaded when resolution fails.
    pub fn load_explicit(&mut self, id: &str) -> Result<Vec<String>, ModuleError> {
        let mut order = Vec::new();
        let mut stack = Vec::new();
        self.visit(id, None, &mut stack, &mut order)?;

        for module in &order {
            info!("loading module '{module}'");
            self.loaded.insert(module.clone());
            self.load_order.push(module.clone());
        }
        Ok(order)
    }

    /// Load every module of `group` (in id order) with its dependencies.
    ///
    /// Members are loaded independently: a member that fails to resolve is
    /// reported and the remaining members still load. Returns the newly
    /// loaded ids in order together with one error per failed member.
    pub fn load_group(&mut self, group: &str) -> (Vec<String>, Vec<ModuleError>) {
        let members: Vec<String> = self
            .modules
            .values()
            .filter(|module| module.group.as_deref() == Some(group))
            .map(|module| module.module_id.clone())
            .collect();

        if members.is_empty() {
            warn!("module group '{group}' has no members");
        }

        let mut loaded = Vec::new();
        let mut failures = Vec::new();
        for id in members {
            match self.load_explicit(&id) {
                Ok(order) => loaded.extend(order),
                Err(err) => {
                    warn!("group '{group}': {err}");
                    failures.push(err);
                }
            }
        }
        (loaded, failures)
    }

    fn visit(
        &self,
        id: &str,
        dependency: Option<(&ModuleDependency, &str)>,
        stack: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> Result<(), ModuleError> {
        let module = self.modules.get(id).ok_or_else(|| ModuleError::Unknown {
            id: id.to_string(),
            required_by: dependency.map(|(_, by)| by.to_string()),
        })?;

        if let Some((dep, by)) = dependency {
            if dep.version != 0 && dep.version != module.version_id {
                return Err(ModuleError::VersionMismatch {
                    id: id.to_string(),
                    required: dep.version,
                    found: module.version_id,
                    required_by: by.to_string(),
                });
            }
        }

        if self.loaded.contains(id) || order.iter().any(|done| done == id) {
            return Ok(());
        }

        if stack.iter().any(|pending| pending == id) {
            let mut chain = stack.clone();
            chain.push(id.to_string());
            return Err(ModuleError::Cycle {
                chain: chain.join(" -> "),
            });
        }

        stack.push(id.to_string());
        for dep in &module.dependencies {
            self.visit(&dep.id, Some((dep, id)), stack, order)?;
        }
        stack.pop();
        order.push(id.to_string());
        Ok(())
    }

    /// Scanned declaration for `id`.
    pub fn module(&self, id: &str) -> Option<&ModuleDefinition> {
        self.modules.get(id)
    }

    /// Whether `id` has been loaded.
    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded.contains(id)
    }

    /// Loaded modules in load order.
    pub fn loaded_modules(&self) -> impl Iterator<Item = &ModuleDefinition> {
        self.load_order
            .iter()
            .filter_map(|id| self.modules.get(id))
    }

    /// Every registered module, sorted by id.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleDefinition> {
        self.modules.values()
    }
}
