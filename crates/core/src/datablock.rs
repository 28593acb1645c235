//! Declarative datablock records and copy-source inheritance.
//!
//! Parses blocks of the form
//!
//! ```text
//! datablock ParticleData(CloudParticle0 : DefaultParticle)
//! {
//!    textureName = "data/pkg/art/particles/clouds/cloud0.png";
//!    sizes[0] = "50";
//! };
//! ```
//!
//! and `singleton Material(Name) { ... };`. Inheritance is resolved at load
//! time by copying the base's resolved fields and applying the record's own
//! fields over them.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::content::ContentRegistry;

static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\b(datablock|singleton)\s+(\w+)\s*\(\s*(\w+)\s*(?::\s*(\w+)\s*)?\)\s*\{(.*?)\}\s*;",
    )
    .expect("invalid datablock regex")
});

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*([A-Za-z_]\w*)\s*(?:\[\s*(\d+)\s*\])?\s*=\s*(?:"((?:[^"\\]|\\.)*)"|([^;]*?))\s*;"#,
    )
    .expect("invalid datablock field regex")
});

/// Errors raised while resolving datablock inheritance.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DatablockError {
    #[error("datablock '{0}' is not defined")]
    Unknown(String),

    #[error("datablock '{name}' copies from undefined datablock '{base}'")]
    UnknownBase { name: String, base: String },

    #[error("datablock '{name}' ({class}) cannot copy from '{base}' ({base_class})")]
    ClassMismatch {
        name: String,
        class: String,
        base: String,
        base_class: String,
    },

    #[error("datablock inheritance cycle: {chain}")]
    Cycle { chain: String },
}

/// Declaration keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    /// Networked configuration record.
    Datablock,
    /// Client-side singleton such as a material.
    Singleton,
}

/// Field assignments in authored order. Names compare case-insensitively,
/// as the script language does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    /// Set a field, replacing an existing one in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Apply every field of `overrides` on top of these.
    pub fn apply(&mut self, overrides: &Fields) {
        for (name, value) in overrides.iter() {
            self.set(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One declared record, before inheritance is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datablock {
    pub kind: DeclKind,
    pub class: String,
    pub name: String,
    /// Copy source named after the colon, if any.
    pub base: Option<String>,
    pub fields: Fields,
    pub source: Option<PathBuf>,
}

/// A record with its base chain applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDatablock {
    pub class: String,
    pub name: String,
    /// Names from the record itself up to its root base.
    pub lineage: Vec<String>,
    pub fields: Fields,
}

/// Parse every block in a script. Line comments are ignored.
pub fn parse_datablocks(content: &str, source: Option<&Path>) -> Vec<Datablock> {
    let stripped = strip_line_comments(content);
    BLOCK_RE
        .captures_iter(&stripped)
        .filter_map(|caps| {
            let kind = match caps.get(1)?.as_str() {
                "singleton" => DeclKind::Singleton,
                _ => DeclKind::Datablock,
            };
            let mut fields = Fields::default();
            for field in FIELD_RE.captures_iter(caps.get(5)?.as_str()) {
                let Some(name) = field.get(1) else {
                    continue;
                };
                let name = match field.get(2) {
                    Some(index) => format!("{}[{}]", name.as_str(), index.as_str()),
                    None => name.as_str().to_string(),
                };
                let value = field
                    .get(3)
                    .or_else(|| field.get(4))
                    .map(|value| value.as_str().trim())
                    .unwrap_or_default();
                fields.set(name, value);
            }
            Some(Datablock {
                kind,
                class: caps.get(2)?.as_str().to_string(),
                name: caps.get(3)?.as_str().to_string(),
                base: caps.get(4).map(|base| base.as_str().to_string()),
                fields,
                source: source.map(Path::to_path_buf),
            })
        })
        .collect()
}

fn strip_line_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        let mut in_string = false;
        let mut escaped = false;
        let mut cut = line.len();
        let bytes = line.as_bytes();
        for (index, &byte) in bytes.iter().enumerate() {
            match byte {
                _ if escaped => escaped = false,
                b'\\' if in_string => escaped = true,
                b'"' => in_string = !in_string,
                b'/' if !in_string && bytes.get(index + 1) == Some(&b'/') => {
                    cut = index;
                    break;
                }
                _ => {}
            }
        }
        out.push_str(&line[..cut]);
        out.push('\n');
    }
    out
}

/// All known records, keyed case-insensitively by name. Redefining a name
/// replaces the earlier record.
#[derive(Debug, Clone, Default)]
pub struct DatablockSet {
    records: BTreeMap<String, Datablock>,
}

impl DatablockSet {
    pub fn insert(&mut self, datablock: Datablock) {
        let key = datablock.name.to_ascii_lowercase();
        if let Some(previous) = self.records.get(&key) {
            debug!(
                "datablock '{}' redefined (was {})",
                datablock.name,
                previous
                    .source
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "inline".to_string())
            );
        }
        self.records.insert(key, datablock);
    }

    /// Parse a script and add its records. Returns how many were read.
    pub fn load_str(&mut self, content: &str, source: Option<&Path>) -> usize {
        let parsed = parse_datablocks(content, source);
        let count = parsed.len();
        for datablock in parsed {
            self.insert(datablock);
        }
        count
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read datablocks {}", path.display()))?;
        Ok(self.load_str(&content, Some(path)))
    }

    /// Load every source file registered under `category`, resolving paths
    /// against `root`. Compiled artifacts cannot be parsed and are skipped.
    pub fn load_registry(
        &mut self,
        root: &Path,
        registry: &ContentRegistry,
        category: &str,
        derived_extension: &str,
    ) -> usize {
        let mut total = 0;
        for path in registry.paths(category) {
            if path.extension().and_then(|ext| ext.to_str()) == Some(derived_extension) {
                debug!("skipping compiled datablocks {}", path.display());
                continue;
            }
            match self.load_file(root.join(path)) {
                Ok(count) => total += count,
                Err(err) => warn!("Skipping datablocks {}: {err:#}", path.display()),
            }
        }
        total
    }

    pub fn get(&self, name: &str) -> Option<&Datablock> {
        self.records.get(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Datablock> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply the copy-source chain of `name`, root base first.
    pub fn resolve(&self, name: &str) -> Result<ResolvedDatablock, DatablockError> {
        let leaf = self
            .get(name)
            .ok_or_else(|| DatablockError::Unknown(name.to_string()))?;

        let mut chain = vec![leaf];
        let mut seen = HashSet::from([leaf.name.to_ascii_lowercase()]);
        let mut current = leaf;
        while let Some(base_name) = &current.base {
            let base = self.get(base_name).ok_or_else(|| DatablockError::UnknownBase {
                name: current.name.clone(),
                base: base_name.clone(),
            })?;
            if !seen.insert(base.name.to_ascii_lowercase()) {
                let mut names: Vec<&str> = chain.iter().map(|block| block.name.as_str()).collect();
                names.push(base.name.as_str());
                return Err(DatablockError::Cycle {
                    chain: names.join(" -> "),
                });
            }
            if !base.class.eq_ignore_ascii_case(&current.class) {
                return Err(DatablockError::ClassMismatch {
                    name: current.name.clone(),
                    class: current.class.clone(),
                    base: base.name.clone(),
                    base_class: base.class.clone(),
                });
            }
            chain.push(base);
            current = base;
        }

        let mut fields = Fields::default();
        for block in chain.iter().rev() {
            fields.apply(&block.fields);
        }

        Ok(ResolvedDatablock {
            class: leaf.class.clone(),
            name: leaf.name.clone(),
            lineage: chain.iter().map(|block| block.name.clone()).collect(),
            fields,
        })
    }
}
