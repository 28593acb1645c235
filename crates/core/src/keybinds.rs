//! Layered input bindings.
//!
//! Packaged defaults are loaded first; a user override file is layered on top
//! only when present. A layer may redefine a binding but never removes one.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default name of the user keybind override.
pub const USER_KEYBINDS_FILE: &str = "keybinds.cs";

static BIND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*(\w+)\.bind\(\s*(\w+)\s*,\s*(?:"([^"]+)"|([^,\s]+))\s*,\s*"?(\w+)"?\s*\)\s*;"#,
    )
    .expect("invalid keybind regex")
});

/// Identifies a physical input within an action map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BindingKey {
    /// Action map the binding lives in, e.g. `moveMap`.
    pub map: String,
    /// Input device, e.g. `keyboard` or `mouse`.
    pub device: String,
    /// Key or event name, e.g. `w` or `shift tab`.
    pub key: String,
}

impl BindingKey {
    /// Key names are trimmed; map and device are kept verbatim.
    pub fn new(map: &str, device: &str, key: &str) -> Self {
        Self {
            map: map.to_string(),
            device: device.to_string(),
            key: key.trim().to_string(),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.map, self.device, self.key)
    }
}

/// Table of input bindings built from one or more binding scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(with = "binding_list")]
    bindings: BTreeMap<BindingKey, String>,
}

impl KeyBindings {
    /// Parse `map.bind(device, key, command);` lines.
    pub fn parse(content: &str) -> Self {
        let mut bindings = Self::default();
        for caps in BIND_RE.captures_iter(content) {
            let (Some(map), Some(device), Some(command)) = (caps.get(1), caps.get(2), caps.get(5))
            else {
                continue;
            };
            let Some(key) = caps.get(3).or_else(|| caps.get(4)) else {
                continue;
            };
            bindings.bind(
                BindingKey::new(map.as_str(), device.as_str(), key.as_str()),
                command.as_str(),
            );
        }
        bindings
    }

    /// Parse a binding script from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read keybinds {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Defaults from `defaults`, then `user_override` layered on top if it exists.
    pub fn load_layered(defaults: &Path, user_override: &Path) -> Result<Self> {
        let mut bindings = Self::load(defaults)?;
        if user_override.is_file() {
            bindings.layer(Self::load(user_override)?);
        } else {
            debug!("no keybind override at {}", user_override.display());
        }
        Ok(bindings)
    }

    /// Bind `key`, replacing any previous command.
    pub fn bind(&mut self, key: BindingKey, command: impl Into<String>) {
        self.bindings.insert(key, command.into());
    }

    /// Apply every binding of `overrides`, replacing matching keys.
    pub fn layer(&mut self, overrides: KeyBindings) {
        self.bindings.extend(overrides.bindings);
    }

    /// Command bound to `key` in `map` on `device`.
    pub fn command(&self, map: &str, device: &str, key: &str) -> Option<&str> {
        self.bindings
            .get(&BindingKey::new(map, device, key))
            .map(String::as_str)
    }

    /// Bindings ordered by map, device, then key.
    pub fn iter(&self) -> impl Iterator<Item = (&BindingKey, &str)> {
        self.bindings
            .iter()
            .map(|(key, command)| (key, command.as_str()))
    }

    /// Number of bound keys.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// JSON object keys must be strings, so the table is stored as a list.
mod binding_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::BindingKey;

    #[derive(Serialize, Deserialize)]
    struct Binding {
        #[serde(flatten)]
        key: BindingKey,
        command: String,
    }

    pub fn serialize<S: Serializer>(
        bindings: &BTreeMap<BindingKey, String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        bindings
            .iter()
            .map(|(key, command)| Binding {
                key: key.clone(),
                command: command.clone(),
            })
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<BindingKey, String>, D::Error> {
        let list = Vec::<Binding>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|binding| (binding.key, binding.command))
            .collect())
    }
}
