//! Process-wide run mode.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Whether the process runs as a headless server or an interactive client.
///
/// Chosen once at startup; the bootstrap only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Headless server. Client-only content is never touched.
    Dedicated,
    /// Interactive client with rendering, UI and input bindings.
    #[default]
    Client,
}

impl RunMode {
    /// True for the interactive client.
    pub fn is_client(self) -> bool {
        matches!(self, RunMode::Client)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Dedicated => f.write_str("dedicated"),
            RunMode::Client => f.write_str("client"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dedicated" | "server" => Ok(RunMode::Dedicated),
            "client" => Ok(RunMode::Client),
            other => Err(format!("unknown run mode '{other}'")),
        }
    }
}
