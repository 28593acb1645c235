//! Seams to the engine that actually executes scripts and owns the window.
//!
//! The dedicated startup path only ever sees a [`ScriptHost`]; client-only
//! hooks live on [`ClientHost`] so a dedicated build never has to provide them.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

/// A script the engine could not execute.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("failed to execute {}: {reason}", .path.display())]
pub struct ExecError {
    pub path: PathBuf,
    pub reason: String,
}

/// Executes scripts in order; each may register symbols later scripts use.
pub trait ScriptHost {
    fn exec(&mut self, path: &Path) -> Result<(), ExecError>;
}

/// Interactive-client subsystems initialised after packages load.
pub trait ClientHost: ScriptHost {
    fn init_render_manager(&mut self);
    fn init_lighting(&mut self, system: &str);
    fn configure_canvas(&mut self);
    /// Probe the hardware and pick graphics settings.
    fn autodetect_graphics(&mut self);
    fn init_post_fx(&mut self);
    fn show_window(&mut self);
}

/// One call made on a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", content = "arg", rename_all = "snake_case")]
pub enum HostCall {
    Exec(PathBuf),
    InitRenderManager,
    InitLighting(String),
    ConfigureCanvas,
    AutodetectGraphics,
    InitPostFx,
    ShowWindow,
}

impl HostCall {
    pub fn is_client_only(&self) -> bool {
        !matches!(self, HostCall::Exec(_))
    }
}

/// Host that performs nothing and records every call, for dry runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    calls: Vec<HostCall>,
    failing: HashSet<PathBuf>,
    verbose: bool,
}

impl RecordingHost {
    /// Log each call at info level as it is recorded.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }

    /// Make `exec` of `path` fail.
    pub fn fail_on(&mut self, path: impl Into<PathBuf>) {
        self.failing.insert(path.into());
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    /// Paths passed to `exec`, in order.
    pub fn executed(&self) -> Vec<&Path> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                HostCall::Exec(path) => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, call: HostCall) {
        if self.verbose {
            info!("{call:?}");
        }
        self.calls.push(call);
    }
}

impl ScriptHost for RecordingHost {
    fn exec(&mut self, path: &Path) -> Result<(), ExecError> {
        if self.failing.contains(path) {
            return Err(ExecError {
                path: path.to_path_buf(),
                reason: "simulated failure".to_string(),
            });
        }
        self.record(HostCall::Exec(path.to_path_buf()));
        Ok(())
    }
}

impl ClientHost for RecordingHost {
    fn init_render_manager(&mut self) {
        self.record(HostCall::InitRenderManager);
    }

    fn init_lighting(&mut self, system: &str) {
        self.record(HostCall::InitLighting(system.to_string()));
    }

    fn configure_canvas(&mut self) {
        self.record(HostCall::ConfigureCanvas);
    }

    fn autodetect_graphics(&mut self) {
        self.record(HostCall::AutodetectGraphics);
    }

    fn init_post_fx(&mut self) {
        self.record(HostCall::InitPostFx);
    }

    fn show_window(&mut self) {
        self.record(HostCall::ShowWindow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_and_simulated_failures() {
        let mut host = RecordingHost::default();
        host.fail_on("broken.cs");

        assert!(host.exec(Path::new("main.cs")).is_ok());
        let err = host.exec(Path::new("broken.cs")).unwrap_err();
        assert_eq!(err.path, PathBuf::from("broken.cs"));
        host.init_lighting("Basic Lighting");

        assert_eq!(host.executed(), [Path::new("main.cs")]);
        assert_eq!(
            host.calls(),
            [
                HostCall::Exec(PathBuf::from("main.cs")),
                HostCall::InitLighting("Basic Lighting".to_string()),
            ]
        );
        assert!(host.calls()[1].is_client_only());
    }
}
