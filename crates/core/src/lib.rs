#![warn(clippy::all, missing_docs)]

//! Package bootstrap and content discovery for the Expeditious game tree.
//!
//! This crate hosts the module database, package descriptors and their
//! mode-gated manifests, content scanning, preference and keybind loading,
//! datablock resolution, and the editor object registry used by the `pkgboot`
//! CLI and any engine host embedding it.

pub mod bootstrap;
pub mod config;
pub mod content;
#[allow(missing_docs)]
pub mod datablock;
#[allow(missing_docs)]
pub mod editor;
#[allow(missing_docs)]
pub mod host;
pub mod keybinds;
pub mod manifest;
pub mod mode;
pub mod modules;
pub mod prefs;
pub mod report;
#[allow(missing_docs)]
pub mod scene;
pub mod watch;

pub use bootstrap::{Bootstrap, PackagePlan};
pub use config::AppConfig;
pub use content::{ContentRegistry, ContentScanner, ScanRule, SharedRegistry};
pub use datablock::{DatablockSet, ResolvedDatablock};
pub use host::{ClientHost, RecordingHost, ScriptHost};
pub use manifest::{PackageDescriptor, PackageManifest};
pub use mode::RunMode;
pub use modules::ModuleDatabase;
pub use report::BootReport;
pub use watch::{ContentWatcher, WatchEvent};
