//! Startup sequence: modules, package manifests, content discovery, and the
//! client-only initialisation gated on the run mode.
//!
//! Every step runs sequentially. Missing or failing scripts are logged and
//! recorded in the [`BootReport`]; the remaining steps still run.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    content::{ContentRegistry, ContentScanner, ScanRule},
    host::{ClientHost, ScriptHost},
    keybinds::KeyBindings,
    manifest::{AnchorRoots, EntryKind, ManifestEntry, PackageDescriptor, PackageManifest},
    mode::RunMode,
    modules::{ModuleDatabase, ModuleDefinition},
    prefs::{resolve_override, Preferences, AUTO_DETECT_KEY},
    report::{BootFailure, BootReport},
};

/// A loaded module's manifest for one run mode, without executing anything.
#[derive(Debug, Clone, Serialize)]
pub struct PackagePlan {
    /// Module owning the package.
    pub module: String,
    /// Descriptor file, when the module declares one.
    pub descriptor: Option<PathBuf>,
    /// Empty when the descriptor is absent or unreadable.
    pub manifest: PackageManifest,
}

/// Drives the startup sequence against an engine host.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    config: AppConfig,
    scanner: ContentScanner,
}

impl Bootstrap {
    /// Bootstrap driven by `config`.
    pub fn new(config: AppConfig) -> Self {
        let scanner = ContentScanner::new(config.derived_extension.clone());
        Self { config, scanner }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Scanner applying the configured derived extension.
    pub fn scanner(&self) -> &ContentScanner {
        &self.scanner
    }

    /// Run the path selected by the configured run mode.
    pub fn run<H: ClientHost>(&self, host: &mut H) -> BootReport {
        match self.config.run_mode {
            RunMode::Dedicated => self.dedicated(host),
            RunMode::Client => self.client(host),
        }
    }

    /// Headless server startup. Client manifest entries and client hooks are
    /// never attempted.
    pub fn dedicated<H: ScriptHost>(&self, host: &mut H) -> BootReport {
        info!("starting dedicated bootstrap");
        let mut report = self.load_packages(RunMode::Dedicated, host);
        report.finish();
        log_summary(&report);
        report
    }

    /// Interactive client startup.
    pub fn client<H: ClientHost>(&self, host: &mut H) -> BootReport {
        info!("starting client bootstrap");
        let mut report = self.load_packages(RunMode::Client, host);

        host.init_render_manager();
        host.init_lighting(&self.config.lighting);

        let default_prefs = self.config.default_prefs_path();
        let source = resolve_override(
            &self.config.profile_dir().join(&self.config.client_prefs_file),
            &default_prefs,
        );
        let preferences = match self.scanner.resolve_source(source.path()) {
            Some(path) => {
                exec_logged(host, &path, &mut report);
                Preferences::load(&source).unwrap_or_else(|err| {
                    debug!("preferences not parsed: {err:#}");
                    Preferences::default()
                })
            }
            None => {
                warn!("Missing preferences {}", source.path().display());
                report.missing.push(source.path().to_path_buf());
                Preferences::default()
            }
        };
        report.preferences = Some(source);

        host.configure_canvas();

        let auto_detect = self
            .config
            .auto_detect
            .or_else(|| preferences.flag(AUTO_DETECT_KEY))
            .unwrap_or(false);
        if auto_detect {
            host.autodetect_graphics();
        }
        report.auto_detected = auto_detect;

        host.init_post_fx();
        host.show_window();

        report.finish();
        log_summary(&report);
        report
    }

    /// Manifests every loaded module would execute in `mode`.
    pub fn plan(&self, mode: RunMode) -> Vec<PackagePlan> {
        let mut report = BootReport::new(mode, ContentRegistry::default());
        let modules = self.load_modules(&mut report);
        modules
            .loaded_modules()
            .map(|module| {
                let descriptor = module.package_path();
                let manifest = descriptor
                    .as_deref()
                    .and_then(|path| PackageDescriptor::load(path).ok())
                    .map(|descriptor| descriptor.build_manifest(mode))
                    .unwrap_or_default();
                PackagePlan {
                    module: module.module_id.clone(),
                    descriptor,
                    manifest,
                }
            })
            .collect()
    }

    /// Content rules of every loaded package, in load order.
    pub fn content_rules(&self) -> Vec<ScanRule> {
        let mut report = BootReport::new(self.config.run_mode, ContentRegistry::default());
        let modules = self.load_modules(&mut report);
        modules
            .loaded_modules()
            .filter_map(|module| module.package_path())
            .filter_map(|path| match PackageDescriptor::load(&path) {
                Ok(descriptor) => Some(descriptor.content),
                Err(err) => {
                    warn!("Skipping package {}: {err:#}", path.display());
                    None
                }
            })
            .flatten()
            .collect()
    }

    /// Scan the content rules of every loaded package into a fresh registry,
    /// without executing anything.
    pub fn scan(&self) -> (ContentRegistry, Vec<BootFailure>) {
        let mut registry = self.empty_registry();
        let failures = self.scan_rules(&self.content_rules(), &mut registry);
        (registry, failures)
    }

    /// Run `rules` into `registry`. Rules naming an undeclared category are
    /// skipped; a failing rule is returned and the rest still run.
    pub fn scan_rules(
        &self,
        rules: &[ScanRule],
        registry: &mut ContentRegistry,
    ) -> Vec<BootFailure> {
        let mut failures = Vec::new();
        for rule in rules {
            if !registry.has_category(&rule.category) {
                debug!(
                    "category {} not declared, skipping {}",
                    rule.category, rule.pattern
                );
                continue;
            }
            if let Err(err) = self
                .scanner
                .scan_rule(&self.config.game_root, rule, registry)
            {
                warn!("Failed to scan {}: {err:#}", rule.pattern);
                failures.push(BootFailure {
                    subject: rule.pattern.clone(),
                    reason: format!("{err:#}"),
                });
            }
        }
        failures
    }

    /// Registry with the configured categories declared and nothing scanned.
    pub fn empty_registry(&self) -> ContentRegistry {
        ContentRegistry::with_categories(self.config.content_categories.iter().cloned())
    }

    /// Scan and load the core module, then the configured module group.
    pub fn load_modules(&self, report: &mut BootReport) -> ModuleDatabase {
        let root = &self.config.game_root;
        let mut modules = ModuleDatabase::new(self.config.module_extension.clone());

        let core_dir = root.join(&self.config.core_modules_dir);
        if let Err(err) = modules.scan_modules(&core_dir) {
            warn!("Failed to scan {}: {err:#}", core_dir.display());
            report.fail(core_dir.display().to_string(), format!("{err:#}"));
        }
        match modules.load_explicit(&self.config.core_module) {
            Ok(loaded) => report.modules.extend(loaded),
            Err(err) => {
                error!("{err}");
                report.fail(&self.config.core_module, err);
            }
        }

        let game_dir = root.join(&self.config.game_modules_dir);
        if let Err(err) = modules.scan_modules(&game_dir) {
            warn!("Failed to scan {}: {err:#}", game_dir.display());
            report.fail(game_dir.display().to_string(), format!("{err:#}"));
        }
        let (loaded, failures) = modules.load_group(&self.config.module_group);
        report.modules.extend(loaded);
        for err in failures {
            error!("{err}");
            report.fail(&self.config.module_group, err);
        }

        modules
    }

    fn load_packages<H: ScriptHost>(&self, mode: RunMode, host: &mut H) -> BootReport {
        let mut report = BootReport::new(mode, self.empty_registry());
        let modules = self.load_modules(&mut report);

        for module in modules.loaded_modules() {
            self.load_module(module, mode, host, &mut report);
        }
        report
    }

    fn load_module<H: ScriptHost>(
        &self,
        module: &ModuleDefinition,
        mode: RunMode,
        host: &mut H,
        report: &mut BootReport,
    ) {
        if let Some(script) = module.script_path() {
            match self.scanner.resolve_source(&script) {
                Some(path) => exec_logged(host, &path, report),
                None => {
                    warn!(
                        "Missing script {} for module '{}'",
                        script.display(),
                        module.module_id
                    );
                    report.missing.push(script);
                }
            }
        }

        let Some(descriptor_path) = module.package_path() else {
            return;
        };
        let descriptor = match PackageDescriptor::load(&descriptor_path) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!("Skipping package of module '{}': {err:#}", module.module_id);
                report.fail(&module.module_id, format!("{err:#}"));
                return;
            }
        };

        let package_dir = descriptor_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| module.module_path.clone());
        let profile_dir = self.config.profile_dir();
        let roots = AnchorRoots {
            package: &package_dir,
            game: &self.config.game_root,
            profile: &profile_dir,
        };

        let manifest = descriptor.build_manifest(mode);
        debug!(
            "package '{}': {} shared, {} client entries",
            descriptor.name,
            manifest.shared().len(),
            manifest.client().len()
        );

        self.run_entries(manifest.shared(), &roots, host, report);
        self.scan_content(&descriptor, report);
        if mode.is_client() {
            self.run_entries(manifest.client(), &roots, host, report);
        }
    }

    fn scan_content(&self, descriptor: &PackageDescriptor, report: &mut BootReport) {
        let failures = self.scan_rules(&descriptor.content, &mut report.registry);
        report.failures.extend(failures);
    }

    fn run_entries<H: ScriptHost>(
        &self,
        entries: &[ManifestEntry],
        roots: &AnchorRoots<'_>,
        host: &mut H,
        report: &mut BootReport,
    ) {
        for entry in entries {
            let path = entry.path.resolve(roots);
            let Some(resolved) = self.scanner.resolve_source(&path) else {
                if entry.optional {
                    debug!("optional {} not present", path.display());
                    report.skipped_optional.push(path);
                } else {
                    warn!("Missing script {} ({})", path.display(), entry.path);
                    report.missing.push(path);
                }
                continue;
            };

            if entry.kind == EntryKind::Keybinds && resolved == path {
                match KeyBindings::load(&resolved) {
                    Ok(bindings) => report.keybindings.layer(bindings),
                    Err(err) => debug!("keybinds not parsed: {err:#}"),
                }
            }

            exec_logged(host, &resolved, report);
        }
    }
}

fn exec_logged<H: ScriptHost>(host: &mut H, path: &Path, report: &mut BootReport) {
    match host.exec(path) {
        Ok(()) => report.executed.push(path.to_path_buf()),
        Err(err) => {
            warn!("{err}");
            report.fail(path.display().to_string(), err.reason);
        }
    }
}

fn log_summary(report: &BootReport) {
    info!(
        "bootstrap finished ({}): {} module(s), {} script(s), {} missing, {} failure(s), {} content file(s)",
        report.mode,
        report.modules.len(),
        report.executed.len(),
        report.missing.len(),
        report.failures.len(),
        report.registry.total()
    );
}
