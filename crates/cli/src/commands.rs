use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use pkgboot_core::{
    AppConfig, BootReport, Bootstrap, ContentWatcher, DatablockSet, RecordingHost, SharedRegistry,
    WatchEvent,
};

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

pub fn plan(config: AppConfig) -> Result<()> {
    let mode = config.run_mode;
    let bootstrap = Bootstrap::new(config);
    print_json(&bootstrap.plan(mode))
}

pub fn boot(config: AppConfig, report_path: Option<PathBuf>) -> Result<()> {
    let bootstrap = Bootstrap::new(config);
    let mut host = RecordingHost::verbose();
    let report = bootstrap.run(&mut host);

    if let Some(path) = &report_path {
        report.persist(path)?;
        info!("boot report written to {}", path.display());
    }
    print_json(&json!({
        "mode": report.mode,
        "calls": host.calls(),
        "missing": report.missing,
        "failures": report.failures,
        "registry": report.registry,
    }))?;

    if !report.is_clean() {
        bail!(
            "bootstrap finished with {} missing script(s) and {} failure(s)",
            report.missing.len(),
            report.failures.len()
        );
    }
    Ok(())
}

pub fn scan(config: AppConfig) -> Result<()> {
    let bootstrap = Bootstrap::new(config);
    let (registry, failures) = bootstrap.scan();
    print_json(&registry)?;
    if let Some(first) = failures.first() {
        bail!(
            "{} content rule(s) failed, first {}: {}",
            failures.len(),
            first.subject,
            first.reason
        );
    }
    Ok(())
}

pub fn datablock(file: &Path, name: &str) -> Result<()> {
    let mut datablocks = DatablockSet::default();
    let count = datablocks.load_file(file)?;
    info!("{count} datablock(s) declared in {}", file.display());

    let resolved = datablocks
        .resolve(name)
        .with_context(|| format!("failed to resolve datablock in {}", file.display()))?;
    print_json(&resolved)
}

pub fn modules(config: AppConfig) -> Result<()> {
    let mode = config.run_mode;
    let bootstrap = Bootstrap::new(config);
    let mut report = BootReport::new(mode, bootstrap.empty_registry());
    let database = bootstrap.load_modules(&mut report);

    let loaded: Vec<_> = database
        .loaded_modules()
        .map(|module| {
            json!({
                "moduleId": module.module_id,
                "versionId": module.version_id,
                "group": module.group,
                "path": module.module_path,
            })
        })
        .collect();
    print_json(&json!({ "loaded": loaded, "failures": report.failures }))
}

pub async fn watch(config: AppConfig) -> Result<()> {
    let bootstrap = Bootstrap::new(config);
    let registry = SharedRegistry::new(bootstrap.empty_registry());
    let watcher = ContentWatcher::new(
        bootstrap.config().game_root.clone(),
        bootstrap.content_rules(),
        bootstrap.scanner().clone(),
        registry.clone(),
    );

    let (tx, mut rx) = mpsc::channel(8);
    let task = tokio::spawn(async move {
        if let Err(err) = watcher.run(tx).await {
            error!("Content watcher error: {err:#}");
        }
    });

    while let Some(event) = rx.recv().await {
        match event {
            WatchEvent::Rescanned { total } => {
                info!("registry rescanned: {total} file(s)");
                print_json(&registry.snapshot())?;
            }
            WatchEvent::Error(err) => warn!("rescan failed: {err:#}"),
        }
    }
    task.await.context("content watcher task panicked")
}
