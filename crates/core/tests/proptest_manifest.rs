//! Property tests for manifest building and content scanning.
//!
//! Descriptors and content trees are generated at random; the mode gate and
//! the registry's set semantics must hold for all of them.

use std::fs;

use pkgboot_core::{
    content::ContentRegistry,
    manifest::{Anchor, ClientSection, ResourcePath, Scope},
    ContentScanner, PackageDescriptor, RunMode, ScanRule,
};
use proptest::prelude::*;
use tempfile::tempdir;

fn resource_path_strategy() -> impl Strategy<Value = ResourcePath> {
    (
        prop_oneof![Just(Anchor::Package), Just(Anchor::Game), Just(Anchor::Profile)],
        "[a-z]{1,8}/[a-z]{1,8}\\.cs",
    )
        .prop_map(|(anchor, relative)| ResourcePath::new(anchor, relative))
}

fn paths(max: usize) -> impl Strategy<Value = Vec<ResourcePath>> {
    prop::collection::vec(resource_path_strategy(), 0..max)
}

fn descriptor_strategy() -> impl Strategy<Value = PackageDescriptor> {
    (
        paths(6),
        paths(3),
        prop::option::of(resource_path_strategy()),
        prop::option::of(resource_path_strategy()),
        paths(3),
        paths(3),
        paths(3),
    )
        .prop_map(
            |(server, profiles, default_keybinds, user_keybinds, input_commands, guis, scripts)| {
                PackageDescriptor {
                    name: "generated".to_string(),
                    server,
                    content: Vec::new(),
                    client: ClientSection {
                        profiles,
                        default_keybinds,
                        user_keybinds,
                        input_commands,
                        guis,
                        scripts,
                    },
                }
            },
        )
}

/// A content file: stem, whether the source exists, whether a compiled copy exists.
fn content_files() -> impl Strategy<Value = Vec<(String, bool, bool)>> {
    prop::collection::vec(("[a-z]{1,6}", any::<bool>(), any::<bool>()), 0..8)
}

proptest! {
    #[test]
    fn dedicated_manifest_has_no_client_entries(descriptor in descriptor_strategy()) {
        let manifest = descriptor.build_manifest(RunMode::Dedicated);
        prop_assert!(manifest.client().is_empty());
        prop_assert!(manifest.entries().iter().all(|entry| entry.scope == Scope::Shared));
        prop_assert_eq!(manifest.len(), descriptor.server.len());
    }

    #[test]
    fn client_manifest_extends_dedicated(descriptor in descriptor_strategy()) {
        let dedicated = descriptor.build_manifest(RunMode::Dedicated);
        let client = descriptor.build_manifest(RunMode::Client);
        prop_assert_eq!(client.shared(), dedicated.entries());
        prop_assert!(client.client().iter().all(|entry| entry.scope == Scope::Client));

        let section = &descriptor.client;
        let expected = section.profiles.len()
            + usize::from(section.default_keybinds.is_some())
            + usize::from(section.user_keybinds.is_some())
            + section.input_commands.len()
            + section.guis.len()
            + section.scripts.len();
        prop_assert_eq!(client.client().len(), expected);
    }

    #[test]
    fn descriptors_survive_json(descriptor in descriptor_strategy()) {
        let json = serde_json::to_string(&descriptor).expect("serialize");
        let back: PackageDescriptor = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back, descriptor);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn scanning_is_idempotent_and_prefers_sources(files in content_files()) {
        let temp = tempdir().expect("tempdir");
        let dir = temp.path().join("scripts");
        fs::create_dir_all(&dir).expect("create dir");
        for (stem, source, derived) in &files {
            if *source {
                fs::write(dir.join(format!("{stem}.cs")), b"// source").expect("write");
            }
            if *derived {
                fs::write(dir.join(format!("{stem}.cs.dso")), b"\x01").expect("write");
            }
        }

        let scanner = ContentScanner::default();
        let rule = ScanRule::new("DatablockFiles", "scripts/*.cs");
        let mut registry = ContentRegistry::with_categories(["DatablockFiles"]);
        let first = scanner.scan_rule(temp.path(), &rule, &mut registry).expect("scan");
        let second = scanner.scan_rule(temp.path(), &rule, &mut registry).expect("rescan");
        prop_assert_eq!(second, 0);
        prop_assert_eq!(first, registry.total());

        for path in registry.paths("DatablockFiles") {
            let name = path.to_string_lossy();
            if let Some(source) = name.strip_suffix(".dso") {
                prop_assert!(!temp.path().join(source).exists());
            }
        }

        let mut stems: Vec<&String> = files
            .iter()
            .filter(|(_, source, derived)| *source || *derived)
            .map(|(stem, _, _)| stem)
            .collect();
        stems.sort();
        stems.dedup();
        prop_assert_eq!(registry.total(), stems.len());
    }
}
