//! Manifest checks for the crate layering: state at the bottom, then core,
//! then the CI adapters, with the CLI on top.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .unwrap()
        .to_path_buf()
}

fn manifest(relative: &str) -> toml::Value {
    let path = workspace_root().join(relative).join("Cargo.toml");
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("{}: {e}", path.display()))
        .parse()
        .unwrap()
}

/// `reviewgate-*` crates named in a manifest's `[dependencies]`.
fn internal_deps(doc: &toml::Value) -> BTreeSet<String> {
    doc.get("dependencies")
        .and_then(|d| d.as_table())
        .map(|deps| {
            deps.keys()
                .filter(|name| name.starts_with("reviewgate-"))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn internal_dependencies_follow_layering() {
    let expected = [
        ("reviewgate-state", set(&[])),
        ("reviewgate-core", set(&["reviewgate-state"])),
        ("reviewgate-ci", set(&["reviewgate-core"])),
        ("reviewgate-cli", set(&["reviewgate-ci", "reviewgate-core"])),
    ];
    for (krate, deps) in expected {
        let doc = manifest(&format!("crates/{krate}"));
        assert_eq!(internal_deps(&doc), deps, "{krate} dependencies");
    }
}

#[test]
fn internal_dependencies_resolve_through_workspace() {
    let root = manifest(".");
    let version = root["workspace"]["package"]["version"].as_str().unwrap();
    let shared = root["workspace"]["dependencies"].as_table().unwrap();

    for krate in ["reviewgate-core", "reviewgate-ci", "reviewgate-cli"] {
        let doc = manifest(&format!("crates/{krate}"));
        for dep in internal_deps(&doc) {
            let entry = &doc["dependencies"][dep.as_str()];
            assert_eq!(
                entry.get("workspace").and_then(|v| v.as_bool()),
                Some(true),
                "{krate} should take {dep} from the workspace"
            );
            let pinned = &shared[dep.as_str()];
            assert_eq!(pinned["path"].as_str(), Some(format!("crates/{dep}").as_str()));
            assert_eq!(pinned["version"].as_str(), Some(version), "{dep} version pin");
        }
    }
}

#[test]
fn members_match_crate_directories() {
    let root = manifest(".");
    let members: BTreeSet<String> = root["workspace"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m.as_str().map(str::to_string))
        .collect();
    let dirs: BTreeSet<String> = std::fs::read_dir(workspace_root().join("crates"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().join("Cargo.toml").is_file())
        .map(|entry| format!("crates/{}", entry.file_name().to_string_lossy()))
        .collect();
    assert_eq!(members, dirs);

    for member in &members {
        let doc = manifest(member);
        let name = doc["package"]["name"].as_str().unwrap();
        assert_eq!(Some(name), member.strip_prefix("crates/"));
        assert_eq!(
            doc["package"]["version"]["workspace"].as_bool(),
            Some(true),
            "{member} should inherit the workspace version"
        );
    }
}

#[test]
fn cli_installs_reviewgate_binary() {
    let doc = manifest("crates/reviewgate-cli");
    let bins: Vec<&str> = doc["bin"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["name"].as_str())
        .collect();
    assert_eq!(bins, vec!["reviewgate"]);
}
