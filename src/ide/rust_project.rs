//! `rust-project.json` exporter.
//!
//! Describes every target with Rust sources as a crate so rust-analyzer can
//! replay individual compilations. The format is unstable and intentionally
//! minimal here: root module, edition, and intra-graph dependencies.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::json;

use crate::builder::Builder;
use crate::emit::write_if_changed;
use crate::files::SourceFile;
use crate::label::Label;
use crate::settings::BuildSettings;

/// Write `rust-project.json` into the build directory.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn run_and_write_files(settings: &BuildSettings, builder: &Builder) -> Result<()> {
    // Stable crate indices: label order.
    let rust_targets: BTreeMap<Label, (&SourceFile, &crate::target::Target)> = builder
        .get_all_resolved_targets()
        .iter()
        .filter_map(|target| {
            root_module(target).map(|root| (target.label.clone(), (root, target.as_ref())))
        })
        .collect();
    let indices: BTreeMap<&Label, usize> = rust_targets
        .keys()
        .enumerate()
        .map(|(index, label)| (label, index))
        .collect();

    let crates: Vec<serde_json::Value> = rust_targets
        .values()
        .map(|(root, target)| {
            let deps: Vec<serde_json::Value> = target
                .linked_deps()
                .filter_map(|dep| indices.get(dep).map(|&index| (dep, index)))
                .map(|(dep, index)| {
                    json!({
                        "crate": index,
                        "name": dep.name.replace('-', "_"),
                    })
                })
                .collect();
            json!({
                "display_name": target.label.name,
                "root_module": settings.disk_path(root).as_str(),
                "edition": "2021",
                "deps": deps,
                "cfg": [],
            })
        })
        .collect();

    let document = json!({ "crates": crates });
    let mut content =
        serde_json::to_string_pretty(&document).context("serialising rust-project")?;
    content.push('\n');
    let path = settings.build_dir_disk().join("rust-project.json");
    write_if_changed(&path, &content).with_context(|| format!("writing {path}"))?;
    Ok(())
}

/// The crate root: `lib.rs` or `main.rs` when present, else the first Rust
/// source. Targets without Rust sources are not crates.
fn root_module(target: &crate::target::Target) -> Option<&SourceFile> {
    let rust_sources: Vec<&SourceFile> = target
        .sources
        .iter()
        .filter(|source| source.as_str().ends_with(".rs"))
        .collect();
    rust_sources
        .iter()
        .find(|source| {
            source.as_str().ends_with("/lib.rs") || source.as_str().ends_with("/main.rs")
        })
        .copied()
        .or_else(|| rust_sources.first().copied())
}
